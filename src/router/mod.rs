//! # Router Module
//!
//! Compiles the declarative `routes` configuration into a [`RouteTable`] and
//! resolves request paths against it.
//!
//! ## Building
//!
//! Each entry carries a `path`, an optional `method` (default `all`) and
//! either `static: true` or a `handler` of the form `Name.method` (further
//! `.segments` are ignored). Entries
//! without a path, or without any target, are logged and skipped. Handler
//! strings are parsed once into a [`HandlerDescriptor`] here, not per
//! request. When a `(pattern, method)` pair is declared twice, the first
//! declaration is kept.
//!
//! ## Matching
//!
//! Matching is two-step: the path picks a route (literal segments beat
//! `:param` segments, which beat `*` splats), then the request method picks a
//! bucket, falling back to `all`. A matched path without a usable bucket is a
//! miss; no other route is tried.
//!
//! ```rust
//! use bundlerouter::router::{MethodKey, RouteEntry, RouteTable, RouteTarget};
//! use http::Method;
//!
//! let table = RouteTable::from_entries([RouteEntry {
//!     pattern: "/assets/*".to_string(),
//!     method: MethodKey::All,
//!     target: RouteTarget::Static,
//! }]);
//!
//! let matched = table.lookup(&Method::GET, "/assets/css/site.css").unwrap();
//! assert_eq!(matched.splats, vec!["css/site.css".to_string()]);
//! assert!(table.lookup(&Method::GET, "/other").is_none());
//! ```

mod core;
mod radix;

pub use core::{
    HandlerDescriptor, MethodKey, ParamVec, Route, RouteEntry, RouteMatch, RouteTable,
    RouteTarget, MAX_INLINE_PARAMS,
};
