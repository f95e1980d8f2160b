//! # bundlerouter
//!
//! Configuration-driven request dispatch on the `may` coroutine runtime.
//! Routes and the middleware chain are declared in YAML; the code behind
//! them lives in application-defined controllers, models and services that
//! are constructed lazily per request and cached for the rest of it.
//!
//! ## Architecture
//!
//! - **[`config`]**: merged `config/*.yml` sections with typed accessors
//! - **[`router`]**: the route table and pattern matching
//! - **[`component`]**: component classes and their per-request instances
//! - **[`registry`]**: boot-time registries of classes, capabilities and
//!   response formatters, plus plugin manifests
//! - **[`resolver`]**: per-request resolution with a singleton cache and
//!   middleware continuations
//! - **[`context`]**: request and response contexts
//! - **[`dispatcher`]**: the per-request pipeline
//! - **[`server`]**: the `may_minihttp` adapter
//! - **[`static_files`]**: static asset serving
//! - **[`logging`]** and **[`runtime_config`]**: ambient setup
//!
//! ## Request flow
//!
//! ```text
//! HTTP request
//!   -> bind formatters and capabilities
//!   -> middleware chain (Service.method, in order, each awaits next)
//!   -> route match (404 on miss)
//!   -> static file (404 on miss) | Controller.method (500 on failure)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use bundlerouter::component::{ComponentClass, ComponentKind};
//! use bundlerouter::config::AppConfig;
//! use bundlerouter::context::RequestParts;
//! use bundlerouter::dispatcher::Dispatcher;
//! use bundlerouter::framework::Framework;
//! use bundlerouter::registry::Registries;
//! use http::Method;
//!
//! let config = AppConfig::from_yaml_str(
//!     ".",
//!     "routes:\n  user:\n    path: /users/:id\n    method: get\n    handler: Users.show\n",
//! )
//! .unwrap();
//!
//! let mut registries = Registries::new();
//! registries
//!     .register(
//!         ComponentClass::builder(ComponentKind::Controller, "Users", |_bundle| Ok(()))
//!             .method("show", |_: &(), instance| {
//!                 let id = instance.request().param("id").unwrap_or_default();
//!                 instance.response().ok(serde_json::json!({ "id": id }));
//!                 Ok(())
//!             })
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let dispatcher = Dispatcher::from_config(Framework::new(config, registries));
//! let reply = dispatcher.handle(RequestParts::new(Method::GET, "/users/42"));
//! assert_eq!(reply.status, 200);
//! assert_eq!(reply.body_str(), r#"{"id":"42"}"#);
//! ```

pub mod capability;
pub mod cli;
pub mod component;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod framework;
pub mod logging;
pub mod registry;
pub mod resolver;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod static_files;

pub use component::{ComponentClass, ComponentKind, Instance};
pub use config::AppConfig;
pub use context::{RequestContext, ResponseContext};
pub use dispatcher::Dispatcher;
pub use framework::Framework;
pub use registry::Registries;
pub use resolver::{BundleResolver, Next};
pub use router::RouteTable;
