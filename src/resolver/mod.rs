//! # Resolver Module
//!
//! Turns `(kind, name)` pairs into component instances for one resolution
//! chain, normally one inbound request.
//!
//! ## Caching
//!
//! Each chain owns a [`SingletonCache`]. [`BundleResolver::get_or_create`]
//! constructs a name once per chain and returns the cached instance after
//! that; [`BundleResolver::create_new`] always constructs and only stores the
//! result when asked to. The cache is dropped with the last resolver of the
//! chain; there is no teardown hook.
//!
//! ## Capabilities
//!
//! Every constructed instance carries the capability table its framework's
//! registries hold for the instance's kind. The tables are immutable after
//! boot, so concurrent resolutions need no binding step and a class shared by
//! two registries exposes each registry's own capabilities.
//!
//! ## Middleware continuation
//!
//! The chain also carries the continuation slot used by the middleware chain.
//! [`Next`] is the handle a middleware method signals through.

mod cache;
mod core;
mod next;

pub use cache::SingletonCache;
pub use core::BundleResolver;
pub use next::Next;

pub(crate) use core::DetachedScope;
pub(crate) use next::{Continuation, StepOutcome};
