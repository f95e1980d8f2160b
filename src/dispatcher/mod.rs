//! # Dispatcher Module
//!
//! Runs the per-request pipeline. Each request goes through these stages in
//! order, and any stage may end the request early:
//!
//! 1. **Bind responses**: the formatter table (`ok`, `badRequest`,
//!    `notFound`, `conflict`, `serverError` plus anything the application
//!    registered) is attached to the response.
//! 2. **Bind capabilities**: request and response capability functions are
//!    attached to their contexts.
//! 3. **Middleware chain**: every configured `Service.method` entry runs in
//!    declared order. A step must signal through its [`Next`] handle before
//!    the following step starts. A failure stops the chain and the request
//!    ends with an empty 500.
//! 4. **Route match**: no route, or no bucket for the method, ends with 404.
//! 5. **Handler dispatch**: static routes serve a regular file from the
//!    asset root (404 otherwise); handler routes resolve the controller
//!    through the request's [`BundleResolver`] and invoke the method, which
//!    must end the response itself. Resolution or invocation failures,
//!    panics included, end with 500.
//!
//! ## Known limitation
//!
//! There is no cancellation. A middleware that keeps its [`Next`] handle and
//! never signals, or a handler that keeps its response alive and never ends
//! it, stalls that request indefinitely.
//!
//! [`Next`]: crate::resolver::Next
//! [`BundleResolver`]: crate::resolver::BundleResolver

mod core;
mod middleware;

pub use core::{Dispatcher, Outcome};
pub use middleware::{parse_chain, MiddlewareStep};
