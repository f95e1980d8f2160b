//! # CLI Module
//!
//! ```bash
//! # Serve ./myapp on server.http.port (default 1337)
//! bundlerouter serve --app-dir myapp
//!
//! # Override the listen address
//! bundlerouter serve --app-dir myapp --addr 127.0.0.1:8080
//!
//! # Show what config/routes.yml compiles to
//! bundlerouter routes --app-dir myapp
//! ```
//!
//! The binary has no application components, so handler routes answer 500
//! unless an embedding crate calls [`run_cli_with`] with its own
//! [`Registries`](crate::registry::Registries).

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{describe_routes, run_cli, run_cli_with, serve, Cli, Commands};
