use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::dispatcher::Dispatcher;
use crate::framework::Framework;
use crate::logging::{init_logging, LoggingGuard};
use crate::registry::Registries;
use crate::router::RouteTable;
use crate::runtime_config::RuntimeConfig;
use crate::server::{AppService, HttpServer, ServerHandle};

/// Command-line interface for bundlerouter.
#[derive(Debug, Parser)]
#[command(name = "bundlerouter", version)]
#[command(about = "Configuration-driven request dispatcher", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve an application directory over HTTP
    Serve {
        /// Application directory holding `config/`
        #[arg(long, env = "BUNDLE_APP_DIR", default_value = ".")]
        app_dir: PathBuf,

        /// Listen address; defaults to 0.0.0.0 and `server.http.port`
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
    /// Print the compiled route table
    Routes {
        /// Application directory holding `config/`
        #[arg(long, env = "BUNDLE_APP_DIR", default_value = ".")]
        app_dir: PathBuf,
    },
}

/// Parse the process arguments and run with an empty component registry.
pub fn run_cli() -> anyhow::Result<()> {
    run_cli_with(Cli::parse(), Registries::new())
}

/// Run a parsed command against application-supplied registries.
pub fn run_cli_with(cli: Cli, registries: Registries) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { app_dir, addr } => {
            let _logging = init_logging_or_warn();
            let handle = serve(&app_dir, addr, registries)?;
            wait_for_shutdown(handle)
        }
        Commands::Routes { app_dir } => {
            let config = AppConfig::load(&app_dir)?;
            print!("{}", describe_routes(&RouteTable::from_config(&config)));
            Ok(())
        }
    }
}

fn init_logging_or_warn() -> Option<LoggingGuard> {
    match init_logging() {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Logging not initialized: {err:#}");
            None
        }
    }
}

/// Load the application, build the dispatcher and start listening.
///
/// Plugins under `src/plugins` of the app directory are installed first;
/// their functions come from [`Registries::provide_plugin`].
pub fn serve(
    app_dir: &Path,
    addr: Option<SocketAddr>,
    mut registries: Registries,
) -> anyhow::Result<ServerHandle> {
    RuntimeConfig::from_env().apply();
    let config = AppConfig::load(app_dir)
        .with_context(|| format!("Failed to load application {}", app_dir.display()))?;
    let plugins_dir = config.plugins_dir();
    registries
        .install_plugins_from(&plugins_dir)
        .with_context(|| format!("Failed to install plugins from {}", plugins_dir.display()))?;
    let server = config.server();
    if server.secure {
        warn!("server.http.secure is set but TLS is not supported, serving plain HTTP");
    }
    if server.workers > 1 {
        warn!(
            workers = server.workers,
            "server.workers is set but replication is not supported, running one process"
        );
    }
    let addr = addr.unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], server.port)));

    let framework = Framework::new(config, registries);
    let dispatcher = Arc::new(Dispatcher::from_config(framework));
    let handle = HttpServer(AppService::new(dispatcher))
        .start(addr)
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %handle.addr(), app_dir = %app_dir.display(), "Serving application");
    Ok(handle)
}

#[cfg(unix)]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handlers")?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "Shutdown signal received");
    }
    handle.stop();
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    handle
        .join()
        .map_err(|e| anyhow::anyhow!("Server coroutine panicked: {e:?}"))
}

/// One line per `(pattern, method)` in declaration order, then skipped
/// entries.
#[must_use]
pub fn describe_routes(table: &RouteTable) -> String {
    let mut out = String::new();
    for route in table.routes() {
        for (method, target) in route.methods() {
            out.push_str(&format!("{:<8} {:<32} {}\n", method.to_string(), route.pattern(), target));
        }
    }
    for warning in table.warnings() {
        out.push_str(&format!("skipped: {warning}\n"));
    }
    out
}
