//! Structured logging setup.
//!
//! Everything in the crate logs through `tracing` with structured fields
//! (`request_id`, `method`, `path`, `handler`, `middleware`, `status`,
//! `duration_us`). This module installs the subscriber:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `BUNDLE_LOG_LEVEL` | `info` | base level: trace/debug/info/warn/error |
//! | `BUNDLE_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `BUNDLE_LOG_TARGET_FILTER` | unset | extra comma separated directives |
//! | `BUNDLE_LOG_ASYNC` | `false` | write through a non-blocking buffer |
//! | `BUNDLE_LOG_INCLUDE_LOCATION` | `false` | add file and line |
//!
//! `RUST_LOG`, when set, replaces the base level.

use std::env;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// Anything but `pretty` selects JSON.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("pretty") {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub log_level: String,
    pub format: LogFormat,
    pub target_filter: Option<String>,
    pub async_logging: bool,
    pub include_location: bool,
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self {
            log_level: env::var("BUNDLE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: LogFormat::parse(
                &env::var("BUNDLE_LOG_FORMAT").unwrap_or_else(|_| "json".to_string()),
            ),
            target_filter: env::var("BUNDLE_LOG_TARGET_FILTER").ok(),
            async_logging: env_flag("BUNDLE_LOG_ASYNC"),
            include_location: env_flag("BUNDLE_LOG_INCLUDE_LOCATION"),
        }
    }

    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            target_filter: None,
            async_logging: false,
            include_location: true,
        }
    }

    pub fn default_prod() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            target_filter: None,
            async_logging: true,
            include_location: false,
        }
    }

    /// Base level; unknown names fall back to `info`.
    #[must_use]
    pub fn level(&self) -> Level {
        match self.log_level.trim().to_ascii_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Keeps the non-blocking writer flushing. Hold it for the process lifetime.
#[must_use = "dropping the guard stops buffered log output"]
pub struct LoggingGuard {
    _worker: Option<WorkerGuard>,
}

/// Build the filter: `RUST_LOG` or the configured level, quiet transport
/// internals, then any extra directives.
pub fn build_filter(config: &LogConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level().as_str()));
    filter = filter.add_directive(
        "may_minihttp=warn"
            .parse()
            .context("Invalid built-in log directive")?,
    );
    if let Some(targets) = &config.target_filter {
        for directive in targets.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(err) => eprintln!("Ignoring invalid log directive {directive:?}: {err}"),
            }
        }
    }
    Ok(filter)
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging_with_config(config: &LogConfig) -> Result<LoggingGuard> {
    let filter = build_filter(config)?;
    let (writer, worker) = if config.async_logging {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
        (tracing_subscriber::fmt::writer::BoxMakeWriter::new(writer), Some(guard))
    } else {
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stdout),
            None,
        )
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(LoggingGuard { _worker: worker })
}

/// [`init_logging_with_config`] with [`LogConfig::from_env`].
pub fn init_logging() -> Result<LoggingGuard> {
    init_logging_with_config(&LogConfig::from_env())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("xml"), LogFormat::Json);
    }

    #[test]
    fn test_presets() {
        let dev = LogConfig::default_dev();
        assert_eq!(dev.level(), Level::DEBUG);
        assert_eq!(dev.format, LogFormat::Pretty);
        assert!(dev.include_location);

        let prod = LogConfig::default_prod();
        assert_eq!(prod.level(), Level::INFO);
        assert_eq!(prod.format, LogFormat::Json);
        assert!(prod.async_logging);
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let config = LogConfig {
            log_level: "chatty".to_string(),
            ..LogConfig::default_prod()
        };
        assert_eq!(config.level(), Level::INFO);
    }

    #[test]
    fn test_build_filter_skips_bad_directives() {
        let config = LogConfig {
            target_filter: Some("bundlerouter=debug, ,not a directive=".to_string()),
            ..LogConfig::default_dev()
        };
        assert!(build_filter(&config).is_ok());
    }
}
