//! # Runtime Configuration
//!
//! Coroutine runtime settings read from the environment.
//!
//! ### `BUNDLE_STACK_SIZE`
//!
//! Stack size for the `may` coroutines that run requests, as decimal
//! (`16384`) or hexadecimal (`0x4000`). Default `0x4000`. Handlers and
//! middleware run on this stack, so deep resolution chains may need more.
//!
//! ```rust
//! use bundlerouter::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! assert!(config.stack_size > 0);
//! ```

use std::env;

use tracing::{info, warn};

pub const STACK_SIZE_ENV: &str = "BUNDLE_STACK_SIZE";

pub const DEFAULT_STACK_SIZE: usize = 0x4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Coroutine stack size in bytes.
    pub stack_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self {
            stack_size: parse_stack_size(env::var(STACK_SIZE_ENV).ok().as_deref()),
        }
    }

    /// Configure the global `may` runtime. Call before the server starts.
    pub fn apply(&self) {
        may::config().set_stack_size(self.stack_size);
        info!(stack_size = self.stack_size, "Coroutine runtime configured");
    }
}

/// Parse a stack size; unset, zero or unparsable values fall back to the
/// default.
#[must_use]
pub fn parse_stack_size(raw: Option<&str>) -> usize {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return DEFAULT_STACK_SIZE;
    };
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    };
    match parsed {
        Some(size) if size > 0 => size,
        _ => {
            warn!(value = %raw, "Invalid {STACK_SIZE_ENV}, using default");
            DEFAULT_STACK_SIZE
        }
    }
}
