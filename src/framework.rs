//! Process-lifetime application context handed to every component.

use std::fmt;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::registry::Registries;

/// Configuration plus registries, frozen at boot.
pub struct Framework {
    config: AppConfig,
    registries: Registries,
}

impl Framework {
    #[must_use]
    pub fn new(config: AppConfig, registries: Registries) -> Arc<Self> {
        Arc::new(Self { config, registries })
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn registries(&self) -> &Registries {
        &self.registries
    }
}

impl fmt::Debug for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Framework")
            .field("app_dir", &self.config.app_dir())
            .field("registries", &self.registries)
            .finish()
    }
}
