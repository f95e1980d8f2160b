//! # Application Configuration
//!
//! Every `config/*.yml` (or `*.yaml`) file under the application directory
//! becomes one top-level section keyed by its file stem, so `routes.yml`
//! populates `routes` and `http.yml` populates `http`. A `local` section, if
//! present, is deep-merged over the others: mappings merge key by key,
//! anything else is replaced.
//!
//! ```yaml
//! # config/http.yml
//! middlewares:
//!   - Auth.check
//!
//! # config/local.yml
//! server:
//!   http:
//!     port: 8080
//! ```
//!
//! Sections are kept as `serde_yaml` values so declaration order inside the
//! `routes` mapping survives loading.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info, warn};

use crate::static_files::MimeMap;

/// Default listening port when `server.http.port` is absent.
pub const DEFAULT_PORT: u16 = 1337;

const LOCAL_SECTION: &str = "local";

/// Merged application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    app_dir: PathBuf,
    sections: Mapping,
}

/// Listener settings from the `server` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub secure: bool,
    pub key: Option<PathBuf>,
    pub cert: Option<PathBuf>,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            secure: false,
            key: None,
            cert: None,
            workers: 1,
        }
    }
}

impl AppConfig {
    /// Load and merge every YAML file under `<app_dir>/config`.
    ///
    /// A missing `config` directory yields an empty configuration.
    pub fn load(app_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let app_dir = app_dir.as_ref().to_path_buf();
        let config_dir = app_dir.join("config");
        let mut sections = Mapping::new();

        if !config_dir.is_dir() {
            warn!(dir = %config_dir.display(), "No config directory, using empty configuration");
            return Ok(Self::from_sections(app_dir, sections));
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&config_dir)
            .with_context(|| format!("failed to read {}", config_dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && matches!(
                        path.extension().and_then(|e| e.to_str()),
                        Some("yml" | "yaml")
                    )
            })
            .collect();
        files.sort();

        for path in files {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let value: Value = serde_yaml::from_str(&content)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            debug!(file = %path.display(), section = %stem, "Config file loaded");
            sections.insert(Value::from(stem), value);
        }

        let config = Self::from_sections(app_dir, sections);
        info!(
            app_dir = %config.app_dir.display(),
            sections = ?config.section_names(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parse one YAML document whose top-level keys are section names.
    pub fn from_yaml_str(app_dir: impl AsRef<Path>, yaml: &str) -> anyhow::Result<Self> {
        let value: Value = serde_yaml::from_str(yaml).context("failed to parse configuration")?;
        let sections = match value {
            Value::Mapping(map) => map,
            Value::Null => Mapping::new(),
            _ => anyhow::bail!("configuration root must be a mapping"),
        };
        Ok(Self::from_sections(app_dir, sections))
    }

    /// Build from already parsed sections, applying the `local` override.
    #[must_use]
    pub fn from_sections(app_dir: impl AsRef<Path>, mut sections: Mapping) -> Self {
        if let Some(Value::Mapping(local)) = sections.get(LOCAL_SECTION).cloned() {
            for (key, value) in local {
                match sections.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        sections.insert(key, value);
                    }
                }
            }
        }
        Self {
            app_dir: app_dir.as_ref().to_path_buf(),
            sections,
        }
    }

    /// An empty configuration rooted at `app_dir`.
    #[must_use]
    pub fn empty(app_dir: impl AsRef<Path>) -> Self {
        Self::from_sections(app_dir, Mapping::new())
    }

    #[must_use]
    pub fn app_dir(&self) -> &Path {
        &self.app_dir
    }

    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Value> {
        self.sections.get(name)
    }

    #[must_use]
    pub fn section_names(&self) -> Vec<&str> {
        self.sections.keys().filter_map(Value::as_str).collect()
    }

    /// Look up a dotted path such as `server.http.port`.
    #[must_use]
    pub fn get(&self, dotted: &str) -> Option<&Value> {
        let mut parts = dotted.split('.');
        let mut current = self.sections.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// The raw `routes` section.
    #[must_use]
    pub fn routes(&self) -> Option<&Value> {
        self.section("routes")
    }

    /// `http.middlewares`, trimmed, in declared order.
    #[must_use]
    pub fn middlewares(&self) -> Vec<String> {
        let Some(entries) = self.get("http.middlewares") else {
            return Vec::new();
        };
        let Some(entries) = entries.as_sequence() else {
            warn!("http.middlewares is not a list, ignoring it");
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|entry| match entry.as_str() {
                Some(s) => Some(s.trim().to_string()),
                None => {
                    warn!(entry = ?entry, "Middleware entry is not a string, skipping");
                    None
                }
            })
            .collect()
    }

    /// The `mimetypes` section as an extension → content type map.
    #[must_use]
    pub fn mime_types(&self) -> MimeMap {
        let mut mime = MimeMap::default();
        if let Some(Value::Mapping(map)) = self.section("mimetypes") {
            for (ext, content_type) in map {
                match (ext.as_str(), content_type.as_str()) {
                    (Some(ext), Some(content_type)) => mime.insert(ext, content_type),
                    _ => warn!(extension = ?ext, "Ignoring non-string mimetype entry"),
                }
            }
        }
        mime
    }

    #[must_use]
    pub fn server(&self) -> ServerConfig {
        let mut server = ServerConfig::default();
        if let Some(port) = self.get("server.http.port") {
            match port.as_u64().and_then(|p| u16::try_from(p).ok()) {
                Some(p) if p > 0 => server.port = p,
                _ => warn!(port = ?port, "Invalid server.http.port, using default"),
            }
        }
        if let Some(secure) = self.get("server.http.secure").and_then(Value::as_bool) {
            server.secure = secure;
        }
        server.key = self
            .get("server.http.key")
            .and_then(Value::as_str)
            .map(|p| self.resolve(p));
        server.cert = self
            .get("server.http.cert")
            .and_then(Value::as_str)
            .map(|p| self.resolve(p));
        if let Some(workers) = self.get("server.workers").and_then(Value::as_u64) {
            server.workers = usize::try_from(workers).unwrap_or(1).max(1);
        }
        server
    }

    /// Directory static routes are served from: `server.assets` relative to
    /// the app directory, or the app directory itself.
    #[must_use]
    pub fn asset_root(&self) -> PathBuf {
        self.get("server.assets")
            .and_then(Value::as_str)
            .map_or_else(|| self.app_dir.clone(), |p| self.resolve(p))
    }

    /// Directory holding one sub-directory per plugin.
    #[must_use]
    pub fn plugins_dir(&self) -> PathBuf {
        self.app_dir.join("src").join("plugins")
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.app_dir.join(path)
        }
    }
}

/// Merge `overlay` into `base`: mappings recursively, everything else replaced.
fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
