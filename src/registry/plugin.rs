use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::capability::CapabilityFn;
use crate::error::BootError;

/// Manifest file name inside a plugin directory.
pub const MANIFEST_FILE: &str = "plugin.json";

/// Function name → capability target names, as declared in `plugin.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginManifest {
    entries: BTreeMap<String, Vec<String>>,
}

impl PluginManifest {
    pub fn from_json_str(plugin: &str, json: &str) -> Result<Self, BootError> {
        let entries: BTreeMap<String, Vec<String>> =
            serde_json::from_str(json).map_err(|err| BootError::InvalidManifest {
                plugin: plugin.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, targets)| (name.as_str(), targets.as_slice()))
    }

    #[must_use]
    pub fn declares(&self, function: &str) -> bool {
        self.entries.contains_key(function)
    }
}

/// A named set of capability functions plus the manifest saying where they go.
#[derive(Clone)]
pub struct Plugin {
    name: String,
    manifest: PluginManifest,
    functions: HashMap<String, CapabilityFn>,
}

impl Plugin {
    #[must_use]
    pub fn new(name: &str, manifest: PluginManifest) -> Self {
        Self {
            name: name.to_string(),
            manifest,
            functions: HashMap::new(),
        }
    }

    pub fn from_manifest_json(name: &str, json: &str) -> Result<Self, BootError> {
        Ok(Self::new(name, PluginManifest::from_json_str(name, json)?))
    }

    /// Read `plugin.json` from a plugin directory; the directory name is the
    /// plugin name. A missing or unreadable manifest is an invalid manifest.
    pub fn load(dir: &Path) -> Result<Self, BootError> {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());
        let path = dir.join(MANIFEST_FILE);
        let json = fs::read_to_string(&path).map_err(|err| BootError::InvalidManifest {
            plugin: name.clone(),
            reason: format!("failed to read {}: {err}", path.display()),
        })?;
        Self::from_manifest_json(&name, &json)
    }

    /// Take over the function implementations of `other`, keeping this
    /// plugin's name and manifest.
    #[must_use]
    pub fn with_functions_of(mut self, other: &Plugin) -> Self {
        for (name, function) in &other.functions {
            self.functions.insert(name.clone(), Arc::clone(function));
        }
        self
    }

    /// Provide the implementation of a manifest function.
    #[must_use]
    pub fn with_function(mut self, name: &str, function: CapabilityFn) -> Self {
        self.functions.insert(name.to_string(), function);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    #[must_use]
    pub fn function(&self, name: &str) -> Option<&CapabilityFn> {
        self.functions.get(name)
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut functions: Vec<&str> = self.function_names().collect();
        functions.sort_unstable();
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("manifest", &self.manifest)
            .field("functions", &functions)
            .finish()
    }
}
