use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::plugin::Plugin;
use crate::capability::{CapabilityFn, CapabilityTable, CapabilityTarget};
use crate::component::{ComponentClass, ComponentKind};
use crate::context::{FormatterTable, ResponseFormatter};
use crate::error::BootError;

/// Boot-populated lookup tables for component classes, capability functions
/// and response formatters.
///
/// Built mutably during boot, then frozen inside a
/// [`Framework`](crate::framework::Framework) and shared read-only by every
/// request.
#[derive(Clone)]
pub struct Registries {
    classes: HashMap<ComponentKind, HashMap<String, Arc<ComponentClass>>>,
    capabilities: [Arc<CapabilityTable>; 5],
    formatters: Arc<FormatterTable>,
    plugin_sources: HashMap<String, Plugin>,
}

impl Registries {
    #[must_use]
    pub fn new() -> Self {
        Self {
            classes: HashMap::new(),
            capabilities: Default::default(),
            formatters: Arc::new(FormatterTable::with_defaults()),
            plugin_sources: HashMap::new(),
        }
    }

    /// Register a class under its own declared name and kind.
    pub fn register(&mut self, class: Arc<ComponentClass>) -> Result<(), BootError> {
        let kind = class.kind();
        let key = class.name().to_string();
        self.insert(kind, &key, class)
    }

    /// Register a class under an explicit kind and key.
    ///
    /// The key must equal the class's declared name and the kind its declared
    /// kind; registering a name twice for one kind is refused.
    pub fn insert(
        &mut self,
        kind: ComponentKind,
        key: &str,
        class: Arc<ComponentClass>,
    ) -> Result<(), BootError> {
        let key = key.trim();
        if class.name() != key {
            return Err(BootError::NameMismatch {
                kind,
                key: key.to_string(),
                declared: class.name().to_string(),
            });
        }
        if class.kind() != kind {
            return Err(BootError::KindMismatch {
                expected: kind,
                declared: class.kind(),
                name: key.to_string(),
            });
        }
        let by_name = self.classes.entry(kind).or_default();
        if by_name.contains_key(key) {
            return Err(BootError::DuplicateComponent {
                kind,
                name: key.to_string(),
            });
        }
        debug!(kind = %kind, name = %key, methods = ?class.method_names(), "Component registered");
        by_name.insert(key.to_string(), class);
        Ok(())
    }

    #[must_use]
    pub fn class(&self, kind: ComponentKind, name: &str) -> Option<&Arc<ComponentClass>> {
        self.classes.get(&kind).and_then(|by_name| by_name.get(name))
    }

    #[must_use]
    pub fn contains(&self, kind: ComponentKind, name: &str) -> bool {
        self.class(kind, name).is_some()
    }

    /// Sorted names registered for one kind.
    #[must_use]
    pub fn names(&self, kind: ComponentKind) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .classes
            .get(&kind)
            .map(|by_name| by_name.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn capabilities(&self, target: CapabilityTarget) -> &Arc<CapabilityTable> {
        &self.capabilities[slot(target)]
    }

    /// Add a capability function for a target. Returns `true` if the name was new.
    pub fn register_capability(
        &mut self,
        target: CapabilityTarget,
        name: &str,
        function: CapabilityFn,
    ) -> bool {
        let fresh = Arc::make_mut(&mut self.capabilities[slot(target)]).insert(name, function);
        if !fresh {
            warn!(target = %target, name = %name, "Capability replaced");
        }
        fresh
    }

    #[must_use]
    pub fn formatters(&self) -> &Arc<FormatterTable> {
        &self.formatters
    }

    /// Add or replace a named response formatter.
    pub fn register_formatter(&mut self, name: &str, formatter: ResponseFormatter) -> bool {
        Arc::make_mut(&mut self.formatters).insert(name, formatter)
    }

    /// Supply the functions of a plugin whose manifest is discovered on disk
    /// by [`Registries::install_plugins_from`]. Only the name and functions
    /// of `plugin` are used.
    pub fn provide_plugin(&mut self, plugin: Plugin) {
        self.plugin_sources.insert(plugin.name().to_string(), plugin);
    }

    /// Install every plugin under `dir`, one sub-directory per plugin, in
    /// name order. Each sub-directory must hold a `plugin.json`; functions
    /// come from [`Registries::provide_plugin`]. A missing `dir` means no
    /// plugins. Returns the number of `(target, function)` pairs installed.
    pub fn install_plugins_from(&mut self, dir: &Path) -> Result<usize, BootError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "No plugin directory");
                return Ok(0);
            }
            Err(err) => {
                return Err(BootError::InvalidManifest {
                    plugin: dir.display().to_string(),
                    reason: format!("failed to list plugins: {err}"),
                })
            }
        };
        let mut plugin_dirs: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        plugin_dirs.sort();

        let mut installed = 0;
        for plugin_dir in plugin_dirs {
            let mut plugin = Plugin::load(&plugin_dir)?;
            if let Some(source) = self.plugin_sources.get(plugin.name()) {
                plugin = plugin.with_functions_of(source);
            } else {
                warn!(plugin = %plugin.name(), "Plugin has a manifest but no provided functions");
            }
            installed += self.install_plugin(&plugin);
        }
        Ok(installed)
    }

    /// Install the functions a plugin's manifest declares.
    ///
    /// Each manifest entry maps a function name to the targets it is grafted
    /// onto. Unknown targets and declared functions the plugin does not
    /// provide are skipped with a warning. Returns the number of
    /// `(target, function)` pairs installed.
    pub fn install_plugin(&mut self, plugin: &Plugin) -> usize {
        let mut installed = 0;
        for (function_name, targets) in plugin.manifest().entries() {
            let Some(function) = plugin.function(function_name) else {
                warn!(
                    plugin = %plugin.name(),
                    function = %function_name,
                    "Plugin manifest declares a function the plugin does not provide"
                );
                continue;
            };
            for target in targets {
                match CapabilityTarget::parse(target) {
                    Some(target) => {
                        self.register_capability(target, function_name, Arc::clone(function));
                        installed += 1;
                    }
                    None => warn!(
                        plugin = %plugin.name(),
                        function = %function_name,
                        target = %target,
                        "Unknown capability target ignored"
                    ),
                }
            }
        }
        for name in plugin.function_names() {
            if !plugin.manifest().declares(name) {
                debug!(plugin = %plugin.name(), function = %name, "Function not in manifest, not installed");
            }
        }
        info!(plugin = %plugin.name(), installed, "Plugin installed");
        installed
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Registries");
        for kind in ComponentKind::ALL {
            s.field(kind.as_str(), &self.names(kind));
        }
        for target in CapabilityTarget::ALL {
            s.field(target.as_str(), &self.capabilities(target).names());
        }
        let mut plugins: Vec<&str> = self.plugin_sources.keys().map(String::as_str).collect();
        plugins.sort_unstable();
        s.field("formatters", &self.formatters.names())
            .field("plugins", &plugins)
            .finish()
    }
}

fn slot(target: CapabilityTarget) -> usize {
    match target {
        CapabilityTarget::Request => 0,
        CapabilityTarget::Response => 1,
        CapabilityTarget::Controller => 2,
        CapabilityTarget::Model => 3,
        CapabilityTarget::Service => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::capability;
    use serde_json::Value;

    fn class(kind: ComponentKind, name: &str) -> Arc<ComponentClass> {
        ComponentClass::builder(kind, name, |_| Ok(())).build()
    }

    #[test]
    fn test_register_under_declared_name() {
        let mut registries = Registries::new();
        registries
            .register(class(ComponentKind::Controller, "Users"))
            .expect("register");
        assert!(registries.contains(ComponentKind::Controller, "Users"));
        assert!(!registries.contains(ComponentKind::Service, "Users"));
        assert_eq!(registries.names(ComponentKind::Controller), vec!["Users"]);
    }

    #[test]
    fn test_name_mismatch_is_fatal() {
        let mut registries = Registries::new();
        let err = registries
            .insert(ComponentKind::Controller, "Accounts", class(ComponentKind::Controller, "Users"))
            .unwrap_err();
        assert!(matches!(err, BootError::NameMismatch { .. }));
    }

    #[test]
    fn test_kind_mismatch_is_fatal() {
        let mut registries = Registries::new();
        let err = registries
            .insert(ComponentKind::Service, "Users", class(ComponentKind::Controller, "Users"))
            .unwrap_err();
        assert!(matches!(err, BootError::KindMismatch { .. }));
    }

    #[test]
    fn test_duplicate_refused() {
        let mut registries = Registries::new();
        registries
            .register(class(ComponentKind::Model, "Pets"))
            .expect("first");
        let err = registries
            .register(class(ComponentKind::Model, "Pets"))
            .unwrap_err();
        assert_eq!(
            err,
            BootError::DuplicateComponent {
                kind: ComponentKind::Model,
                name: "Pets".to_string()
            }
        );
    }

    #[test]
    fn test_capability_tables_per_target() {
        let mut registries = Registries::new();
        assert!(registries.register_capability(
            CapabilityTarget::Controller,
            "render",
            capability(|_, v| Ok(v))
        ));
        assert!(registries
            .capabilities(CapabilityTarget::Controller)
            .contains("render"));
        assert!(registries.capabilities(CapabilityTarget::Model).is_empty());
    }

    #[test]
    fn test_install_plugin_honours_manifest() {
        let plugin = Plugin::from_manifest_json(
            "views",
            r#"{"render": ["controller", "response", "views"], "missing": ["model"]}"#,
        )
        .expect("manifest")
        .with_function("render", capability(|_, _| Ok(Value::from("html"))))
        .with_function("hidden", capability(|_, _| Ok(Value::Null)));

        let mut registries = Registries::new();
        assert_eq!(registries.install_plugin(&plugin), 2);
        assert!(registries
            .capabilities(CapabilityTarget::Controller)
            .contains("render"));
        assert!(registries
            .capabilities(CapabilityTarget::Response)
            .contains("render"));
        assert!(registries.capabilities(CapabilityTarget::Model).is_empty());
        for target in CapabilityTarget::ALL {
            assert!(!registries.capabilities(target).contains("hidden"));
        }
    }

    fn write_manifest(root: &Path, plugin: &str, json: &str) {
        let dir = root.join(plugin);
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join(crate::registry::MANIFEST_FILE), json).expect("write");
    }

    #[test]
    fn test_install_plugins_from_directory() {
        let root = tempfile::tempdir().expect("tempdir");
        write_manifest(root.path(), "views", r#"{"render": ["controller"]}"#);
        write_manifest(root.path(), "audit", r#"{"stamp": ["request", "response"]}"#);
        fs::write(root.path().join("README.txt"), "not a plugin").expect("write");

        let mut registries = Registries::new();
        registries.provide_plugin(
            Plugin::new("views", Default::default())
                .with_function("render", capability(|_, _| Ok(Value::from("html")))),
        );
        registries.provide_plugin(
            Plugin::new("audit", Default::default())
                .with_function("stamp", capability(|_, v| Ok(v))),
        );

        assert_eq!(registries.install_plugins_from(root.path()).expect("install"), 3);
        assert!(registries
            .capabilities(CapabilityTarget::Controller)
            .contains("render"));
        assert!(registries
            .capabilities(CapabilityTarget::Request)
            .contains("stamp"));
        assert!(registries
            .capabilities(CapabilityTarget::Response)
            .contains("stamp"));
    }

    #[test]
    fn test_plugin_directory_without_manifest_fails_boot() {
        let root = tempfile::tempdir().expect("tempdir");
        write_manifest(root.path(), "views", r#"{"render": ["controller"]}"#);
        fs::create_dir(root.path().join("broken")).expect("mkdir");

        let mut registries = Registries::new();
        let err = registries.install_plugins_from(root.path()).unwrap_err();
        match err {
            BootError::InvalidManifest { plugin, .. } => assert_eq!(plugin, "broken"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_plugin_directory_installs_nothing() {
        let root = tempfile::tempdir().expect("tempdir");
        let mut registries = Registries::new();
        assert_eq!(
            registries
                .install_plugins_from(&root.path().join("src").join("plugins"))
                .expect("no plugins"),
            0
        );
    }

    #[test]
    fn test_custom_formatter_registered() {
        let mut registries = Registries::new();
        assert!(registries.register_formatter(
            "created",
            crate::context::status_formatter(201)
        ));
        assert!(registries.formatters().get("created").is_some());
        assert!(registries.formatters().get("ok").is_some());
    }
}
