use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::Method;
use serde::Deserialize;
use serde_yaml::Value;
use smallvec::SmallVec;
use tracing::{debug, info, warn};

use super::radix::{canonical, parse_pattern, PatternTree};
use crate::component::ComponentKind;
use crate::config::AppConfig;
use crate::error::RouteWarning;

/// Path parameters stored inline up to this count.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Captured parameters; names are shared with the pattern tree.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Method bucket of a route: one HTTP method, or every method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MethodKey {
    All,
    Method(Method),
}

impl MethodKey {
    /// Parse a configured method. Missing, blank, `all` (any case) and `*`
    /// mean every method; anything else is upper-cased.
    pub fn parse(method: Option<&str>) -> Result<Self, String> {
        let Some(raw) = method.map(str::trim).filter(|m| !m.is_empty()) else {
            return Ok(MethodKey::All);
        };
        if raw == "*" || raw.eq_ignore_ascii_case("all") {
            return Ok(MethodKey::All);
        }
        Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
            .map(MethodKey::Method)
            .map_err(|_| raw.to_string())
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodKey::All => f.write_str("all"),
            MethodKey::Method(m) => f.write_str(m.as_str()),
        }
    }
}

/// A component method a handler route invokes, validated at build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerDescriptor {
    pub kind: ComponentKind,
    pub name: String,
    pub method: String,
}

impl HandlerDescriptor {
    /// Parse `Name.method` into a controller descriptor. Segments after the
    /// method (`Name.method.extra`) are ignored.
    #[must_use]
    pub fn parse(handler: &str) -> Option<Self> {
        let mut segments = handler.trim().split('.').map(str::trim);
        let name = segments.next()?;
        let method = segments.next()?;
        if name.is_empty() || method.is_empty() {
            return None;
        }
        Some(Self {
            kind: ComponentKind::Controller,
            name: name.to_string(),
            method: method.to_string(),
        })
    }
}

impl fmt::Display for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.method)
    }
}

/// What a matched `(pattern, method)` dispatches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// Serve the request path as a file from the asset root.
    Static,
    Handler(Arc<HandlerDescriptor>),
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteTarget::Static => f.write_str("static"),
            RouteTarget::Handler(handler) => fmt::Display::fmt(handler, f),
        }
    }
}

/// One configured route entry, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub pattern: String,
    pub method: MethodKey,
    pub target: RouteTarget,
}

#[derive(Debug, Deserialize)]
struct RawRouteEntry {
    path: Option<String>,
    method: Option<String>,
    #[serde(rename = "static", default)]
    is_static: bool,
    handler: Option<String>,
}

impl RouteEntry {
    /// Validate one declaration. `name` identifies it in warnings.
    pub fn from_value(name: &str, value: &Value) -> Result<Self, RouteWarning> {
        let raw: RawRouteEntry =
            serde_yaml::from_value(value.clone()).map_err(|err| RouteWarning::InvalidEntry {
                entry: name.to_string(),
                reason: err.to_string(),
            })?;

        let pattern = raw
            .path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| RouteWarning::MissingPath {
                entry: name.to_string(),
            })?
            .to_string();

        let method =
            MethodKey::parse(raw.method.as_deref()).map_err(|method| RouteWarning::UnknownMethod {
                entry: name.to_string(),
                method,
            })?;

        let target = if raw.is_static {
            RouteTarget::Static
        } else {
            let handler = raw
                .handler
                .as_deref()
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .ok_or_else(|| RouteWarning::MissingTarget {
                    entry: name.to_string(),
                })?;
            let descriptor =
                HandlerDescriptor::parse(handler).ok_or_else(|| RouteWarning::InvalidHandler {
                    entry: name.to_string(),
                    handler: handler.to_string(),
                })?;
            RouteTarget::Handler(Arc::new(descriptor))
        };

        Ok(Self {
            pattern,
            method,
            target,
        })
    }
}

/// A compiled pattern and its per-method targets.
#[derive(Debug, Clone)]
pub struct Route {
    pattern: Arc<str>,
    methods: Vec<(MethodKey, RouteTarget)>,
}

impl Route {
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Buckets in declaration order.
    #[must_use]
    pub fn methods(&self) -> &[(MethodKey, RouteTarget)] {
        &self.methods
    }

    /// The target for `method`, falling back to the `all` bucket.
    #[must_use]
    pub fn target_for(&self, method: &Method) -> Option<(&MethodKey, &RouteTarget)> {
        let exact = self.methods.iter().find(|(key, _)| match key {
            MethodKey::Method(m) => m == method,
            MethodKey::All => false,
        });
        exact
            .or_else(|| self.methods.iter().find(|(key, _)| *key == MethodKey::All))
            .map(|(key, target)| (key, target))
    }
}

/// A request resolved to a route and one of its targets.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub pattern: Arc<str>,
    pub method: MethodKey,
    pub target: RouteTarget,
    pub params: ParamVec,
    pub splats: Vec<String>,
}

impl RouteMatch {
    /// Last occurrence wins when a pattern repeats a name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Route patterns compiled from configuration, immutable once built.
#[derive(Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    index: HashMap<String, usize>,
    tree: PatternTree,
    warnings: Vec<RouteWarning>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `routes` section of the application configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        match config.routes() {
            Some(section) => Self::build(section),
            None => {
                info!("No routes section configured");
                Self::new()
            }
        }
    }

    /// Build from a `routes` section: either a mapping of entry name to
    /// declaration, or a list of declarations.
    ///
    /// Malformed entries are logged and skipped. When the same
    /// `(pattern, method)` is declared more than once, the earliest
    /// declaration wins.
    #[must_use]
    pub fn build(section: &Value) -> Self {
        let mut table = Self::new();
        let declared: Vec<(String, &Value)> = match section {
            Value::Mapping(map) => map
                .iter()
                .map(|(key, value)| (entry_name(key), value))
                .collect(),
            Value::Sequence(entries) => entries
                .iter()
                .enumerate()
                .map(|(i, value)| (format!("#{i}"), value))
                .collect(),
            Value::Null => Vec::new(),
            other => {
                table.warn(RouteWarning::InvalidEntry {
                    entry: "routes".to_string(),
                    reason: format!("expected a mapping or a list, found {other:?}"),
                });
                Vec::new()
            }
        };

        for (name, value) in declared {
            match RouteEntry::from_value(&name, value) {
                Ok(entry) => {
                    table.insert(entry);
                }
                Err(warning) => table.warn(warning),
            }
        }

        info!(
            routes = table.routes.len(),
            skipped = table.warnings.len(),
            "Route table built"
        );
        table
    }

    /// Build from already validated entries, in declaration order.
    pub fn from_entries(entries: impl IntoIterator<Item = RouteEntry>) -> Self {
        let mut table = Self::new();
        for entry in entries {
            table.insert(entry);
        }
        table
    }

    /// Add one entry. Returns `false` if its `(pattern, method)` pair was
    /// already declared; the earlier declaration is kept.
    pub fn insert(&mut self, entry: RouteEntry) -> bool {
        let segments = parse_pattern(&entry.pattern);
        let key = canonical(&segments);

        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = self.routes.len();
                self.routes.push(Route {
                    pattern: Arc::from(key.as_str()),
                    methods: Vec::new(),
                });
                let stored = self.tree.insert(&segments, idx);
                debug_assert_eq!(stored, idx, "canonical keys map one-to-one onto tree nodes");
                self.index.insert(key, idx);
                idx
            }
        };

        let route = &mut self.routes[idx];
        if route.methods.iter().any(|(m, _)| *m == entry.method) {
            warn!(
                pattern = %route.pattern,
                method = %entry.method,
                ignored = %entry.target,
                "Duplicate route declaration, keeping the earlier one"
            );
            return false;
        }
        debug!(
            pattern = %route.pattern,
            method = %entry.method,
            target = %entry.target,
            "Route registered"
        );
        route.methods.push((entry.method, entry.target));
        true
    }

    fn warn(&mut self, warning: RouteWarning) {
        warn!(warning = %warning, "Route entry skipped");
        self.warnings.push(warning);
    }

    /// Resolve a path to its route, ignoring the method.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(&Route, ParamVec, Vec<String>)> {
        let (idx, captures) = self.tree.search(path)?;
        let route = self.routes.get(idx)?;
        Some((route, captures.params, captures.splats))
    }

    /// Resolve a request to a target: the route matching `path`, then its
    /// bucket for `method` or its `all` bucket. `None` means 404.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let (route, params, splats) = self.match_path(path)?;
        let (key, target) = route.target_for(method)?;
        Some(RouteMatch {
            pattern: Arc::clone(&route.pattern),
            method: key.clone(),
            target: target.clone(),
            params,
            splats,
        })
    }

    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Entries skipped while building.
    #[must_use]
    pub fn warnings(&self) -> &[RouteWarning] {
        &self.warnings
    }

    /// Every handler descriptor in the table.
    pub fn handlers(&self) -> impl Iterator<Item = &HandlerDescriptor> {
        self.routes.iter().flat_map(|route| {
            route.methods.iter().filter_map(|(_, target)| match target {
                RouteTarget::Handler(handler) => Some(handler.as_ref()),
                RouteTarget::Static => None,
            })
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.routes)
            .field("warnings", &self.warnings)
            .finish()
    }
}

fn entry_name(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| format!("{other:?}")),
    }
}
