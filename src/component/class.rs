use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use super::Instance;
use crate::error::{panic_message, ComponentError};
use crate::resolver::BundleResolver;

/// Resolvable component categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    Controller,
    Model,
    Service,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 3] = [
        ComponentKind::Controller,
        ComponentKind::Model,
        ComponentKind::Service,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Controller => "controller",
            ComponentKind::Model => "model",
            ComponentKind::Service => "service",
        }
    }

    /// Accepts singular and plural spellings, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "controller" | "controllers" => Some(ComponentKind::Controller),
            "model" | "models" => Some(ComponentKind::Model),
            "service" | "services" => Some(ComponentKind::Service),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Constructor =
    Arc<dyn Fn(&BundleResolver) -> Result<Arc<dyn Any + Send + Sync>, ComponentError> + Send + Sync>;

pub(crate) type MethodFn = Arc<dyn Fn(&Instance) -> Result<(), ComponentError> + Send + Sync>;

/// A named, constructible component type registered under one kind.
///
/// The class owns a constructor producing the instance state and a method
/// table keyed by name, which is what `"Name.method"` handler specs and
/// middleware entries invoke. A class holds no capabilities of its own: the
/// resolver attaches the capability table of the resolving framework to each
/// instance, so one class can be shared by several registries.
pub struct ComponentClass {
    kind: ComponentKind,
    name: Arc<str>,
    constructor: Constructor,
    methods: HashMap<String, MethodFn>,
}

impl ComponentClass {
    /// Start declaring a class whose instances hold a `T`.
    ///
    /// ```rust
    /// use bundlerouter::component::{ComponentClass, ComponentKind};
    ///
    /// struct Users;
    ///
    /// let class = ComponentClass::builder(ComponentKind::Controller, "Users", |_bundle| Ok(Users))
    ///     .method("index", |_users: &Users, instance| {
    ///         instance.response().ok("[]");
    ///         Ok(())
    ///     })
    ///     .build();
    /// assert!(class.has_method("index"));
    /// ```
    pub fn builder<T, F>(kind: ComponentKind, name: &str, constructor: F) -> ComponentClassBuilder<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&BundleResolver) -> Result<T, ComponentError> + Send + Sync + 'static,
    {
        let constructor: Constructor = Arc::new(move |bundle: &BundleResolver| {
            let state = constructor(bundle)?;
            Ok(Arc::new(state) as Arc<dyn Any + Send + Sync>)
        });
        ComponentClassBuilder {
            kind,
            name: Arc::from(name.trim()),
            constructor,
            methods: HashMap::new(),
            _state: PhantomData,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn has_method(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    /// Sorted method names, for diagnostics.
    #[must_use]
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn construct(
        &self,
        bundle: &BundleResolver,
    ) -> Result<Arc<dyn Any + Send + Sync>, ComponentError> {
        match catch_unwind(AssertUnwindSafe(|| (self.constructor)(bundle))) {
            Ok(result) => result,
            Err(payload) => Err(ComponentError::Panicked(panic_message(payload.as_ref()))),
        }
    }

    pub(crate) fn method(&self, method: &str) -> Option<&MethodFn> {
        self.methods.get(method)
    }
}

impl fmt::Debug for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentClass")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("methods", &self.method_names())
            .finish()
    }
}

/// Builder returned by [`ComponentClass::builder`].
pub struct ComponentClassBuilder<T> {
    kind: ComponentKind,
    name: Arc<str>,
    constructor: Constructor,
    methods: HashMap<String, MethodFn>,
    _state: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> ComponentClassBuilder<T> {
    /// Register a method callable as `Name.method`.
    ///
    /// Methods take no request arguments: they read and write through the
    /// instance's bound request and response.
    #[must_use]
    pub fn method<M>(mut self, name: &str, method: M) -> Self
    where
        M: Fn(&T, &Instance) -> Result<(), ComponentError> + Send + Sync + 'static,
    {
        let component = Arc::clone(&self.name);
        let f: MethodFn = Arc::new(move |instance: &Instance| {
            let state = instance.state::<T>().ok_or_else(|| {
                ComponentError::failed(format!("{component} instance holds unexpected state"))
            })?;
            method(state, instance)
        });
        self.methods.insert(name.trim().to_string(), f);
        self
    }

    #[must_use]
    pub fn build(self) -> Arc<ComponentClass> {
        Arc::new(ComponentClass {
            kind: self.kind,
            name: self.name,
            constructor: self.constructor,
            methods: self.methods,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_accepts_plurals() {
        assert_eq!(ComponentKind::parse("controllers"), Some(ComponentKind::Controller));
        assert_eq!(ComponentKind::parse(" Model "), Some(ComponentKind::Model));
        assert_eq!(ComponentKind::parse("service"), Some(ComponentKind::Service));
        assert_eq!(ComponentKind::parse("request"), None);
    }

    #[test]
    fn test_method_names_sorted() {
        let class = ComponentClass::builder(ComponentKind::Controller, "Users", |_| Ok(()))
            .method("show", |_: &(), _| Ok(()))
            .method("index", |_: &(), _| Ok(()))
            .build();
        assert_eq!(class.method_names(), vec!["index", "show"]);
        assert_eq!(class.name(), "Users");
        assert_eq!(class.kind(), ComponentKind::Controller);
    }
}
