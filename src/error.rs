//! Error types shared by the registries, resolver and dispatcher.
//!
//! Boot-time surfaces (configuration loading, server start, CLI) use
//! `anyhow::Result`. The types here model the runtime taxonomy: every one of
//! them ends in a concrete response or a logged warning, never in an error
//! escaping the dispatch boundary.

use std::fmt;

use crate::component::ComponentKind;

/// Fatal registry problems detected while the application boots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootError {
    /// A component was registered under a key that differs from its declared name.
    NameMismatch {
        kind: ComponentKind,
        key: String,
        declared: String,
    },
    /// A component class was registered in the registry of another kind.
    KindMismatch {
        expected: ComponentKind,
        declared: ComponentKind,
        name: String,
    },
    /// The same name was registered twice for one kind.
    DuplicateComponent { kind: ComponentKind, name: String },
    /// A plugin manifest could not be parsed.
    InvalidManifest { plugin: String, reason: String },
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootError::NameMismatch {
                kind,
                key,
                declared,
            } => write!(
                f,
                "{kind} class name '{declared}' does not match its registry key '{key}'"
            ),
            BootError::KindMismatch {
                expected,
                declared,
                name,
            } => write!(
                f,
                "'{name}' is declared as a {declared} but was registered as a {expected}"
            ),
            BootError::DuplicateComponent { kind, name } => {
                write!(f, "{kind} '{name}' is already registered")
            }
            BootError::InvalidManifest { plugin, reason } => {
                write!(f, "plugin '{plugin}' has an invalid manifest: {reason}")
            }
        }
    }
}

impl std::error::Error for BootError {}

/// Malformed route declarations. Logged at build time; the entry is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteWarning {
    /// The entry has no `path`.
    MissingPath { entry: String },
    /// The entry has neither `static: true` nor a `handler`.
    MissingTarget { entry: String },
    /// The handler is not of the form `Name.method`.
    InvalidHandler { entry: String, handler: String },
    /// The declared method is not a valid HTTP method token.
    UnknownMethod { entry: String, method: String },
    /// The entry is not a mapping with the expected fields.
    InvalidEntry { entry: String, reason: String },
}

impl fmt::Display for RouteWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteWarning::MissingPath { entry } => {
                write!(f, "{entry} route does not have any path defined")
            }
            RouteWarning::MissingTarget { entry } => {
                write!(f, "{entry} route does not have any handler defined")
            }
            RouteWarning::InvalidHandler { entry, handler } => write!(
                f,
                "{entry} route handler '{handler}' is not of the form Name.method"
            ),
            RouteWarning::UnknownMethod { entry, method } => {
                write!(f, "{entry} route method '{method}' is not a valid HTTP method")
            }
            RouteWarning::InvalidEntry { entry, reason } => {
                write!(f, "{entry} route entry is malformed: {reason}")
            }
        }
    }
}

impl std::error::Error for RouteWarning {}

/// Why a `(kind, name)` pair could not be turned into an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No class is registered under this name for the kind.
    UnknownComponent { kind: ComponentKind, name: String },
    /// The constructor returned an error or panicked.
    Construction {
        kind: ComponentKind,
        name: String,
        reason: String,
    },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::UnknownComponent { kind, name } => {
                write!(f, "unknown {kind} '{name}'")
            }
            ResolveError::Construction { kind, name, reason } => {
                write!(f, "failed to construct {kind} '{name}': {reason}")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Failures raised by component methods, constructors and capability functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentError {
    /// The class has no method with this name.
    UnknownMethod { component: String, method: String },
    /// No capability with this name is bound to the target.
    UnknownCapability { target: String, name: String },
    /// Application code reported a failure.
    Failed(String),
    /// Application code panicked; the payload message is kept.
    Panicked(String),
}

impl ComponentError {
    /// Shorthand for [`ComponentError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        ComponentError::Failed(reason.into())
    }
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentError::UnknownMethod { component, method } => {
                write!(f, "{component} has no method '{method}'")
            }
            ComponentError::UnknownCapability { target, name } => {
                write!(f, "no {target} capability named '{name}'")
            }
            ComponentError::Failed(reason) => f.write_str(reason),
            ComponentError::Panicked(message) => write!(f, "panicked: {message}"),
        }
    }
}

impl std::error::Error for ComponentError {}

/// Reasons a middleware step aborted the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiddlewareError {
    /// The named service is not registered.
    UnknownMiddleware(String),
    /// The service method raised an error or reported failure through `next`.
    Failed { step: String, reason: String },
    /// Every continuation handle was dropped without signalling.
    Dropped(String),
}

impl fmt::Display for MiddlewareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiddlewareError::UnknownMiddleware(name) => write!(f, "Unknown middleware {name}"),
            MiddlewareError::Failed { step, reason } => {
                write!(f, "middleware {step} failed: {reason}")
            }
            MiddlewareError::Dropped(step) => write!(
                f,
                "middleware {step} returned without signalling completion and released its continuation"
            ),
        }
    }
}

impl std::error::Error for MiddlewareError {}

/// Render a panic payload the way the dispatcher logs it.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
