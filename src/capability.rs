//! Plugin-contributed capability functions.
//!
//! A capability is a named function registered for one of five targets. The
//! request and response targets are attached to each request's contexts at
//! the start of the pipeline; the controller, model and service targets are
//! attached to every instance the resolver constructs. Application code calls
//! them by name through `RequestContext::capability`,
//! `ResponseContext::capability` or `Instance::capability`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::component::{ComponentKind, Instance};
use crate::context::{RequestContext, ResponseContext};
use crate::error::ComponentError;
use crate::framework::Framework;

/// Where a capability function is grafted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapabilityTarget {
    Request,
    Response,
    Controller,
    Model,
    Service,
}

impl CapabilityTarget {
    pub const ALL: [CapabilityTarget; 5] = [
        CapabilityTarget::Request,
        CapabilityTarget::Response,
        CapabilityTarget::Controller,
        CapabilityTarget::Model,
        CapabilityTarget::Service,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityTarget::Request => "request",
            CapabilityTarget::Response => "response",
            CapabilityTarget::Controller => "controller",
            CapabilityTarget::Model => "model",
            CapabilityTarget::Service => "service",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "request" => Some(CapabilityTarget::Request),
            "response" => Some(CapabilityTarget::Response),
            "controller" => Some(CapabilityTarget::Controller),
            "model" => Some(CapabilityTarget::Model),
            "service" => Some(CapabilityTarget::Service),
            _ => None,
        }
    }
}

impl From<ComponentKind> for CapabilityTarget {
    fn from(kind: ComponentKind) -> Self {
        match kind {
            ComponentKind::Controller => CapabilityTarget::Controller,
            ComponentKind::Model => CapabilityTarget::Model,
            ComponentKind::Service => CapabilityTarget::Service,
        }
    }
}

impl fmt::Display for CapabilityTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a capability function is closed over when it runs.
#[derive(Clone)]
pub struct Bindings {
    pub framework: Arc<Framework>,
    pub request: RequestContext,
    pub response: ResponseContext,
    /// The calling component; `None` for request and response capabilities.
    pub instance: Option<Arc<Instance>>,
}

/// A capability function: receives its bindings and a JSON argument.
pub type CapabilityFn =
    Arc<dyn Fn(&Bindings, Value) -> Result<Value, ComponentError> + Send + Sync>;

/// Name → function table for one target.
#[derive(Clone, Default)]
pub struct CapabilityTable {
    functions: HashMap<String, CapabilityFn>,
}

impl CapabilityTable {
    /// Insert or replace a function. Returns `true` if the name was new.
    pub fn insert(&mut self, name: &str, function: CapabilityFn) -> bool {
        self.functions
            .insert(name.trim().to_string(), function)
            .is_none()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CapabilityFn> {
        self.functions.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityTable")
            .field("functions", &self.names())
            .finish()
    }
}

/// A capability table attached to a request or response context.
#[derive(Clone)]
pub(crate) struct BoundCapabilities {
    pub(crate) table: Arc<CapabilityTable>,
    pub(crate) framework: Arc<Framework>,
}

impl BoundCapabilities {
    pub(crate) fn call(
        &self,
        target: CapabilityTarget,
        name: &str,
        request: RequestContext,
        response: ResponseContext,
        args: Value,
    ) -> Result<Value, ComponentError> {
        let function = self
            .table
            .get(name)
            .ok_or_else(|| ComponentError::UnknownCapability {
                target: target.to_string(),
                name: name.to_string(),
            })?;
        let bindings = Bindings {
            framework: Arc::clone(&self.framework),
            request,
            response,
            instance: None,
        };
        function(&bindings, args)
    }
}

/// Wrap a closure as a [`CapabilityFn`].
pub fn capability<F>(function: F) -> CapabilityFn
where
    F: Fn(&Bindings, Value) -> Result<Value, ComponentError> + Send + Sync + 'static,
{
    Arc::new(function)
}
