use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use serde_json::Value;

use super::{ComponentClass, ComponentKind};
use crate::capability::{Bindings, CapabilityTable};
use crate::config::AppConfig;
use crate::context::{RequestContext, ResponseContext};
use crate::error::{panic_message, ComponentError};
use crate::framework::Framework;
use crate::resolver::{BundleResolver, DetachedScope, Next};

/// A constructed component bound to one resolution chain.
///
/// Instances see the request and response of the chain that built them, the
/// framework, the chain's continuation handle and, through [`Instance::bundle`],
/// the chain's singleton cache. The instance itself only keeps a weak link to
/// the cache, so cached instances never keep their own chain alive.
///
/// Capabilities come from the framework that resolved the instance, not from
/// the class, so registries sharing a class each see their own table.
pub struct Instance {
    class: Arc<ComponentClass>,
    state: Arc<dyn Any + Send + Sync>,
    scope: DetachedScope,
    capabilities: Arc<CapabilityTable>,
    this: Weak<Instance>,
}

impl Instance {
    pub(crate) fn new(
        class: Arc<ComponentClass>,
        state: Arc<dyn Any + Send + Sync>,
        scope: DetachedScope,
        capabilities: Arc<CapabilityTable>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            class,
            state,
            scope,
            capabilities,
            this: this.clone(),
        })
    }

    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        self.class.kind()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.class.name()
    }

    #[must_use]
    pub fn class(&self) -> &Arc<ComponentClass> {
        &self.class
    }

    /// The application state built by the class constructor.
    #[must_use]
    pub fn state<T: 'static>(&self) -> Option<&T> {
        self.state.downcast_ref::<T>()
    }

    #[must_use]
    pub fn request(&self) -> &RequestContext {
        &self.scope.request
    }

    #[must_use]
    pub fn response(&self) -> &ResponseContext {
        &self.scope.response
    }

    #[must_use]
    pub fn framework(&self) -> &Arc<Framework> {
        &self.scope.framework
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        self.scope.framework.config()
    }

    /// Continuation handle of the middleware step currently running, if any.
    ///
    /// Middleware methods must signal through it exactly once; the chain does
    /// not advance until they do.
    #[must_use]
    pub fn next(&self) -> Option<Next> {
        self.scope.continuation.current()
    }

    /// A resolver sharing this instance's chain cache.
    ///
    /// If the chain has already completed, a fresh detached cache is used.
    #[must_use]
    pub fn bundle(&self) -> BundleResolver {
        self.scope.attach()
    }

    /// Call a method from the class method table.
    ///
    /// A panic inside the method is caught and reported as
    /// [`ComponentError::Panicked`].
    pub fn invoke(&self, method: &str) -> Result<(), ComponentError> {
        let f = self
            .class
            .method(method)
            .ok_or_else(|| ComponentError::UnknownMethod {
                component: self.name().to_string(),
                method: method.to_string(),
            })?;
        match catch_unwind(AssertUnwindSafe(|| f(self))) {
            Ok(result) => result,
            Err(payload) => Err(ComponentError::Panicked(panic_message(payload.as_ref()))),
        }
    }

    /// The capability table of this instance's kind.
    #[must_use]
    pub fn capabilities(&self) -> &Arc<CapabilityTable> {
        &self.capabilities
    }

    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.contains(name)
    }

    /// Call a capability registered for this instance's kind. The function
    /// receives this instance in [`Bindings::instance`].
    pub fn capability(&self, name: &str, args: Value) -> Result<Value, ComponentError> {
        let function =
            self.capabilities
                .get(name)
                .ok_or_else(|| ComponentError::UnknownCapability {
                    target: self.kind().to_string(),
                    name: name.to_string(),
                })?;
        let bindings = Bindings {
            framework: Arc::clone(&self.scope.framework),
            request: self.scope.request.clone(),
            response: self.scope.response.clone(),
            instance: self.this.upgrade(),
        };
        function(&bindings, args)
    }

    /// Store this instance in the chain cache under its own name, replacing
    /// whatever was cached there.
    pub fn singleton(self: &Arc<Self>) {
        let bundle = self.bundle();
        bundle
            .singletons()
            .insert(self.kind(), self.name(), Arc::clone(self));
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .field("request_id", &self.scope.request.id())
            .finish()
    }
}
