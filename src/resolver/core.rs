use std::sync::Arc;

use tracing::{debug, error};

use super::cache::{SingletonCache, WeakSingletonCache};
use super::next::{Continuation, Next};
use crate::component::{ComponentKind, Instance};
use crate::config::AppConfig;
use crate::context::{RequestContext, ResponseContext};
use crate::error::ResolveError;
use crate::framework::Framework;

/// Resolves `(kind, name)` pairs to instances for one resolution chain.
///
/// A resolver is cheap to clone; clones share the chain's singleton cache and
/// continuation slot. Lookups that fail are logged at `error` and come back
/// as `None`, the `try_*` variants return the underlying [`ResolveError`].
#[derive(Clone)]
pub struct BundleResolver {
    framework: Arc<Framework>,
    request: RequestContext,
    response: ResponseContext,
    continuation: Continuation,
    singletons: SingletonCache,
}

impl BundleResolver {
    /// Open a new chain with an empty cache.
    #[must_use]
    pub fn new(framework: Arc<Framework>, request: RequestContext, response: ResponseContext) -> Self {
        Self::with_cache(framework, request, response, SingletonCache::new())
    }

    /// Open a chain over an existing cache.
    #[must_use]
    pub fn with_cache(
        framework: Arc<Framework>,
        request: RequestContext,
        response: ResponseContext,
        singletons: SingletonCache,
    ) -> Self {
        Self {
            framework,
            request,
            response,
            continuation: Continuation::default(),
            singletons,
        }
    }

    #[must_use]
    pub fn framework(&self) -> &Arc<Framework> {
        &self.framework
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        self.framework.config()
    }

    #[must_use]
    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    #[must_use]
    pub fn response(&self) -> &ResponseContext {
        &self.response
    }

    /// Continuation of the middleware step currently running, if any.
    #[must_use]
    pub fn next(&self) -> Option<Next> {
        self.continuation.current()
    }

    #[must_use]
    pub fn singletons(&self) -> &SingletonCache {
        &self.singletons
    }

    pub(crate) fn continuation(&self) -> &Continuation {
        &self.continuation
    }

    /// Return the cached instance for `name`, constructing and caching it on
    /// first use.
    pub fn get_or_create(&self, kind: ComponentKind, name: &str) -> Option<Arc<Instance>> {
        self.try_get_or_create(kind, name)
            .map_err(|err| self.report(&err))
            .ok()
    }

    /// Always construct a fresh instance; cache it only if `persist` is set.
    pub fn create_new(&self, kind: ComponentKind, name: &str, persist: bool) -> Option<Arc<Instance>> {
        self.try_create_new(kind, name, persist)
            .map_err(|err| self.report(&err))
            .ok()
    }

    pub fn try_get_or_create(
        &self,
        kind: ComponentKind,
        name: &str,
    ) -> Result<Arc<Instance>, ResolveError> {
        if let Some(instance) = self.singletons.get(kind, name) {
            return Ok(instance);
        }
        let instance = self.construct(kind, name)?;
        // A constructor may have resolved the same name while we were building.
        if let Some(existing) = self.singletons.get(kind, name) {
            return Ok(existing);
        }
        self.singletons.insert(kind, name, Arc::clone(&instance));
        Ok(instance)
    }

    pub fn try_create_new(
        &self,
        kind: ComponentKind,
        name: &str,
        persist: bool,
    ) -> Result<Arc<Instance>, ResolveError> {
        let instance = self.construct(kind, name)?;
        if persist {
            self.singletons.insert(kind, name, Arc::clone(&instance));
        }
        Ok(instance)
    }

    pub fn controller(&self, name: &str) -> Option<Arc<Instance>> {
        self.get_or_create(ComponentKind::Controller, name)
    }

    pub fn model(&self, name: &str) -> Option<Arc<Instance>> {
        self.get_or_create(ComponentKind::Model, name)
    }

    pub fn service(&self, name: &str) -> Option<Arc<Instance>> {
        self.get_or_create(ComponentKind::Service, name)
    }

    pub fn new_controller(&self, name: &str) -> Option<Arc<Instance>> {
        self.create_new(ComponentKind::Controller, name, true)
    }

    pub fn new_model(&self, name: &str) -> Option<Arc<Instance>> {
        self.create_new(ComponentKind::Model, name, true)
    }

    pub fn new_service(&self, name: &str) -> Option<Arc<Instance>> {
        self.create_new(ComponentKind::Service, name, true)
    }

    fn construct(&self, kind: ComponentKind, name: &str) -> Result<Arc<Instance>, ResolveError> {
        let registries = self.framework.registries();
        let class = registries
            .class(kind, name)
            .map(Arc::clone)
            .ok_or_else(|| ResolveError::UnknownComponent {
                kind,
                name: name.to_string(),
            })?;

        let capabilities = Arc::clone(registries.capabilities(kind.into()));

        let state = class
            .construct(self)
            .map_err(|err| ResolveError::Construction {
                kind,
                name: name.to_string(),
                reason: err.to_string(),
            })?;

        debug!(
            request_id = %self.request.id(),
            kind = %kind,
            name = %name,
            "Component constructed"
        );
        Ok(Instance::new(class, state, self.detach(), capabilities))
    }

    fn report(&self, err: &ResolveError) {
        error!(
            request_id = %self.request.id(),
            method = %self.request.method(),
            path = %self.request.path(),
            error = %err,
            "Component resolution failed"
        );
    }

    pub(crate) fn detach(&self) -> DetachedScope {
        DetachedScope {
            framework: Arc::clone(&self.framework),
            request: self.request.clone(),
            response: self.response.clone(),
            continuation: self.continuation.clone(),
            singletons: self.singletons.downgrade(),
        }
    }
}

impl std::fmt::Debug for BundleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleResolver")
            .field("request_id", &self.request.id())
            .field("singletons", &self.singletons)
            .finish()
    }
}

/// The part of a chain an instance carries around.
///
/// Holds everything a [`BundleResolver`] does except that the cache link is
/// weak, so a cached instance does not keep its own cache alive.
#[derive(Clone)]
pub(crate) struct DetachedScope {
    pub(crate) framework: Arc<Framework>,
    pub(crate) request: RequestContext,
    pub(crate) response: ResponseContext,
    pub(crate) continuation: Continuation,
    pub(crate) singletons: WeakSingletonCache,
}

impl DetachedScope {
    pub(crate) fn attach(&self) -> BundleResolver {
        let singletons = self.singletons.upgrade().unwrap_or_else(|| {
            debug!(
                request_id = %self.request.id(),
                "Resolution chain already ended, using a detached cache"
            );
            SingletonCache::new()
        });
        BundleResolver {
            framework: Arc::clone(&self.framework),
            request: self.request.clone(),
            response: self.response.clone(),
            continuation: self.continuation.clone(),
            singletons,
        }
    }
}
