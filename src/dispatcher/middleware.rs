use std::sync::Arc;
use std::time::Instant;

use may::sync::mpsc;
use tracing::{debug, warn};

use crate::component::ComponentKind;
use crate::error::{MiddlewareError, ResolveError};
use crate::resolver::{BundleResolver, Next, StepOutcome};

/// One `Service.method` entry of the middleware chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddlewareStep {
    entry: Arc<str>,
    service: String,
    method: String,
}

impl MiddlewareStep {
    /// Parse a configured entry. Anything but exactly `Service.method` is
    /// rejected.
    #[must_use]
    pub fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        let (service, method) = entry.split_once('.')?;
        if service.is_empty() || method.is_empty() || method.contains('.') {
            return None;
        }
        Some(Self {
            entry: Arc::from(entry),
            service: service.to_string(),
            method: method.to_string(),
        })
    }

    #[must_use]
    pub fn entry(&self) -> &str {
        &self.entry
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Resolve the service through the chain, invoke the method and block
    /// until the method signals through its [`Next`] handle.
    ///
    /// A step whose method neither signals nor keeps a handle fails as
    /// [`MiddlewareError::Dropped`]. A step that keeps a handle and never
    /// signals blocks the request indefinitely.
    pub(crate) fn run(&self, resolver: &BundleResolver) -> Result<(), MiddlewareError> {
        let started = Instant::now();
        let service = resolver
            .try_get_or_create(ComponentKind::Service, &self.service)
            .map_err(|err| match err {
                ResolveError::UnknownComponent { name, .. } => {
                    MiddlewareError::UnknownMiddleware(name)
                }
                other => MiddlewareError::Failed {
                    step: self.entry.to_string(),
                    reason: other.to_string(),
                },
            })?;

        let (tx, rx) = mpsc::channel::<StepOutcome>();
        let next = Next::new(&self.entry, tx);
        resolver.continuation().arm(next.clone());
        let invoked = service.invoke(&self.method);
        resolver.continuation().disarm();
        drop(next);

        if let Err(err) = invoked {
            return Err(MiddlewareError::Failed {
                step: self.entry.to_string(),
                reason: err.to_string(),
            });
        }

        let outcome = rx
            .recv()
            .map_err(|_| MiddlewareError::Dropped(self.entry.to_string()))?;
        debug!(
            request_id = %resolver.request().id(),
            middleware = %self.entry,
            ok = outcome.is_ok(),
            duration_us = started.elapsed().as_micros() as u64,
            "Middleware step complete"
        );
        outcome
    }
}

/// Parse the configured chain, dropping malformed entries with a warning.
#[must_use]
pub fn parse_chain(entries: &[String]) -> Vec<MiddlewareStep> {
    entries
        .iter()
        .filter_map(|entry| {
            let step = MiddlewareStep::parse(entry);
            if step.is_none() {
                warn!(middleware = %entry, "Invalid middleware {entry}, skipping");
            }
            step
        })
        .collect()
}
