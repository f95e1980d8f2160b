use std::fmt;
use std::sync::Arc;

use may::sync::mpsc;
use parking_lot::Mutex;
use tracing::warn;

use crate::error::MiddlewareError;

pub(crate) type StepOutcome = Result<(), MiddlewareError>;

/// Continuation handle of one middleware step.
///
/// The step completes when the middleware calls [`Next::proceed`] or
/// [`Next::fail`]. Only the first signal counts; clones share that state, so
/// the handle may be moved into a coroutine and signalled later. Dropping
/// every clone without signalling fails the step.
#[derive(Clone)]
pub struct Next {
    step: Arc<str>,
    tx: Arc<Mutex<Option<mpsc::Sender<StepOutcome>>>>,
}

impl Next {
    pub(crate) fn new(step: &str, tx: mpsc::Sender<StepOutcome>) -> Self {
        Self {
            step: Arc::from(step),
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// The `Service.method` entry this handle belongs to.
    #[must_use]
    pub fn step(&self) -> &str {
        &self.step
    }

    /// Let the chain continue. Returns `false` if the step was already signalled.
    pub fn proceed(&self) -> bool {
        self.signal(Ok(()))
    }

    /// Abort the chain; the request ends with a 500.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.signal(Err(MiddlewareError::Failed {
            step: self.step.to_string(),
            reason: reason.into(),
        }))
    }

    #[must_use]
    pub fn is_signaled(&self) -> bool {
        self.tx.lock().is_none()
    }

    fn signal(&self, outcome: StepOutcome) -> bool {
        let Some(tx) = self.tx.lock().take() else {
            warn!(step = %self.step, "Middleware signalled completion more than once");
            return false;
        };
        // The receiver is gone only if the dispatcher already gave up on this step.
        if tx.send(outcome).is_err() {
            warn!(step = %self.step, "Middleware completion arrived after the chain ended");
        }
        true
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("step", &self.step)
            .field("signaled", &self.is_signaled())
            .finish()
    }
}

/// Slot holding the continuation of the middleware step currently running.
///
/// One slot is shared by every instance of a resolution chain; the dispatcher
/// arms it before invoking a middleware method and disarms it afterwards.
#[derive(Clone, Default)]
pub(crate) struct Continuation {
    slot: Arc<Mutex<Option<Next>>>,
}

impl Continuation {
    pub(crate) fn arm(&self, next: Next) {
        *self.slot.lock() = Some(next);
    }

    pub(crate) fn disarm(&self) {
        self.slot.lock().take();
    }

    pub(crate) fn current(&self) -> Option<Next> {
        self.slot.lock().clone()
    }
}
