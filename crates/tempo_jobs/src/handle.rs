//! Async handles
//!
//! An [`AsyncHandle`] names one job. It holds only a weak reference to the
//! scheduler, so handles outliving the scheduler are harmless: every query
//! reports not-running and every operation is a no-op.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::job::JobId;
use crate::shared::Shared;

/// Handle to a scheduled job
#[derive(Clone)]
pub struct AsyncHandle {
    shared: Weak<Shared>,
    id: JobId,
}

impl AsyncHandle {
    pub(crate) fn new(shared: Weak<Shared>, id: JobId) -> Self {
        Self { shared, id }
    }

    /// A handle that never names a job
    pub fn detached() -> Self {
        Self::new(Weak::new(), JobId::default())
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Whether the job is registered and not cancelled
    pub fn is_running(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.is_running(self.id))
    }

    /// Cancel the job and every nested child it scheduled
    ///
    /// Cancellation is polled: a step already running finishes before the
    /// job is disposed. Returns false if the job was already gone.
    pub fn cancel(&self) -> bool {
        match self.shared.upgrade() {
            Some(shared) => shared.cancel(self.id),
            None => false,
        }
    }

    /// Run `callback` on the main thread when the job completes
    ///
    /// Returns false (dropping the callback) if the job is already gone.
    pub fn on_complete(&self, callback: impl FnOnce() + Send + 'static) -> bool {
        self.with_unit(|unit| unit.on_complete.push(Box::new(callback)))
    }

    /// Run `callback` on the main thread when the job is cancelled or panics
    pub fn on_stop(&self, callback: impl FnOnce() + Send + 'static) -> bool {
        self.with_unit(|unit| unit.on_stop.push(Box::new(callback)))
    }

    /// Handles of the job's live children
    pub fn children(&self) -> Vec<AsyncHandle> {
        let Some(shared) = self.shared.upgrade() else {
            return Vec::new();
        };
        let state = shared.state.lock();
        let children = state.units.get(self.id).map_or_else(Vec::new, |unit| {
            unit.children
                .iter()
                .map(|child| AsyncHandle::new(Arc::downgrade(&shared), *child))
                .collect()
        });
        drop(state);
        children
    }

    fn with_unit(&self, f: impl FnOnce(&mut crate::job::JobUnit)) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let mut state = shared.state.lock();
        match state.units.get_mut(self.id) {
            Some(unit) if !unit.cancelled => {
                f(unit);
                true
            }
            _ => false,
        }
    }
}

impl Default for AsyncHandle {
    fn default() -> Self {
        Self::detached()
    }
}

impl PartialEq for AsyncHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Weak::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for AsyncHandle {}

impl fmt::Debug for AsyncHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncHandle")
            .field("id", &self.id)
            .field("running", &self.is_running())
            .finish()
    }
}
