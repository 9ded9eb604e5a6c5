// Progress Event Bus
//
// In-memory publish/subscribe keyed by job id. Delivery is synchronous and
// best-effort; a panicking subscriber is isolated with catch_unwind so it can
// never prevent delivery to the other subscribers of the same event. This is
// intentionally the one swappable seam: a distributed pub/sub could back the
// same subscribe/emit surface without touching anything above it.

use crate::domain::{JobId, ProgressEvent};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error};

pub type SubscriberId = u64;

type Callback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

struct Registration {
    id: SubscriberId,
    callback: Callback,
}

#[derive(Default)]
pub struct ProgressEventBus {
    // The only mutable shared structure in the engine. All mutation happens
    // under this sync lock with no suspension point, so registration is
    // atomic with respect to the event loop.
    subscribers: Mutex<HashMap<JobId, Vec<Registration>>>,
    next_id: AtomicU64,
}

impl ProgressEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<JobId, Vec<Registration>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a callback for one job's events. Multiple subscribers per
    /// job are supported (several observers watching the same job).
    pub fn subscribe(
        &self,
        job_id: &JobId,
        callback: impl Fn(&ProgressEvent) + Send + Sync + 'static,
    ) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.registry()
            .entry(job_id.clone())
            .or_default()
            .push(Registration {
                id,
                callback: Arc::new(callback),
            });
        debug!(job_id = %job_id, subscriber_id = %id, "Subscriber registered");
        id
    }

    /// Remove one subscriber. No-op if already removed, so drop guards can
    /// call this unconditionally.
    pub fn unsubscribe(&self, job_id: &JobId, subscriber_id: SubscriberId) {
        let mut registry = self.registry();
        if let Some(registrations) = registry.get_mut(job_id) {
            registrations.retain(|r| r.id != subscriber_id);
            if registrations.is_empty() {
                registry.remove(job_id);
            }
        }
    }

    /// Drop every registration for a job. Called by the stream layer once a
    /// terminal status is observed, so no registration survives a finished
    /// job.
    pub fn unsubscribe_all(&self, job_id: &JobId) {
        if self.registry().remove(job_id).is_some() {
            debug!(job_id = %job_id, "All subscribers removed");
        }
    }

    /// Deliver an event to every subscriber of the job, synchronously.
    pub fn emit(&self, job_id: &JobId, event: &ProgressEvent) {
        // Snapshot outside the callbacks: a subscriber may re-enter the bus
        let callbacks: Vec<Callback> = {
            let registry = self.registry();
            match registry.get(job_id) {
                Some(registrations) => {
                    registrations.iter().map(|r| Arc::clone(&r.callback)).collect()
                }
                None => return,
            }
        };

        for callback in callbacks {
            // Panic isolation: one broken observer must not break the rest
            if let Err(panic_info) = catch_unwind(AssertUnwindSafe(|| callback(event))) {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic".to_string()
                };
                error!(job_id = %job_id, panic_msg = %panic_msg, "Subscriber callback panicked");
            }
        }
    }

    pub fn has_subscribers(&self, job_id: &JobId) -> bool {
        self.registry().contains_key(job_id)
    }

    pub fn subscriber_count(&self, job_id: &JobId) -> usize {
        self.registry().get(job_id).map_or(0, |r| r.len())
    }
}
