// Job Store Port (Interface)
//
// Durable record of job identity, kind, status, and progress counters.
// The core depends only on this contract, never on the storage engine.

use crate::domain::{Job, JobId, JobKind, JobProgress};
use async_trait::async_trait;
use thiserror::Error;

/// Storage errors, split so the retry layer can tell transient
/// infrastructure failures from permanent ones.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Transient infrastructure failure (locked database, connection drop).
    /// The only variant worth retrying.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// Constraint violation or invalid status transition (e.g. writing to a
    /// job that already reached a terminal status)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Retryability predicate for the retry executor: only transient
    /// infrastructure failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Store interface for Job persistence
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a new job in `pending` state
    async fn create_job(&self, owner_id: &str, kind: &JobKind) -> Result<Job, StoreError>;

    /// Find job by ID
    async fn get_job(&self, id: &JobId) -> Result<Option<Job>, StoreError>;

    /// Transition `pending -> running`
    async fn set_running(&self, id: &JobId) -> Result<(), StoreError>;

    /// Transition to terminal `completed`. Rejected with `Conflict` if the
    /// job is already terminal.
    async fn set_completed(&self, id: &JobId) -> Result<(), StoreError>;

    /// Transition to terminal `failed`, recording the error message.
    /// Rejected with `Conflict` if the job is already terminal.
    async fn set_failed(&self, id: &JobId, message: Option<&str>) -> Result<(), StoreError>;

    /// Persist aggregate progress counters
    async fn set_progress(&self, id: &JobId, progress: &JobProgress) -> Result<(), StoreError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::JobStatus;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// Scripted failure for one store operation
    #[derive(Debug, Clone)]
    struct FailureScript {
        remaining: u32,
        transient: bool,
    }

    /// In-memory JobStore with failure injection and call counting
    pub struct MemoryJobStore {
        jobs: Mutex<HashMap<JobId, Job>>,
        failures: Mutex<HashMap<&'static str, FailureScript>>,
        calls: Mutex<HashMap<&'static str, u32>>,
        next_id: AtomicU64,
        clock: AtomicU64,
    }

    impl MemoryJobStore {
        pub fn new() -> Self {
            Self {
                jobs: Mutex::new(HashMap::new()),
                failures: Mutex::new(HashMap::new()),
                calls: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                clock: AtomicU64::new(1000),
            }
        }

        /// Script the next `times` calls to `operation` to fail.
        /// Transient failures map to `StoreError::Unavailable`, permanent
        /// ones to `StoreError::Backend`.
        pub fn fail_next(&self, operation: &'static str, times: u32, transient: bool) {
            self.failures.lock().unwrap().insert(
                operation,
                FailureScript {
                    remaining: times,
                    transient,
                },
            );
        }

        /// Number of calls made to `operation`
        pub fn call_count(&self, operation: &'static str) -> u32 {
            *self.calls.lock().unwrap().get(operation).unwrap_or(&0)
        }

        /// Direct snapshot of a stored job, bypassing failure scripts
        pub fn snapshot(&self, id: &JobId) -> Option<Job> {
            self.jobs.lock().unwrap().get(id).cloned()
        }

        /// Seed a job directly (e.g. an already-running or terminal job)
        pub fn insert(&self, job: Job) {
            self.jobs.lock().unwrap().insert(job.id.clone(), job);
        }

        fn record_call(&self, operation: &'static str) -> Result<(), StoreError> {
            *self.calls.lock().unwrap().entry(operation).or_insert(0) += 1;

            let mut failures = self.failures.lock().unwrap();
            if let Some(script) = failures.get_mut(operation) {
                if script.remaining > 0 {
                    script.remaining -= 1;
                    return Err(if script.transient {
                        StoreError::Unavailable(format!("injected transient {} failure", operation))
                    } else {
                        StoreError::Backend(format!("injected {} failure", operation))
                    });
                }
            }
            Ok(())
        }

        fn now(&self) -> i64 {
            self.clock.fetch_add(1, Ordering::SeqCst) as i64
        }
    }

    impl Default for MemoryJobStore {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl JobStore for MemoryJobStore {
        async fn create_job(&self, owner_id: &str, kind: &JobKind) -> Result<Job, StoreError> {
            self.record_call("create_job")?;
            let id = format!("job-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
            let job = Job::new(id.clone(), self.now(), owner_id, kind.clone());
            self.jobs.lock().unwrap().insert(id, job.clone());
            Ok(job)
        }

        async fn get_job(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
            self.record_call("get_job")?;
            Ok(self.jobs.lock().unwrap().get(id).cloned())
        }

        async fn set_running(&self, id: &JobId) -> Result<(), StoreError> {
            self.record_call("set_running")?;
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            if job.status != JobStatus::Pending {
                return Err(StoreError::Conflict(format!(
                    "cannot start job in status {}",
                    job.status
                )));
            }
            job.status = JobStatus::Running;
            job.updated_at = self.now();
            Ok(())
        }

        async fn set_completed(&self, id: &JobId) -> Result<(), StoreError> {
            self.record_call("set_completed")?;
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            if job.status.is_terminal() {
                return Err(StoreError::Conflict(format!(
                    "job already terminal: {}",
                    job.status
                )));
            }
            job.status = JobStatus::Completed;
            job.updated_at = self.now();
            Ok(())
        }

        async fn set_failed(&self, id: &JobId, message: Option<&str>) -> Result<(), StoreError> {
            self.record_call("set_failed")?;
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            if job.status.is_terminal() {
                return Err(StoreError::Conflict(format!(
                    "job already terminal: {}",
                    job.status
                )));
            }
            job.status = JobStatus::Failed;
            job.error_message = message.map(|m| m.to_string());
            job.updated_at = self.now();
            Ok(())
        }

        async fn set_progress(&self, id: &JobId, progress: &JobProgress) -> Result<(), StoreError> {
            self.record_call("set_progress")?;
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .get_mut(id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            job.progress = progress.clone();
            job.updated_at = self.now();
            Ok(())
        }
    }
}
