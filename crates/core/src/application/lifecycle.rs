// Job Lifecycle
//
// State-machine operations layered on the JobStore, with cleanup-on-failure
// guarantees. Status writes are retried only on transient storage errors;
// not-found and conflict are permanent and surface immediately.

use crate::application::retry::{with_retry, RetryOptions};
use crate::domain::{JobId, JobProgress, JobStatus};
use crate::error::Result;
use crate::port::{JobStore, StoreError};
use std::sync::Arc;
use tracing::{error, info};

pub struct JobLifecycle {
    store: Arc<dyn JobStore>,
    retry: RetryOptions,
}

impl JobLifecycle {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self::with_retry_options(store, RetryOptions::default())
    }

    pub fn with_retry_options(store: Arc<dyn JobStore>, retry: RetryOptions) -> Self {
        Self { store, retry }
    }

    /// Transition `pending -> running`.
    ///
    /// If the store write fails, compensates by attempting to mark the job
    /// `failed` so it is never orphaned in `pending` while a scheduler waits
    /// on it. The caller always receives the original start failure; a
    /// failing compensation is logged separately.
    pub async fn start(&self, job_id: &JobId) -> Result<()> {
        let started = with_retry(
            || self.store.set_running(job_id),
            &self.retry,
            StoreError::is_transient,
        )
        .await;

        if let Err(start_err) = started {
            error!(job_id = %job_id, error = %start_err, "Failed to mark job running");

            let reason = format!("could not start job: {}", start_err);
            let compensated = with_retry(
                || self.store.set_failed(job_id, Some(&reason)),
                &self.retry,
                StoreError::is_transient,
            )
            .await;
            if let Err(comp_err) = compensated {
                error!(
                    job_id = %job_id,
                    error = %comp_err,
                    "Compensating set_failed also failed; job may be stuck in pending"
                );
            }
            return Err(start_err.into());
        }

        info!(job_id = %job_id, "Job running");
        Ok(())
    }

    /// Decide the terminal outcome from final counters.
    ///
    /// `total == 0` (nothing to do) or `succeeded > 0` (partial success is
    /// still useful output) completes the job; only a batch with work where
    /// every item failed is marked `failed`.
    pub async fn finalize(
        &self,
        job_id: &JobId,
        progress: &JobProgress,
        error_message: Option<&str>,
    ) -> Result<JobStatus> {
        if progress.total == 0 || progress.succeeded > 0 {
            self.complete(job_id).await?;
            info!(
                job_id = %job_id,
                succeeded = %progress.succeeded,
                failed = %progress.failed,
                "Job completed"
            );
            Ok(JobStatus::Completed)
        } else {
            let default_message = format!("all {} items failed", progress.failed);
            let message = error_message.unwrap_or(&default_message);
            self.fail(job_id, Some(message)).await?;
            error!(job_id = %job_id, failed = %progress.failed, "Job failed");
            Ok(JobStatus::Failed)
        }
    }

    /// Mark the job `completed` (retried on transient storage errors)
    pub async fn complete(&self, job_id: &JobId) -> Result<()> {
        with_retry(
            || self.store.set_completed(job_id),
            &self.retry,
            StoreError::is_transient,
        )
        .await?;
        Ok(())
    }

    /// Mark the job `failed` (retried on transient storage errors)
    pub async fn fail(&self, job_id: &JobId, message: Option<&str>) -> Result<()> {
        with_retry(
            || self.store.set_failed(job_id, message),
            &self.retry,
            StoreError::is_transient,
        )
        .await?;
        Ok(())
    }
}
