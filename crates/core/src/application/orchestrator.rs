// Batch Orchestrator
//
// Drives N work items to completion under bounded concurrency, updating
// durable progress and the live event bus as it goes. Items are processed in
// fixed-size chunks of `concurrency`: chunks run strictly sequentially, all
// items within a chunk run concurrently, which bounds peak parallelism
// exactly while guaranteeing progress is flushed at least once per chunk.

use crate::application::bus::ProgressEventBus;
use crate::application::constants::{
    DEFAULT_BATCH_CONCURRENCY, MAX_BATCH_CONCURRENCY, MIN_BATCH_CONCURRENCY,
};
use crate::application::lifecycle::JobLifecycle;
use crate::application::retry::{with_retry, RetryOptions};
use crate::domain::{ItemStatus, JobId, JobProgress, JobStatus, ProgressEvent};
use crate::error::{AppError, Result};
use crate::port::{JobStore, StoreError};
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// A per-item failure, captured as a value. One item's failure never aborts
/// the batch; it is absorbed into the aggregate counters.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ItemError {
    pub message: String,
}

impl ItemError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One unit of work plus the labels used for item-level instrumentation
#[derive(Debug, Clone)]
pub struct WorkItem<T> {
    pub id: String,
    pub kind: String,
    pub label: Option<String>,
    pub payload: T,
}

impl<T> WorkItem<T> {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, payload: T) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            label: None,
            payload,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    /// Chunk size / peak parallelism, bounded to 1..=10
    pub concurrency: usize,
    /// Emit fine-grained `item` events alongside the per-chunk `progress`
    /// cadence
    pub emit_item_events: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_BATCH_CONCURRENCY,
            emit_item_events: true,
        }
    }
}

pub struct BatchOrchestrator {
    store: Arc<dyn JobStore>,
    bus: Arc<ProgressEventBus>,
    lifecycle: JobLifecycle,
    retry: RetryOptions,
    config: BatchConfig,
}

impl BatchOrchestrator {
    /// # Errors
    /// - `AppError::Config` if `concurrency` is outside 1..=10
    pub fn new(
        store: Arc<dyn JobStore>,
        bus: Arc<ProgressEventBus>,
        config: BatchConfig,
    ) -> Result<Self> {
        if config.concurrency < MIN_BATCH_CONCURRENCY || config.concurrency > MAX_BATCH_CONCURRENCY
        {
            return Err(AppError::Config(format!(
                "batch concurrency {} outside {}..={}",
                config.concurrency, MIN_BATCH_CONCURRENCY, MAX_BATCH_CONCURRENCY
            )));
        }
        let retry = RetryOptions::default();
        let lifecycle = JobLifecycle::with_retry_options(Arc::clone(&store), retry);
        Ok(Self {
            store,
            bus,
            lifecycle,
            retry,
            config,
        })
    }

    /// Override retry behavior for store writes (mainly for tests)
    pub fn with_retry_options(mut self, retry: RetryOptions) -> Self {
        self.lifecycle = JobLifecycle::with_retry_options(Arc::clone(&self.store), retry);
        self.retry = retry;
        self
    }

    /// Run the batch to completion and decide the terminal job outcome.
    ///
    /// Propagates a failure to persist the `running` transition (the job
    /// never proceeds without a trustworthy record); per-item failures are
    /// values and never interrupt the batch.
    pub async fn run<T, F, Fut>(
        &self,
        job_id: &JobId,
        items: Vec<WorkItem<T>>,
        operation: F,
    ) -> Result<JobProgress>
    where
        T: Send,
        F: Fn(T) -> Fut + Send + Sync,
        Fut: Future<Output = std::result::Result<(), ItemError>> + Send,
    {
        self.lifecycle.start(job_id).await?;
        self.bus.emit(
            job_id,
            &ProgressEvent::Status {
                status: JobStatus::Running,
            },
        );

        let total = items.len();
        let mut progress = JobProgress::for_total(total as u32);
        info!(
            job_id = %job_id,
            total = %total,
            concurrency = %self.config.concurrency,
            "Batch started"
        );
        self.persist_progress(job_id, &progress).await;
        self.bus.emit(job_id, &ProgressEvent::from_progress(&progress));

        if self.config.emit_item_events {
            for (index, item) in items.iter().enumerate() {
                self.emit_item(job_id, item, ItemStatus::Queued, index);
            }
        }

        let mut first_failure: Option<String> = None;
        let mut position = 0usize;
        let mut remaining = items.into_iter();
        loop {
            let chunk: Vec<WorkItem<T>> = remaining
                .by_ref()
                .take(self.config.concurrency)
                .collect();
            if chunk.is_empty() {
                break;
            }
            let chunk_len = chunk.len();

            // Start every future in the chunk before awaiting any of them
            let in_flight: Vec<_> = chunk
                .into_iter()
                .enumerate()
                .map(|(offset, item)| {
                    let index = position + offset;
                    if self.config.emit_item_events {
                        self.emit_item(job_id, &item, ItemStatus::InProgress, index);
                    }
                    let WorkItem {
                        id,
                        kind,
                        label,
                        payload,
                    } = item;
                    let future = operation(payload);
                    async move { (id, kind, label, index, future.await) }
                })
                .collect();

            for (id, kind, label, index, outcome) in join_all(in_flight).await {
                let descriptor = WorkItem {
                    id: id.clone(),
                    kind,
                    label,
                    payload: (),
                };
                match outcome {
                    Ok(()) => {
                        progress.record_success();
                        if self.config.emit_item_events {
                            self.emit_item(job_id, &descriptor, ItemStatus::Succeeded, index);
                        }
                    }
                    Err(err) => {
                        progress.record_failure();
                        warn!(job_id = %job_id, item_id = %id, error = %err, "Batch item failed");
                        if first_failure.is_none() {
                            first_failure = Some(format!("{}: {}", id, err));
                        }
                        if self.config.emit_item_events {
                            self.emit_item(job_id, &descriptor, ItemStatus::Failed, index);
                        }
                    }
                }
            }
            position += chunk_len;

            // Flush once per chunk: persist, then publish
            self.persist_progress(job_id, &progress).await;
            self.bus.emit(job_id, &ProgressEvent::from_progress(&progress));
        }

        let error_message = if progress.total > 0 && progress.succeeded == 0 {
            first_failure
                .as_deref()
                .map(|first| format!("all {} items failed; first error: {}", progress.failed, first))
        } else {
            None
        };
        let status = self
            .lifecycle
            .finalize(job_id, &progress, error_message.as_deref())
            .await?;

        // Finalize persisted the terminal state, so this status event is
        // guaranteed to be the last one subscribers see for this job
        self.bus.emit(job_id, &ProgressEvent::Status { status });
        Ok(progress)
    }

    /// Progress counters are not a lifecycle transition: after retries are
    /// exhausted the write is skipped with a warning, and `finalize` later
    /// reconciles the durable counters. Live observers are told about the
    /// skipped write through an `error` event.
    async fn persist_progress(&self, job_id: &JobId, progress: &JobProgress) {
        let written = with_retry(
            || self.store.set_progress(job_id, progress),
            &self.retry,
            StoreError::is_transient,
        )
        .await;
        if let Err(err) = written {
            warn!(
                job_id = %job_id,
                error = %err,
                "Failed to persist progress counters, continuing batch"
            );
            self.bus.emit(
                job_id,
                &ProgressEvent::Error {
                    message: format!("progress counters not persisted: {}", err),
                },
            );
        }
    }

    fn emit_item<T>(&self, job_id: &JobId, item: &WorkItem<T>, status: ItemStatus, index: usize) {
        self.bus.emit(
            job_id,
            &ProgressEvent::Item {
                item_id: item.id.clone(),
                item_kind: item.kind.clone(),
                status,
                label: item.label.clone(),
                index: Some(index as u32),
                count: None,
                total: None,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobKind;
    use crate::port::job_store::mocks::MemoryJobStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::{sleep, Duration};

    fn fast_retry() -> RetryOptions {
        RetryOptions {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        }
    }

    fn orchestrator(
        store: &Arc<MemoryJobStore>,
        bus: &Arc<ProgressEventBus>,
        concurrency: usize,
    ) -> BatchOrchestrator {
        BatchOrchestrator::new(
            store.clone() as Arc<dyn JobStore>,
            Arc::clone(bus),
            BatchConfig {
                concurrency,
                emit_item_events: true,
            },
        )
        .unwrap()
        .with_retry_options(fast_retry())
    }

    async fn pending_job(store: &Arc<MemoryJobStore>) -> JobId {
        store
            .create_job("owner-1", &JobKind::new("song_analysis"))
            .await
            .unwrap()
            .id
    }

    fn numbered_items(count: usize) -> Vec<WorkItem<usize>> {
        (0..count)
            .map(|i| WorkItem::new(format!("track-{}", i), "song", i))
            .collect()
    }

    #[test]
    fn test_concurrency_out_of_range_rejected() {
        let store = Arc::new(MemoryJobStore::new()) as Arc<dyn JobStore>;
        let bus = Arc::new(ProgressEventBus::new());
        for bad in [0usize, 11, 100] {
            let result = BatchOrchestrator::new(
                Arc::clone(&store),
                Arc::clone(&bus),
                BatchConfig {
                    concurrency: bad,
                    emit_item_events: false,
                },
            );
            assert!(matches!(result, Err(AppError::Config(_))), "concurrency {}", bad);
        }
    }

    #[tokio::test]
    async fn test_partial_failure_still_completes() {
        let store = Arc::new(MemoryJobStore::new());
        let bus = Arc::new(ProgressEventBus::new());
        let job_id = pending_job(&store).await;
        let orchestrator = orchestrator(&store, &bus, 3);

        let progress = orchestrator
            .run(&job_id, numbered_items(10), |n| async move {
                if n == 2 || n == 5 || n == 8 {
                    Err(ItemError::new(format!("analysis failed for track {}", n)))
                } else {
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert_eq!(progress.total, 10);
        assert_eq!(progress.done, 10);
        assert_eq!(progress.succeeded, 7);
        assert_eq!(progress.failed, 3);

        let job = store.snapshot(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, progress);
        assert!(job.error_message.is_none());
    }

    #[tokio::test]
    async fn test_all_failed_marks_job_failed() {
        let store = Arc::new(MemoryJobStore::new());
        let bus = Arc::new(ProgressEventBus::new());
        let job_id = pending_job(&store).await;
        let orchestrator = orchestrator(&store, &bus, 2);

        let progress = orchestrator
            .run(&job_id, numbered_items(4), |_| async {
                Err(ItemError::new("backend down"))
            })
            .await
            .unwrap();

        assert_eq!(progress.succeeded, 0);
        assert_eq!(progress.failed, 4);
        let job = store.snapshot(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        let message = job.error_message.unwrap();
        assert!(message.contains("all 4 items failed"));
        assert!(message.contains("backend down"));
    }

    #[tokio::test]
    async fn test_empty_batch_completes() {
        let store = Arc::new(MemoryJobStore::new());
        let bus = Arc::new(ProgressEventBus::new());
        let job_id = pending_job(&store).await;
        let orchestrator = orchestrator(&store, &bus, 3);

        let progress = orchestrator
            .run(&job_id, Vec::<WorkItem<()>>::new(), |_| async { Ok(()) })
            .await
            .unwrap();

        assert_eq!(progress.total, 0);
        assert_eq!(store.snapshot(&job_id).unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_start_failure_propagates_and_skips_batch() {
        let store = Arc::new(MemoryJobStore::new());
        let bus = Arc::new(ProgressEventBus::new());
        let job_id = pending_job(&store).await;
        store.fail_next("set_running", 1, false);
        let orchestrator = orchestrator(&store, &bus, 3);

        let executed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&executed);
        let result = orchestrator
            .run(&job_id, numbered_items(3), move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(executed.load(Ordering::SeqCst), 0);
        // Orphan prevention: the job ended up failed, not stuck pending
        assert_eq!(store.snapshot(&job_id).unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_parallelism_bounded_by_chunk_size() {
        let store = Arc::new(MemoryJobStore::new());
        let bus = Arc::new(ProgressEventBus::new());
        let job_id = pending_job(&store).await;
        let concurrency = 3;
        let orchestrator = orchestrator(&store, &bus, concurrency);

        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let active_ref = Arc::clone(&active);
        let peak_ref = Arc::clone(&peak);

        orchestrator
            .run(&job_id, numbered_items(10), move |_| {
                let active = Arc::clone(&active_ref);
                let peak = Arc::clone(&peak_ref);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= concurrency);
    }

    #[tokio::test]
    async fn test_progress_events_flushed_per_chunk_in_order() {
        let store = Arc::new(MemoryJobStore::new());
        let bus = Arc::new(ProgressEventBus::new());
        let job_id = pending_job(&store).await;
        let orchestrator = orchestrator(&store, &bus, 2);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(&job_id, move |event| {
            if let ProgressEvent::Progress { done, .. } = event {
                sink.lock().unwrap().push(*done);
            }
        });

        orchestrator
            .run(&job_id, numbered_items(5), |_| async { Ok(()) })
            .await
            .unwrap();

        // Initial flush plus one per chunk (2+2+1), strictly increasing
        assert_eq!(*seen.lock().unwrap(), vec![0, 2, 4, 5]);
    }

    #[tokio::test]
    async fn test_terminal_status_event_is_last() {
        let store = Arc::new(MemoryJobStore::new());
        let bus = Arc::new(ProgressEventBus::new());
        let job_id = pending_job(&store).await;
        let orchestrator = orchestrator(&store, &bus, 2);

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        bus.subscribe(&job_id, move |event| {
            sink.lock().unwrap().push(event.clone());
        });

        orchestrator
            .run(&job_id, numbered_items(3), |_| async { Ok(()) })
            .await
            .unwrap();

        let events = events.lock().unwrap();
        let last = events.last().unwrap();
        assert!(last.is_terminal_status());
        // Exactly one terminal status, and nothing after it
        let terminal_count = events.iter().filter(|e| e.is_terminal_status()).count();
        assert_eq!(terminal_count, 1);
    }

    #[tokio::test]
    async fn test_item_events_ordered_per_item() {
        let store = Arc::new(MemoryJobStore::new());
        let bus = Arc::new(ProgressEventBus::new());
        let job_id = pending_job(&store).await;
        let orchestrator = orchestrator(&store, &bus, 2);

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        bus.subscribe(&job_id, move |event| {
            if let ProgressEvent::Item {
                item_id, status, ..
            } = event
            {
                sink.lock().unwrap().push((item_id.clone(), *status));
            }
        });

        orchestrator
            .run(&job_id, numbered_items(4), |n| async move {
                if n % 2 == 0 {
                    Ok(())
                } else {
                    Err(ItemError::new("odd tracks fail"))
                }
            })
            .await
            .unwrap();

        let events = events.lock().unwrap();
        for i in 0..4 {
            let id = format!("track-{}", i);
            let phases: Vec<ItemStatus> = events
                .iter()
                .filter(|(item_id, _)| *item_id == id)
                .map(|(_, status)| *status)
                .collect();
            let expected_terminal = if i % 2 == 0 {
                ItemStatus::Succeeded
            } else {
                ItemStatus::Failed
            };
            assert_eq!(
                phases,
                vec![ItemStatus::Queued, ItemStatus::InProgress, expected_terminal],
                "item {}",
                id
            );
        }
    }

    #[tokio::test]
    async fn test_progress_write_failure_does_not_abort_batch() {
        let store = Arc::new(MemoryJobStore::new());
        let bus = Arc::new(ProgressEventBus::new());
        let job_id = pending_job(&store).await;
        // Every set_progress call fails permanently
        store.fail_next("set_progress", 100, false);
        let orchestrator = orchestrator(&store, &bus, 2);

        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        bus.subscribe(&job_id, move |event| {
            if let ProgressEvent::Error { message } = event {
                sink.lock().unwrap().push(message.clone());
            }
        });

        let progress = orchestrator
            .run(&job_id, numbered_items(4), |_| async { Ok(()) })
            .await
            .unwrap();

        assert_eq!(progress.succeeded, 4);
        assert_eq!(store.snapshot(&job_id).unwrap().status, JobStatus::Completed);

        // Skipped writes were surfaced to live observers
        let errors = errors.lock().unwrap();
        assert!(!errors.is_empty());
        assert!(errors[0].contains("progress counters not persisted"));
    }
}
