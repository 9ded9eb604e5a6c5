// Progress Stream
//
// Adapts the event bus (push) plus a one-time JobStore read (pull, for
// observers that attach after work already started) into an ordered frame
// sequence for exactly one remote observer. Transport-agnostic: the HTTP
// layer maps frames onto text/event-stream records.

use crate::application::bus::ProgressEventBus;
use crate::application::constants::DEFAULT_KEEP_ALIVE_INTERVAL;
use crate::domain::{DomainError, JobId, ProgressEvent};
use crate::error::Result;
use crate::port::JobStore;
use async_stream::stream;
use futures::Stream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One unit of stream output
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// A progress event to deliver verbatim
    Event(ProgressEvent),
    /// Idle keep-alive marker, sent on a fixed interval so intermediaries
    /// do not time out the connection
    KeepAlive,
}

#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    pub keep_alive: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            keep_alive: DEFAULT_KEEP_ALIVE_INTERVAL,
        }
    }
}

/// Unsubscribes on drop. Dropping the stream mid-flight (observer
/// disconnected, keep-alive write failed) runs this guard; reaching the
/// terminal status first makes it a no-op since unsubscribe is idempotent.
struct Unsubscriber {
    bus: Arc<ProgressEventBus>,
    job_id: JobId,
    subscriber_id: crate::application::bus::SubscriberId,
}

impl Drop for Unsubscriber {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.job_id, self.subscriber_id);
    }
}

/// Open a progress stream for one observer.
///
/// On attach, reads the job snapshot: emits a `progress` frame only when
/// `total > 0` (0 means "not yet discovered" - no misleading 0/0 flash) and
/// always emits a `status` frame. If the job is already terminal the stream
/// ends right there and no subscription is created. Otherwise every bus
/// event is relayed verbatim in arrival order until a terminal `status`
/// event, which is guaranteed to be the last frame. After subscribing, the
/// status is read once more to cover a job that went terminal between
/// snapshot and subscription.
///
/// # Errors
/// - `DomainError::JobNotFound` if the job id does not exist
pub async fn open(
    store: Arc<dyn JobStore>,
    bus: Arc<ProgressEventBus>,
    job_id: JobId,
    config: StreamConfig,
) -> Result<impl Stream<Item = StreamFrame> + Send> {
    let job = store
        .get_job(&job_id)
        .await?
        .ok_or_else(|| DomainError::JobNotFound(job_id.clone()))?;

    Ok(stream! {
        if job.progress.total > 0 {
            yield StreamFrame::Event(ProgressEvent::from_progress(&job.progress));
        }
        yield StreamFrame::Event(ProgressEvent::Status { status: job.status });

        if job.status.is_terminal() {
            debug!(job_id = %job_id, status = %job.status, "Job already terminal, closing stream");
            return;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscriber_id = bus.subscribe(&job_id, move |event| {
            // Receiver gone means the observer disconnected; nothing to do
            let _ = tx.send(event.clone());
        });
        let _guard = Unsubscriber {
            bus: Arc::clone(&bus),
            job_id: job_id.clone(),
            subscriber_id,
        };
        info!(job_id = %job_id, "Progress stream attached");

        // The job can reach terminal state between the snapshot read and
        // this subscription registering; that final status event had no
        // receivers. Recheck the store so the stream still ends with the
        // terminal status instead of idling on keep-alives.
        match store.get_job(&job_id).await {
            Ok(Some(current)) if current.status.is_terminal() => {
                if current.progress.total > 0 && current.progress != job.progress {
                    yield StreamFrame::Event(ProgressEvent::from_progress(&current.progress));
                }
                yield StreamFrame::Event(ProgressEvent::Status { status: current.status });
                bus.unsubscribe_all(&job_id);
                info!(job_id = %job_id, status = %current.status, "Job went terminal before subscription, closing stream");
                return;
            }
            Ok(_) => {}
            Err(err) => {
                // Keep relaying; live events still reach this subscriber
                warn!(job_id = %job_id, error = %err, "Post-subscribe status recheck failed");
            }
        }

        let mut keep_alive = tokio::time::interval_at(
            tokio::time::Instant::now() + config.keep_alive,
            config.keep_alive,
        );

        loop {
            tokio::select! {
                received = rx.recv() => {
                    match received {
                        Some(event) => {
                            let terminal = event.is_terminal_status();
                            yield StreamFrame::Event(event);
                            if terminal {
                                // Last event for this job: drop every
                                // remaining registration
                                bus.unsubscribe_all(&job_id);
                                info!(job_id = %job_id, "Terminal status relayed, closing stream");
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = keep_alive.tick() => {
                    yield StreamFrame::KeepAlive;
                }
            }
        }
    })
}
