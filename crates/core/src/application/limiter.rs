// Concurrency Limiter
//
// Bounded-parallelism gate with optional minimum-interval pacing between
// operation starts. Admission is a running counter up to `limit`; when full,
// callers queue as FIFO waiters. A released slot is handed to the oldest
// waiter as a ready permit - the running counter is transferred, never
// decremented and re-incremented, so two operations can never both observe a
// free slot. Pacing is a separate serialized start gate and does not affect
// the admission counter.

use crate::error::{AppError, Result};
use rand::Rng;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

/// Pacing window: no two operations begin within less than `min_interval`
/// of each other; when `max_interval > min_interval`, the actual gap is
/// drawn uniformly from the window. Models polite client-side pacing
/// against an external rate limit, independent of raw parallelism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingWindow {
    pub min_interval: Duration,
    pub max_interval: Duration,
}

impl PacingWindow {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            min_interval: interval,
            max_interval: interval,
        }
    }
}

struct LimiterState {
    running: usize,
    waiters: VecDeque<oneshot::Sender<SlotPermit>>,
}

struct PacingGate {
    // Fair tokio mutex: waiters take their start turn in FIFO order
    next_start: tokio::sync::Mutex<tokio::time::Instant>,
    window: PacingWindow,
}

impl PacingGate {
    fn new(window: PacingWindow) -> Self {
        Self {
            next_start: tokio::sync::Mutex::new(tokio::time::Instant::now()),
            window,
        }
    }

    async fn wait_turn(&self) {
        let mut next_start = self.next_start.lock().await;
        tokio::time::sleep_until(*next_start).await;

        let gap = if self.window.max_interval > self.window.min_interval {
            let spread = (self.window.max_interval - self.window.min_interval).as_millis() as u64;
            let jitter = rand::thread_rng().gen_range(0..=spread);
            self.window.min_interval + Duration::from_millis(jitter)
        } else {
            self.window.min_interval
        };
        *next_start = tokio::time::Instant::now() + gap;
    }
}

struct Inner {
    limit: usize,
    state: Mutex<LimiterState>,
    pacing: Option<PacingGate>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, LimiterState> {
        // Recover from poisoning: the guarded state is a counter and a
        // queue, both valid after an unwinding holder
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(self: Arc<Self>) {
        loop {
            let waiter = {
                let mut state = self.state();
                match state.waiters.pop_front() {
                    Some(tx) => Some(tx),
                    None => {
                        state.running -= 1;
                        None
                    }
                }
            };
            let Some(tx) = waiter else { return };

            // Transfer the slot directly to the oldest waiter
            let permit = SlotPermit {
                inner: Some(Arc::clone(&self)),
            };
            match tx.send(permit) {
                Ok(()) => return,
                Err(mut unclaimed) => {
                    // Waiter cancelled before the grant arrived; defuse the
                    // returned permit so dropping it does not recurse, and
                    // offer the slot to the next waiter
                    unclaimed.inner = None;
                }
            }
        }
    }
}

/// RAII admission slot. Dropping the permit releases the slot (including on
/// panic), handing it to the oldest queued waiter if any.
pub struct SlotPermit {
    inner: Option<Arc<Inner>>,
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.release();
        }
    }
}

/// Bounded-parallelism gate. Cheap to clone; clones share the same slots.
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    inner: Arc<Inner>,
}

impl ConcurrencyLimiter {
    /// Create a limiter admitting at most `limit` concurrent operations
    ///
    /// # Errors
    /// - `AppError::Config` if `limit == 0`
    pub fn new(limit: usize) -> Result<Self> {
        Self::build(limit, None)
    }

    /// Create a limiter with an additional pacing window between starts
    ///
    /// # Errors
    /// - `AppError::Config` if `limit == 0` or the window is inverted
    pub fn with_pacing(limit: usize, window: PacingWindow) -> Result<Self> {
        if window.max_interval < window.min_interval {
            return Err(AppError::Config(format!(
                "pacing max_interval {:?} < min_interval {:?}",
                window.max_interval, window.min_interval
            )));
        }
        Self::build(limit, Some(window))
    }

    fn build(limit: usize, window: Option<PacingWindow>) -> Result<Self> {
        if limit < 1 {
            return Err(AppError::Config(
                "concurrency limit must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                limit,
                state: Mutex::new(LimiterState {
                    running: 0,
                    waiters: VecDeque::new(),
                }),
                pacing: window.map(PacingGate::new),
            }),
        })
    }

    /// Resolve once a slot is available, then once this caller's paced start
    /// turn has arrived. Waiters are granted slots in FIFO order.
    pub async fn acquire(&self) -> SlotPermit {
        let waiting = {
            let mut state = self.inner.state();
            if state.running < self.inner.limit {
                state.running += 1;
                None
            } else {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                debug!(pending = state.waiters.len(), "Limiter full, queueing waiter");
                Some(rx)
            }
        };

        let permit = match waiting {
            None => SlotPermit {
                inner: Some(Arc::clone(&self.inner)),
            },
            // The sender sits in our own state and `self` keeps the limiter
            // alive, so the channel cannot close without a grant
            Some(rx) => rx.await.expect("limiter dropped with queued waiter"),
        };

        if let Some(gate) = &self.inner.pacing {
            gate.wait_turn().await;
        }
        permit
    }

    /// `acquire` -> run `operation` -> release (including on panic, via the
    /// permit guard)
    pub async fn run<F, Fut, T>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let _permit = self.acquire().await;
        operation().await
    }

    /// Operations currently holding a slot
    pub fn active_count(&self) -> usize {
        self.inner.state().running
    }

    /// Callers queued for a slot
    pub fn pending_count(&self) -> usize {
        self.inner.state().waiters.len()
    }

    pub fn limit(&self) -> usize {
        self.inner.limit
    }
}
