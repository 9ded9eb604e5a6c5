// Application Layer - Use Cases and Business Logic

pub mod bus;
pub mod constants;
pub mod lifecycle;
pub mod limiter;
pub mod orchestrator;
pub mod retry;
pub mod stream;

// Re-exports
pub use bus::{ProgressEventBus, SubscriberId};
pub use lifecycle::JobLifecycle;
pub use limiter::{ConcurrencyLimiter, PacingWindow, SlotPermit};
pub use orchestrator::{BatchConfig, BatchOrchestrator, ItemError, WorkItem};
pub use retry::{with_retry, RetryOptions};
pub use stream::{StreamConfig, StreamFrame};
