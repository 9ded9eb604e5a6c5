// Domain Layer - Pure business logic and entities

pub mod error;
pub mod event;
pub mod job;

// Re-exports
pub use error::DomainError;
pub use event::{ItemStatus, ProgressEvent};
pub use job::{Job, JobId, JobKind, JobProgress, JobStatus, OwnerId};
