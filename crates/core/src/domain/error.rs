// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job {job_id} is not owned by {owner_id}")]
    OwnershipMismatch { job_id: String, owner_id: String },
}

pub type Result<T> = std::result::Result<T, DomainError>;
