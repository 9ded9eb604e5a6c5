// Job Domain Model

use serde::{Deserialize, Serialize};

/// Job ID (UUID v4, injected via IdProvider)
pub type JobId = String;

/// Identifier of the requesting principal. Authorization happens at the
/// boundary only; the core never interprets this value.
pub type OwnerId = String;

/// Job status. Monotonic: `pending -> running -> {completed | failed}`,
/// no transition out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// `completed` and `failed` admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Job kind - open discriminator supplied by the calling domain
/// (e.g. "song_analysis", "sync_liked_songs"). The core treats it as an
/// opaque label and never branches on its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobKind(String);

impl JobKind {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Aggregate progress counters.
///
/// Invariants: `done == succeeded + failed`, and `done <= total` once total
/// is known. `total == 0` means either "not yet discovered" or "legitimately
/// empty" - consumers must not render a 0/0 progress bar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub total: u32,
    pub done: u32,
    pub succeeded: u32,
    pub failed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl JobProgress {
    /// Fresh counters for a batch of `total` items
    pub fn for_total(total: u32) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Record one successful item, maintaining `done = succeeded + failed`
    pub fn record_success(&mut self) {
        self.succeeded += 1;
        self.done += 1;
    }

    /// Record one failed item, maintaining `done = succeeded + failed`
    pub fn record_failure(&mut self) {
        self.failed += 1;
        self.done += 1;
    }

    pub fn is_finished(&self) -> bool {
        self.done >= self.total
    }
}

/// Job Entity - durable record of one batch of work and its aggregate outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub owner_id: OwnerId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: JobProgress,

    /// Set only when status becomes `failed`
    pub error_message: Option<String>,

    pub created_at: i64, // epoch ms
    pub updated_at: i64,
}

impl Job {
    /// Create a new job in `pending` state
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `owner_id` - Requesting principal
    /// * `kind` - Job kind label
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        owner_id: impl Into<String>,
        kind: JobKind,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            kind,
            status: JobStatus::Pending,
            progress: JobProgress::default(),
            error_message: None,
            created_at,
            updated_at: created_at,
        }
    }
}
