// Progress Events
//
// Ephemeral, never persisted; only their aggregate effect on Job.progress
// and Job.status is durable. Serialized with a `type` discriminator so each
// event is one self-describing wire record.

use crate::domain::JobStatus;
use serde::{Deserialize, Serialize};

/// Status of a single work unit within a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Queued,
    InProgress,
    Succeeded,
    Failed,
}

/// A live progress event for one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Aggregate counters changed
    Progress {
        done: u32,
        total: u32,
        succeeded: u32,
        failed: u32,
    },
    /// Job-level state transition
    Status { status: JobStatus },
    /// A single work unit's status, optionally carrying sub-progress for
    /// long-running sub-phases
    Item {
        item_id: String,
        item_kind: String,
        status: ItemStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        index: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        count: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<u32>,
    },
    /// Out-of-band error notice not tied to a specific item
    Error { message: String },
}

impl ProgressEvent {
    /// Build a `progress` event from the current counters
    pub fn from_progress(progress: &crate::domain::JobProgress) -> Self {
        ProgressEvent::Progress {
            done: progress.done,
            total: progress.total,
            succeeded: progress.succeeded,
            failed: progress.failed,
        }
    }

    /// True for a `status` event carrying a terminal value. A terminal
    /// status is always the last event a subscriber sees for a job.
    pub fn is_terminal_status(&self) -> bool {
        matches!(self, ProgressEvent::Status { status } if status.is_terminal())
    }
}
