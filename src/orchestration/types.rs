//! Result and request records exchanged by the orchestration components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::messaging::TaskId;
use crate::models::TransferItem;
use crate::state_machine::TransferItemState;

/// Outcome classification of one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    PartialSuccess,
    Error,
}

impl BatchStatus {
    /// `success` with zero errors, `error` with zero successes, otherwise partial
    pub fn classify(success_count: usize, error_count: usize) -> Self {
        if error_count == 0 {
            Self::Success
        } else if success_count > 0 {
            Self::PartialSuccess
        } else {
            Self::Error
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialSuccess => "partial_success",
            Self::Error => "error",
        }
    }
}

/// Result record returned by a batch worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub status: BatchStatus,
    pub message: String,
    pub batch_number: u32,
    pub success_count: usize,
    pub error_count: usize,
    pub total_count: usize,
    /// First few item error messages, in processing order
    pub errors: Vec<String>,
}

/// Result of one orchestrator run over a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProcessingResult {
    pub job_id: Uuid,
    pub message: String,
    pub total_items: usize,
    pub batches_created: usize,
    pub batch_tasks_started: usize,
    pub batch_task_ids: Vec<TaskId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryResult {
    pub job_id: Uuid,
    pub message: String,
    pub retried_count: usize,
    /// Handle of the re-dispatched orchestrator run; `None` when nothing was retried
    pub orchestration_task_id: Option<TaskId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationResult {
    pub job_id: Uuid,
    pub message: String,
    pub cancelled_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupResult {
    pub message: String,
    pub deleted_count: u64,
    pub cutoff: DateTime<Utc>,
}

/// A request to move a set of companies into a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferJobRequest {
    pub company_ids: Vec<i64>,
    pub source_collection_id: Option<Uuid>,
    pub target_collection_id: Uuid,
}

/// Aggregate view of one job, computed from its items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: Uuid,
    pub total_items: usize,
    pub pending_count: usize,
    pub processing_count: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub cancelled_count: usize,
    pub items: Vec<TransferItem>,
    /// Latest job-level task handle, while the queue still remembers it
    pub task_id: Option<TaskId>,
}

impl JobStatus {
    pub fn from_items(job_id: Uuid, items: Vec<TransferItem>, task_id: Option<TaskId>) -> Self {
        let count = |state: TransferItemState| items.iter().filter(|i| i.status == state).count();

        Self {
            job_id,
            total_items: items.len(),
            pending_count: count(TransferItemState::Pending),
            processing_count: count(TransferItemState::Processing),
            success_count: count(TransferItemState::Success),
            error_count: count(TransferItemState::Error),
            cancelled_count: count(TransferItemState::Cancelled),
            items,
            task_id,
        }
    }

    /// No item is waiting for or undergoing an attempt
    pub fn is_settled(&self) -> bool {
        self.pending_count == 0 && self.processing_count == 0
    }
}
