//! # Message Structures for the Task Queue
//!
//! Typed descriptors exchanged between producers (job initializer, orchestrator,
//! retry coordinator, the worker binary's sweep timer) and the worker pool.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::commands;

/// Triggers the job orchestrator for one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSubmissionMessage {
    pub job_id: Uuid,
    pub batch_size: usize,
}

/// One batch descriptor; triggers the batch worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchExecutionMessage {
    pub job_id: Uuid,
    /// Ordered; the worker processes companies strictly in this order
    pub company_ids: Vec<i64>,
    pub source_collection_id: Option<Uuid>,
    pub target_collection_id: Uuid,
    /// 1-based, gap-free within one orchestrator run
    pub batch_number: u32,
}

/// Triggers the retry coordinator for one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryMessage {
    pub job_id: Uuid,
}

/// Units of work accepted by the task queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload", rename_all = "snake_case")]
pub enum TransferCommand {
    ProcessJob(JobSubmissionMessage),
    ProcessBatch(BatchExecutionMessage),
    RetryJob(RetryMessage),
    CleanupExpired,
}

impl TransferCommand {
    /// Name used in logs and in the task registry
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProcessJob(_) => commands::PROCESS_JOB,
            Self::ProcessBatch(_) => commands::PROCESS_BATCH,
            Self::RetryJob(_) => commands::RETRY_JOB,
            Self::CleanupExpired => commands::CLEANUP_EXPIRED,
        }
    }

    /// The job this command acts on, if any
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            Self::ProcessJob(msg) => Some(msg.job_id),
            Self::ProcessBatch(msg) => Some(msg.job_id),
            Self::RetryJob(msg) => Some(msg.job_id),
            Self::CleanupExpired => None,
        }
    }

    /// Whether this command drives a whole job (as opposed to one batch or a sweep)
    pub fn is_job_level(&self) -> bool {
        matches!(self, Self::ProcessJob(_) | Self::RetryJob(_))
    }
}
