//! # System Constants
//!
//! Operational boundaries of the transfer engine: default sizes, retention windows,
//! status groupings used by the controllers, and the names that appear in logs and
//! task results.

pub use crate::state_machine::TransferItemState as TransferStatus;

/// Defaults applied when configuration does not override them
pub mod defaults {
    /// Items per batch descriptor
    pub const BATCH_SIZE: usize = 100;

    /// A progress report is emitted every N processed items of a batch
    pub const PROGRESS_INTERVAL: usize = 100;

    /// Only the first N item error messages are carried in a batch result
    pub const MAX_REPORTED_ERRORS: usize = 10;

    /// Terminal items older than this are purged by the retention reaper
    pub const RETENTION_DAYS: i64 = 30;

    /// Interval between retention sweeps run by the worker binary
    pub const RETENTION_SWEEP_INTERVAL_SECONDS: u64 = 3600;

    /// Worker tasks consuming the task queue
    pub const WORKER_COUNT: usize = 8;

    /// Bounded capacity of the task queue channel
    pub const QUEUE_BUFFER_SIZE: usize = 1024;

    /// How long finished task states stay queryable through their handle
    pub const TASK_RESULT_TTL_SECONDS: i64 = 3600;

    /// How often the worker pool drops expired task states
    pub const TASK_PRUNE_INTERVAL_MS: u64 = 60_000;
}

/// Names of the units of work accepted by the task queue
pub mod commands {
    pub const PROCESS_JOB: &str = "transfer.process_job";
    pub const PROCESS_BATCH: &str = "transfer.process_batch";
    pub const RETRY_JOB: &str = "transfer.retry_job";
    pub const CLEANUP_EXPIRED: &str = "transfer.cleanup_expired";
}

/// Status groupings consulted by the orchestrator and the controllers
pub mod status_groups {
    use super::TransferStatus;

    /// States the cancellation controller moves to `cancelled`
    pub const CANCELLABLE_STATES: &[TransferStatus] =
        &[TransferStatus::Pending, TransferStatus::Processing];

    /// States eligible for retention purge
    pub const PURGEABLE_STATES: &[TransferStatus] =
        &[TransferStatus::Success, TransferStatus::Error];

    /// States the retry coordinator resets to `pending`
    pub const RETRYABLE_STATES: &[TransferStatus] = &[TransferStatus::Error];
}

/// Constraint names of the persistence collaborator
pub mod tables {
    /// Uniqueness constraint on `(company_id, collection_id)` memberships
    pub const UNIQUE_COMPANY_COLLECTION: &str = "uq_company_collection";
}
