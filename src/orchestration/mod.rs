//! # Transfer Orchestration
//!
//! The batch transfer job engine:
//!
//! - [`job_initializer`] - creates jobs from transfer requests
//! - [`job_orchestrator`] - partitions a job's pending items into batches and dispatches them
//! - [`batch_worker`] - executes one batch with an idempotent, per-item commit loop
//! - [`retry_coordinator`] - resets failed items and re-dispatches the orchestrator
//! - [`cancellation`] - best-effort, non-preemptive job cancellation
//! - [`retention_reaper`] - purges old terminal items
//! - [`status_queries`] - job, company and task status
//! - [`processor`] - routes queued commands to the components above
//! - [`bootstrap`] - wires everything into a running [`TransferSystem`]

pub mod batch_worker;
pub mod bootstrap;
pub mod cancellation;
pub mod job_initializer;
pub mod job_orchestrator;
pub mod processor;
pub mod retention_reaper;
pub mod retry_coordinator;
pub mod status_queries;
pub mod types;

pub use batch_worker::BatchWorker;
pub use bootstrap::{SystemStatus, TransferSystem};
pub use cancellation::CancellationController;
pub use job_initializer::JobInitializer;
pub use job_orchestrator::{partition_into_batches, JobOrchestrator};
pub use processor::TransferCommandProcessor;
pub use retention_reaper::RetentionReaper;
pub use retry_coordinator::RetryCoordinator;
pub use status_queries::StatusQueries;
pub use types::{
    BatchResult, BatchStatus, CancellationResult, CleanupResult, JobProcessingResult, JobStatus,
    RetryResult, TransferJobRequest,
};
