//! # Transfer Command Processor
//!
//! Routes each dequeued [`TransferCommand`] to the component that owns it and turns
//! the component's result into the task's JSON result.
//!
//! Batch results are always `Ok`, even for a failed batch: batch-level failures are
//! reported in the result record, never through the task's failure channel. Job-level
//! errors (orchestrator, retry) do surface as task failures.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::batch_worker::BatchWorker;
use super::job_orchestrator::JobOrchestrator;
use super::retention_reaper::RetentionReaper;
use super::retry_coordinator::RetryCoordinator;
use crate::config::TransferConfig;
use crate::database::StoreProvider;
use crate::error::TransferResult;
use crate::messaging::{CommandHandler, ProgressReporter, TaskDispatcher, TransferCommand};

pub struct TransferCommandProcessor {
    orchestrator: JobOrchestrator,
    batch_worker: BatchWorker,
    retry_coordinator: RetryCoordinator,
    retention_reaper: RetentionReaper,
}

impl TransferCommandProcessor {
    pub fn new(
        store: Arc<dyn StoreProvider>,
        dispatcher: Arc<dyn TaskDispatcher>,
        config: &TransferConfig,
    ) -> Self {
        Self {
            orchestrator: JobOrchestrator::new(Arc::clone(&store), Arc::clone(&dispatcher)),
            batch_worker: BatchWorker::new(Arc::clone(&store), config.batch.clone()),
            retry_coordinator: RetryCoordinator::new(
                Arc::clone(&store),
                dispatcher,
                config.batch.batch_size,
            ),
            retention_reaper: RetentionReaper::new(store, config.retention.retention_window()),
        }
    }
}

#[async_trait]
impl CommandHandler for TransferCommandProcessor {
    async fn handle(
        &self,
        command: TransferCommand,
        progress: ProgressReporter,
    ) -> TransferResult<serde_json::Value> {
        debug!(
            command = command.name(),
            job_id = ?command.job_id(),
            task_id = ?progress.task_id(),
            "Processing command"
        );

        let result = match command {
            TransferCommand::ProcessJob(job) => {
                serde_json::to_value(self.orchestrator.process_job(&job, &progress).await?)?
            }
            TransferCommand::ProcessBatch(batch) => {
                serde_json::to_value(self.batch_worker.execute(&batch, &progress).await)?
            }
            TransferCommand::RetryJob(request) => {
                serde_json::to_value(self.retry_coordinator.retry_job(&request).await?)?
            }
            TransferCommand::CleanupExpired => {
                serde_json::to_value(self.retention_reaper.run().await?)?
            }
        };

        Ok(result)
    }
}
