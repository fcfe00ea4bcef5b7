//! # Transfer System Bootstrap
//!
//! Wires the task queue, the worker pool and the command processor around one store
//! provider, and exposes the caller-facing operations: job creation, status queries,
//! retry, cancellation, cleanup and membership removal.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use transfer_core::config::TransferConfig;
//! use transfer_core::database::InMemoryStore;
//! use transfer_core::orchestration::{TransferJobRequest, TransferSystem};
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let system = TransferSystem::start(Arc::new(InMemoryStore::new()), TransferConfig::default())?;
//! let job = system
//!     .create_job(TransferJobRequest {
//!         company_ids: vec![1, 2, 3],
//!         source_collection_id: None,
//!         target_collection_id: Uuid::new_v4(),
//!     })
//!     .await?;
//! let status = system.job_status(job.job_id).await?;
//! system.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use uuid::Uuid;

use super::cancellation::CancellationController;
use super::job_initializer::JobInitializer;
use super::processor::TransferCommandProcessor;
use super::status_queries::StatusQueries;
use super::types::{CancellationResult, JobStatus, TransferJobRequest};
use crate::config::{ConfigManager, TransferConfig};
use crate::database::{create_pool, health_check, PgStoreProvider, StoreProvider};
use crate::error::{TransferError, TransferResult};
use crate::messaging::{
    RetryMessage, TaskDispatcher, TaskId, TaskQueue, TaskState, TransferCommand, WorkerPool,
};
use crate::models::TransferItem;

/// Snapshot of a running system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub tracked_tasks: usize,
    pub retention_schedule_running: bool,
}

pub struct TransferSystem {
    config: TransferConfig,
    queue: TaskQueue,
    worker_pool: WorkerPool,
    initializer: JobInitializer,
    queries: StatusQueries,
    cancellation: CancellationController,
    retention_task: Option<JoinHandle<()>>,
}

impl TransferSystem {
    /// Start the queue and worker pool over an existing store provider.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(store: Arc<dyn StoreProvider>, config: TransferConfig) -> TransferResult<Self> {
        config.validate()?;

        let (queue, receiver) =
            TaskQueue::new(config.queue.buffer_size, config.queue.result_ttl());
        let dispatcher: Arc<dyn TaskDispatcher> = Arc::new(queue.clone());

        // Handlers run on the pool, so their own dispatches take the follow-up lane
        let processor = TransferCommandProcessor::new(
            Arc::clone(&store),
            Arc::new(queue.follow_up_dispatcher()),
            &config,
        );
        let worker_pool = WorkerPool::start(
            config.queue.worker_count,
            receiver,
            queue.registry(),
            Arc::new(processor),
            config.queue.prune_interval(),
        );

        let system = Self {
            initializer: JobInitializer::new(
                Arc::clone(&store),
                dispatcher,
                config.batch.batch_size,
            ),
            queries: StatusQueries::new(Arc::clone(&store), queue.registry()),
            cancellation: CancellationController::new(store),
            config,
            queue,
            worker_pool,
            retention_task: None,
        };

        info!(
            worker_count = system.config.queue.worker_count,
            batch_size = system.config.batch.batch_size,
            "✅ Transfer system started"
        );
        Ok(system)
    }

    /// Connect to PostgreSQL with the managed configuration and start the system
    pub async fn bootstrap(config_manager: Arc<ConfigManager>) -> TransferResult<Self> {
        let config = config_manager.config().clone();
        info!(
            environment = %config_manager.environment(),
            "🔧 Bootstrapping transfer system"
        );

        let pool = create_pool(&config.database).await?;
        if !health_check(&pool).await? {
            return Err(TransferError::DatabaseError(
                "Database health check failed".to_string(),
            ));
        }
        let mut system = Self::start(Arc::new(PgStoreProvider::new(pool)), config)?;
        if system.config.retention.enabled {
            system.start_retention_schedule();
        }
        Ok(system)
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub async fn create_job(&self, request: TransferJobRequest) -> TransferResult<JobStatus> {
        self.initializer.create_job(request).await
    }

    pub async fn create_job_for_collection(
        &self,
        source_collection_id: Uuid,
        target_collection_id: Uuid,
    ) -> TransferResult<JobStatus> {
        self.initializer
            .create_job_for_collection(source_collection_id, target_collection_id)
            .await
    }

    pub async fn job_status(&self, job_id: Uuid) -> TransferResult<JobStatus> {
        self.queries.job_status(job_id).await
    }

    pub async fn job_items(&self, job_id: Uuid) -> TransferResult<Vec<TransferItem>> {
        self.queries.job_items(job_id).await
    }

    pub async fn company_transfer_history(
        &self,
        company_id: i64,
    ) -> TransferResult<Vec<TransferItem>> {
        self.queries.company_transfer_history(company_id).await
    }

    pub async fn companies_transfer_status(
        &self,
        company_ids: &[i64],
    ) -> TransferResult<HashMap<i64, Vec<TransferItem>>> {
        self.queries.companies_transfer_status(company_ids).await
    }

    pub fn task_status(&self, task_id: TaskId) -> TransferResult<TaskState> {
        self.queries.task_status(task_id)
    }

    /// Queue a retry of the job's failed items; returns the retry task handle
    pub async fn retry_job(&self, job_id: Uuid) -> TransferResult<TaskId> {
        Ok(self
            .queue
            .submit(TransferCommand::RetryJob(RetryMessage { job_id }))
            .await?)
    }

    pub async fn cancel_job(&self, job_id: Uuid) -> TransferResult<CancellationResult> {
        self.cancellation.cancel_job(job_id).await
    }

    /// Queue a retention sweep; returns its task handle
    pub async fn cleanup_expired(&self) -> TransferResult<TaskId> {
        Ok(self.queue.submit(TransferCommand::CleanupExpired).await?)
    }

    pub async fn remove_companies(
        &self,
        collection_id: Uuid,
        company_ids: &[i64],
    ) -> TransferResult<Vec<i64>> {
        self.queries.remove_companies(collection_id, company_ids).await
    }

    /// Queue a retention sweep every `retention.sweep_interval_seconds`
    pub fn start_retention_schedule(&mut self) {
        if self.retention_task.is_some() {
            warn!("Retention schedule already running");
            return;
        }

        let queue = self.queue.clone();
        let period = self.config.retention.sweep_interval();
        self.retention_task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(err) = queue.submit(TransferCommand::CleanupExpired).await {
                    warn!(error = %err, "Could not queue retention sweep");
                }
            }
        }));
        info!(
            interval_seconds = self.config.retention.sweep_interval_seconds,
            "⏰ Retention schedule started"
        );
    }

    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            worker_count: self.worker_pool.worker_count(),
            queue_capacity: self.queue.capacity(),
            tracked_tasks: self.queue.registry().len(),
            retention_schedule_running: self.retention_task.is_some(),
        }
    }

    /// Stop the retention schedule and let in-flight commands finish
    pub async fn shutdown(self) {
        if let Some(task) = self.retention_task {
            task.abort();
        }
        self.worker_pool.shutdown().await;
        info!("🛑 Transfer system stopped");
    }
}
