//! # Worker Pool
//!
//! N tokio workers consuming one task queue. Workers share the receiver, so commands
//! for the same job run concurrently with no ordering guarantee between them. A
//! handler error or panic marks that task as failed and the worker moves on.
//!
//! The pool also owns the registry pruner: finished task states older than their TTL
//! are dropped every `prune_interval`, whether or not anyone polls them.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::message::TransferCommand;
use super::task_queue::{ProgressReporter, QueueReceiver, QueuedCommand, TaskRegistry};
use crate::error::TransferResult;

/// Executes one dequeued command
#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    /// Run the command; the returned value becomes the task's success result
    async fn handle(
        &self,
        command: TransferCommand,
        progress: ProgressReporter,
    ) -> TransferResult<serde_json::Value>;
}

/// Handle to the running workers
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    pruner: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl WorkerPool {
    /// Spawn `worker_count` workers and the registry pruner on the current runtime
    pub fn start(
        worker_count: usize,
        receiver: QueueReceiver,
        registry: Arc<TaskRegistry>,
        handler: Arc<dyn CommandHandler>,
        prune_interval: Duration,
    ) -> Self {
        let receiver = Arc::new(Mutex::new(receiver));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handles = (0..worker_count)
            .map(|worker_index| {
                let receiver = Arc::clone(&receiver);
                let registry = Arc::clone(&registry);
                let handler = Arc::clone(&handler);
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    run_worker(worker_index, receiver, registry, handler, shutdown_rx).await;
                })
            })
            .collect();
        let pruner = tokio::spawn(run_pruner(registry, prune_interval, shutdown_rx));

        info!(worker_count = worker_count, "🚀 Worker pool started");
        Self {
            handles,
            pruner,
            shutdown_tx,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }

    /// Stop taking new commands and wait for in-flight commands to finish
    pub async fn shutdown(self) {
        // Receivers only go away once every worker has exited
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "Worker task ended abnormally");
            }
        }
        if let Err(err) = self.pruner.await {
            warn!(error = %err, "Registry pruner ended abnormally");
        }
        info!("🛑 Worker pool stopped");
    }
}

async fn run_pruner(
    registry: Arc<TaskRegistry>,
    prune_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(prune_interval.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            _ = interval.tick() => {
                registry.prune_expired(Utc::now());
            }
        }
    }
}

async fn run_worker(
    worker_index: usize,
    receiver: Arc<Mutex<QueueReceiver>>,
    registry: Arc<TaskRegistry>,
    handler: Arc<dyn CommandHandler>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    debug!(worker_index = worker_index, "Worker started");

    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => None,
                queued = receiver.recv() => queued,
            }
        };

        let Some(QueuedCommand { task_id, command }) = next else {
            break;
        };

        let command_name = command.name();
        let progress = ProgressReporter::new(task_id, Arc::clone(&registry));
        let outcome = AssertUnwindSafe(handler.handle(command, progress))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => {
                debug!(
                    worker_index = worker_index,
                    task_id = %task_id,
                    command = command_name,
                    "✅ Task completed"
                );
                registry.complete(task_id, result);
            }
            Ok(Err(err)) => {
                error!(
                    worker_index = worker_index,
                    task_id = %task_id,
                    command = command_name,
                    error = %err,
                    "❌ Task failed"
                );
                registry.fail(task_id, err.to_string());
            }
            Err(panic_error) => {
                let panic_msg = if let Some(s) = panic_error.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_error.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                error!(
                    worker_index = worker_index,
                    task_id = %task_id,
                    command = command_name,
                    panic_msg = %panic_msg,
                    "💥 Task handler panicked"
                );
                registry.fail(task_id, format!("Handler panicked: {panic_msg}"));
            }
        }
    }

    debug!(worker_index = worker_index, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransferError;
    use crate::messaging::message::RetryMessage;
    use crate::messaging::task_queue::{TaskId, TaskQueue, TaskState};
    use crate::messaging::BatchExecutionMessage;
    use uuid::Uuid;

    struct ScriptedHandler;

    #[async_trait]
    impl CommandHandler for ScriptedHandler {
        async fn handle(
            &self,
            command: TransferCommand,
            progress: ProgressReporter,
        ) -> TransferResult<serde_json::Value> {
            match command {
                TransferCommand::CleanupExpired => {
                    progress.report(1, 1, "sweeping");
                    Ok(serde_json::json!({"deleted_count": 3}))
                }
                TransferCommand::RetryJob(_) => {
                    Err(TransferError::NotFound("job".to_string()))
                }
                _ => panic!("boom"),
            }
        }
    }

    async fn wait_until_finished(queue: &TaskQueue, task_id: TaskId) -> TaskState {
        for _ in 0..200 {
            if let Some(state) = queue.task_status(task_id) {
                if state.is_finished() {
                    return state;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task {task_id} did not finish");
    }

    #[tokio::test]
    async fn test_handler_outcomes_are_recorded() {
        let (queue, receiver) = TaskQueue::new(8, chrono::Duration::hours(1));
        let pool = WorkerPool::start(
            2,
            receiver,
            queue.registry(),
            Arc::new(ScriptedHandler),
            Duration::from_secs(60),
        );

        let ok = queue.submit(TransferCommand::CleanupExpired).await.unwrap();
        let failed = queue
            .submit(TransferCommand::RetryJob(RetryMessage {
                job_id: Uuid::new_v4(),
            }))
            .await
            .unwrap();
        let panicked = queue
            .submit(TransferCommand::ProcessBatch(BatchExecutionMessage {
                job_id: Uuid::new_v4(),
                company_ids: vec![1],
                source_collection_id: None,
                target_collection_id: Uuid::new_v4(),
                batch_number: 1,
            }))
            .await
            .unwrap();

        assert_eq!(
            wait_until_finished(&queue, ok).await,
            TaskState::Success {
                result: serde_json::json!({"deleted_count": 3})
            }
        );
        assert!(matches!(
            wait_until_finished(&queue, failed).await,
            TaskState::Failure { error } if error.contains("Not found")
        ));
        assert!(matches!(
            wait_until_finished(&queue, panicked).await,
            TaskState::Failure { error } if error.contains("boom")
        ));

        assert_eq!(pool.worker_count(), 2);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_finished_tasks_are_pruned_without_polling() {
        let (queue, receiver) = TaskQueue::new(8, chrono::Duration::zero());
        let pool = WorkerPool::start(
            1,
            receiver,
            queue.registry(),
            Arc::new(ScriptedHandler),
            Duration::from_millis(10),
        );

        for _ in 0..3 {
            queue.submit(TransferCommand::CleanupExpired).await.unwrap();
        }

        let registry = queue.registry();
        for _ in 0..200 {
            if registry.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(registry.is_empty());
        pool.shutdown().await;
    }
}
