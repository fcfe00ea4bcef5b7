//! Builders and polling helpers shared by the integration tests.

use std::time::Duration;

use chrono::{DateTime, Utc};
use transfer_core::config::TransferConfig;
use transfer_core::messaging::BatchExecutionMessage;
use transfer_core::{
    JobStatus, NewTransferItem, TaskId, TaskState, TransferItem, TransferItemState, TransferSystem,
};
use uuid::Uuid;

pub fn pending_item(job_id: Uuid, company_id: i64, target: Uuid) -> TransferItem {
    NewTransferItem {
        job_id,
        company_id,
        source_collection_id: None,
        target_collection_id: target,
    }
    .into_pending(Utc::now())
}

pub fn pending_items(
    job_id: Uuid,
    target: Uuid,
    company_ids: impl IntoIterator<Item = i64>,
) -> Vec<TransferItem> {
    let created_at = Utc::now();
    company_ids
        .into_iter()
        .map(|company_id| {
            NewTransferItem {
                job_id,
                company_id,
                source_collection_id: None,
                target_collection_id: target,
            }
            .into_pending(created_at)
        })
        .collect()
}

/// An item in `status`, created at `created_at`
pub fn item_in_state(
    job_id: Uuid,
    company_id: i64,
    target: Uuid,
    status: TransferItemState,
    created_at: DateTime<Utc>,
) -> TransferItem {
    let mut item = NewTransferItem {
        job_id,
        company_id,
        source_collection_id: None,
        target_collection_id: target,
    }
    .into_pending(created_at);
    item.status = status;
    item.is_cancelled = status == TransferItemState::Cancelled;
    if status == TransferItemState::Error {
        item.error_message = Some("previous attempt failed".to_string());
    }
    if status != TransferItemState::Pending {
        item.attempt_count = 1;
        item.last_attempt_at = Some(created_at);
    }
    item
}

pub fn batch(
    job_id: Uuid,
    target: Uuid,
    company_ids: impl IntoIterator<Item = i64>,
    batch_number: u32,
) -> BatchExecutionMessage {
    BatchExecutionMessage {
        job_id,
        company_ids: company_ids.into_iter().collect(),
        source_collection_id: None,
        target_collection_id: target,
        batch_number,
    }
}

pub fn test_config(batch_size: usize, worker_count: usize) -> TransferConfig {
    let mut config = TransferConfig::default();
    config.batch.batch_size = batch_size;
    config.queue.worker_count = worker_count;
    config.queue.buffer_size = 64;
    config
}

/// Poll until no item of the job is pending or processing
pub async fn wait_for_settled_job(system: &TransferSystem, job_id: Uuid) -> JobStatus {
    for _ in 0..500 {
        if let Ok(status) = system.job_status(job_id).await {
            if status.is_settled() {
                return status;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not settle");
}

/// Poll until the task behind a handle has finished
pub async fn wait_for_task(system: &TransferSystem, task_id: TaskId) -> TaskState {
    for _ in 0..500 {
        if let Ok(state) = system.task_status(task_id) {
            if state.is_finished() {
                return state;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {task_id} did not finish");
}
