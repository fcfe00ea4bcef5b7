//! # Job Orchestrator
//!
//! Splits a job's dispatchable items into fixed-size batches and hands each batch to
//! the task queue independently. It never waits for a batch to finish and performs
//! no writes of its own.
//!
//! Errors here are job-fatal and propagate to the caller: an invalid batch size, a
//! chunk mixing collections, a store failure while reading items, or a queue that
//! refuses a descriptor.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::types::JobProcessingResult;
use crate::database::StoreProvider;
use crate::error::{TransferError, TransferResult};
use crate::logging::log_job_operation;
use crate::messaging::{
    BatchExecutionMessage, JobSubmissionMessage, ProgressReporter, TaskDispatcher, TransferCommand,
};
use crate::models::TransferItem;

/// Partition items, already in dispatch order, into batch descriptors.
///
/// Every chunk must share the target and source collection of its first item since
/// the descriptor carries them once per batch.
pub fn partition_into_batches(
    job_id: Uuid,
    items: &[TransferItem],
    batch_size: usize,
) -> TransferResult<Vec<BatchExecutionMessage>> {
    if batch_size == 0 {
        return Err(TransferError::ValidationError(
            "batch_size must be positive".to_string(),
        ));
    }

    items
        .chunks(batch_size)
        .enumerate()
        .map(|(index, chunk)| {
            let first = &chunk[0];
            if let Some(stray) = chunk.iter().find(|item| {
                item.target_collection_id != first.target_collection_id
                    || item.source_collection_id != first.source_collection_id
            }) {
                return Err(TransferError::ValidationError(format!(
                    "Job {job_id} mixes collections within one batch: company {} targets {} \
                     but the batch targets {}",
                    stray.company_id, stray.target_collection_id, first.target_collection_id
                )));
            }

            let batch_number = u32::try_from(index + 1).map_err(|_| {
                TransferError::ValidationError(format!("Job {job_id} exceeds the batch limit"))
            })?;

            Ok(BatchExecutionMessage {
                job_id,
                company_ids: chunk.iter().map(|item| item.company_id).collect(),
                source_collection_id: first.source_collection_id,
                target_collection_id: first.target_collection_id,
                batch_number,
            })
        })
        .collect()
}

pub struct JobOrchestrator {
    store: Arc<dyn StoreProvider>,
    dispatcher: Arc<dyn TaskDispatcher>,
}

impl JobOrchestrator {
    pub fn new(store: Arc<dyn StoreProvider>, dispatcher: Arc<dyn TaskDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Dispatch every pending, non-cancelled item of a job in batches
    pub async fn process_job(
        &self,
        job: &JobSubmissionMessage,
        progress: &ProgressReporter,
    ) -> TransferResult<JobProcessingResult> {
        let job_id = job.job_id;
        if job.batch_size == 0 {
            return Err(TransferError::ValidationError(
                "batch_size must be positive".to_string(),
            ));
        }

        let items = {
            let mut session = self.store.session().await?;
            session.dispatchable_items(job_id).await?
        };

        if items.is_empty() {
            info!(job_id = %job_id, "No pending items to process");
            return Ok(JobProcessingResult {
                job_id,
                message: "No pending items to process".to_string(),
                total_items: 0,
                batches_created: 0,
                batch_tasks_started: 0,
                batch_task_ids: Vec::new(),
            });
        }

        let total_items = items.len();
        progress.report(
            0,
            total_items,
            format!("Creating batches for {total_items} items..."),
        );

        let batches = partition_into_batches(job_id, &items, job.batch_size)?;
        let batches_created = batches.len();
        debug!(
            job_id = %job_id,
            total_items = total_items,
            batch_size = job.batch_size,
            batches = batches_created,
            "Partitioned job into batches"
        );

        let mut batch_task_ids = Vec::with_capacity(batches_created);
        for batch in batches {
            let batch_number = batch.batch_number;
            let task_id = self
                .dispatcher
                .dispatch(TransferCommand::ProcessBatch(batch))
                .await?;
            debug!(
                job_id = %job_id,
                batch_number = batch_number,
                task_id = %task_id,
                "📤 Batch dispatched"
            );
            batch_task_ids.push(task_id);
        }

        let message = format!("Started {} batches", batch_task_ids.len());
        progress.report(total_items, total_items, message.clone());
        log_job_operation("process_job", job_id, "started", Some(&message));

        Ok(JobProcessingResult {
            job_id,
            message,
            total_items,
            batches_created,
            batch_tasks_started: batch_task_ids.len(),
            batch_task_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTransferItem;
    use chrono::Utc;

    fn items(job_id: Uuid, target: Uuid, count: i64) -> Vec<TransferItem> {
        (1..=count)
            .map(|company_id| {
                NewTransferItem {
                    job_id,
                    company_id,
                    source_collection_id: None,
                    target_collection_id: target,
                }
                .into_pending(Utc::now())
            })
            .collect()
    }

    #[test]
    fn test_partition_150_items_into_two_batches() {
        let job_id = Uuid::new_v4();
        let target = Uuid::new_v4();
        let batches = partition_into_batches(job_id, &items(job_id, target, 150), 100).unwrap();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].batch_number, 1);
        assert_eq!(batches[0].company_ids.len(), 100);
        assert_eq!(batches[1].batch_number, 2);
        assert_eq!(batches[1].company_ids, (101..=150).collect::<Vec<_>>());
        assert!(batches.iter().all(|b| b.target_collection_id == target));
    }

    #[test]
    fn test_partition_rejects_zero_batch_size() {
        let job_id = Uuid::new_v4();
        let err = partition_into_batches(job_id, &items(job_id, Uuid::new_v4(), 3), 0)
            .unwrap_err();
        assert!(matches!(err, TransferError::ValidationError(_)));
    }

    #[test]
    fn test_partition_rejects_mixed_targets() {
        let job_id = Uuid::new_v4();
        let mut job_items = items(job_id, Uuid::new_v4(), 4);
        job_items[2].target_collection_id = Uuid::new_v4();

        assert!(partition_into_batches(job_id, &job_items, 10).is_err());
        // Split so that every chunk is homogeneous
        assert!(partition_into_batches(job_id, &job_items, 1).is_ok());
    }
}
