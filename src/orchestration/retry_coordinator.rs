//! # Retry Coordinator
//!
//! Resets a job's failed items to `pending` and re-dispatches the job orchestrator.
//! The orchestrator then sweeps up *every* pending item of the job, not only the ones
//! just reset; overlapping runs are safe because the batch worker's membership check
//! turns repeated transfers into no-ops.
//!
//! The reset is conditional on each item still being in `error`; items another writer
//! moved in the meantime are skipped.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::types::RetryResult;
use crate::constants::status_groups::RETRYABLE_STATES;
use crate::database::StoreProvider;
use crate::error::TransferResult;
use crate::logging::log_job_operation;
use crate::messaging::{JobSubmissionMessage, RetryMessage, TaskDispatcher, TransferCommand};
use crate::state_machine::{TransferEvent, TransferItemStateMachine};

pub struct RetryCoordinator {
    store: Arc<dyn StoreProvider>,
    dispatcher: Arc<dyn TaskDispatcher>,
    state_machine: TransferItemStateMachine,
    batch_size: usize,
}

impl RetryCoordinator {
    pub fn new(
        store: Arc<dyn StoreProvider>,
        dispatcher: Arc<dyn TaskDispatcher>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            dispatcher,
            state_machine: TransferItemStateMachine::new(),
            batch_size,
        }
    }

    pub async fn retry_job(&self, request: &RetryMessage) -> TransferResult<RetryResult> {
        let job_id = request.job_id;
        let mut session = self.store.session().await?;
        let failed = session.items_with_status(job_id, RETRYABLE_STATES).await?;

        if failed.is_empty() {
            info!(job_id = %job_id, "No failed items to retry");
            return Ok(RetryResult {
                job_id,
                message: "No failed items to retry".to_string(),
                retried_count: 0,
                orchestration_task_id: None,
            });
        }

        let now = Utc::now();
        let mut retried_count = 0;
        for mut item in failed {
            let read_status = item.status;
            self.state_machine.apply(&mut item, TransferEvent::Retry, now)?;
            if session.save_item_if_status(&item, read_status).await? {
                retried_count += 1;
            } else {
                debug!(
                    job_id = %job_id,
                    company_id = item.company_id,
                    "Item left {read_status} before it could be reset"
                );
            }
        }
        drop(session);

        if retried_count == 0 {
            info!(job_id = %job_id, "No failed items to retry");
            return Ok(RetryResult {
                job_id,
                message: "No failed items to retry".to_string(),
                retried_count: 0,
                orchestration_task_id: None,
            });
        }

        let task_id = self
            .dispatcher
            .dispatch(TransferCommand::ProcessJob(JobSubmissionMessage {
                job_id,
                batch_size: self.batch_size,
            }))
            .await?;
        debug!(job_id = %job_id, task_id = %task_id, "Orchestrator re-dispatched");

        let message = format!("Retrying {retried_count} failed items");
        log_job_operation("retry_job", job_id, "retrying", Some(&message));

        Ok(RetryResult {
            job_id,
            message,
            retried_count,
            orchestration_task_id: Some(task_id),
        })
    }
}
