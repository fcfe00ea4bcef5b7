//! # Job Initializer
//!
//! Turns a transfer request into a job: one `pending` item per distinct company,
//! inserted in bulk, followed by a `ProcessJob` submission to the task queue.
//!
//! Duplicate company ids inside one request collapse to a single item. Two separate
//! requests for the same company and collection produce two independent jobs.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::types::{JobStatus, TransferJobRequest};
use crate::database::StoreProvider;
use crate::error::{TransferError, TransferResult};
use crate::logging::log_job_operation;
use crate::messaging::{JobSubmissionMessage, TaskDispatcher, TransferCommand};
use crate::models::{NewTransferItem, TransferItem};

pub struct JobInitializer {
    store: Arc<dyn StoreProvider>,
    dispatcher: Arc<dyn TaskDispatcher>,
    batch_size: usize,
}

impl JobInitializer {
    pub fn new(
        store: Arc<dyn StoreProvider>,
        dispatcher: Arc<dyn TaskDispatcher>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            dispatcher,
            batch_size,
        }
    }

    /// Create a job and submit it for processing
    pub async fn create_job(&self, request: TransferJobRequest) -> TransferResult<JobStatus> {
        let mut seen = HashSet::with_capacity(request.company_ids.len());
        let company_ids: Vec<i64> = request
            .company_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        if company_ids.is_empty() {
            return Err(TransferError::ValidationError(
                "A transfer job needs at least one company".to_string(),
            ));
        }

        let job_id = Uuid::new_v4();
        let created_at = Utc::now();
        let items: Vec<TransferItem> = company_ids
            .into_iter()
            .map(|company_id| {
                NewTransferItem {
                    job_id,
                    company_id,
                    source_collection_id: request.source_collection_id,
                    target_collection_id: request.target_collection_id,
                }
                .into_pending(created_at)
            })
            .collect();

        {
            let mut session = self.store.session().await?;
            session.insert_items(&items).await?;
        }

        let task_id = self
            .dispatcher
            .dispatch(TransferCommand::ProcessJob(JobSubmissionMessage {
                job_id,
                batch_size: self.batch_size,
            }))
            .await?;

        info!(
            job_id = %job_id,
            task_id = %task_id,
            total_items = items.len(),
            target_collection_id = %request.target_collection_id,
            "🆕 Transfer job created"
        );
        log_job_operation(
            "create_job",
            job_id,
            "pending",
            Some(&format!("{} items", items.len())),
        );

        Ok(JobStatus::from_items(job_id, items, Some(task_id)))
    }

    /// Create a job moving every member of `source_collection_id` into the target
    pub async fn create_job_for_collection(
        &self,
        source_collection_id: Uuid,
        target_collection_id: Uuid,
    ) -> TransferResult<JobStatus> {
        let company_ids = {
            let mut session = self.store.session().await?;
            session.collection_members(source_collection_id).await?
        };

        if company_ids.is_empty() {
            return Err(TransferError::ValidationError(format!(
                "Collection {source_collection_id} has no companies to transfer"
            )));
        }

        self.create_job(TransferJobRequest {
            company_ids,
            source_collection_id: Some(source_collection_id),
            target_collection_id,
        })
        .await
    }
}
