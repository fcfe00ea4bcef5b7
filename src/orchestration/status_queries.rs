//! Read-only status queries over the transfer item store, plus membership removal.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use super::types::JobStatus;
use crate::database::StoreProvider;
use crate::error::{TransferError, TransferResult};
use crate::messaging::{TaskId, TaskRegistry, TaskState};
use crate::models::TransferItem;

pub struct StatusQueries {
    store: Arc<dyn StoreProvider>,
    registry: Arc<TaskRegistry>,
}

impl StatusQueries {
    pub fn new(store: Arc<dyn StoreProvider>, registry: Arc<TaskRegistry>) -> Self {
        Self { store, registry }
    }

    /// Aggregate counts plus the full item list; `NotFound` for unknown jobs
    pub async fn job_status(&self, job_id: Uuid) -> TransferResult<JobStatus> {
        let items = self.job_items(job_id).await?;
        Ok(JobStatus::from_items(
            job_id,
            items,
            self.registry.latest_job_task(job_id),
        ))
    }

    pub async fn job_items(&self, job_id: Uuid) -> TransferResult<Vec<TransferItem>> {
        let mut session = self.store.session().await?;
        let items = session.items_for_job(job_id).await?;
        if items.is_empty() {
            return Err(TransferError::NotFound(format!("Transfer job {job_id}")));
        }
        Ok(items)
    }

    /// Every transfer item ever recorded for one company, newest first
    pub async fn company_transfer_history(
        &self,
        company_id: i64,
    ) -> TransferResult<Vec<TransferItem>> {
        let mut session = self.store.session().await?;
        Ok(session.items_for_companies(&[company_id]).await?)
    }

    /// Transfer history keyed by company; every requested id gets an entry
    pub async fn companies_transfer_status(
        &self,
        company_ids: &[i64],
    ) -> TransferResult<HashMap<i64, Vec<TransferItem>>> {
        let mut by_company: HashMap<i64, Vec<TransferItem>> = company_ids
            .iter()
            .map(|company_id| (*company_id, Vec::new()))
            .collect();
        if company_ids.is_empty() {
            return Ok(by_company);
        }

        let mut session = self.store.session().await?;
        for item in session.items_for_companies(company_ids).await? {
            by_company.entry(item.company_id).or_default().push(item);
        }
        Ok(by_company)
    }

    /// Execution state behind an opaque task handle
    pub fn task_status(&self, task_id: TaskId) -> TransferResult<TaskState> {
        self.registry
            .status(task_id)
            .ok_or_else(|| TransferError::NotFound(format!("Task {task_id}")))
    }

    /// Remove companies from a collection; returns the ids that were members
    pub async fn remove_companies(
        &self,
        collection_id: Uuid,
        company_ids: &[i64],
    ) -> TransferResult<Vec<i64>> {
        if company_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut session = self.store.session().await?;
        Ok(session.remove_memberships(collection_id, company_ids).await?)
    }
}
