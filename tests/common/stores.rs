//! Test doubles at the store and queue seams.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use transfer_core::database::{
    InMemoryStore, MembershipStore, StoreProvider, StoreResult, StoreSession, TransferItemStore,
};
use transfer_core::messaging::{
    BatchExecutionMessage, MessagingError, MessagingResult, TaskDispatcher, TaskId,
    TransferCommand,
};
use transfer_core::{TransferItem, TransferItemState};
use uuid::Uuid;

/// Concurrent writer behaviour injected by [`RacingStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Race {
    /// Bulk membership lookups see no members, as if every lookup ran before a
    /// concurrent batch committed its insert
    StaleMembershipLookups,
    /// A batch commits `success` for every item right after a status-filtered read
    CommitAfterStatusRead,
    /// Another batch transfers the company (membership plus `success`) right after
    /// this session looks its item up
    CommitAfterItemLookup,
}

/// Wraps an in-memory store and interleaves a simulated concurrent writer
#[derive(Debug, Clone)]
pub struct RacingStore {
    pub inner: InMemoryStore,
    pub race: Race,
}

impl RacingStore {
    pub fn stale_membership(inner: InMemoryStore) -> Self {
        Self {
            inner,
            race: Race::StaleMembershipLookups,
        }
    }

    pub fn commit_after_status_read(inner: InMemoryStore) -> Self {
        Self {
            inner,
            race: Race::CommitAfterStatusRead,
        }
    }

    pub fn commit_after_item_lookup(inner: InMemoryStore) -> Self {
        Self {
            inner,
            race: Race::CommitAfterItemLookup,
        }
    }
}

#[async_trait]
impl StoreProvider for RacingStore {
    async fn session(&self) -> StoreResult<Box<dyn StoreSession>> {
        Ok(Box::new(RacingSession {
            inner: self.inner.session().await?,
            race: self.race,
        }))
    }
}

struct RacingSession {
    inner: Box<dyn StoreSession>,
    race: Race,
}

#[async_trait]
impl TransferItemStore for RacingSession {
    async fn insert_items(&mut self, items: &[TransferItem]) -> StoreResult<()> {
        self.inner.insert_items(items).await
    }

    async fn find_item(
        &mut self,
        job_id: Uuid,
        company_id: i64,
        target_collection_id: Uuid,
    ) -> StoreResult<Option<TransferItem>> {
        let item = self
            .inner
            .find_item(job_id, company_id, target_collection_id)
            .await?;
        if let (Race::CommitAfterItemLookup, Some(found)) = (self.race, &item) {
            let mut committed = found.clone();
            committed.status = TransferItemState::Success;
            committed.error_message = None;
            committed.is_cancelled = false;
            self.inner.save_item(&committed).await?;
            // Already a member on repeated lookups
            let _ = self
                .inner
                .insert_membership(company_id, target_collection_id)
                .await;
        }
        Ok(item)
    }

    async fn items_for_job(&mut self, job_id: Uuid) -> StoreResult<Vec<TransferItem>> {
        self.inner.items_for_job(job_id).await
    }

    async fn items_with_status(
        &mut self,
        job_id: Uuid,
        statuses: &[TransferItemState],
    ) -> StoreResult<Vec<TransferItem>> {
        let items = self.inner.items_with_status(job_id, statuses).await?;
        if self.race == Race::CommitAfterStatusRead {
            for item in &items {
                let mut committed = item.clone();
                committed.status = TransferItemState::Success;
                committed.error_message = None;
                committed.is_cancelled = false;
                self.inner.save_item(&committed).await?;
            }
        }
        Ok(items)
    }

    async fn dispatchable_items(&mut self, job_id: Uuid) -> StoreResult<Vec<TransferItem>> {
        self.inner.dispatchable_items(job_id).await
    }

    async fn items_for_companies(
        &mut self,
        company_ids: &[i64],
    ) -> StoreResult<Vec<TransferItem>> {
        self.inner.items_for_companies(company_ids).await
    }

    async fn save_item(&mut self, item: &TransferItem) -> StoreResult<()> {
        self.inner.save_item(item).await
    }

    async fn save_item_if_status(
        &mut self,
        item: &TransferItem,
        expected: TransferItemState,
    ) -> StoreResult<bool> {
        self.inner.save_item_if_status(item, expected).await
    }

    async fn delete_items_created_before(
        &mut self,
        statuses: &[TransferItemState],
        cutoff: DateTime<Utc>,
    ) -> StoreResult<u64> {
        self.inner.delete_items_created_before(statuses, cutoff).await
    }
}

#[async_trait]
impl MembershipStore for RacingSession {
    async fn existing_members(
        &mut self,
        collection_id: Uuid,
        company_ids: &[i64],
    ) -> StoreResult<HashSet<i64>> {
        match self.race {
            Race::StaleMembershipLookups => Ok(HashSet::new()),
            Race::CommitAfterStatusRead | Race::CommitAfterItemLookup => {
                self.inner.existing_members(collection_id, company_ids).await
            }
        }
    }

    async fn insert_membership(
        &mut self,
        company_id: i64,
        collection_id: Uuid,
    ) -> StoreResult<()> {
        self.inner.insert_membership(company_id, collection_id).await
    }

    async fn collection_members(&mut self, collection_id: Uuid) -> StoreResult<Vec<i64>> {
        self.inner.collection_members(collection_id).await
    }

    async fn remove_memberships(
        &mut self,
        collection_id: Uuid,
        company_ids: &[i64],
    ) -> StoreResult<Vec<i64>> {
        self.inner.remove_memberships(collection_id, company_ids).await
    }
}

/// Records dispatched commands instead of executing them
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    commands: Mutex<Vec<TransferCommand>>,
    closed: AtomicBool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every further dispatch, like a queue whose consumers are gone
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn commands(&self) -> Vec<TransferCommand> {
        self.commands.lock().clone()
    }

    pub fn batches(&self) -> Vec<BatchExecutionMessage> {
        self.commands
            .lock()
            .iter()
            .filter_map(|command| match command {
                TransferCommand::ProcessBatch(batch) => Some(batch.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl TaskDispatcher for RecordingDispatcher {
    async fn dispatch(&self, command: TransferCommand) -> MessagingResult<TaskId> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MessagingError::QueueClosed);
        }
        self.commands.lock().push(command);
        Ok(TaskId::new())
    }
}
