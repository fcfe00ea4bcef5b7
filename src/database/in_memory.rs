//! # In-Memory Store
//!
//! Thread-safe in-memory store for testing and development.
//!
//! Enforces the same uniqueness constraint on `(company_id, collection_id)` as the
//! association table, so concurrent batches race exactly as they would against
//! PostgreSQL. Sessions share state; dropping a session releases nothing but the
//! handle itself.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use super::store::{
    MembershipStore, StoreError, StoreProvider, StoreResult, StoreSession, TransferItemStore,
};
use crate::models::{CompanyCollectionAssociation, TransferItem};
use crate::state_machine::TransferItemState;

#[derive(Debug, Default)]
struct StoreState {
    items: Vec<TransferItem>,
    memberships: Vec<CompanyCollectionAssociation>,
    membership_keys: HashSet<(i64, Uuid)>,
}

impl StoreState {
    fn add_membership(&mut self, company_id: i64, collection_id: Uuid) -> StoreResult<()> {
        if !self.membership_keys.insert((company_id, collection_id)) {
            return Err(StoreError::unique_membership_violation());
        }
        self.memberships.push(CompanyCollectionAssociation {
            company_id,
            collection_id,
            created_at: Utc::now(),
        });
        Ok(())
    }

    fn sorted_items<F>(&self, filter: F) -> Vec<TransferItem>
    where
        F: Fn(&TransferItem) -> bool,
    {
        let mut items: Vec<TransferItem> =
            self.items.iter().filter(|item| filter(item)).cloned().collect();
        items.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.company_id.cmp(&b.company_id))
        });
        items
    }
}

fn copy_mutable_columns(stored: &mut TransferItem, item: &TransferItem) {
    stored.status = item.status;
    stored.error_message = item.error_message.clone();
    stored.last_attempt_at = item.last_attempt_at;
    stored.attempt_count = item.attempt_count;
    stored.is_cancelled = item.is_cancelled;
}

/// In-memory store provider
///
/// ```rust
/// use transfer_core::database::{InMemoryStore, MembershipStore, StoreProvider};
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryStore::new();
/// let collection = Uuid::new_v4();
/// store.add_membership(1, collection)?;
///
/// let mut session = store.session().await?;
/// let members = session.existing_members(collection, &[1, 2]).await?;
/// assert!(members.contains(&1));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    fail_membership_lookups: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a membership (for testing)
    pub fn add_membership(&self, company_id: i64, collection_id: Uuid) -> StoreResult<()> {
        self.state.lock().add_membership(company_id, collection_id)
    }

    /// Seed items with explicit timestamps (for testing)
    pub fn seed_items(&self, items: impl IntoIterator<Item = TransferItem>) {
        self.state.lock().items.extend(items);
    }

    /// Snapshot of every stored item, in insertion order
    pub fn items(&self) -> Vec<TransferItem> {
        self.state.lock().items.clone()
    }

    /// Snapshot of one item by id
    pub fn item(&self, id: Uuid) -> Option<TransferItem> {
        self.state.lock().items.iter().find(|i| i.id == id).cloned()
    }

    /// Snapshot of every membership record
    pub fn memberships(&self) -> Vec<CompanyCollectionAssociation> {
        self.state.lock().memberships.clone()
    }

    /// Number of membership records for one pair (0 or 1 while the constraint holds)
    pub fn membership_count(&self, company_id: i64, collection_id: Uuid) -> usize {
        self.state
            .lock()
            .memberships
            .iter()
            .filter(|m| m.company_id == company_id && m.collection_id == collection_id)
            .count()
    }

    /// Make bulk membership lookups fail, simulating a store outage mid-batch
    pub fn fail_membership_lookups(&self, fail: bool) {
        self.fail_membership_lookups.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreProvider for InMemoryStore {
    async fn session(&self) -> StoreResult<Box<dyn StoreSession>> {
        Ok(Box::new(InMemorySession {
            state: Arc::clone(&self.state),
            fail_membership_lookups: Arc::clone(&self.fail_membership_lookups),
        }))
    }
}

/// Session over the shared in-memory state
#[derive(Debug)]
pub struct InMemorySession {
    state: Arc<Mutex<StoreState>>,
    fail_membership_lookups: Arc<AtomicBool>,
}

#[async_trait]
impl TransferItemStore for InMemorySession {
    async fn insert_items(&mut self, items: &[TransferItem]) -> StoreResult<()> {
        let mut state = self.state.lock();
        let existing: HashSet<Uuid> = state.items.iter().map(|i| i.id).collect();
        if let Some(dup) = items.iter().find(|i| existing.contains(&i.id)) {
            return Err(StoreError::ConstraintViolation {
                constraint: format!("transfer_job_items_pkey ({})", dup.id),
            });
        }
        state.items.extend_from_slice(items);
        Ok(())
    }

    async fn find_item(
        &mut self,
        job_id: Uuid,
        company_id: i64,
        target_collection_id: Uuid,
    ) -> StoreResult<Option<TransferItem>> {
        Ok(self
            .state
            .lock()
            .items
            .iter()
            .find(|i| i.matches(job_id, company_id, target_collection_id))
            .cloned())
    }

    async fn items_for_job(&mut self, job_id: Uuid) -> StoreResult<Vec<TransferItem>> {
        Ok(self.state.lock().sorted_items(|i| i.job_id == job_id))
    }

    async fn items_with_status(
        &mut self,
        job_id: Uuid,
        statuses: &[TransferItemState],
    ) -> StoreResult<Vec<TransferItem>> {
        Ok(self
            .state
            .lock()
            .sorted_items(|i| i.job_id == job_id && statuses.contains(&i.status)))
    }

    async fn dispatchable_items(&mut self, job_id: Uuid) -> StoreResult<Vec<TransferItem>> {
        Ok(self
            .state
            .lock()
            .sorted_items(|i| i.job_id == job_id && i.is_dispatchable()))
    }

    async fn items_for_companies(
        &mut self,
        company_ids: &[i64],
    ) -> StoreResult<Vec<TransferItem>> {
        let mut items = self
            .state
            .lock()
            .sorted_items(|i| company_ids.contains(&i.company_id));
        items.reverse();
        Ok(items)
    }

    async fn save_item(&mut self, item: &TransferItem) -> StoreResult<()> {
        let mut state = self.state.lock();
        if let Some(stored) = state.items.iter_mut().find(|i| i.id == item.id) {
            copy_mutable_columns(stored, item);
        }
        Ok(())
    }

    async fn save_item_if_status(
        &mut self,
        item: &TransferItem,
        expected: TransferItemState,
    ) -> StoreResult<bool> {
        let mut state = self.state.lock();
        match state
            .items
            .iter_mut()
            .find(|i| i.id == item.id && i.status == expected)
        {
            Some(stored) => {
                copy_mutable_columns(stored, item);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_items_created_before(
        &mut self,
        statuses: &[TransferItemState],
        cutoff: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut state = self.state.lock();
        let before = state.items.len();
        state
            .items
            .retain(|i| !(i.created_at < cutoff && statuses.contains(&i.status)));
        Ok((before - state.items.len()) as u64)
    }
}

#[async_trait]
impl MembershipStore for InMemorySession {
    async fn existing_members(
        &mut self,
        collection_id: Uuid,
        company_ids: &[i64],
    ) -> StoreResult<HashSet<i64>> {
        if self.fail_membership_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "membership lookup failed".to_string(),
            ));
        }

        let state = self.state.lock();
        Ok(company_ids
            .iter()
            .copied()
            .filter(|id| state.membership_keys.contains(&(*id, collection_id)))
            .collect())
    }

    async fn insert_membership(
        &mut self,
        company_id: i64,
        collection_id: Uuid,
    ) -> StoreResult<()> {
        self.state.lock().add_membership(company_id, collection_id)
    }

    async fn collection_members(&mut self, collection_id: Uuid) -> StoreResult<Vec<i64>> {
        Ok(self
            .state
            .lock()
            .memberships
            .iter()
            .filter(|m| m.collection_id == collection_id)
            .map(|m| m.company_id)
            .collect())
    }

    async fn remove_memberships(
        &mut self,
        collection_id: Uuid,
        company_ids: &[i64],
    ) -> StoreResult<Vec<i64>> {
        let mut state = self.state.lock();
        let mut removed = Vec::new();
        state.memberships.retain(|m| {
            let matched = m.collection_id == collection_id && company_ids.contains(&m.company_id);
            if matched {
                removed.push(m.company_id);
            }
            !matched
        });
        for company_id in &removed {
            state.membership_keys.remove(&(*company_id, collection_id));
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTransferItem;

    fn item(job_id: Uuid, company_id: i64, target: Uuid) -> TransferItem {
        NewTransferItem {
            job_id,
            company_id,
            source_collection_id: None,
            target_collection_id: target,
        }
        .into_pending(Utc::now())
    }

    #[tokio::test]
    async fn test_membership_uniqueness_is_enforced() {
        let store = InMemoryStore::new();
        let collection = Uuid::new_v4();
        let mut session = store.session().await.unwrap();

        session.insert_membership(5, collection).await.unwrap();
        let err = session.insert_membership(5, collection).await.unwrap_err();

        assert!(err.is_constraint_violation());
        assert_eq!(store.membership_count(5, collection), 1);
    }

    #[tokio::test]
    async fn test_dispatchable_items_skip_cancelled_and_terminal() {
        let store = InMemoryStore::new();
        let job_id = Uuid::new_v4();
        let target = Uuid::new_v4();

        let pending = item(job_id, 1, target);
        let mut cancelled = item(job_id, 2, target);
        cancelled.status = TransferItemState::Cancelled;
        cancelled.is_cancelled = true;
        let mut done = item(job_id, 3, target);
        done.status = TransferItemState::Success;
        store.seed_items(vec![pending.clone(), cancelled, done]);

        let mut session = store.session().await.unwrap();
        let items = session.dispatchable_items(job_id).await.unwrap();

        assert_eq!(items, vec![pending]);
    }

    #[tokio::test]
    async fn test_conditional_save_skips_rows_moved_by_another_writer() {
        let store = InMemoryStore::new();
        let original = item(Uuid::new_v4(), 1, Uuid::new_v4());
        store.seed_items(vec![original.clone()]);
        let mut session = store.session().await.unwrap();

        let mut cancelled = original.clone();
        cancelled.status = TransferItemState::Cancelled;
        cancelled.is_cancelled = true;
        let mut done = original.clone();
        done.status = TransferItemState::Success;

        assert!(session
            .save_item_if_status(&done, TransferItemState::Pending)
            .await
            .unwrap());
        assert!(!session
            .save_item_if_status(&cancelled, TransferItemState::Pending)
            .await
            .unwrap());
        assert_eq!(
            store.item(original.id).unwrap().status,
            TransferItemState::Success
        );
    }

    #[tokio::test]
    async fn test_remove_memberships_returns_removed_ids() {
        let store = InMemoryStore::new();
        let collection = Uuid::new_v4();
        store.add_membership(1, collection).unwrap();
        store.add_membership(2, collection).unwrap();

        let mut session = store.session().await.unwrap();
        let removed = session
            .remove_memberships(collection, &[2, 3])
            .await
            .unwrap();

        assert_eq!(removed, vec![2]);
        assert_eq!(session.collection_members(collection).await.unwrap(), vec![1]);
        // The pair can be re-added once removed
        session.insert_membership(2, collection).await.unwrap();
    }
}
