//! Store traits shared by every persistence provider.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::error_codes::PgErrorCode;
use crate::constants::tables;
use crate::error::TransferError;
use crate::models::TransferItem;
use crate::state_machine::TransferItemState;

/// Errors surfaced by a store provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("Unique constraint violated: {constraint}")]
    ConstraintViolation { constraint: String },

    /// The write referenced a row that does not exist
    #[error("Referenced record does not exist: {0}")]
    ReferenceViolation(String),

    /// No connection could be acquired
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be mapped onto the model
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }

    pub fn unique_membership_violation() -> Self {
        Self::ConstraintViolation {
            constraint: tables::UNIQUE_COMPANY_COLLECTION.to_string(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some(code) if PgErrorCode::is_unique_violation(code) => {
                    StoreError::ConstraintViolation {
                        constraint: db_err
                            .constraint()
                            .unwrap_or(tables::UNIQUE_COMPANY_COLLECTION)
                            .to_string(),
                    }
                }
                Some(code) if PgErrorCode::is_foreign_key_violation(code) => {
                    StoreError::ReferenceViolation(db_err.message().to_string())
                }
                _ => StoreError::Database(err.to_string()),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Database(err.to_string()),
        }
    }
}

impl From<StoreError> for TransferError {
    fn from(err: StoreError) -> Self {
        TransferError::DatabaseError(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable transfer item records
#[async_trait]
pub trait TransferItemStore: Send {
    /// Insert new items; all-or-nothing
    async fn insert_items(&mut self, items: &[TransferItem]) -> StoreResult<()>;

    /// Point lookup by the `(job_id, company_id, target_collection_id)` triple
    async fn find_item(
        &mut self,
        job_id: Uuid,
        company_id: i64,
        target_collection_id: Uuid,
    ) -> StoreResult<Option<TransferItem>>;

    /// All items of a job, ordered by `(created_at, company_id)`
    async fn items_for_job(&mut self, job_id: Uuid) -> StoreResult<Vec<TransferItem>>;

    /// Items of a job in any of the given states, ordered by `(created_at, company_id)`
    async fn items_with_status(
        &mut self,
        job_id: Uuid,
        statuses: &[TransferItemState],
    ) -> StoreResult<Vec<TransferItem>>;

    /// `pending` items of a job whose `is_cancelled` flag is false, in partition order
    async fn dispatchable_items(&mut self, job_id: Uuid) -> StoreResult<Vec<TransferItem>>;

    /// Items of any job for the given companies, newest first
    async fn items_for_companies(&mut self, company_ids: &[i64])
        -> StoreResult<Vec<TransferItem>>;

    /// Per-row update of the mutable columns of one item
    async fn save_item(&mut self, item: &TransferItem) -> StoreResult<()>;

    /// Like [`save_item`](Self::save_item), but only while the stored row is still in
    /// `expected`. Returns `false` when another writer moved the row first.
    async fn save_item_if_status(
        &mut self,
        item: &TransferItem,
        expected: TransferItemState,
    ) -> StoreResult<bool>;

    /// Delete items in the given states created strictly before `cutoff`
    async fn delete_items_created_before(
        &mut self,
        statuses: &[TransferItemState],
        cutoff: DateTime<Utc>,
    ) -> StoreResult<u64>;
}

/// Membership oracle over the company/collection association table
#[async_trait]
pub trait MembershipStore: Send {
    /// Which of `company_ids` are already members of `collection_id` (one bulk query)
    async fn existing_members(
        &mut self,
        collection_id: Uuid,
        company_ids: &[i64],
    ) -> StoreResult<HashSet<i64>>;

    /// Insert a membership; a duplicate pair yields [`StoreError::ConstraintViolation`]
    async fn insert_membership(&mut self, company_id: i64, collection_id: Uuid)
        -> StoreResult<()>;

    /// Every member of a collection
    async fn collection_members(&mut self, collection_id: Uuid) -> StoreResult<Vec<i64>>;

    /// Remove memberships, returning the company ids that were actually removed
    async fn remove_memberships(
        &mut self,
        collection_id: Uuid,
        company_ids: &[i64],
    ) -> StoreResult<Vec<i64>>;
}

/// A scoped handle onto the store, held for one job or batch invocation
pub trait StoreSession: TransferItemStore + MembershipStore {}

impl<T: TransferItemStore + MembershipStore> StoreSession for T {}

/// Hands out store sessions
#[async_trait]
pub trait StoreProvider: Send + Sync + 'static {
    async fn session(&self) -> StoreResult<Box<dyn StoreSession>>;
}
