//! # Transfer Item Model
//!
//! Durable record of one company→collection transfer attempt; the unit of idempotency
//! and retry for the batch transfer engine.
//!
//! ## Overview
//!
//! Items are created in bulk by a job submission (status `pending`), mutated by the
//! batch worker and the retry/cancellation controllers, and deleted only by the
//! retention reaper once terminal and past the retention window. A *job* is not a
//! stored aggregate: it is the set of items sharing one `job_id`.
//!
//! ## Database Schema
//!
//! Maps to `transfer_job_items`:
//! ```sql
//! CREATE TABLE transfer_job_items (
//!   id UUID PRIMARY KEY,
//!   job_id UUID NOT NULL,
//!   company_id BIGINT NOT NULL,
//!   source_collection_id UUID NULL,
//!   collection_id UUID NOT NULL,
//!   status VARCHAR NOT NULL DEFAULT 'pending',
//!   error_message VARCHAR NULL,
//!   created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!   last_attempt_at TIMESTAMPTZ NULL,
//!   attempt_count INTEGER NOT NULL DEFAULT 0,
//!   is_cancelled BOOLEAN NOT NULL DEFAULT false
//! );
//! CREATE INDEX ON transfer_job_items (job_id);
//! CREATE INDEX ON transfer_job_items (status);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::state_machine::TransferItemState;

/// A single company→collection transfer attempt.
///
/// `target_collection_id` is stored in the `collection_id` column. `is_cancelled`
/// always mirrors `status == cancelled`; the state machine keeps the two in step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferItem {
    pub id: Uuid,
    pub job_id: Uuid,
    pub company_id: i64,
    pub source_collection_id: Option<Uuid>,
    pub target_collection_id: Uuid,
    pub status: TransferItemState,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub attempt_count: i32,
    pub is_cancelled: bool,
}

/// New transfer item for creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransferItem {
    pub job_id: Uuid,
    pub company_id: i64,
    pub source_collection_id: Option<Uuid>,
    pub target_collection_id: Uuid,
}

impl NewTransferItem {
    /// Build the pending record with a fresh id
    pub fn into_pending(self, created_at: DateTime<Utc>) -> TransferItem {
        TransferItem {
            id: Uuid::new_v4(),
            job_id: self.job_id,
            company_id: self.company_id,
            source_collection_id: self.source_collection_id,
            target_collection_id: self.target_collection_id,
            status: TransferItemState::Pending,
            error_message: None,
            created_at,
            last_attempt_at: None,
            attempt_count: 0,
            is_cancelled: false,
        }
    }
}

impl TransferItem {
    /// True when this item is the one a batch descriptor refers to
    pub fn matches(&self, job_id: Uuid, company_id: i64, target_collection_id: Uuid) -> bool {
        self.job_id == job_id
            && self.company_id == company_id
            && self.target_collection_id == target_collection_id
    }

    /// Eligible for an orchestrator run
    pub fn is_dispatchable(&self) -> bool {
        self.status == TransferItemState::Pending && !self.is_cancelled
    }
}

/// Raw row as read from `transfer_job_items`
#[derive(Debug, Clone, FromRow)]
pub(crate) struct TransferItemRow {
    pub id: Uuid,
    pub job_id: Uuid,
    pub company_id: i64,
    pub source_collection_id: Option<Uuid>,
    pub collection_id: Uuid,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub attempt_count: i32,
    pub is_cancelled: bool,
}

impl TryFrom<TransferItemRow> for TransferItem {
    type Error = String;

    fn try_from(row: TransferItemRow) -> Result<Self, Self::Error> {
        Ok(TransferItem {
            id: row.id,
            job_id: row.job_id,
            company_id: row.company_id,
            source_collection_id: row.source_collection_id,
            target_collection_id: row.collection_id,
            status: row.status.parse()?,
            error_message: row.error_message,
            created_at: row.created_at,
            last_attempt_at: row.last_attempt_at,
            attempt_count: row.attempt_count,
            is_cancelled: row.is_cancelled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_item() -> NewTransferItem {
        NewTransferItem {
            job_id: Uuid::new_v4(),
            company_id: 7,
            source_collection_id: None,
            target_collection_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_into_pending_defaults() {
        let now = Utc::now();
        let item = new_item().into_pending(now);

        assert_eq!(item.status, TransferItemState::Pending);
        assert_eq!(item.attempt_count, 0);
        assert_eq!(item.created_at, now);
        assert!(item.last_attempt_at.is_none());
        assert!(item.error_message.is_none());
        assert!(item.is_dispatchable());
    }

    #[test]
    fn test_row_with_unknown_status_is_rejected() {
        let item = new_item().into_pending(Utc::now());
        let row = TransferItemRow {
            id: item.id,
            job_id: item.job_id,
            company_id: item.company_id,
            source_collection_id: None,
            collection_id: item.target_collection_id,
            status: "in_flight".to_string(),
            error_message: None,
            created_at: item.created_at,
            last_attempt_at: None,
            attempt_count: 0,
            is_cancelled: false,
        };

        assert!(TransferItem::try_from(row).is_err());
    }
}
