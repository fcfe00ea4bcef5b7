//! # Company Collection Association
//!
//! Membership of a company in a collection. The table belongs to the surrounding
//! application; the transfer engine only queries it and inserts into it.
//!
//! ```sql
//! CREATE TABLE company_collection_associations (
//!   id SERIAL PRIMARY KEY,
//!   company_id BIGINT NOT NULL REFERENCES companies(id),
//!   collection_id UUID NOT NULL REFERENCES company_collections(id),
//!   created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!   CONSTRAINT uq_company_collection UNIQUE (company_id, collection_id)
//! );
//! ```
//!
//! The unique constraint is the only concurrency-safety mechanism between batches
//! touching the same pair: a losing concurrent insert surfaces as
//! [`StoreError::ConstraintViolation`](crate::database::StoreError::ConstraintViolation).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CompanyCollectionAssociation {
    pub company_id: i64,
    pub collection_id: Uuid,
    pub created_at: DateTime<Utc>,
}
