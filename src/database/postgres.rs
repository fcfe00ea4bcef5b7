//! PostgreSQL store provider.
//!
//! Each [`PgStoreSession`] owns one pooled connection for the lifetime of a job or
//! batch invocation and returns it to the pool when dropped. Queries are checked at
//! runtime so the crate builds without a live database.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::store::{
    MembershipStore, StoreError, StoreProvider, StoreResult, StoreSession, TransferItemStore,
};
use crate::models::core::transfer_item::TransferItemRow;
use crate::models::TransferItem;
use crate::state_machine::TransferItemState;

/// Rows per multi-row INSERT; keeps bind parameters well under the protocol limit
const INSERT_CHUNK_SIZE: usize = 1000;

const ITEM_COLUMNS: &str = "id, job_id, company_id, source_collection_id, collection_id, \
     status, error_message, created_at, last_attempt_at, attempt_count, is_cancelled";

#[derive(Debug, Clone)]
pub struct PgStoreProvider {
    pool: PgPool,
}

impl PgStoreProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StoreProvider for PgStoreProvider {
    async fn session(&self) -> StoreResult<Box<dyn StoreSession>> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PgStoreSession { conn }))
    }
}

/// A scoped connection onto the transfer tables
#[derive(Debug)]
pub struct PgStoreSession {
    conn: PoolConnection<Postgres>,
}

fn status_names(statuses: &[TransferItemState]) -> Vec<&'static str> {
    statuses.iter().map(TransferItemState::as_str).collect()
}

fn into_items(rows: Vec<TransferItemRow>) -> StoreResult<Vec<TransferItem>> {
    rows.into_iter()
        .map(|row| TransferItem::try_from(row).map_err(StoreError::CorruptRecord))
        .collect()
}

#[async_trait]
impl TransferItemStore for PgStoreSession {
    async fn insert_items(&mut self, items: &[TransferItem]) -> StoreResult<()> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = sqlx::Connection::begin(&mut *self.conn).await?;

        for chunk in items.chunks(INSERT_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO transfer_job_items ({ITEM_COLUMNS}) "));
            builder.push_values(chunk, |mut row, item| {
                row.push_bind(item.id)
                    .push_bind(item.job_id)
                    .push_bind(item.company_id)
                    .push_bind(item.source_collection_id)
                    .push_bind(item.target_collection_id)
                    .push_bind(item.status.as_str())
                    .push_bind(item.error_message.clone())
                    .push_bind(item.created_at)
                    .push_bind(item.last_attempt_at)
                    .push_bind(item.attempt_count)
                    .push_bind(item.is_cancelled);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        debug!(count = items.len(), "💾 Inserted transfer items");
        Ok(())
    }

    async fn find_item(
        &mut self,
        job_id: Uuid,
        company_id: i64,
        target_collection_id: Uuid,
    ) -> StoreResult<Option<TransferItem>> {
        let row = sqlx::query_as::<_, TransferItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM transfer_job_items \
             WHERE job_id = $1 AND company_id = $2 AND collection_id = $3 \
             LIMIT 1"
        ))
        .bind(job_id)
        .bind(company_id)
        .bind(target_collection_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        row.map(|row| TransferItem::try_from(row).map_err(StoreError::CorruptRecord))
            .transpose()
    }

    async fn items_for_job(&mut self, job_id: Uuid) -> StoreResult<Vec<TransferItem>> {
        let rows = sqlx::query_as::<_, TransferItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM transfer_job_items \
             WHERE job_id = $1 \
             ORDER BY created_at, company_id"
        ))
        .bind(job_id)
        .fetch_all(&mut *self.conn)
        .await?;

        into_items(rows)
    }

    async fn items_with_status(
        &mut self,
        job_id: Uuid,
        statuses: &[TransferItemState],
    ) -> StoreResult<Vec<TransferItem>> {
        let rows = sqlx::query_as::<_, TransferItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM transfer_job_items \
             WHERE job_id = $1 AND status = ANY($2) \
             ORDER BY created_at, company_id"
        ))
        .bind(job_id)
        .bind(status_names(statuses))
        .fetch_all(&mut *self.conn)
        .await?;

        into_items(rows)
    }

    async fn dispatchable_items(&mut self, job_id: Uuid) -> StoreResult<Vec<TransferItem>> {
        let rows = sqlx::query_as::<_, TransferItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM transfer_job_items \
             WHERE job_id = $1 AND status = $2 AND is_cancelled = false \
             ORDER BY created_at, company_id"
        ))
        .bind(job_id)
        .bind(TransferItemState::Pending.as_str())
        .fetch_all(&mut *self.conn)
        .await?;

        into_items(rows)
    }

    async fn items_for_companies(
        &mut self,
        company_ids: &[i64],
    ) -> StoreResult<Vec<TransferItem>> {
        let rows = sqlx::query_as::<_, TransferItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM transfer_job_items \
             WHERE company_id = ANY($1) \
             ORDER BY created_at DESC"
        ))
        .bind(company_ids)
        .fetch_all(&mut *self.conn)
        .await?;

        into_items(rows)
    }

    async fn save_item(&mut self, item: &TransferItem) -> StoreResult<()> {
        sqlx::query(
            "UPDATE transfer_job_items \
             SET status = $2, error_message = $3, last_attempt_at = $4, \
                 attempt_count = $5, is_cancelled = $6 \
             WHERE id = $1",
        )
        .bind(item.id)
        .bind(item.status.as_str())
        .bind(item.error_message.as_deref())
        .bind(item.last_attempt_at)
        .bind(item.attempt_count)
        .bind(item.is_cancelled)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    async fn save_item_if_status(
        &mut self,
        item: &TransferItem,
        expected: TransferItemState,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE transfer_job_items \
             SET status = $2, error_message = $3, last_attempt_at = $4, \
                 attempt_count = $5, is_cancelled = $6 \
             WHERE id = $1 AND status = $7",
        )
        .bind(item.id)
        .bind(item.status.as_str())
        .bind(item.error_message.as_deref())
        .bind(item.last_attempt_at)
        .bind(item.attempt_count)
        .bind(item.is_cancelled)
        .bind(expected.as_str())
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_items_created_before(
        &mut self,
        statuses: &[TransferItemState],
        cutoff: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM transfer_job_items \
             WHERE created_at < $1 AND status = ANY($2)",
        )
        .bind(cutoff)
        .bind(status_names(statuses))
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl MembershipStore for PgStoreSession {
    async fn existing_members(
        &mut self,
        collection_id: Uuid,
        company_ids: &[i64],
    ) -> StoreResult<HashSet<i64>> {
        let members: Vec<i64> = sqlx::query_scalar(
            "SELECT company_id FROM company_collection_associations \
             WHERE collection_id = $1 AND company_id = ANY($2)",
        )
        .bind(collection_id)
        .bind(company_ids)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(members.into_iter().collect())
    }

    async fn insert_membership(
        &mut self,
        company_id: i64,
        collection_id: Uuid,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO company_collection_associations (company_id, collection_id, created_at) \
             VALUES ($1, $2, NOW())",
        )
        .bind(company_id)
        .bind(collection_id)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    async fn collection_members(&mut self, collection_id: Uuid) -> StoreResult<Vec<i64>> {
        let members = sqlx::query_scalar(
            "SELECT company_id FROM company_collection_associations \
             WHERE collection_id = $1 \
             ORDER BY created_at, company_id",
        )
        .bind(collection_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(members)
    }

    async fn remove_memberships(
        &mut self,
        collection_id: Uuid,
        company_ids: &[i64],
    ) -> StoreResult<Vec<i64>> {
        let removed = sqlx::query_scalar(
            "DELETE FROM company_collection_associations \
             WHERE collection_id = $1 AND company_id = ANY($2) \
             RETURNING company_id",
        )
        .bind(collection_id)
        .bind(company_ids)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(removed)
    }
}
