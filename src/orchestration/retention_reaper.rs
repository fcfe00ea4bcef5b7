//! # Retention Reaper
//!
//! Purges `success` and `error` items created before the retention window. Items in
//! `pending`, `processing` or `cancelled` are never deleted here, whatever their age.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use super::types::CleanupResult;
use crate::constants::status_groups::PURGEABLE_STATES;
use crate::database::StoreProvider;
use crate::error::TransferResult;

pub struct RetentionReaper {
    store: Arc<dyn StoreProvider>,
    retention_window: Duration,
}

impl RetentionReaper {
    pub fn new(store: Arc<dyn StoreProvider>, retention_window: Duration) -> Self {
        Self {
            store,
            retention_window,
        }
    }

    pub async fn run(&self) -> TransferResult<CleanupResult> {
        self.run_at(Utc::now()).await
    }

    /// Sweep as of `now`; items created strictly before `now - window` are purged
    pub async fn run_at(&self, now: DateTime<Utc>) -> TransferResult<CleanupResult> {
        let cutoff = now - self.retention_window;
        let mut session = self.store.session().await?;
        let deleted_count = session
            .delete_items_created_before(PURGEABLE_STATES, cutoff)
            .await?;

        info!(
            deleted_count = deleted_count,
            cutoff = %cutoff,
            "🧹 Retention sweep finished"
        );

        Ok(CleanupResult {
            message: format!("Cleaned up {deleted_count} old transfer records"),
            deleted_count,
            cutoff,
        })
    }
}
