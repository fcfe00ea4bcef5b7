//! # Transfer Worker
//!
//! Runs the transfer engine against PostgreSQL: the task queue, the worker pool and
//! the periodic retention sweep. Stops gracefully on Ctrl-C.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/collection_transfers transfer-worker
//! TRANSFER_CONFIG_PATH=config/transfer.toml TRANSFER_ENV=production transfer-worker
//! ```

use anyhow::Context;
use tracing::info;

use transfer_core::config::ConfigManager;
use transfer_core::logging::init_structured_logging;
use transfer_core::TransferSystem;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let config_manager = ConfigManager::load().context("Failed to load configuration")?;
    info!(
        environment = %config_manager.environment(),
        config_file = ?config_manager.source_file(),
        "🚀 Starting transfer worker"
    );

    let system = TransferSystem::bootstrap(config_manager)
        .await
        .context("Failed to bootstrap transfer system")?;
    let status = system.status();
    info!(
        worker_count = status.worker_count,
        queue_capacity = status.queue_capacity,
        retention_schedule = status.retention_schedule_running,
        "✅ Transfer worker ready, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("🛑 Shutdown signal received");
    system.shutdown().await;
    Ok(())
}
