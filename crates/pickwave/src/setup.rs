use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use tracing::{info, warn};

use pickwave_acquire::TcpArchive;
use pickwave_config::RuntimeConfig;
use pickwave_core::{Engine, EngineConfig, StaticInventory};
use pickwave_export::DirectoryExport;

/// Wire the engine to its collaborators: inventory file, directory export
/// sink, and the TCP archive client.
pub async fn build_engine(config: &RuntimeConfig) -> Result<(Arc<Engine>, Arc<StaticInventory>)> {
    let inventory = Arc::new(
        StaticInventory::from_path(&config.inventory.path, &config.inventory.blacklist)
            .context("Failed to load station inventory")?,
    );
    if inventory.is_empty() {
        warn!(path = %config.inventory.path, "inventory is empty; every pick will be ignored");
    } else {
        info!(streams = inventory.len(), "station inventory loaded");
    }

    let export = Arc::new(
        DirectoryExport::create(&config.export.dir)
            .await
            .context("Failed to open export directory")?,
    );
    let archive = Arc::new(TcpArchive::new(
        config.archive.addr.clone(),
        config.archive.read_timeout(),
    ));

    let engine_config = EngineConfig {
        retention: Duration::seconds(config.buffer.retention_secs as i64),
        lead: Duration::seconds(config.window.lead_secs as i64),
        lag: Duration::seconds(config.window.lag_secs as i64),
        expire_after: Duration::seconds(config.window.expire_secs as i64),
        archive_timeout: config.archive.fetch_timeout(),
    };
    let engine = Arc::new(Engine::new(engine_config, inventory.clone(), archive, export));
    Ok((engine, inventory))
}
