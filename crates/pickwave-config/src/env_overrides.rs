use crate::{LogFormat, RuntimeConfig};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "PICKWAVE_";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides without touching the process environment.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority below CLI flags).
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Buffering
    if let Some(val) = get_env_u64(env, "BUFFER_RETENTION_SECS")? {
        config.buffer.retention_secs = val;
    }
    if let Some(val) = get_env_u64(env, "BUFFER_TRIM_INTERVAL_SECS")? {
        config.buffer.trim_interval_secs = val;
    }

    // Request windows
    if let Some(val) = get_env_u64(env, "WINDOW_LEAD_SECS")? {
        config.window.lead_secs = val;
    }
    if let Some(val) = get_env_u64(env, "WINDOW_LAG_SECS")? {
        config.window.lag_secs = val;
    }
    if let Some(val) = get_env_u64(env, "WINDOW_EXPIRE_SECS")? {
        config.window.expire_secs = val;
    }
    if let Some(val) = get_env_u64(env, "WINDOW_SWEEP_INTERVAL_SECS")? {
        config.window.sweep_interval_secs = val;
    }

    // Feeds
    if let Some(addr) = env.get("RECORDS_ADDR") {
        config.acquire.records_addr = addr;
    }
    if let Some(addr) = env.get("PICKS_ADDR") {
        config.acquire.picks_addr = addr;
    }
    if let Some(val) = get_env_u64(env, "STALL_TIMEOUT_SECS")? {
        config.acquire.stall_timeout_secs = val;
    }

    // Archive
    if let Some(addr) = env.get("ARCHIVE_ADDR") {
        config.archive.addr = addr;
    }
    if let Some(val) = get_env_u64(env, "ARCHIVE_READ_TIMEOUT_SECS")? {
        config.archive.read_timeout_secs = val;
    }
    if let Some(val) = get_env_u64(env, "ARCHIVE_FETCH_TIMEOUT_SECS")? {
        config.archive.fetch_timeout_secs = val;
    }

    // Polling
    if let Some(val) = get_env_u64(env, "POLL_INTERVAL_SECS")? {
        config.poll.interval_secs = val;
    }

    // Export and inventory
    if let Some(dir) = env.get("EXPORT_DIR") {
        config.export.dir = dir;
    }
    if let Some(path) = env.get("INVENTORY_PATH") {
        config.inventory.path = path;
    }

    // Logging
    if let Some(level) = env.get("LOG_LEVEL") {
        config.log.level = level;
    }
    if let Some(format) = env.get("LOG_FORMAT") {
        config.log.format = format
            .parse::<LogFormat>()
            .context("Invalid PICKWAVE_LOG_FORMAT value")?;
    }

    Ok(())
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    match env.get(key) {
        Some(val) => val
            .parse::<u64>()
            .map(Some)
            .map_err(|e| anyhow!("Invalid {}{} value '{}': {}", ENV_PREFIX, key, val, e)),
        None => Ok(None),
    }
}
