// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::RuntimeConfig;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    if config.buffer.retention_secs == 0 {
        bail!("buffer.retention_secs must be greater than 0");
    }
    if config.buffer.trim_interval_secs == 0 {
        bail!("buffer.trim_interval_secs must be greater than 0");
    }

    if config.window.lead_secs + config.window.lag_secs == 0 {
        bail!("window.lead_secs and window.lag_secs must not both be 0");
    }
    if config.window.expire_secs == 0 {
        bail!("window.expire_secs must be greater than 0");
    }
    if config.window.sweep_interval_secs == 0 {
        bail!("window.sweep_interval_secs must be greater than 0");
    }

    if config.acquire.records_addr.is_empty() {
        bail!("acquire.records_addr must not be empty");
    }
    if config.acquire.picks_addr.is_empty() {
        bail!("acquire.picks_addr must not be empty");
    }
    if config.archive.addr.is_empty() {
        bail!("archive.addr must not be empty");
    }
    if config.poll.interval_secs == 0 {
        bail!("poll.interval_secs must be greater than 0");
    }
    if config.export.dir.is_empty() {
        bail!("export.dir must not be empty");
    }
    if config.inventory.path.is_empty() {
        bail!("inventory.path must not be empty");
    }

    // A window longer than the buffer can never complete from live data.
    let span = config.window.lead_secs + config.window.lag_secs;
    if span > config.buffer.retention_secs {
        warn!(
            window_secs = span,
            retention_secs = config.buffer.retention_secs,
            "requested window exceeds the live retention span; every pick will fall back to the archive"
        );
    }

    if config.buffer.retention_secs > 24 * 3600 {
        warn!(
            retention_secs = config.buffer.retention_secs,
            "buffer.retention_secs is very large; may cause memory issues"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_retention_is_rejected() {
        let mut config = RuntimeConfig::default();
        config.buffer.retention_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn empty_addresses_are_rejected() {
        let mut config = RuntimeConfig::default();
        config.archive.addr.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn zero_length_windows_are_rejected() {
        let mut config = RuntimeConfig::default();
        config.window.lead_secs = 0;
        config.window.lag_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn defaults_validate() {
        validate_config(&RuntimeConfig::default()).unwrap();
    }
}
