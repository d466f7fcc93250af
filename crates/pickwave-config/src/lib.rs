// pickwave-config - Unified configuration for the acquisition clients
//
// Sources, in priority order:
// 1. Command-line flags (applied by the binary)
// 2. Environment variables (PICKWAVE_* prefix)
// 3. Config file path from --config or PICKWAVE_CONFIG
// 4. Default config file location (./pickwave.toml)
// 5. Built-in defaults

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{apply_env_overrides, EnvSource, ENV_PREFIX};
pub use sources::{load_from_path, load_or_default};

/// Main runtime configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub buffer: BufferConfig,
    pub window: WindowConfig,
    pub acquire: AcquireConfig,
    pub archive: ArchiveConfig,
    pub poll: PollConfig,
    pub export: ExportConfig,
    pub inventory: InventoryConfig,
    pub log: LogConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            buffer: BufferConfig::default(),
            window: WindowConfig::default(),
            acquire: AcquireConfig::default(),
            archive: ArchiveConfig::default(),
            poll: PollConfig::default(),
            export: ExportConfig::default(),
            inventory: InventoryConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

/// Live record buffering.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Span of live data kept per stream, in seconds.
    pub retention_secs: u64,
    /// How often buffers are trimmed back to the retention span.
    pub trim_interval_secs: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            retention_secs: 3600,
            trim_interval_secs: 120,
        }
    }
}

impl BufferConfig {
    pub fn trim_interval(&self) -> Duration {
        Duration::from_secs(self.trim_interval_secs)
    }
}

/// The time window requested around each pick.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Seconds of data before the pick time.
    pub lead_secs: u64,
    /// Seconds of data after the pick time.
    pub lag_secs: u64,
    /// Seconds an incomplete request may wait before it is dropped.
    pub expire_secs: u64,
    /// How often the expiry sweep runs.
    pub sweep_interval_secs: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            lead_secs: 120,
            lag_secs: 240,
            expire_secs: 1800,
            sweep_interval_secs: 30,
        }
    }
}

impl WindowConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Live feed endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AcquireConfig {
    pub records_addr: String,
    pub picks_addr: String,
    /// A feed connection with no traffic for this long is considered stalled.
    pub stall_timeout_secs: u64,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            records_addr: "127.0.0.1:18000".to_string(),
            picks_addr: "127.0.0.1:18001".to_string(),
            stall_timeout_secs: 300,
        }
    }
}

impl AcquireConfig {
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }
}

/// Secondary bulk waveform source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub addr: String,
    /// Per-read deadline; an idle archive connection ends the fetch with
    /// whatever arrived so far.
    pub read_timeout_secs: u64,
    /// Overall budget for one combined fetch.
    pub fetch_timeout_secs: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:18002".to_string(),
            read_timeout_secs: 5,
            fetch_timeout_secs: 30,
        }
    }
}

impl ArchiveConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Bulk-polling cadence (poll mode only).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Export sink destination.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub dir: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: "./export".to_string(),
        }
    }
}

/// Station inventory source and exclusions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub path: String,
    /// (network, station) pairs excluded regardless of inventory content,
    /// e.g. stations with bad component orientations.
    pub blacklist: Vec<(String, String)>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            path: "./inventory.toml".to_string(),
            blacklist: vec![("WA".to_string(), "ZON".to_string())],
        }
    }
}

/// Logging output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Unsupported log format: {}. Supported: text, json", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = RuntimeConfig::default();
        assert_eq!(config.buffer.retention_secs, 3600);
        assert_eq!(config.window.lead_secs, 120);
        assert_eq!(config.window.lag_secs, 240);
        assert_eq!(config.window.expire_secs, 1800);
        assert_eq!(config.inventory.blacklist.len(), 1);
        config.validate().unwrap();
    }

    #[test]
    fn partial_files_fall_back_to_defaults() {
        let config: RuntimeConfig = toml::from_str(
            r#"
[buffer]
retention_secs = 7200

[export]
dir = "/tmp/bundles"
"#,
        )
        .unwrap();
        assert_eq!(config.buffer.retention_secs, 7200);
        assert_eq!(config.buffer.trim_interval_secs, 120);
        assert_eq!(config.export.dir, "/tmp/bundles");
        assert_eq!(config.poll.interval_secs, 30);
    }

    #[test]
    fn blacklist_parses_as_pairs() {
        let config: RuntimeConfig = toml::from_str(
            r#"
[inventory]
path = "inv.toml"
blacklist = [["WA", "ZON"], ["GR", "BAD"]]
"#,
        )
        .unwrap();
        assert_eq!(
            config.inventory.blacklist,
            vec![
                ("WA".to_string(), "ZON".to_string()),
                ("GR".to_string(), "BAD".to_string())
            ]
        );
    }

    #[test]
    fn log_format_parses() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("TEXT".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
