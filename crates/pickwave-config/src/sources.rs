// Configuration source loading.
//
// Priority order:
// 1. Environment variables (PICKWAVE_* prefix)
// 2. Config file path from PICKWAVE_CONFIG
// 3. Default config file (./pickwave.toml)
// 4. Built-in defaults

use crate::env_overrides::{self, EnvSource, ENV_PREFIX};
use crate::RuntimeConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;

/// Load configuration from a specific file path (for the --config flag),
/// then apply environment overrides and validate.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let mut config: RuntimeConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration with graceful fallback: tries PICKWAVE_CONFIG and the
/// default file location, returns built-in defaults if neither exists.
pub fn load_or_default() -> Result<RuntimeConfig> {
    let mut config = match config_file()? {
        Some(content) => toml::from_str(&content).context("Failed to parse config file")?,
        None => RuntimeConfig::default(),
    };

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

fn config_file() -> Result<Option<String>> {
    if let Ok(path) = env::var("PICKWAVE_CONFIG") {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        return Ok(Some(content));
    }

    let default_path = "./pickwave.toml";
    if Path::new(default_path).exists() {
        let content = std::fs::read_to_string(default_path)
            .with_context(|| format!("Failed to read config file: {}", default_path))?;
        return Ok(Some(content));
    }

    Ok(None)
}

struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }
}
