//! Station inventory lookup: which orientation components exist for a
//! stream at a given time.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::types::{Component, StreamKey};

/// Metadata collaborator. An empty component set means the stream is
/// unknown (or excluded) and picks for it are silently ignored.
pub trait Inventory: Send + Sync {
    fn components(&self, key: &StreamKey, at: DateTime<Utc>) -> Vec<Component>;
}

/// Inventory snapshot loaded from a TOML file at startup.
///
/// Stations with known-bad component orientations are excluded wholesale via
/// a (network, station) blacklist. Filtering happens here, at load time, so
/// the engine never sees excluded streams.
#[derive(Debug, Default)]
pub struct StaticInventory {
    streams: HashMap<StreamKey, Vec<Component>>,
}

#[derive(Debug, Deserialize)]
struct InventoryFile {
    /// Keys are `NET.STA.LOC.CHA` stream names, values the component letters.
    #[serde(default)]
    streams: HashMap<String, Vec<String>>,
}

impl StaticInventory {
    pub fn from_path(path: impl AsRef<Path>, blacklist: &[(String, String)]) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read inventory file: {}", path.display()))?;
        Self::from_toml(&content, blacklist)
            .with_context(|| format!("failed to parse inventory file: {}", path.display()))
    }

    pub fn from_toml(content: &str, blacklist: &[(String, String)]) -> Result<Self> {
        let file: InventoryFile = toml::from_str(content)?;
        let mut inventory = Self::default();
        for (name, letters) in file.streams {
            let Some(key) = parse_stream_name(&name) else {
                debug!(stream = %name, "ignoring malformed inventory entry");
                continue;
            };
            if blacklist
                .iter()
                .any(|(net, sta)| *net == key.net && *sta == key.sta)
            {
                debug!(stream = %key, "ignoring blacklisted station");
                continue;
            }
            let components: Vec<Component> = letters
                .iter()
                .filter_map(|s| s.chars().next())
                .map(Component)
                .collect();
            if components.is_empty() {
                continue;
            }
            inventory.streams.insert(key, components);
        }
        Ok(inventory)
    }

    pub fn insert(&mut self, key: StreamKey, components: Vec<Component>) {
        self.streams.insert(key, components);
    }

    /// Streams the live acquisition subscribes to.
    pub fn streams(&self) -> impl Iterator<Item = (&StreamKey, &[Component])> {
        self.streams.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl Inventory for StaticInventory {
    /// The snapshot is time-invariant; the timestamp parameter exists for
    /// interface parity with live metadata services.
    fn components(&self, key: &StreamKey, _at: DateTime<Utc>) -> Vec<Component> {
        self.streams.get(key).cloned().unwrap_or_default()
    }
}

fn parse_stream_name(name: &str) -> Option<StreamKey> {
    let parts: Vec<&str> = name.split('.').collect();
    match parts.as_slice() {
        [net, sta, loc, cha] if !cha.is_empty() => Some(StreamKey::new(*net, *sta, *loc, *cha)),
        _ => None,
    }
}
