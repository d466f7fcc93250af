//! Directory export sink: one numbered directory per completed request.
//!
//! Each bundle directory holds the raw record payloads concatenated into one
//! file per component, plus a `pick.json` describing the pick the bundle was
//! acquired for. Numbering continues from whatever already exists so a
//! restarted client never reuses a directory.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::fs;
use tracing::{debug, info};

use pickwave_core::{ExportSink, PendingRequest};

pub struct DirectoryExport {
    base: PathBuf,
    counter: Mutex<u64>,
}

impl DirectoryExport {
    /// Open (creating if needed) the export directory and resume the bundle
    /// numbering after the highest existing entry.
    pub async fn create(base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();
        fs::create_dir_all(&base)
            .await
            .with_context(|| format!("failed to create export directory: {}", base.display()))?;

        let mut last = 0u64;
        let mut entries = fs::read_dir(&base)
            .await
            .with_context(|| format!("failed to list export directory: {}", base.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(n) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<u64>().ok())
            {
                last = last.max(n);
            }
        }
        if last > 0 {
            info!(last, "continuing export numbering");
        }

        Ok(Self {
            base,
            counter: Mutex::new(last),
        })
    }

    fn next_bundle_dir(&self) -> PathBuf {
        let seq = {
            let mut counter = self.counter.lock();
            *counter += 1;
            *counter
        };
        self.base.join(format!("{seq:09}"))
    }
}

#[async_trait]
impl ExportSink for DirectoryExport {
    async fn export(&self, request: &PendingRequest) -> Result<()> {
        let dir = self.next_bundle_dir();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create bundle directory: {}", dir.display()))?;

        let key = request.key();
        let base_name = format!("{}.{}.{}.{}", key.net, key.sta, key.wire_loc(), key.cha);

        for &component in &request.components {
            let Some(records) = request.data.get(&component) else {
                continue;
            };
            if records.is_empty() {
                continue;
            }
            let path = dir.join(format!("{base_name}{component}.mseed"));
            if fs::try_exists(&path).await? {
                debug!(path = %path.display(), "not overwriting existing component file");
                continue;
            }
            let mut payload = Vec::new();
            for record in records {
                payload.extend_from_slice(&record.payload);
            }
            fs::write(&path, payload)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
        }

        let pick = serde_json::json!({
            "id": request.pick.id,
            "stream": request.pick.key.to_string(),
            "time": request.pick.time,
            "window": {
                "start": request.window.start,
                "end": request.window.end,
            },
        });
        let path = dir.join("pick.json");
        fs::write(&path, serde_json::to_vec_pretty(&pick)?)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        info!(pick = %request.pick.id, dir = %dir.display(), "bundle exported");
        Ok(())
    }
}
