//! Archive client: one combined query per connection, records streamed back
//! until an end-of-data marker.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use pickwave_core::{ArchiveQuery, ArchiveSource, Record};

use crate::wire::{QueryMsg, RecordMsg, WindowRef, END_OF_DATA};

/// Bulk retrieval over newline-delimited JSON.
///
/// The per-read deadline makes an idle connection return whatever arrived so
/// far instead of hanging; archives are allowed to be incomplete, so partial
/// results are a normal outcome here.
pub struct TcpArchive {
    addr: String,
    read_timeout: Duration,
}

impl TcpArchive {
    pub fn new(addr: impl Into<String>, read_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            read_timeout,
        }
    }
}

#[async_trait]
impl ArchiveSource for TcpArchive {
    async fn fetch(&self, queries: &[ArchiveQuery]) -> Result<Vec<Record>> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .with_context(|| format!("failed to connect to archive at {}", self.addr))?;
        let (reader, mut writer) = stream.into_split();

        let query = QueryMsg {
            streams: queries.iter().map(WindowRef::from_query).collect(),
        };
        let mut line = serde_json::to_vec(&query)?;
        line.push(b'\n');
        writer
            .write_all(&line)
            .await
            .context("failed to send archive query")?;
        info!(addr = %self.addr, streams = query.streams.len(), "requesting archive windows");

        let mut lines = BufReader::new(reader).lines();
        let mut records = Vec::new();
        loop {
            match tokio::time::timeout(self.read_timeout, lines.next_line()).await {
                Err(_) => {
                    warn!(addr = %self.addr, "archive connection idle; returning partial data");
                    break;
                }
                Ok(Ok(None)) => break,
                Ok(Err(e)) => {
                    warn!(error = %e, "archive read failed; returning partial data");
                    break;
                }
                Ok(Ok(Some(line))) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if line == END_OF_DATA {
                        break;
                    }
                    let parsed = serde_json::from_str::<RecordMsg>(line)
                        .map_err(anyhow::Error::from)
                        .and_then(RecordMsg::into_record);
                    match parsed {
                        Ok(record) => records.push(record),
                        Err(e) => debug!(error = %e, "dropping malformed archive line"),
                    }
                }
            }
        }

        debug!(records = records.len(), "archive fetch finished");
        Ok(records)
    }
}
