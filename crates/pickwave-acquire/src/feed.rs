//! Live record and pick feeds over newline-delimited JSON.
//!
//! Both feeds push into bounded channels; the stall timeout is enforced
//! here, at the acquisition boundary, so a silent upstream ends the feed
//! instead of blocking the engine forever.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use pickwave_core::{Component, Pick, Record, StreamKey};

use crate::wire::{ChannelRef, PickMsg, RecordMsg, SubscribeMsg};

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub addr: String,
    /// A connection with no traffic for this long is considered stalled and
    /// the feed ends.
    pub stall_timeout: Duration,
}

/// Connect to the record feed, subscribe to the given streams from `start`
/// onwards, and forward parsed records until the feed ends, stalls, or the
/// receiver goes away.
pub async fn run_record_feed(
    config: FeedConfig,
    subscriptions: Vec<(StreamKey, Vec<Component>)>,
    start: DateTime<Utc>,
    tx: mpsc::Sender<Record>,
) -> Result<()> {
    let stream = TcpStream::connect(&config.addr)
        .await
        .with_context(|| format!("failed to connect to record feed at {}", config.addr))?;
    let (reader, mut writer) = stream.into_split();

    let mut streams = Vec::new();
    for (key, components) in &subscriptions {
        for &component in components {
            streams.push(ChannelRef {
                net: key.net.clone(),
                sta: key.sta.clone(),
                loc: key.wire_loc().to_string(),
                cha: key.channel_code(component),
            });
        }
    }
    let subscribe = SubscribeMsg { streams, start };
    let mut line = serde_json::to_vec(&subscribe)?;
    line.push(b'\n');
    writer
        .write_all(&line)
        .await
        .context("failed to send record subscription")?;
    info!(
        addr = %config.addr,
        streams = subscribe.streams.len(),
        "subscribed to record feed"
    );

    let mut lines = BufReader::new(reader).lines();
    loop {
        match tokio::time::timeout(config.stall_timeout, lines.next_line()).await {
            Err(_) => {
                warn!(addr = %config.addr, "record feed stalled; closing");
                return Ok(());
            }
            Ok(Ok(None)) => {
                info!(addr = %config.addr, "record feed ended");
                return Ok(());
            }
            Ok(Err(e)) => return Err(e).context("record feed read failed"),
            Ok(Ok(Some(line))) => {
                if line.trim().is_empty() {
                    continue;
                }
                let parsed = serde_json::from_str::<RecordMsg>(&line)
                    .map_err(anyhow::Error::from)
                    .and_then(RecordMsg::into_record);
                match parsed {
                    Ok(record) => {
                        if tx.send(record).await.is_err() {
                            return Ok(());
                        }
                    }
                    Err(e) => debug!(error = %e, "dropping malformed record line"),
                }
            }
        }
    }
}

/// Connect to the pick feed and forward parsed picks.
pub async fn run_pick_feed(config: FeedConfig, tx: mpsc::Sender<Pick>) -> Result<()> {
    let stream = TcpStream::connect(&config.addr)
        .await
        .with_context(|| format!("failed to connect to pick feed at {}", config.addr))?;
    info!(addr = %config.addr, "connected to pick feed");

    let mut lines = BufReader::new(stream).lines();
    loop {
        match tokio::time::timeout(config.stall_timeout, lines.next_line()).await {
            Err(_) => {
                // Picks are sparse; a quiet spell is not an error, but with
                // no heartbeat there is nothing to distinguish it from a
                // dead peer.
                warn!(addr = %config.addr, "pick feed stalled; closing");
                return Ok(());
            }
            Ok(Ok(None)) => {
                info!(addr = %config.addr, "pick feed ended");
                return Ok(());
            }
            Ok(Err(e)) => return Err(e).context("pick feed read failed"),
            Ok(Ok(Some(line))) => {
                if line.trim().is_empty() {
                    continue;
                }
                let parsed = serde_json::from_str::<PickMsg>(&line)
                    .map_err(anyhow::Error::from)
                    .and_then(PickMsg::into_pick);
                match parsed {
                    Ok(pick) => {
                        if tx.send(pick).await.is_err() {
                            return Ok(());
                        }
                    }
                    Err(e) => debug!(error = %e, "dropping malformed pick line"),
                }
            }
        }
    }
}
