// Stream mode - live buffering with event-triggered completion
//
// Records and picks arrive on independent feeds; completions fire as soon
// as the buffer can satisfy a window. Trimming and expiry run on their own
// timers, independent of data arrival.

use std::time::Instant;

use anyhow::Result;
use chrono::{Duration, Utc};
use metrics::{counter, histogram};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use pickwave_acquire::{run_pick_feed, run_record_feed, FeedConfig};
use pickwave_config::RuntimeConfig;
use pickwave_core::{Component, Engine, Pick, PickOutcome, StreamKey};

use crate::init;
use crate::setup;

pub async fn run(config: RuntimeConfig) -> Result<()> {
    info!("stream mode - live buffering with event-triggered completion");

    let (engine, inventory) = setup::build_engine(&config).await?;

    let (record_tx, mut record_rx) = mpsc::channel(1024);
    let (pick_tx, mut pick_rx) = mpsc::channel(64);

    let subscriptions: Vec<(StreamKey, Vec<Component>)> = inventory
        .streams()
        .map(|(key, components)| (key.clone(), components.to_vec()))
        .collect();
    // Start the live request one retention span in the past so a freshly
    // started client can serve picks for recent data right away.
    let start = Utc::now() - Duration::seconds(config.buffer.retention_secs as i64);

    let record_feed_config = FeedConfig {
        addr: config.acquire.records_addr.clone(),
        stall_timeout: config.acquire.stall_timeout(),
    };
    let record_feed = tokio::spawn(async move {
        if let Err(e) = run_record_feed(record_feed_config, subscriptions, start, record_tx).await
        {
            error!(error = %e, "record feed failed");
        }
    });
    let pick_feed_config = FeedConfig {
        addr: config.acquire.picks_addr.clone(),
        stall_timeout: config.acquire.stall_timeout(),
    };
    let pick_feed = tokio::spawn(async move {
        if let Err(e) = run_pick_feed(pick_feed_config, pick_tx).await {
            error!(error = %e, "pick feed failed");
        }
    });

    let mut trim_interval = tokio::time::interval(config.buffer.trim_interval());
    let mut sweep_interval = tokio::time::interval(config.window.sweep_interval());

    loop {
        tokio::select! {
            maybe_record = record_rx.recv() => match maybe_record {
                Some(record) => {
                    counter!("pickwave.records.ingested", 1);
                    engine.ingest_record(record).await;
                }
                None => {
                    info!("record feed closed; shutting down");
                    break;
                }
            },
            maybe_pick = pick_rx.recv() => match maybe_pick {
                Some(pick) => handle_pick(&engine, pick).await,
                None => {
                    info!("pick feed closed; shutting down");
                    break;
                }
            },
            _ = trim_interval.tick() => {
                let dropped = engine.trim_buffers();
                if dropped > 0 {
                    debug!(dropped, "trimmed record buffers");
                }
                histogram!("pickwave.buffer.records", engine.buffered_records() as f64);
            }
            _ = sweep_interval.tick() => {
                let expired = engine.sweep_expired();
                if expired > 0 {
                    counter!("pickwave.requests.expired", expired as u64);
                }
                debug!(pending = engine.pending_requests(), "pending requests");
            }
            _ = init::shutdown_signal() => break,
        }
    }

    record_feed.abort();
    pick_feed.abort();
    info!("stream mode shutdown complete");
    Ok(())
}

async fn handle_pick(engine: &Engine, pick: Pick) {
    debug!(pick = %pick.id, "pick received");
    counter!("pickwave.picks.received", 1);
    let started = Instant::now();

    match engine.handle_pick(pick).await {
        PickOutcome::Registered => counter!("pickwave.picks.registered", 1),
        PickOutcome::ArchivedDirect | PickOutcome::ArchivedStale => {
            counter!("pickwave.picks.archived", 1);
            histogram!(
                "pickwave.archive.latency_ms",
                started.elapsed().as_secs_f64() * 1000.0
            );
        }
        PickOutcome::Duplicate => counter!("pickwave.picks.duplicate", 1),
        PickOutcome::UnknownStream => counter!("pickwave.picks.unknown_stream", 1),
    }
}
