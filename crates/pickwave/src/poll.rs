// Poll mode - timer-triggered bulk window requests
//
// Picks only register here. Every poll interval the engine re-requests all
// due windows from the archive source in one combined query and runs the
// results through the normal matching path; whatever stays incomplete is
// retried on the next pass until it expires.

use std::time::Instant;

use anyhow::Result;
use metrics::counter;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use pickwave_acquire::{run_pick_feed, FeedConfig};
use pickwave_config::RuntimeConfig;
use pickwave_core::PickOutcome;

use crate::init;
use crate::setup;

pub async fn run(config: RuntimeConfig) -> Result<()> {
    info!("poll mode - bulk window requests on a fixed interval");

    let (engine, _inventory) = setup::build_engine(&config).await?;

    let (pick_tx, mut pick_rx) = mpsc::channel(64);
    let pick_feed_config = FeedConfig {
        addr: config.acquire.picks_addr.clone(),
        stall_timeout: config.acquire.stall_timeout(),
    };
    let pick_feed = tokio::spawn(async move {
        if let Err(e) = run_pick_feed(pick_feed_config, pick_tx).await {
            error!(error = %e, "pick feed failed");
        }
    });

    let mut poll_interval = tokio::time::interval(config.poll.interval());
    // A slow bulk fetch must not be followed by a burst of catch-up ticks.
    poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe_pick = pick_rx.recv() => match maybe_pick {
                Some(pick) => {
                    debug!(pick = %pick.id, "pick received");
                    counter!("pickwave.picks.received", 1);
                    match engine.register_pick(pick) {
                        PickOutcome::Registered => counter!("pickwave.picks.registered", 1),
                        PickOutcome::Duplicate => counter!("pickwave.picks.duplicate", 1),
                        PickOutcome::UnknownStream => counter!("pickwave.picks.unknown_stream", 1),
                        _ => {}
                    }
                }
                None => {
                    info!("pick feed closed; shutting down");
                    break;
                }
            },
            _ = poll_interval.tick() => {
                let started = Instant::now();
                let fetched = engine.poll_due().await;
                if fetched > 0 {
                    counter!("pickwave.records.ingested", fetched as u64);
                }
                let expired = engine.sweep_expired();
                if expired > 0 {
                    counter!("pickwave.requests.expired", expired as u64);
                }
                engine.trim_buffers();
                debug!(
                    fetched,
                    pending = engine.pending_requests(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "poll pass finished"
                );
            }
            _ = init::shutdown_signal() => break,
        }
    }

    pick_feed.abort();
    info!("poll mode shutdown complete");
    Ok(())
}
