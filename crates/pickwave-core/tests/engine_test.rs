//! End-to-end engine behavior with mock collaborators: live completion,
//! archive routing, duplicate handling, gap backfill and expiry.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

use pickwave_core::{
    ArchiveQuery, ArchiveSource, Component, Engine, EngineConfig, ExportSink, PendingRequest,
    Pick, PickOutcome, Record, StaticInventory, StreamKey,
};

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn key() -> StreamKey {
    StreamKey::new("GR", "FUR", "", "HH")
}

fn record(comp: char, start: i64, end: i64) -> Record {
    Record {
        key: key(),
        component: Component(comp),
        start: t(start),
        end: t(end),
        payload: Bytes::from_static(b"\0\0\0\0\0\0\0\0"),
    }
}

fn pick(id: &str, secs: i64) -> Pick {
    Pick {
        id: id.to_string(),
        key: key(),
        time: t(secs),
    }
}

#[derive(Default)]
struct CapturingSink {
    bundles: Mutex<Vec<PendingRequest>>,
}

#[async_trait]
impl ExportSink for CapturingSink {
    async fn export(&self, request: &PendingRequest) -> anyhow::Result<()> {
        self.bundles.lock().push(request.clone());
        Ok(())
    }
}

#[derive(Default)]
struct FixedArchive {
    records: Vec<Record>,
    calls: Mutex<usize>,
}

#[async_trait]
impl ArchiveSource for FixedArchive {
    async fn fetch(&self, _queries: &[ArchiveQuery]) -> anyhow::Result<Vec<Record>> {
        *self.calls.lock() += 1;
        Ok(self.records.clone())
    }
}

fn engine_with(
    archive_records: Vec<Record>,
) -> (Arc<Engine>, Arc<CapturingSink>, Arc<FixedArchive>) {
    let mut inventory = StaticInventory::default();
    inventory.insert(key(), vec![Component('Z'), Component('N'), Component('E')]);
    let sink = Arc::new(CapturingSink::default());
    let archive = Arc::new(FixedArchive {
        records: archive_records,
        calls: Mutex::new(0),
    });
    let config = EngineConfig {
        retention: Duration::seconds(3600),
        lead: Duration::seconds(120),
        lag: Duration::seconds(240),
        expire_after: Duration::seconds(1800),
        archive_timeout: std::time::Duration::from_secs(5),
    };
    let engine = Arc::new(Engine::new(config, Arc::new(inventory), archive.clone(), sink.clone()));
    (engine, sink, archive)
}

#[tokio::test]
async fn live_records_complete_a_registered_pick() {
    let (engine, sink, archive) = engine_with(vec![]);

    // The stream is live before the pick arrives.
    for comp in ['Z', 'N', 'E'] {
        engine.ingest_record(record(comp, 0, 3000)).await;
    }

    // Pick at 3100: window [2980, 3340).
    assert_eq!(engine.handle_pick(pick("p1", 3100)).await, PickOutcome::Registered);
    assert_eq!(engine.pending_requests(), 1);

    // Z and N reach the window end; E still lags.
    engine.ingest_record(record('Z', 3000, 3400)).await;
    engine.ingest_record(record('N', 3000, 3400)).await;
    assert_eq!(engine.pending_requests(), 1);
    assert!(sink.bundles.lock().is_empty());

    // E catching up completes the request.
    engine.ingest_record(record('E', 3000, 3400)).await;
    assert_eq!(engine.pending_requests(), 0);

    let bundles = sink.bundles.lock();
    assert_eq!(bundles.len(), 1);
    let bundle = &bundles[0];
    assert!(bundle.finished);
    for comp in ['Z', 'N', 'E'] {
        assert!(!bundle.data[&Component(comp)].is_empty());
    }
    // Live data sufficed; the archive was never consulted.
    assert_eq!(*archive.calls.lock(), 0);
}

#[tokio::test]
async fn pick_for_a_never_seen_stream_goes_straight_to_the_archive() {
    let archive_records = vec![
        record('Z', 3000, 3400),
        record('N', 3000, 3400),
    ];
    let (engine, sink, archive) = engine_with(archive_records);

    // No live records at all; the request must never enter the index.
    assert_eq!(engine.handle_pick(pick("p1", 3100)).await, PickOutcome::ArchivedDirect);
    assert_eq!(engine.pending_requests(), 0);
    assert_eq!(*archive.calls.lock(), 1);

    // Archive only had 2 of 3 components; the bundle is still completed.
    let bundles = sink.bundles.lock();
    assert_eq!(bundles.len(), 1);
    assert!(bundles[0].finished);
    assert!(!bundles[0].data[&Component('Z')].is_empty());
    assert!(!bundles[0].data[&Component('N')].is_empty());
    assert!(bundles[0].data[&Component('E')].is_empty());
}

#[tokio::test]
async fn stale_windows_are_served_from_the_archive_and_retired_once() {
    let archive_records = vec![
        record('Z', 100, 400),
        record('N', 100, 400),
        record('E', 100, 400),
    ];
    let (engine, sink, _archive) = engine_with(archive_records);

    // Live marks are far ahead of the requested window.
    for comp in ['Z', 'N', 'E'] {
        engine.ingest_record(record(comp, 9000, 10000)).await;
    }

    // Pick at 200: window end 440, min mark 10000, retention/2 = 1800.
    assert_eq!(engine.handle_pick(pick("p1", 200)).await, PickOutcome::ArchivedStale);
    assert_eq!(engine.pending_requests(), 0);

    let bundles = sink.bundles.lock();
    assert_eq!(bundles.len(), 1);
    for comp in ['Z', 'N', 'E'] {
        assert_eq!(bundles[0].data[&Component(comp)].len(), 1);
    }
}

#[tokio::test]
async fn duplicate_picks_are_dropped_not_replaced() {
    let (engine, sink, _archive) = engine_with(vec![]);
    engine.ingest_record(record('Z', 0, 3000)).await;

    assert_eq!(engine.handle_pick(pick("p1", 3100)).await, PickOutcome::Registered);
    assert_eq!(engine.handle_pick(pick("p1", 3100)).await, PickOutcome::Duplicate);
    assert_eq!(engine.pending_requests(), 1);
    assert!(sink.bundles.lock().is_empty());
}

#[tokio::test]
async fn picks_for_unknown_streams_are_silently_ignored() {
    let (engine, sink, archive) = engine_with(vec![]);
    let stranger = Pick {
        id: "p1".to_string(),
        key: StreamKey::new("XX", "NOPE", "", "HH"),
        time: t(3100),
    };
    assert_eq!(engine.handle_pick(stranger).await, PickOutcome::UnknownStream);
    assert_eq!(engine.pending_requests(), 0);
    assert!(sink.bundles.lock().is_empty());
    assert_eq!(*archive.calls.lock(), 0);
}

#[tokio::test]
async fn a_gapped_component_is_backfilled_before_export() {
    // Live N data jumps clean over the window; the archive has the gap.
    let (engine, sink, archive) = engine_with(vec![record('N', 2980, 3340)]);

    for comp in ['Z', 'N', 'E'] {
        engine.ingest_record(record(comp, 0, 2000)).await;
    }
    assert_eq!(engine.handle_pick(pick("p1", 3100)).await, PickOutcome::Registered);

    // Window is [2980, 3340). Z and E cover it; N's next record starts
    // after the window end, so its mark passes without any overlap.
    engine.ingest_record(record('Z', 2900, 3400)).await;
    engine.ingest_record(record('E', 2900, 3400)).await;
    engine.ingest_record(record('N', 3350, 3500)).await;

    assert_eq!(engine.pending_requests(), 0);
    assert_eq!(*archive.calls.lock(), 1);

    let bundles = sink.bundles.lock();
    assert_eq!(bundles.len(), 1);
    assert_eq!(bundles[0].data[&Component('N')].len(), 1);
    assert_eq!(bundles[0].data[&Component('N')][0].start, t(2980));
}

#[tokio::test]
async fn overdue_incomplete_requests_expire_without_export() {
    let mut inventory = StaticInventory::default();
    inventory.insert(key(), vec![Component('Z'), Component('N'), Component('E')]);
    let sink = Arc::new(CapturingSink::default());
    let archive = Arc::new(FixedArchive::default());
    let config = EngineConfig {
        expire_after: Duration::zero(),
        ..EngineConfig::default()
    };
    let engine = Engine::new(config, Arc::new(inventory), archive, sink.clone());

    engine.ingest_record(record('Z', 0, 3000)).await;
    engine.ingest_record(record('N', 0, 3000)).await;
    assert_eq!(engine.handle_pick(pick("p1", 3100)).await, PickOutcome::Registered);

    // Z and N reach the window end but E never arrives.
    engine.ingest_record(record('Z', 3000, 3400)).await;
    engine.ingest_record(record('N', 3000, 3400)).await;
    assert_eq!(engine.pending_requests(), 1);

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert_eq!(engine.sweep_expired(), 1);
    assert_eq!(engine.pending_requests(), 0);
    assert!(sink.bundles.lock().is_empty());

    // Expired means gone: a sweep finds nothing more to do.
    assert_eq!(engine.sweep_expired(), 0);
}

#[tokio::test]
async fn polling_pass_completes_due_requests_from_the_source() {
    let archive_records = vec![
        record('Z', 2900, 3400),
        record('N', 2900, 3400),
        record('E', 2900, 3400),
    ];
    let (engine, sink, archive) = engine_with(archive_records);

    // The polling driver registers without routing; the stream has no live
    // marks, so only a poll pass can complete this.
    assert_eq!(engine.register_pick(pick("p1", 3100)), PickOutcome::Registered);
    assert_eq!(engine.pending_requests(), 1);

    let fetched = engine.poll_due().await;
    assert_eq!(fetched, 3);
    assert_eq!(*archive.calls.lock(), 1);
    assert_eq!(engine.pending_requests(), 0);
    assert_eq!(sink.bundles.lock().len(), 1);
}
