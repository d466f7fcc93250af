//! The acquisition engine: one serialized mutual-exclusion domain over the
//! live buffer and the request index.
//!
//! Record ingest, pick registration, completion matching and sweeping all
//! run under a single lock; archive fetches await outside it and re-acquire
//! only to retire, so a multi-second archive stall never blocks ingest
//! accounting mid-mutation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::archive::{ArchiveFallback, ArchiveQuery, ArchiveSource};
use crate::buffer::StreamBuffer;
use crate::error::EngineError;
use crate::index::{PendingRequest, RequestIndex};
use crate::inventory::Inventory;
use crate::matcher;
use crate::sink::ExportSink;
use crate::types::{Pick, Record, TimeWindow};

/// Engine tuning knobs, usually converted from the runtime configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Span of live data kept per stream.
    pub retention: Duration,
    /// Window opens this far before the pick time.
    pub lead: Duration,
    /// Window closes this far after the pick time.
    pub lag: Duration,
    /// Incomplete requests are dropped after this long.
    pub expire_after: Duration,
    /// Budget for one combined archive fetch.
    pub archive_timeout: std::time::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention: Duration::seconds(3600),
            lead: Duration::seconds(120),
            lag: Duration::seconds(240),
            expire_after: Duration::seconds(1800),
            archive_timeout: std::time::Duration::from_secs(30),
        }
    }
}

/// How a pick was routed at arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickOutcome {
    /// Registered for live matching.
    Registered,
    /// Stream never observed live; served from the archive directly,
    /// without ever entering the index.
    ArchivedDirect,
    /// Window too old for the live buffer; registered and served from the
    /// archive concurrently.
    ArchivedStale,
    /// Same pick identity already pending; dropped.
    Duplicate,
    /// Inventory knows no components for the stream; ignored.
    UnknownStream,
}

struct EngineState {
    buffer: StreamBuffer,
    index: RequestIndex,
}

/// One explicitly constructed engine instance; create at startup, drop at
/// shutdown. Several independent instances can coexist in one process.
pub struct Engine {
    config: EngineConfig,
    state: Mutex<EngineState>,
    inventory: Arc<dyn Inventory>,
    archive: ArchiveFallback,
    export: Arc<dyn ExportSink>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        inventory: Arc<dyn Inventory>,
        archive: Arc<dyn ArchiveSource>,
        export: Arc<dyn ExportSink>,
    ) -> Self {
        let archive = ArchiveFallback::new(archive, config.archive_timeout);
        Self {
            config,
            state: Mutex::new(EngineState {
                buffer: StreamBuffer::new(),
                index: RequestIndex::new(),
            }),
            inventory,
            archive,
            export,
        }
    }

    /// Ingest one live record and complete whatever requests its stream can
    /// now satisfy.
    pub async fn ingest_record(&self, record: Record) {
        let key = record.key.clone();
        let completed = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state.buffer.ingest(record);
            matcher::complete_for_key(&state.buffer, &mut state.index, &key)
        };
        for request in completed {
            self.finish_live(request).await;
        }
    }

    /// Route a pick: register it for live matching, or go to the archive
    /// when the live buffer is structurally unable to serve the window.
    pub async fn handle_pick(&self, pick: Pick) -> PickOutcome {
        let Some(request) = self.build_request(&pick) else {
            return PickOutcome::UnknownStream;
        };

        enum Route {
            Live,
            Direct(PendingRequest),
            Stale(PendingRequest),
        }

        let route = {
            let mut state = self.state.lock();
            match state.buffer.min_high_water(request.key()) {
                // Nothing has ever arrived live for this stream. It may be
                // down right now while the pick refers to older data, so the
                // archive is the only place the window can come from.
                None => Route::Direct(request),
                Some(min) => {
                    let stale = request.window.end < min - self.config.retention / 2;
                    let snapshot = if stale { Some(request.clone()) } else { None };
                    if let Err(EngineError::DuplicatePick(id)) = state.index.register(request) {
                        debug!(pick = %id, "dropping re-delivered pick");
                        return PickOutcome::Duplicate;
                    }
                    match snapshot {
                        Some(snapshot) => Route::Stale(snapshot),
                        None => Route::Live,
                    }
                }
            }
        };

        match route {
            Route::Live => PickOutcome::Registered,
            Route::Direct(request) => {
                for request in self.archive.dispatch(vec![request]).await {
                    self.hand_off(request).await;
                }
                PickOutcome::ArchivedDirect
            }
            Route::Stale(snapshot) => {
                for request in self.archive.dispatch(vec![snapshot]).await {
                    self.complete_from_archive(request).await;
                }
                PickOutcome::ArchivedStale
            }
        }
    }

    /// Register without any archive routing. The bulk-polling driver fetches
    /// on its own schedule instead of at pick arrival.
    pub fn register_pick(&self, pick: Pick) -> PickOutcome {
        let Some(request) = self.build_request(&pick) else {
            return PickOutcome::UnknownStream;
        };
        match self.state.lock().index.register(request) {
            Ok(()) => PickOutcome::Registered,
            Err(_) => {
                debug!(pick = %pick.id, "dropping re-delivered pick");
                PickOutcome::Duplicate
            }
        }
    }

    /// One bulk-polling pass: re-request every due window from the archive
    /// source and run the results through the normal matching path. Pending
    /// requests that stay incomplete are retried on the next pass until they
    /// expire.
    pub async fn poll_due(&self) -> usize {
        let queries = self.due_queries(Utc::now());
        if queries.is_empty() {
            return 0;
        }
        let records = match self.archive.fetch(&queries).await {
            Ok(records) => records,
            Err(e) => {
                warn!("{e}; retrying on the next pass");
                Vec::new()
            }
        };
        let count = records.len();
        for record in records {
            self.ingest_record(record).await;
        }
        count
    }

    /// Queries covering every pending request whose window end has passed.
    pub fn due_queries(&self, now: DateTime<Utc>) -> Vec<ArchiveQuery> {
        let state = self.state.lock();
        let mut queries = Vec::new();
        for request in state.index.iter().filter(|r| now >= r.window.end) {
            for &component in &request.components {
                queries.push(ArchiveQuery {
                    key: request.key().clone(),
                    component,
                    window: request.window,
                });
            }
        }
        queries
    }

    /// Drop requests whose deadline passed while still incomplete. They are
    /// never exported and never retried; the per-component shortfall is
    /// logged for observability.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut state = self.state.lock();
        let overdue: Vec<String> = state
            .index
            .iter()
            .filter(|r| now > r.expires)
            .map(|r| r.pick.id.clone())
            .collect();
        let mut dropped = 0;
        for id in overdue {
            let Ok(request) = state.index.retire(&id) else {
                continue;
            };
            let shortfall: Vec<String> = request
                .components
                .iter()
                .map(|&component| {
                    match state.buffer.high_water(request.key(), component) {
                        Some(mark) if mark >= request.window.end => format!("{component} ok"),
                        Some(mark) => format!("{component} stopped at {mark}"),
                        None => format!("{component} no data"),
                    }
                })
                .collect();
            warn!(
                pick = %request.pick.id,
                stream = %request.key(),
                shortfall = %shortfall.join(", "),
                "expiring incomplete request"
            );
            dropped += 1;
        }
        dropped
    }

    /// Trim every stream's buffer to the configured retention span.
    pub fn trim_buffers(&self) -> usize {
        self.state.lock().buffer.trim(self.config.retention)
    }

    pub fn pending_requests(&self) -> usize {
        self.state.lock().index.len()
    }

    pub fn buffered_records(&self) -> usize {
        self.state.lock().buffer.record_count()
    }

    fn build_request(&self, pick: &Pick) -> Option<PendingRequest> {
        let components = self.inventory.components(&pick.key, pick.time);
        if components.is_empty() {
            // Blacklisted, or a station added to processing after this pick
            // was made. Either way the pick is skipped.
            debug!(pick = %pick.id, stream = %pick.key, "skipping pick for unknown stream");
            return None;
        }
        let window = TimeWindow::around(pick.time, self.config.lead, self.config.lag);
        Some(PendingRequest::new(
            pick.clone(),
            components,
            window,
            self.config.expire_after,
        ))
    }

    /// Live completion only proves the high-water marks passed the window
    /// end; a gap may still have left a component without records. Those are
    /// backfilled from the archive before the hand-off.
    async fn finish_live(&self, mut request: PendingRequest) {
        let missing = request.missing_components();
        if !missing.is_empty() {
            debug!(
                pick = %request.pick.id,
                components = missing.len(),
                "backfilling gapped components from the archive"
            );
            self.archive.backfill(&mut request, &missing).await;
        }
        self.hand_off(request).await;
    }

    /// Completion for a request that raced the live path: if the live side
    /// already retired it, this attempt finds nothing and drops its result.
    async fn complete_from_archive(&self, request: PendingRequest) {
        let retired = self.state.lock().index.retire(&request.pick.id);
        match retired {
            Ok(_) => self.hand_off(request).await,
            Err(_) => {
                debug!(pick = %request.pick.id, "request already retired; discarding archive result");
            }
        }
    }

    async fn hand_off(&self, request: PendingRequest) {
        info!(pick = %request.pick.id, stream = %request.key(), "completing request");
        if let Err(e) = self.export.export(&request).await {
            warn!(pick = %request.pick.id, error = %e, "export sink rejected bundle");
        }
    }
}
