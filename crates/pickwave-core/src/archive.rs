//! Fallback retrieval from a secondary, non-real-time waveform source.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::index::PendingRequest;
use crate::types::{Component, Record, StreamKey, TimeWindow};

/// One per-component, time-bounded retrieval unit.
#[derive(Debug, Clone)]
pub struct ArchiveQuery {
    pub key: StreamKey,
    pub component: Component,
    pub window: TimeWindow,
}

/// Bulk retrieval against the archive.
///
/// Implementations apply their own read deadline and may return partial
/// results; archives are allowed to be incomplete.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    async fn fetch(&self, queries: &[ArchiveQuery]) -> anyhow::Result<Vec<Record>>;
}

/// Completes requests the live buffer cannot satisfy.
///
/// Completion here is unconditional: whatever the archive returned is
/// attached, even nothing, and there is no retry loop inside a dispatch. A
/// caller wanting a second attempt re-dispatches explicitly.
pub struct ArchiveFallback {
    source: Arc<dyn ArchiveSource>,
    timeout: Duration,
}

impl ArchiveFallback {
    pub fn new(source: Arc<dyn ArchiveSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Run one combined query within the configured budget. Source errors
    /// degrade to an empty result set; only the budget elapsing surfaces,
    /// and callers complete with partial data rather than failing.
    pub async fn fetch(&self, queries: &[ArchiveQuery]) -> Result<Vec<Record>, EngineError> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }
        debug!(streams = queries.len(), "archive: requesting streams");
        match tokio::time::timeout(self.timeout, self.source.fetch(queries)).await {
            Ok(Ok(records)) => {
                debug!(records = records.len(), "archive: received records");
                Ok(records)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "archive fetch failed");
                Ok(Vec::new())
            }
            Err(_) => Err(EngineError::ArchiveTimeout(self.timeout)),
        }
    }

    /// Dispatch one or many requests as a single combined query and complete
    /// them all, attaching whatever overlapping records came back.
    pub async fn dispatch(&self, mut requests: Vec<PendingRequest>) -> Vec<PendingRequest> {
        let mut queries = Vec::new();
        for request in &requests {
            for &component in &request.components {
                queries.push(ArchiveQuery {
                    key: request.key().clone(),
                    component,
                    window: request.window,
                });
            }
        }
        let records = self.fetch_lossy(&queries).await;
        for request in &mut requests {
            let components = request.components.clone();
            attach(request, &components, &records);
            request.finished = true;
        }
        requests
    }

    /// Fill only the named components of an already-completed request, used
    /// when live completion left a component without records.
    pub async fn backfill(&self, request: &mut PendingRequest, components: &[Component]) {
        let queries: Vec<ArchiveQuery> = components
            .iter()
            .map(|&component| ArchiveQuery {
                key: request.key().clone(),
                component,
                window: request.window,
            })
            .collect();
        let records = self.fetch_lossy(&queries).await;
        attach(request, components, &records);
    }

    async fn fetch_lossy(&self, queries: &[ArchiveQuery]) -> Vec<Record> {
        match self.fetch(queries).await {
            Ok(records) => records,
            Err(e) => {
                warn!("{e}; completing with partial data");
                Vec::new()
            }
        }
    }
}

fn attach(request: &mut PendingRequest, components: &[Component], records: &[Record]) {
    for &component in components {
        let matched: Vec<Record> = records
            .iter()
            .filter(|r| {
                r.key == *request.key()
                    && r.component == component
                    && request.window.overlaps(r)
            })
            .cloned()
            .collect();
        request.data.insert(component, matched);
    }
}
