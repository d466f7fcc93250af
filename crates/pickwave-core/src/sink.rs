//! Hand-off boundary for completed request bundles.

use async_trait::async_trait;

use crate::index::PendingRequest;

/// Receives each retired request exactly once.
///
/// The sink owns any serialized or on-disk representation; the engine's only
/// contract is the single hand-off per retirement.
#[async_trait]
pub trait ExportSink: Send + Sync {
    async fn export(&self, request: &PendingRequest) -> anyhow::Result<()>;
}
