use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the acquisition engine.
///
/// None of these are fatal: the engine's job is forward progress under
/// permanently missing data, so callers log and keep going.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A request for this pick identity is already pending; re-delivered
    /// picks are dropped, not replaced.
    #[error("pick {0} is already registered")]
    DuplicatePick(String),

    #[error("no pending request for pick {0}")]
    NotFound(String),

    /// The inventory knows no usable components for the stream.
    #[error("no components known for stream {0}")]
    UnknownStream(String),

    #[error("archive fetch exceeded its {}s budget", .0.as_secs())]
    ArchiveTimeout(Duration),
}
