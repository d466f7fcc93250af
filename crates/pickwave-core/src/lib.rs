//! Reconciliation engine joining a continuous waveform record stream with a
//! sparse pick-event stream into completed, bounded time windows.
//!
//! Records arrive continuously and out of order relative to picks; the
//! window a pick needs may already be buffered, partially buffered, not yet
//! arrived, or too old for the live feed. The engine keeps a sliding
//! per-stream buffer, indexes pending requests, completes them as soon as
//! every required component has been observed past the window end, falls
//! back to a bulk archive query when the live feed cannot help, and expires
//! requests that wait too long.
//!
//! Transports, metadata services, archives and export sinks are
//! collaborators behind the [`Inventory`], [`ArchiveSource`] and
//! [`ExportSink`] traits; the engine itself never touches a socket.

pub mod archive;
pub mod buffer;
pub mod engine;
pub mod error;
pub mod index;
pub mod inventory;
pub mod matcher;
pub mod sink;
pub mod types;

pub use archive::{ArchiveFallback, ArchiveQuery, ArchiveSource};
pub use buffer::StreamBuffer;
pub use engine::{Engine, EngineConfig, PickOutcome};
pub use error::EngineError;
pub use index::{PendingRequest, RequestIndex};
pub use inventory::{Inventory, StaticInventory};
pub use sink::ExportSink;
pub use types::{Component, Pick, Record, StreamKey, TimeWindow};
