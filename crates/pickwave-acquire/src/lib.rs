//! Feed transports and archive client.
//!
//! Everything here speaks newline-delimited JSON over TCP and converts to
//! the core types at the boundary; malformed lines are dropped with a log
//! line and never reach the engine.

pub mod archive;
pub mod feed;
pub mod wire;

pub use archive::TcpArchive;
pub use feed::{run_pick_feed, run_record_feed, FeedConfig};
