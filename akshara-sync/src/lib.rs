//! # Akshara Sync
//!
//! Pulls published learnings from an upstream peer and folds them into
//! the local engine:
//!
//! - `upstream` - HTTP client for the peer's corpus and pack endpoints
//! - `queue`    - on-disk learn queue and resumable download offsets
//! - `dispatcher` - the periodic download→persist→learn pipeline
//! - `packs`    - word-pack registry and install lifecycle

pub mod dispatcher;
pub mod packs;
pub mod queue;
pub mod upstream;

pub use dispatcher::SyncDispatcher;
pub use packs::PackManager;
pub use queue::SyncPaths;
pub use upstream::UpstreamClient;
