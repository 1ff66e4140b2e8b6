//! # Akshara Engine Runtime
//!
//! Makes the native engine capability safe and fast to share across many
//! concurrent requests:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     akshara-engine                       │
//! ├──────────────────────────────────────────────────────────┤
//! │  Read path:                                              │
//! │  request ──> response cache ──miss──> handle pool ──> engine
//! │                                                          │
//! │  Write path:                                             │
//! │  request ──> per-scheme queue ──> pinned worker ──> engine
//! │                                                          │
//! │  • pool     - bounded per-scheme handles, 800ms overflow │
//! │  • workers  - serialized learn/train mutations           │
//! │  • cache    - fingerprinted response byte cache          │
//! │  • corpus   - gzip page cache with single-flight fill    │
//! │  • scheme   - symbol-table introspection                 │
//! │  • memory   - in-process reference engine                │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod corpus;
pub mod memory;
pub mod pool;
pub mod scheme;
pub mod workers;

pub use cache::ResponseCache;
pub use corpus::{CorpusPageCache, DOWNLOAD_PAGE_SIZE};
pub use memory::MemoryEngine;
pub use pool::HandlePool;
pub use workers::{Mutations, TrainRequest};
