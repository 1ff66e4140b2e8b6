//! # Metrics
//!
//! Counters for the daemon's hot paths. Cheap atomics, read via
//! `snapshot` for logging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone, Default)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    // Response cache
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,

    // Handle pool
    handles_created: AtomicU64,
    handles_closed: AtomicU64,
    pool_overflows: AtomicU64,

    // Mutation queues
    learn_submitted: AtomicU64,
    learn_dropped: AtomicU64,
    train_submitted: AtomicU64,
    train_dropped: AtomicU64,

    // Sync and packs
    pages_synced: AtomicU64,
    pack_installs: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub handles_created: u64,
    pub handles_closed: u64,
    pub pool_overflows: u64,
    pub learn_submitted: u64,
    pub learn_dropped: u64,
    pub train_submitted: u64,
    pub train_dropped: u64,
    pub pages_synced: u64,
    pub pack_installs: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handle_created(&self) {
        self.inner.handles_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handle_closed(&self) {
        self.inner.handles_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pool_overflow(&self) {
        self.inner.pool_overflows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_learn_submitted(&self) {
        self.inner.learn_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_learn_dropped(&self) {
        self.inner.learn_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_train_submitted(&self) {
        self.inner.train_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_train_dropped(&self) {
        self.inner.train_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_page_synced(&self) {
        self.inner.pages_synced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pack_install(&self) {
        self.inner.pack_installs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let m = &self.inner;
        MetricsSnapshot {
            cache_hits: m.cache_hits.load(Ordering::Relaxed),
            cache_misses: m.cache_misses.load(Ordering::Relaxed),
            handles_created: m.handles_created.load(Ordering::Relaxed),
            handles_closed: m.handles_closed.load(Ordering::Relaxed),
            pool_overflows: m.pool_overflows.load(Ordering::Relaxed),
            learn_submitted: m.learn_submitted.load(Ordering::Relaxed),
            learn_dropped: m.learn_dropped.load(Ordering::Relaxed),
            train_submitted: m.train_submitted.load(Ordering::Relaxed),
            train_dropped: m.train_dropped.load(Ordering::Relaxed),
            pages_synced: m.pages_synced.load(Ordering::Relaxed),
            pack_installs: m.pack_installs.load(Ordering::Relaxed),
        }
    }
}
