//! Corpus page serving: gzip-encoded JSON pages of learned words, cached
//! per `(scheme, offset)` with single-flight fill.
//!
//! Full pages are immutable once written (the words behind them are
//! ordered by id) so they cache forever. The last, short page keeps
//! changing as new words are learned, so it is served to the filling
//! caller but never stored.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use akshara_core::error::Result;
use akshara_core::metrics::Metrics;
use akshara_core::types::CorpusWord;
use akshara_core::utils::{gzip_bytes, utc_now_string};

use crate::cache::ResponseCache;
use crate::pool::HandlePool;

/// Words per corpus page, here and upstream.
pub const DOWNLOAD_PAGE_SIZE: usize = 100;

/// Wire format of one corpus page.
#[derive(Debug, Serialize, Deserialize)]
pub struct CorpusPage {
    pub count: usize,
    pub words: Vec<CorpusWord>,
    pub success: bool,
    #[serde(default)]
    pub error: String,
    pub at: String,
}

enum Filled {
    /// A full page, already stored in the cache.
    Stored(Bytes),
    /// A short last page: served to this caller only, never stored.
    Partial(Bytes),
}

/// Cache of gzip-encoded corpus pages with single-flight fill.
pub struct CorpusPageCache {
    store: ResponseCache,
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    metrics: Metrics,
}

fn page_key(scheme: &str, offset: usize) -> String {
    format!("{}+{}", scheme, offset)
}

impl CorpusPageCache {
    pub fn new(max_entries: usize, metrics: Metrics) -> Self {
        Self {
            store: ResponseCache::new(max_entries),
            gates: Mutex::new(HashMap::new()),
            metrics,
        }
    }

    /// Number of pages currently cached.
    pub fn cached_pages(&self) -> usize {
        self.store.stats().entries
    }

    /// Serve the page at `offset`, filling the cache on a miss. At most
    /// one fill per key runs at a time; callers that arrive during a fill
    /// wait for it and read the stored result.
    pub async fn page(&self, pool: &HandlePool, scheme: &str, offset: usize) -> Result<Bytes> {
        let key = page_key(scheme, offset);

        if let Some(bytes) = self.store.get(&key) {
            self.metrics.record_cache_hit();
            return Ok(bytes);
        }

        let gate = {
            let mut gates = self.gates.lock();
            gates
                .entry(key.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        let result = {
            let _filling = gate.lock().await;

            // A concurrent filler may have stored the page while this
            // caller waited on the gate.
            if let Some(bytes) = self.store.get(&key) {
                self.metrics.record_cache_hit();
                Ok(bytes)
            } else {
                self.metrics.record_cache_miss();
                match self.fill(pool, scheme, offset).await {
                    Ok(Filled::Stored(bytes)) => {
                        self.store.set(key.clone(), bytes.clone());
                        Ok(bytes)
                    }
                    Ok(Filled::Partial(bytes)) => Ok(bytes),
                    Err(e) => Err(e),
                }
            }
        };

        let mut gates = self.gates.lock();
        // Only the map and this caller hold the gate: safe to forget.
        let idle = gates.get(&key).map(|entry| Arc::strong_count(entry) == 2).unwrap_or(false);
        if idle {
            gates.remove(&key);
        }

        result
    }

    async fn fill(&self, pool: &HandlePool, scheme: &str, offset: usize) -> Result<Filled> {
        let words = pool
            .with_handle(scheme, |handle| handle.learned_words(offset, DOWNLOAD_PAGE_SIZE))
            .await?;

        let count = words.len();
        let page = CorpusPage {
            count,
            words,
            success: true,
            error: String::new(),
            at: utc_now_string(),
        };

        let body = serde_json::to_vec(&page)?;
        let packed = Bytes::from(gzip_bytes(&body)?);

        if count < DOWNLOAD_PAGE_SIZE {
            debug!(scheme, offset, count, "short corpus page, bypassing cache");
            return Ok(Filled::Partial(packed));
        }

        Ok(Filled::Stored(packed))
    }
}
