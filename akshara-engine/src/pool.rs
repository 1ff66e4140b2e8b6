//! Per-scheme bounded pools of engine handles.
//!
//! A pool is a bounded set of idle handles filled at startup. `acquire`
//! waits for an idle handle up to a hard deadline, then falls back to
//! opening a fresh one so a burst never starves a caller. `release` (the
//! guard's drop) returns the handle if the pool has room and closes it
//! otherwise, which keeps the number of live pooled handles bounded.

use std::collections::{HashMap, VecDeque};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use akshara_core::config::DaemonConfig;
use akshara_core::error::{Error, Result};
use akshara_core::metrics::Metrics;
use akshara_core::traits::{Engine, EngineHandle};
use akshara_core::types::SchemeDetails;

/// How long `acquire` waits for an idle handle before opening a fresh one.
pub const ACQUIRE_DEADLINE: Duration = Duration::from_millis(800);

struct SchemePool {
    capacity: usize,
    idle: Mutex<VecDeque<Box<dyn EngineHandle>>>,
    available: Notify,
}

/// Pools of engine handles, one per scheme.
pub struct HandlePool {
    engine: Arc<dyn Engine>,
    pools: HashMap<String, SchemePool>,
    schemes: Vec<SchemeDetails>,
    metrics: Metrics,
}

impl HandlePool {
    /// Pre-fill one pool per scheme with `max_handle_count` handles each.
    pub fn new(engine: Arc<dyn Engine>, config: &DaemonConfig, metrics: Metrics) -> Result<Self> {
        let schemes = engine.scheme_details();
        let mut pools = HashMap::with_capacity(schemes.len());

        for scheme in &schemes {
            let capacity = config.max_handles_for(&scheme.identifier);
            let mut idle = VecDeque::with_capacity(capacity);

            for _ in 0..capacity {
                idle.push_back(engine.new_handle(&scheme.identifier)?);
                metrics.record_handle_created();
            }

            pools.insert(
                scheme.identifier.clone(),
                SchemePool { capacity, idle: Mutex::new(idle), available: Notify::new() },
            );
        }

        Ok(Self { engine, pools, schemes, metrics })
    }

    /// Schemes this pool serves, in engine discovery order.
    pub fn schemes(&self) -> &[SchemeDetails] {
        &self.schemes
    }

    pub fn scheme_details(&self, scheme: &str) -> Result<&SchemeDetails> {
        self.schemes
            .iter()
            .find(|s| s.identifier == scheme)
            .ok_or_else(|| Error::UnknownScheme(scheme.to_string()))
    }

    pub fn is_valid_scheme(&self, scheme: &str) -> bool {
        self.pools.contains_key(scheme)
    }

    /// Number of idle handles currently pooled for a scheme.
    pub fn idle_count(&self, scheme: &str) -> usize {
        self.pools.get(scheme).map(|p| p.idle.lock().len()).unwrap_or(0)
    }

    /// Take a handle, waiting up to [`ACQUIRE_DEADLINE`] for one to become
    /// idle before opening a fresh overflow handle.
    pub async fn acquire(&self, scheme: &str) -> Result<PooledHandle<'_>> {
        let slot = self
            .pools
            .get(scheme)
            .ok_or_else(|| Error::UnknownScheme(scheme.to_string()))?;

        let deadline = tokio::time::sleep(ACQUIRE_DEADLINE);
        tokio::pin!(deadline);

        loop {
            if let Some(handle) = slot.idle.lock().pop_front() {
                return Ok(PooledHandle { pool: self, slot, handle: Some(handle) });
            }

            tokio::select! {
                _ = slot.available.notified() => {}
                _ = &mut deadline => break,
            }
        }

        // Every pooled handle is busy: open a fresh one rather than keep
        // the caller waiting. The release path caps how many survive.
        debug!(scheme, "handle pool exhausted, opening overflow handle");
        let handle = self.engine.new_handle(scheme)?;
        self.metrics.record_handle_created();
        self.metrics.record_pool_overflow();

        Ok(PooledHandle { pool: self, slot, handle: Some(handle) })
    }

    /// Acquire a handle, run `f` on it and release it.
    pub async fn with_handle<T, F>(&self, scheme: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn EngineHandle) -> Result<T>,
    {
        let mut guard = self.acquire(scheme).await?;
        f(&mut *guard)
    }
}

/// An acquired handle. Dropping it returns the handle to its pool, or
/// closes it when the pool is already at capacity.
pub struct PooledHandle<'a> {
    pool: &'a HandlePool,
    slot: &'a SchemePool,
    handle: Option<Box<dyn EngineHandle>>,
}

impl std::fmt::Debug for PooledHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledHandle")
            .field("scheme", &self.handle.as_ref().map(|h| h.scheme()))
            .finish()
    }
}

impl Deref for PooledHandle<'_> {
    type Target = dyn EngineHandle;

    fn deref(&self) -> &Self::Target {
        self.handle.as_deref().expect("handle present until drop")
    }
}

impl DerefMut for PooledHandle<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.handle.as_deref_mut().expect("handle present until drop")
    }
}

impl Drop for PooledHandle<'_> {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else { return };

        let mut idle = self.slot.idle.lock();
        if idle.len() >= self.slot.capacity {
            drop(idle);
            drop(handle);
            self.pool.metrics.record_handle_closed();
            debug!("throwing away overflow handle");
            return;
        }

        idle.push_back(handle);
        drop(idle);
        self.slot.available.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use akshara_core::types::{
        AdvancedSuggestions, CorpusDetails, CorpusWord, LearnStatus, Suggestion, Symbol,
    };

    #[derive(Default)]
    struct Counters {
        created: AtomicUsize,
        closed: AtomicUsize,
    }

    struct StubEngine {
        counters: Arc<Counters>,
    }

    struct StubHandle {
        scheme: String,
        counters: Arc<Counters>,
    }

    impl Drop for StubHandle {
        fn drop(&mut self) {
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Engine for StubEngine {
        fn scheme_details(&self) -> Vec<SchemeDetails> {
            vec![SchemeDetails {
                identifier: "ml".into(),
                lang_code: "ml".into(),
                display_name: "Malayalam".into(),
                author: String::new(),
                compiled_date: String::new(),
                is_stable: true,
            }]
        }

        fn new_handle(&self, scheme: &str) -> Result<Box<dyn EngineHandle>> {
            self.counters.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StubHandle { scheme: scheme.to_string(), counters: self.counters.clone() }))
        }
    }

    impl EngineHandle for StubHandle {
        fn scheme(&self) -> &str {
            &self.scheme
        }
        fn transliterate(&mut self, _text: &str) -> Result<Vec<Suggestion>> {
            Ok(Vec::new())
        }
        fn transliterate_advanced(&mut self, _text: &str) -> Result<AdvancedSuggestions> {
            Ok(AdvancedSuggestions::default())
        }
        fn reverse_transliterate(&mut self, _text: &str) -> Result<Vec<Suggestion>> {
            Ok(Vec::new())
        }
        fn learn(&mut self, _word: &str, _weight: u64) -> Result<()> {
            Ok(())
        }
        fn train(&mut self, _pattern: &str, _word: &str) -> Result<()> {
            Ok(())
        }
        fn unlearn(&mut self, _word: &str) -> Result<()> {
            Ok(())
        }
        fn learn_from_file(&mut self, _path: &std::path::Path) -> Result<LearnStatus> {
            Ok(LearnStatus { total_words: 0, failed: 0 })
        }
        fn import(&mut self, _path: &std::path::Path) -> Result<()> {
            Ok(())
        }
        fn search_symbol_table(&mut self, _criteria: &Symbol) -> Result<Vec<Symbol>> {
            Ok(Vec::new())
        }
        fn corpus_details(&mut self) -> Result<CorpusDetails> {
            Ok(CorpusDetails { words_count: 0 })
        }
        fn learned_words(&mut self, _offset: usize, _limit: usize) -> Result<Vec<CorpusWord>> {
            Ok(Vec::new())
        }
        fn vst_path(&self) -> std::path::PathBuf {
            std::path::PathBuf::new()
        }
        fn suggestions_file_path(&self) -> std::path::PathBuf {
            std::path::PathBuf::new()
        }
    }

    fn pool_with_capacity(capacity: usize) -> (HandlePool, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let engine = Arc::new(StubEngine { counters: counters.clone() });
        let mut config = DaemonConfig::default();
        config.max_handle_count.insert("default".to_string(), capacity);
        let pool = HandlePool::new(engine, &config, Metrics::new()).unwrap();
        (pool, counters)
    }

    #[tokio::test]
    async fn acquire_and_release_keeps_pool_size() {
        let (pool, counters) = pool_with_capacity(2);
        assert_eq!(counters.created.load(Ordering::SeqCst), 2);
        assert_eq!(pool.idle_count("ml"), 2);

        {
            let _handle = pool.acquire("ml").await.unwrap();
            assert_eq!(pool.idle_count("ml"), 1);
        }

        assert_eq!(pool.idle_count("ml"), 2);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_scheme_is_rejected() {
        let (pool, _) = pool_with_capacity(1);
        let err = pool.acquire("xx").await.unwrap_err();
        assert!(matches!(err, Error::UnknownScheme(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_pool_overflows_after_deadline() {
        let (pool, counters) = pool_with_capacity(1);

        let held = pool.acquire("ml").await.unwrap();
        assert_eq!(pool.idle_count("ml"), 0);

        // Pool is drained, so this must wait out the deadline and then
        // open a fresh handle.
        let overflow = pool.acquire("ml").await.unwrap();
        assert_eq!(counters.created.load(Ordering::SeqCst), 2);

        drop(held);
        assert_eq!(pool.idle_count("ml"), 1);

        // Pool is full again, so the overflow handle is closed on release.
        drop(overflow);
        assert_eq!(pool.idle_count("ml"), 1);
        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn with_handle_releases_on_error() {
        let (pool, _) = pool_with_capacity(1);

        let result: Result<()> = pool
            .with_handle("ml", |_| Err(Error::bad_request("boom")))
            .await;
        assert!(result.is_err());
        assert_eq!(pool.idle_count("ml"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_picks_up_released_handle() {
        let (pool, counters) = pool_with_capacity(1);
        let pool = Arc::new(pool);

        let held = pool.acquire("ml").await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move {
                let _h = pool.acquire("ml").await.unwrap();
            })
        };

        tokio::task::yield_now().await;
        drop(held);
        waiter.await.unwrap();

        // The released handle satisfied the waiter; nothing extra opened.
        assert_eq!(counters.created.load(Ordering::SeqCst), 1);
    }
}
