//! Sharded LRU byte cache in front of the engine, keyed by namespaced
//! fingerprints. Partitioning across shards keeps lock contention off the
//! read path.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;

/// Joins the parts of a cached string list. Assumed to never occur inside
/// a cached value.
const STRING_SEPARATOR: &str = "<>";

/// Fingerprint for a plain transliteration answer.
pub fn tl_fingerprint(scheme: &str, input: &str) -> String {
    format!("tl-{}-{}", scheme, input)
}

/// Fingerprint for a reverse transliteration answer.
pub fn rtl_fingerprint(scheme: &str, input: &str) -> String {
    format!("rtl-{}-{}", scheme, input)
}

/// Fingerprint for an advanced transliteration answer.
pub fn atl_fingerprint(scheme: &str, input: &str) -> String {
    format!("atl-{}-{}", scheme, input)
}

struct CacheShard {
    lru: Mutex<LruCache<String, Bytes>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Sharded response cache
pub struct ResponseCache {
    shards: Vec<CacheShard>,
    shard_mask: usize,
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

impl ResponseCache {
    /// Create a cache sized for roughly `max_entries` values.
    /// Uses 16 shards by default for good concurrency.
    pub fn new(max_entries: usize) -> Self {
        Self::with_shards(max_entries, 16)
    }

    /// Create cache with custom shard count (must be power of 2)
    pub fn with_shards(max_entries: usize, num_shards: usize) -> Self {
        assert!(num_shards.is_power_of_two(), "shard count must be power of 2");

        let per_shard = std::cmp::max(16, max_entries / num_shards);

        let shards: Vec<_> = (0..num_shards)
            .map(|_| CacheShard {
                lru: Mutex::new(LruCache::new(NonZeroUsize::new(per_shard).unwrap())),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            })
            .collect();

        Self { shards, shard_mask: num_shards - 1 }
    }

    #[inline]
    fn shard_for(&self, key: &str) -> &CacheShard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let idx = (hasher.finish() as usize) & self.shard_mask;
        &self.shards[idx]
    }

    /// Get a raw value from cache
    #[inline]
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let shard = self.shard_for(key);
        let mut lru = shard.lru.lock();

        match lru.get(key) {
            Some(value) => {
                shard.hits.fetch_add(1, Ordering::Relaxed);
                Some(value.clone())
            }
            None => {
                shard.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert a raw value into cache
    #[inline]
    pub fn set(&self, key: String, value: Bytes) {
        let shard = self.shard_for(&key);
        shard.lru.lock().put(key, value);
    }

    /// Store a list of strings under one key.
    pub fn set_string(&self, key: String, parts: &[String]) {
        let joined = parts.join(STRING_SEPARATOR);
        self.set(key, Bytes::from(joined.into_bytes()));
    }

    /// Read back a list of strings stored with `set_string`.
    pub fn get_string(&self, key: &str) -> Option<Vec<String>> {
        let value = self.get(key)?;
        let text = String::from_utf8_lossy(&value);
        Some(text.split(STRING_SEPARATOR).map(str::to_string).collect())
    }

    /// Remove one key. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        let shard = self.shard_for(key);
        shard.lru.lock().pop(key).is_some()
    }

    /// Drop every cached value
    pub fn clear(&self) {
        for shard in &self.shards {
            shard.lru.lock().clear();
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();

        for shard in &self.shards {
            stats.entries += shard.lru.lock().len();
            stats.hits += shard.hits.load(Ordering::Relaxed);
            stats.misses += shard.misses.load(Ordering::Relaxed);
        }

        let total = stats.hits + stats.misses;
        stats.hit_rate = if total > 0 { stats.hits as f64 / total as f64 } else { 0.0 };

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_round_trip() {
        let cache = ResponseCache::new(1024);
        let key = tl_fingerprint("ml", "malayalam");
        cache.set_string(key.clone(), &["മലയാളം".to_string(), "മലയാലം".to_string()]);

        let back = cache.get_string(&key).unwrap();
        assert_eq!(back, vec!["മലയാളം", "മലയാലം"]);
    }

    #[test]
    fn single_part_round_trip() {
        let cache = ResponseCache::new(1024);
        cache.set_string("rtl-ml-x".to_string(), &["word".to_string()]);
        assert_eq!(cache.get_string("rtl-ml-x").unwrap(), vec!["word"]);
    }

    #[test]
    fn delete_makes_next_read_miss() {
        let cache = ResponseCache::new(1024);
        cache.set("tl-ml-a".to_string(), Bytes::from_static(b"cached"));
        assert!(cache.get("tl-ml-a").is_some());

        assert!(cache.delete("tl-ml-a"));
        assert!(cache.get("tl-ml-a").is_none());
        assert!(!cache.delete("tl-ml-a"));
    }

    #[test]
    fn clear_empties_every_shard() {
        let cache = ResponseCache::with_shards(1024, 8);
        for i in 0..100 {
            cache.set(format!("tl-ml-{}", i), Bytes::from_static(b"v"));
        }
        assert_eq!(cache.stats().entries, 100);

        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn eviction_under_pressure() {
        let cache = ResponseCache::with_shards(64, 4);
        for i in 0..10_000 {
            cache.set(format!("k{}", i), Bytes::from_static(b"v"));
        }
        assert!(cache.stats().entries <= 64 + 4 * 16);
    }

    #[test]
    fn stats_track_hits_and_misses() {
        let cache = ResponseCache::new(256);
        cache.set("a".to_string(), Bytes::from_static(b"1"));
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn fingerprints_are_namespaced() {
        assert_eq!(tl_fingerprint("ml", "car"), "tl-ml-car");
        assert_eq!(rtl_fingerprint("ml", "car"), "rtl-ml-car");
        assert_eq!(atl_fingerprint("ml", "car"), "atl-ml-car");
    }
}
