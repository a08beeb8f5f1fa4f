//! Embedding Cache (spec §4.3): bounded LRU keyed by a hash of the input
//! text, with a TTL so stale entries from a long-lived process eventually
//! fall out even under heavy reuse of the same queries.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    vector: Vec<f32>,
    inserted_at: Instant,
}

/// Thread-safe, bounded, TTL'd cache from normalized query text to its
/// embedding vector. Shared behind an `Arc` by [`super::ProviderChain`]
/// callers so repeated searches for the same query skip re-embedding.
pub struct EmbeddingCache {
    inner: Mutex<LruCache<u64, Entry>>,
    ttl: Duration,
}

impl EmbeddingCache {
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_size.max(1)).unwrap();
        EmbeddingCache {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        let key = hash_key(text);
        let mut cache = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match cache.get(&key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => Some(entry.vector.clone()),
            Some(_) => {
                cache.pop(&key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, text: &str, vector: Vec<f32>) {
        let key = hash_key(text);
        let mut cache = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.put(
            key,
            Entry {
                vector,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry older than the configured TTL (spec's periodic
    /// cache-sweep job, §4.10).
    pub fn sweep_expired(&self) -> usize {
        let mut cache = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let expired: Vec<u64> = cache
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() > self.ttl)
            .map(|(k, _)| *k)
            .collect();
        let count = expired.len();
        for key in expired {
            cache.pop(&key);
        }
        count
    }
}

fn hash_key(text: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_returns_the_same_vector() {
        let cache = EmbeddingCache::new(8, Duration::from_secs(60));
        cache.put("hello", vec![1.0, 2.0]);
        assert_eq!(cache.get("hello"), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn miss_on_unknown_key() {
        let cache = EmbeddingCache::new(8, Duration::from_secs(60));
        assert_eq!(cache.get("nope"), None);
    }

    #[test]
    fn expired_entries_are_evicted_on_access() {
        let cache = EmbeddingCache::new(8, Duration::from_millis(1));
        cache.put("hello", vec![1.0]);
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.get("hello"), None);
    }

    #[test]
    fn eviction_respects_capacity() {
        let cache = EmbeddingCache::new(1, Duration::from_secs(60));
        cache.put("a", vec![1.0]);
        cache.put("b", vec![2.0]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(vec![2.0]));
    }

    #[test]
    fn sweep_expired_removes_only_stale_entries() {
        let cache = EmbeddingCache::new(8, Duration::from_millis(5));
        cache.put("stale", vec![1.0]);
        std::thread::sleep(Duration::from_millis(20));
        cache.put("fresh", vec![2.0]);
        let removed = cache.sweep_expired();
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 1);
    }
}
