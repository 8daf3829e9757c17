//! Bounded recency caches for headers, bodies and receipts.
//!
//! Block content never changes once stored, so entries are never invalidated;
//! they only fall out on eviction.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arbor_common::{BlockBody, BlockHash, BlockHeader, Receipt};
use lru::LruCache;

use crate::repository_config::RepositoryConfig;

/// Hit and miss counters of one cache.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// LRU map shared between threads.
pub struct SharedLru<K: Hash + Eq, V> {
    inner: Mutex<LruCache<K, Arc<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: Hash + Eq, V> SharedLru<K, V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up and mark as most recently used.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let found = self.inner.lock().unwrap().get(key).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn insert(&self, key: K, value: Arc<V>) {
        self.inner.lock().unwrap().put(key, value);
    }

    /// Check presence without touching recency or counters.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().unwrap().contains(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Counters of every block-content cache.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BlockCacheStats {
    pub headers: CacheStats,
    pub bodies: CacheStats,
    pub receipts: CacheStats,
}

/// The three block-content caches.
pub struct BlockCaches {
    pub headers: SharedLru<BlockHash, BlockHeader>,
    pub bodies: SharedLru<BlockHash, BlockBody>,
    pub receipts: SharedLru<BlockHash, Vec<Receipt>>,
}

impl BlockCaches {
    pub fn new(config: &RepositoryConfig) -> Self {
        Self {
            headers: SharedLru::new(config.header_cache_size),
            bodies: SharedLru::new(config.body_cache_size),
            receipts: SharedLru::new(config.receipt_cache_size),
        }
    }

    pub fn stats(&self) -> BlockCacheStats {
        BlockCacheStats {
            headers: self.headers.stats(),
            bodies: self.bodies.stats(),
            receipts: self.receipts.stats(),
        }
    }
}
