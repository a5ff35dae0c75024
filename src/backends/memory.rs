//! In-process storage adapter backed by a mutex-guarded map.
//!
//! The default adapter for tests and single-process deployments. Entries
//! carry their own expiry and are dropped lazily on read (plus an explicit
//! [`MemoryBackend::cleanup_expired`] sweep, since a plain map has no
//! eviction of its own).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::CacheError;
use crate::traits::{PutOptions, SourceSets, StorageBackend};

/// Stored record with expiration tracking.
#[derive(Debug, Clone)]
struct StoredEntry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn new(value: Bytes, ttl: Duration) -> Self {
        Self {
            value,
            // A zero TTL delegates expiry to the engine; a plain map has no
            // engine default, so such entries simply never expire here.
            expires_at: (!ttl.is_zero()).then(|| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() > expires_at)
    }
}

/// In-process adapter over a mutex-guarded `HashMap`.
///
/// Concurrent reads and writes serialize on the lock; every critical
/// section is a single map operation, so the lock is held only for the
/// lookup/insert itself. Values are [`Bytes`], so returning a hit clones a
/// refcount, not the payload.
pub struct MemoryBackend {
    store: Mutex<HashMap<String, StoredEntry>>,
    sources: SourceSets,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    sets: Arc<AtomicU64>,
}

impl MemoryBackend {
    /// Create an empty in-process backend with the given source routing.
    #[must_use]
    pub fn new(sources: SourceSets) -> Self {
        info!("Initializing memory backend");
        Self {
            store: Mutex::new(HashMap::new()),
            sources,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            sets: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Drop expired entries. Call periodically; reads also drop expired
    /// entries they encounter.
    pub fn cleanup_expired(&self) -> usize {
        let mut removed = 0;
        self.store.lock().retain(|_, entry| {
            if entry.is_expired() {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            debug!(count = removed, "[memory] cleaned up expired entries");
        }
        removed
    }

    /// Number of live (possibly expired but unswept) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    /// (hits, misses, sets) counters.
    #[must_use]
    pub fn stats(&self) -> (u64, u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.sets.load(Ordering::Relaxed),
        )
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(SourceSets::default())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn put(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        _options: &PutOptions,
    ) -> Result<(), CacheError> {
        let entry = StoredEntry::new(Bytes::copy_from_slice(value), ttl);
        self.store.lock().insert(key.to_string(), entry);
        self.sets.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, ttl_secs = %ttl.as_secs(), "[memory] stored key");
        Ok(())
    }

    async fn get(&self, key: &str, _source: &str) -> Result<Bytes, CacheError> {
        let mut store = self.store.lock();
        match store.get(key) {
            Some(entry) if entry.is_expired() => {
                store.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                Err(CacheError::KeyNotFound)
            }
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(entry.value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Err(CacheError::KeyNotFound)
            }
        }
    }

    fn fetch_source_set(&self, source: &str) -> String {
        self.sources.resolve(source).to_string()
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
