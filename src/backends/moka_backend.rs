//! Moka storage adapter.
//!
//! Alternative in-process adapter with bounded capacity and automatic
//! eviction. Prefer this over [`MemoryBackend`](super::MemoryBackend) for
//! long-running single-process deployments where an unbounded map would
//! grow without limit.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use moka::future::Cache;
use tracing::{debug, info};

use crate::error::CacheError;
use crate::traits::{PutOptions, SourceSets, StorageBackend};

/// Record with its own expiry, checked on read.
///
/// Moka's cache-level TTL is an upper bound; the per-entry deadline is what
/// honors the caller's requested TTL exactly.
#[derive(Debug, Clone)]
struct StoredEntry {
    value: Bytes,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn new(value: Bytes, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: (!ttl.is_zero()).then(|| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() > expires_at)
    }
}

/// Configuration for [`MokaBackend`].
#[derive(Debug, Clone, Copy)]
pub struct MokaBackendConfig {
    /// Maximum number of records kept before eviction.
    pub max_capacity: u64,
    /// Cache-level upper bound on record lifetime.
    pub time_to_live: Duration,
    /// Idle timeout after which untouched records may be evicted.
    pub time_to_idle: Duration,
}

impl Default for MokaBackendConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            time_to_live: Duration::from_secs(3600),
            time_to_idle: Duration::from_secs(600),
        }
    }
}

/// In-process adapter over a Moka cache with automatic eviction.
pub struct MokaBackend {
    cache: Cache<String, StoredEntry>,
    sources: SourceSets,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    sets: Arc<AtomicU64>,
}

impl MokaBackend {
    /// Build the adapter with the given capacity/lifetime bounds.
    #[must_use]
    pub fn new(config: MokaBackendConfig, sources: SourceSets) -> Self {
        info!(capacity = config.max_capacity, "Initializing Moka backend");

        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(config.time_to_live)
            .time_to_idle(config.time_to_idle)
            .build();

        Self {
            cache,
            sources,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            sets: Arc::new(AtomicU64::new(0)),
        }
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

impl Default for MokaBackend {
    fn default() -> Self {
        Self::new(MokaBackendConfig::default(), SourceSets::default())
    }
}

#[async_trait]
impl StorageBackend for MokaBackend {
    async fn put(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        _options: &PutOptions,
    ) -> Result<(), CacheError> {
        let entry = StoredEntry::new(Bytes::copy_from_slice(value), ttl);
        self.cache.insert(key.to_string(), entry).await;
        self.sets.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, ttl_secs = %ttl.as_secs(), "[moka] stored key");
        Ok(())
    }

    async fn get(&self, key: &str, _source: &str) -> Result<Bytes, CacheError> {
        match self.cache.get(key).await {
            Some(entry) if entry.is_expired() => {
                self.cache.remove(key).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                Err(CacheError::KeyNotFound)
            }
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(entry.value)
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
        "moka"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip_and_miss() {
        let backend = MokaBackend::default();
        backend
            .put("id-1", b"json{}", Duration::from_secs(60), &PutOptions::default())
            .await
            .unwrap();

        assert_eq!(&backend.get("id-1", "").await.unwrap()[..], b"json{}");
        assert!(backend.get("absent", "").await.unwrap_err().is_key_not_found());
    }

    #[tokio::test]
    async fn per_entry_ttl_wins_over_cache_ttl() {
        let backend = MokaBackend::default();
        backend
            .put("short", b"jsonx", Duration::from_millis(10), &PutOptions::default())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(backend.get("short", "").await.unwrap_err().is_key_not_found());
    }
}
