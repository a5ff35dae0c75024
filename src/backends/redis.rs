//! Redis storage adapter.
//!
//! Distributed KV adapter over a `ConnectionManager` (automatic
//! reconnection). Logical sources map to physical partitions as key
//! prefixes, so many facade instances can share one Redis while keeping
//! partitions addressable.
//!
//! Retry policy lives entirely here: a write may be retried a configured
//! number of times with a configured per-attempt timeout, overridable per
//! request through [`PutOptions`]. Nothing above the adapter retries.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{debug, info, warn};

use crate::config::RedisConfig;
use crate::error::CacheError;
use crate::traits::{PutOptions, SourceSets, StorageBackend};

/// Base delay between write attempts; a random jitter of the same size is
/// added so concurrent retries do not synchronize.
const RETRY_BACKOFF: Duration = Duration::from_millis(20);

/// Redis adapter with partition-prefixed keys.
pub struct RedisBackend {
    conn_manager: ConnectionManager,
    sources: SourceSets,
    default_write_timeout: Duration,
    default_write_retries: u32,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    sets: Arc<AtomicU64>,
}

impl RedisBackend {
    /// Connect and verify the connection with a PING.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created or the initial
    /// connection or PING fails.
    pub async fn connect(cfg: &RedisConfig, sources: SourceSets) -> Result<Self, CacheError> {
        info!(redis_url = %cfg.url, "Initializing Redis backend with ConnectionManager");

        let client = Client::open(cfg.url.as_str())
            .with_context(|| format!("failed to create Redis client for {}", cfg.url))?;

        let conn_manager = ConnectionManager::new(client)
            .await
            .context("failed to establish Redis connection manager")?;

        let mut conn = conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis PING health check failed")?;

        info!(redis_url = %cfg.url, "Redis backend connected");

        Ok(Self {
            conn_manager,
            sources,
            default_write_timeout: Duration::from_millis(cfg.write_timeout_ms),
            default_write_retries: cfg.write_retries,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            sets: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Partition-prefixed physical key.
    fn physical_key(&self, key: &str, source: &str) -> String {
        format!("{}:{}", self.sources.resolve(source), key)
    }

    async fn write_once(
        &self,
        physical_key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), redis::RedisError> {
        let mut conn = self.conn_manager.clone();
        if ttl.is_zero() {
            // Zero TTL delegates expiry to the engine: store without one.
            conn.set(physical_key, value).await
        } else {
            conn.set_ex(physical_key, value, ttl.as_secs()).await
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

#[async_trait]
impl StorageBackend for RedisBackend {
    async fn put(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        options: &PutOptions,
    ) -> Result<(), CacheError> {
        let physical_key = self.physical_key(key, &options.source);

        let write_timeout = if options.write_timeout_ms > 0 {
            Duration::from_millis(options.write_timeout_ms)
        } else {
            self.default_write_timeout
        };
        let retries = if options.write_retries > 0 {
            options.write_retries
        } else {
            self.default_write_retries
        };

        let mut last_err: Option<anyhow::Error> = None;
        for attempt in 0..=retries {
            if attempt > 0 {
                let jitter_ms = rand::thread_rng().gen_range(0..=RETRY_BACKOFF.as_millis() as u64);
                tokio::time::sleep(RETRY_BACKOFF + Duration::from_millis(jitter_ms)).await;
            }

            let write = self.write_once(&physical_key, value, ttl);
            let outcome = if write_timeout.is_zero() {
                write.await.map_err(anyhow::Error::from)
            } else {
                match tokio::time::timeout(write_timeout, write).await {
                    Ok(result) => result.map_err(anyhow::Error::from),
                    Err(_) => Err(anyhow::anyhow!(
                        "write attempt timed out after {write_timeout:?}"
                    )),
                }
            };

            match outcome {
                Ok(()) => {
                    self.sets.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %physical_key, ttl_secs = %ttl.as_secs(), "[redis] stored key");
                    return Ok(());
                }
                Err(err) => {
                    warn!(key = %physical_key, attempt = attempt, error = %err, "[redis] write failed");
                    last_err = Some(err);
                }
            }
        }

        Err(CacheError::Internal(
            last_err.unwrap_or_else(|| anyhow::anyhow!("redis write failed")),
        ))
    }

    async fn get(&self, key: &str, source: &str) -> Result<Bytes, CacheError> {
        let physical_key = self.physical_key(key, source);
        let mut conn = self.conn_manager.clone();

        match conn.get::<_, Option<Vec<u8>>>(&physical_key).await {
            Ok(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Bytes::from(value))
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Err(CacheError::KeyNotFound)
            }
            Err(err) => Err(CacheError::Internal(
                anyhow::Error::from(err).context("redis get failed"),
            )),
        }
    }

    fn fetch_source_set(&self, source: &str) -> String {
        self.sources.resolve(source).to_string()
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
