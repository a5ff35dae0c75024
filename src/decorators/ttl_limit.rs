//! TTL-limiting decorator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CacheError;
use crate::traits::{PutOptions, StorageBackend};

/// Ensures the inner backend never sees a TTL above the configured maximum.
///
/// Writes carry `min(requested, max)`; reads pass through untouched. This
/// sits directly above compression so every write path, whatever wrapped
/// it further out, is bounded before it reaches the adapter.
pub struct TtlLimited {
    inner: Arc<dyn StorageBackend>,
    max_ttl: Duration,
}

impl TtlLimited {
    /// Wrap `inner`, clamping write TTLs to `max_ttl`.
    #[must_use]
    pub fn new(inner: Arc<dyn StorageBackend>, max_ttl: Duration) -> Self {
        Self { inner, max_ttl }
    }
}

#[async_trait]
impl StorageBackend for TtlLimited {
    async fn put(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        options: &PutOptions,
    ) -> Result<(), CacheError> {
        self.inner
            .put(key, value, ttl.min(self.max_ttl), options)
            .await
    }

    async fn get(&self, key: &str, source: &str) -> Result<Bytes, CacheError> {
        self.inner.get(key, source).await
    }

    fn fetch_source_set(&self, source: &str) -> String {
        self.inner.fetch_source_set(source)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
