//! Payload-size-limiting decorator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CacheError;
use crate::traits::{PutOptions, StorageBackend};

/// Rejects writes whose payload exceeds the configured byte limit.
///
/// The rejection happens before the inner backend is invoked, and before
/// compression has changed the byte count, so the limit applies to what
/// the caller actually sent. Reads pass through untouched.
pub struct SizeLimited {
    inner: Arc<dyn StorageBackend>,
    max_size: usize,
}

impl SizeLimited {
    /// Wrap `inner`, rejecting writes larger than `max_size` bytes.
    #[must_use]
    pub fn new(inner: Arc<dyn StorageBackend>, max_size: usize) -> Self {
        Self { inner, max_size }
    }
}

#[async_trait]
impl StorageBackend for SizeLimited {
    async fn put(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        options: &PutOptions,
    ) -> Result<(), CacheError> {
        if value.len() > self.max_size {
            return Err(CacheError::PayloadTooLarge {
                size: value.len(),
                limit: self.max_size,
            });
        }
        self.inner.put(key, value, ttl, options).await
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
