//! Compressing decorator.

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::CacheError;
use crate::traits::{PutOptions, StorageBackend};

/// Gzip-compresses values on the way into the inner backend and
/// decompresses them on the way out.
///
/// Innermost decorator: whatever the adapter stores is always the
/// compressed form, and decompression is the first thing that happens
/// after the adapter returns. Gzip is lossless and self-delimiting, so no
/// external length hint is stored. Decompression failure (corrupted or
/// uncompressed legacy data) surfaces as a generic error.
pub struct Compressed {
    inner: Arc<dyn StorageBackend>,
}

impl Compressed {
    /// Wrap `inner` with gzip compression.
    #[must_use]
    pub fn new(inner: Arc<dyn StorageBackend>) -> Self {
        Self { inner }
    }
}

fn compress(value: &[u8]) -> Result<Vec<u8>, CacheError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(value)
        .context("gzip compression failed")?;
    Ok(encoder.finish().context("gzip compression failed")?)
}

fn decompress(value: &[u8]) -> Result<Vec<u8>, CacheError> {
    let mut decoder = GzDecoder::new(value);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .context("gzip decompression failed, stored value is not valid gzip")?;
    Ok(decompressed)
}

#[async_trait]
impl StorageBackend for Compressed {
    async fn put(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        options: &PutOptions,
    ) -> Result<(), CacheError> {
        let compressed = compress(value)?;
        self.inner.put(key, &compressed, ttl, options).await
    }

    async fn get(&self, key: &str, source: &str) -> Result<Bytes, CacheError> {
        let compressed = self.inner.get(key, source).await?;
        Ok(Bytes::from(decompress(&compressed)?))
    }

    fn fetch_source_set(&self, source: &str) -> String {
        self.inner.fetch_source_set(source)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
