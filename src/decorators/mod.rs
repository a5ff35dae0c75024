//! Cross-cutting backend decorators.
//!
//! Each decorator wraps exactly one inner [`StorageBackend`] and re-exposes
//! the same contract, so adapters never know they are wrapped. Composition
//! order is fixed by [`decorate`], outermost to innermost:
//!
//! ```text
//! metrics → size-limit → ttl-limit → compression → adapter
//! ```
//!
//! - metrics outermost, so it observes true caller-facing latency and every
//!   failure injected by inner layers;
//! - size enforcement before compression changes the byte count, so the
//!   limit applies to the caller's actual payload;
//! - TTL clamping close to the adapter, so every write path is bounded;
//! - compression innermost, so the adapter always stores/retrieves the
//!   compressed form.
//!
//! Decorators hold no mutable state beyond their configured thresholds and
//! never retry; a failure at any layer short-circuits straight back up.

pub mod compression;
pub mod instrumented;
pub mod size_limit;
pub mod ttl_limit;

pub use compression::Compressed;
pub use instrumented::Instrumented;
pub use size_limit::SizeLimited;
pub use ttl_limit::TtlLimited;

use std::sync::Arc;

use crate::config::CacheConfig;
use crate::metrics::Metrics;
use crate::traits::StorageBackend;

/// Wrap an adapter in the full decorator chain in its fixed order.
#[must_use]
pub fn decorate(
    adapter: Arc<dyn StorageBackend>,
    cfg: &CacheConfig,
    metrics: Metrics,
) -> Arc<dyn StorageBackend> {
    let mut backend = adapter;
    if cfg.compression {
        backend = Arc::new(Compressed::new(backend));
    }
    backend = Arc::new(TtlLimited::new(backend, cfg.max_ttl()));
    backend = Arc::new(SizeLimited::new(backend, cfg.max_payload_size_bytes));
    Arc::new(Instrumented::new(backend, metrics))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared recording mock for decorator tests.

    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;

    use crate::error::CacheError;
    use crate::traits::{PutOptions, StorageBackend};

    /// One observed write.
    #[derive(Debug, Clone)]
    pub struct PutCall {
        pub key: String,
        pub value: Vec<u8>,
        pub ttl: Duration,
        pub options: PutOptions,
    }

    /// Backend that records every call and serves from an in-memory map.
    #[derive(Default)]
    pub struct RecordingBackend {
        pub puts: Mutex<Vec<PutCall>>,
        pub store: Mutex<HashMap<String, Bytes>>,
    }

    impl RecordingBackend {
        pub fn preload(&self, key: &str, value: &[u8]) {
            self.store
                .lock()
                .insert(key.to_string(), Bytes::copy_from_slice(value));
        }

        pub fn put_count(&self) -> usize {
            self.puts.lock().len()
        }

        pub fn last_put(&self) -> PutCall {
            self.puts.lock().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl StorageBackend for RecordingBackend {
        async fn put(
            &self,
            key: &str,
            value: &[u8],
            ttl: Duration,
            options: &PutOptions,
        ) -> Result<(), CacheError> {
            self.puts.lock().push(PutCall {
                key: key.to_string(),
                value: value.to_vec(),
                ttl,
                options: options.clone(),
            });
            self.store
                .lock()
                .insert(key.to_string(), Bytes::copy_from_slice(value));
            Ok(())
        }

        async fn get(&self, key: &str, _source: &str) -> Result<Bytes, CacheError> {
            self.store
                .lock()
                .get(key)
                .cloned()
                .ok_or(CacheError::KeyNotFound)
        }

        fn fetch_source_set(&self, source: &str) -> String {
            if source.is_empty() {
                "default-set".to_string()
            } else {
                format!("set-{source}")
            }
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }
}
