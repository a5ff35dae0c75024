//! Metrics-instrumenting decorator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CacheError;
use crate::metrics::Metrics;
use crate::payload::{self, PayloadKind};
use crate::traits::{PutOptions, StorageBackend};

/// Reports backend-level metrics for every call, tagged by the physical
/// partition resolved from the logical source.
///
/// Strictly observational: values, TTLs and errors pass through untouched.
/// This is the outermost decorator, so the durations it samples are the
/// true caller-facing latency including every inner layer, and the errors
/// it counts include failures injected by those layers.
pub struct Instrumented {
    inner: Arc<dyn StorageBackend>,
    metrics: Metrics,
}

impl Instrumented {
    /// Wrap `inner`, reporting into `metrics`.
    #[must_use]
    pub fn new(inner: Arc<dyn StorageBackend>, metrics: Metrics) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl StorageBackend for Instrumented {
    async fn put(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        options: &PutOptions,
    ) -> Result<(), CacheError> {
        let partition = self.inner.fetch_source_set(&options.source);

        match payload::classify(value) {
            Some(PayloadKind::Xml) => self.metrics.record_put_backend_xml(&partition),
            Some(PayloadKind::Json) => self.metrics.record_put_backend_json(&partition),
            None => self.metrics.record_put_backend_invalid(&partition),
        }
        #[allow(clippy::cast_precision_loss)]
        self.metrics.record_put_backend_size(value.len() as f64);
        self.metrics.record_put_backend_ttl(ttl);

        let start = Instant::now();
        let result = self.inner.put(key, value, ttl, options).await;
        match &result {
            Ok(()) => self.metrics.record_put_backend_duration(start.elapsed()),
            Err(_) => self.metrics.record_put_backend_error(&partition),
        }
        result
    }

    async fn get(&self, key: &str, source: &str) -> Result<Bytes, CacheError> {
        let partition = self.inner.fetch_source_set(source);
        self.metrics.record_get_backend_total(&partition);

        let start = Instant::now();
        let result = self.inner.get(key, source).await;
        match &result {
            Ok(_) => self.metrics.record_get_backend_duration(start.elapsed()),
            Err(err) => {
                match err {
                    CacheError::KeyNotFound => self.metrics.record_key_not_found(&partition),
                    CacheError::MissingKey => self.metrics.record_missing_key(&partition),
                    _ => {}
                }
                self.metrics.record_get_backend_error(&partition);
            }
        }
        result
    }

    fn fetch_source_set(&self, source: &str) -> String {
        self.inner.fetch_source_set(source)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decorators::testing::RecordingBackend;
    use crate::metrics::StatsSink;

    fn instrumented_over(
        adapter: Arc<RecordingBackend>,
    ) -> (Instrumented, Arc<StatsSink>) {
        let sink = Arc::new(StatsSink::new());
        let metrics = Metrics::new(vec![sink.clone()]);
        (Instrumented::new(adapter, metrics), sink)
    }

    #[tokio::test]
    async fn put_classifies_prefix_and_times_success() {
        let adapter = Arc::new(RecordingBackend::default());
        let (backend, sink) = instrumented_over(adapter.clone());

        backend
            .put("k1", b"json{}", Duration::from_secs(10), &PutOptions::default())
            .await
            .unwrap();
        backend
            .put(
                "k2",
                b"xml<x/>",
                Duration::from_secs(10),
                &PutOptions {
                    source: "app".to_string(),
                    ..PutOptions::default()
                },
            )
            .await
            .unwrap();
        backend
            .put("k3", b"garbage", Duration::from_secs(10), &PutOptions::default())
            .await
            .unwrap();

        assert_eq!(sink.count("put_backend.json_request_count:default-set"), 1);
        assert_eq!(sink.count("put_backend.xml_request_count:set-app"), 1);
        assert_eq!(sink.count("put_backend.invalid_request_count:default-set"), 1);
        assert_eq!(sink.count("put_backend.request_duration_count"), 3);
        assert_eq!(sink.count("put_backend.request_size_count"), 3);
        assert_eq!(sink.count("put_backend.request_ttl_count"), 3);
        assert_eq!(sink.count("put_backend.error_count:default-set"), 0);
        // The decorator altered nothing on the way down.
        assert_eq!(adapter.put_count(), 3);
        assert_eq!(adapter.last_put().value, b"garbage".to_vec());
    }

    #[tokio::test]
    async fn get_counts_misses_without_altering_the_error() {
        let adapter = Arc::new(RecordingBackend::default());
        let (backend, sink) = instrumented_over(adapter.clone());

        let err = backend.get("absent", "").await.unwrap_err();
        assert!(err.is_key_not_found());

        assert_eq!(sink.count("get_backend.request_count:default-set"), 1);
        assert_eq!(sink.count("get_backend.key_not_found_count:default-set"), 1);
        assert_eq!(sink.count("get_backend.error_count:default-set"), 1);
        assert_eq!(sink.count("get_backend.request_duration_count"), 0);
    }

    #[tokio::test]
    async fn get_times_success() {
        let adapter = Arc::new(RecordingBackend::default());
        adapter.preload("k", b"jsonv");
        let (backend, sink) = instrumented_over(adapter);

        assert_eq!(&backend.get("k", "app").await.unwrap()[..], b"jsonv");
        assert_eq!(sink.count("get_backend.request_count:set-app"), 1);
        assert_eq!(sink.count("get_backend.request_duration_count"), 1);
        assert_eq!(sink.count("get_backend.error_count:set-app"), 0);
    }
}
