//! Fluent construction of a fully wired [`CacheService`].

use std::sync::Arc;

use tracing::info;

use crate::backends::MemoryBackend;
use crate::config::CacheConfig;
use crate::decorators::decorate;
use crate::error::CacheError;
use crate::metrics::{Metrics, MetricsSink, TelemetrySink};
use crate::service::CacheService;
use crate::traits::StorageBackend;

/// Builder wiring an adapter, the decorator chain and metrics sinks into a
/// ready [`CacheService`].
///
/// # Example
///
/// ```rust,no_run
/// use payload_cache::CacheServiceBuilder;
///
/// # async fn build() -> Result<(), payload_cache::CacheError> {
/// let service = CacheServiceBuilder::new()
///     .with_telemetry()
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct CacheServiceBuilder {
    config: CacheConfig,
    adapter: Option<Arc<dyn StorageBackend>>,
    sinks: Vec<Arc<dyn MetricsSink>>,
}

impl CacheServiceBuilder {
    /// Start from the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given configuration for limits, deadlines and routing.
    #[must_use]
    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Use the given storage adapter instead of the in-process default.
    ///
    /// The adapter is wrapped in the decorator chain during [`build`];
    /// pass the bare adapter, not an already-decorated one.
    ///
    /// [`build`]: CacheServiceBuilder::build
    #[must_use]
    pub fn with_backend(mut self, adapter: Arc<dyn StorageBackend>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Append a metrics sink; every event is broadcast to all sinks.
    #[must_use]
    pub fn with_metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Append a [`TelemetrySink`] emitting through the `metrics` facade.
    #[must_use]
    pub fn with_telemetry(self) -> Self {
        self.with_metrics_sink(Arc::new(TelemetrySink::new()))
    }

    /// Wire everything together.
    ///
    /// Without an explicit adapter, an in-process [`MemoryBackend`] routed
    /// by the configured partitions is used.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, e.g. an empty default
    /// partition name.
    pub fn build(self) -> Result<CacheService, CacheError> {
        let adapter = match self.adapter {
            Some(adapter) => adapter,
            None => Arc::new(MemoryBackend::new(self.config.source_sets()?)),
        };
        info!(
            backend = adapter.name(),
            compression = self.config.compression,
            sinks = self.sinks.len(),
            "Building cache service"
        );

        let metrics = Metrics::new(self.sinks);
        let backend = decorate(adapter, &self.config, metrics.clone());
        Ok(CacheService::new(backend, metrics, &self.config))
    }
}
