//! Shared helpers for integration tests.

use std::sync::{Arc, Once};

use payload_cache::{
    CacheConfig, CacheService, CacheServiceBuilder, PutRequest, StatsSink,
};
use rand::Rng;
use rand::distributions::Alphanumeric;

static INIT: Once = Once::new();

/// Install a tracing subscriber once per test binary; `RUST_LOG` controls
/// verbosity.
fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Build a service over the in-process backend with a stats sink attached.
pub fn service_with(config: CacheConfig) -> (CacheService, Arc<StatsSink>) {
    init_tracing();
    let sink = Arc::new(StatsSink::new());
    let service = CacheServiceBuilder::new()
        .with_config(config)
        .with_metrics_sink(sink.clone())
        .build()
        .expect("default config must build");
    (service, sink)
}

/// Service with default limits.
pub fn default_service() -> (CacheService, Arc<StatsSink>) {
    service_with(CacheConfig::default())
}

/// Parse a batch request from its wire form.
pub fn put_request(json: &str) -> PutRequest {
    serde_json::from_str(json).expect("request fixture must parse")
}

/// Random key for tests exercising caller-supplied keys.
pub fn random_key(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("{prefix}-{suffix}")
}
