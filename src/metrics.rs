//! Metrics reporting.
//!
//! The core only knows how to report named numeric events through the
//! narrow [`MetricsSink`] trait: counter increments (optionally tagged with
//! a partition name), duration samples and size samples. A
//! [`Metrics`] handle fans every event out to zero or more independently
//! configured sinks; sinks are appended at construction time only.
//!
//! Two engines ship with the crate: [`TelemetrySink`], which emits through
//! the `metrics` facade so any exporter the process installs picks the
//! events up, and [`StatsSink`], an in-process aggregator handy for tests
//! and health endpoints. Export pipelines themselves are out of scope.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

/// Receiver for named numeric events.
///
/// Implementations must not fail the calling operation and must not block
/// it meaningfully. Every method has a no-op default so a sink only
/// implements the events it cares about.
#[allow(unused_variables)]
pub trait MetricsSink: Send + Sync {
    // Request-level write events.

    /// A write request was received.
    fn record_put_total(&self) {}
    /// A write request was rejected as malformed.
    fn record_put_bad_request(&self) {}
    /// A write request failed server-side.
    fn record_put_error(&self) {}
    /// End-to-end duration of a successful write request.
    fn record_put_duration(&self, duration: Duration) {}

    // Request-level read events.

    /// A read request was received.
    fn record_get_total(&self) {}
    /// A read request was rejected as malformed.
    fn record_get_bad_request(&self) {}
    /// A read request failed.
    fn record_get_error(&self) {}
    /// End-to-end duration of a successful read request.
    fn record_get_duration(&self, duration: Duration) {}

    // Backend-level write events, tagged by physical partition.

    /// A stored value carried the XML prefix.
    fn record_put_backend_xml(&self, partition: &str) {}
    /// A stored value carried the JSON prefix.
    fn record_put_backend_json(&self, partition: &str) {}
    /// A stored value carried no recognized prefix.
    fn record_put_backend_invalid(&self, partition: &str) {}
    /// Duration of a successful backend write.
    fn record_put_backend_duration(&self, duration: Duration) {}
    /// A backend write failed.
    fn record_put_backend_error(&self, partition: &str) {}
    /// Size sample of a written payload, in bytes.
    fn record_put_backend_size(&self, size_bytes: f64) {}
    /// TTL sample carried by a backend write.
    fn record_put_backend_ttl(&self, ttl: Duration) {}

    // Backend-level read events, tagged by physical partition.

    /// A backend read was attempted.
    fn record_get_backend_total(&self, partition: &str) {}
    /// Duration of a successful backend read.
    fn record_get_backend_duration(&self, duration: Duration) {}
    /// A backend read failed.
    fn record_get_backend_error(&self, partition: &str) {}
    /// A backend read missed.
    fn record_key_not_found(&self, partition: &str) {}
    /// A backend read was attempted without a key.
    fn record_missing_key(&self, partition: &str) {}
}

/// Fan-out handle broadcasting every event to all configured sinks.
///
/// Cheap to clone; the sink list is immutable after construction.
#[derive(Clone, Default)]
pub struct Metrics {
    engines: Arc<Vec<Arc<dyn MetricsSink>>>,
}

macro_rules! fan_out {
    ($(#[$meta:meta])* $name:ident ( $($arg:ident : $ty:ty),* )) => {
        $(#[$meta])*
        pub fn $name(&self, $($arg: $ty),*) {
            for engine in self.engines.iter() {
                engine.$name($($arg),*);
            }
        }
    };
}

impl Metrics {
    /// Build a handle over the given sinks.
    #[must_use]
    pub fn new(engines: Vec<Arc<dyn MetricsSink>>) -> Self {
        Self {
            engines: Arc::new(engines),
        }
    }

    /// A handle with no sinks; every event is dropped.
    #[must_use]
    pub fn noop() -> Self {
        Self::default()
    }

    fan_out!(
        /// See [`MetricsSink::record_put_total`].
        record_put_total());
    fan_out!(
        /// See [`MetricsSink::record_put_bad_request`].
        record_put_bad_request());
    fan_out!(
        /// See [`MetricsSink::record_put_error`].
        record_put_error());
    fan_out!(
        /// See [`MetricsSink::record_put_duration`].
        record_put_duration(duration: Duration));
    fan_out!(
        /// See [`MetricsSink::record_get_total`].
        record_get_total());
    fan_out!(
        /// See [`MetricsSink::record_get_bad_request`].
        record_get_bad_request());
    fan_out!(
        /// See [`MetricsSink::record_get_error`].
        record_get_error());
    fan_out!(
        /// See [`MetricsSink::record_get_duration`].
        record_get_duration(duration: Duration));
    fan_out!(
        /// See [`MetricsSink::record_put_backend_xml`].
        record_put_backend_xml(partition: &str));
    fan_out!(
        /// See [`MetricsSink::record_put_backend_json`].
        record_put_backend_json(partition: &str));
    fan_out!(
        /// See [`MetricsSink::record_put_backend_invalid`].
        record_put_backend_invalid(partition: &str));
    fan_out!(
        /// See [`MetricsSink::record_put_backend_duration`].
        record_put_backend_duration(duration: Duration));
    fan_out!(
        /// See [`MetricsSink::record_put_backend_error`].
        record_put_backend_error(partition: &str));
    fan_out!(
        /// See [`MetricsSink::record_put_backend_size`].
        record_put_backend_size(size_bytes: f64));
    fan_out!(
        /// See [`MetricsSink::record_put_backend_ttl`].
        record_put_backend_ttl(ttl: Duration));
    fan_out!(
        /// See [`MetricsSink::record_get_backend_total`].
        record_get_backend_total(partition: &str));
    fan_out!(
        /// See [`MetricsSink::record_get_backend_duration`].
        record_get_backend_duration(duration: Duration));
    fan_out!(
        /// See [`MetricsSink::record_get_backend_error`].
        record_get_backend_error(partition: &str));
    fan_out!(
        /// See [`MetricsSink::record_key_not_found`].
        record_key_not_found(partition: &str));
    fan_out!(
        /// See [`MetricsSink::record_missing_key`].
        record_missing_key(partition: &str));
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("engines", &self.engines.len())
            .finish()
    }
}

// Metric names emitted through the `metrics` facade.
const PUT_REQUEST_TOTAL: &str = "payload_cache_put_request_total";
const PUT_BAD_REQUEST_TOTAL: &str = "payload_cache_put_bad_request_total";
const PUT_ERROR_TOTAL: &str = "payload_cache_put_error_total";
const PUT_DURATION: &str = "payload_cache_put_request_duration_seconds";
const GET_REQUEST_TOTAL: &str = "payload_cache_get_request_total";
const GET_BAD_REQUEST_TOTAL: &str = "payload_cache_get_bad_request_total";
const GET_ERROR_TOTAL: &str = "payload_cache_get_error_total";
const GET_DURATION: &str = "payload_cache_get_request_duration_seconds";
const PUT_BACKEND_XML_TOTAL: &str = "payload_cache_put_backend_xml_total";
const PUT_BACKEND_JSON_TOTAL: &str = "payload_cache_put_backend_json_total";
const PUT_BACKEND_INVALID_TOTAL: &str = "payload_cache_put_backend_invalid_total";
const PUT_BACKEND_DURATION: &str = "payload_cache_put_backend_duration_seconds";
const PUT_BACKEND_ERROR_TOTAL: &str = "payload_cache_put_backend_error_total";
const PUT_BACKEND_SIZE: &str = "payload_cache_put_backend_size_bytes";
const PUT_BACKEND_TTL: &str = "payload_cache_put_backend_ttl_seconds";
const GET_BACKEND_TOTAL: &str = "payload_cache_get_backend_total";
const GET_BACKEND_DURATION: &str = "payload_cache_get_backend_duration_seconds";
const GET_BACKEND_ERROR_TOTAL: &str = "payload_cache_get_backend_error_total";
const KEY_NOT_FOUND_TOTAL: &str = "payload_cache_get_backend_key_not_found_total";
const MISSING_KEY_TOTAL: &str = "payload_cache_get_backend_missing_key_total";

/// Sink emitting through the [`metrics`] facade crate.
///
/// Whatever recorder/exporter the embedding process installs receives the
/// events; without one, the macros are no-ops. Metric descriptions are
/// registered once at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetrySink;

impl TelemetrySink {
    /// Create the sink and register metric descriptions.
    #[must_use]
    pub fn new() -> Self {
        metrics::describe_counter!(PUT_REQUEST_TOTAL, "Total number of write requests.");
        metrics::describe_counter!(PUT_BAD_REQUEST_TOTAL, "Write requests rejected as malformed.");
        metrics::describe_counter!(PUT_ERROR_TOTAL, "Write requests failed server-side.");
        metrics::describe_histogram!(
            PUT_DURATION,
            metrics::Unit::Seconds,
            "Duration of successful write requests."
        );
        metrics::describe_counter!(GET_REQUEST_TOTAL, "Total number of read requests.");
        metrics::describe_counter!(GET_BAD_REQUEST_TOTAL, "Read requests rejected as malformed.");
        metrics::describe_counter!(GET_ERROR_TOTAL, "Read requests failed.");
        metrics::describe_histogram!(
            GET_DURATION,
            metrics::Unit::Seconds,
            "Duration of successful read requests."
        );
        metrics::describe_counter!(PUT_BACKEND_XML_TOTAL, "Backend writes carrying XML payloads.");
        metrics::describe_counter!(PUT_BACKEND_JSON_TOTAL, "Backend writes carrying JSON payloads.");
        metrics::describe_counter!(
            PUT_BACKEND_INVALID_TOTAL,
            "Backend writes carrying an unrecognized payload prefix."
        );
        metrics::describe_histogram!(
            PUT_BACKEND_DURATION,
            metrics::Unit::Seconds,
            "Duration of successful backend writes."
        );
        metrics::describe_counter!(PUT_BACKEND_ERROR_TOTAL, "Failed backend writes.");
        metrics::describe_histogram!(
            PUT_BACKEND_SIZE,
            metrics::Unit::Bytes,
            "Size of written payloads."
        );
        metrics::describe_histogram!(
            PUT_BACKEND_TTL,
            metrics::Unit::Seconds,
            "TTL carried by backend writes."
        );
        metrics::describe_counter!(GET_BACKEND_TOTAL, "Attempted backend reads.");
        metrics::describe_histogram!(
            GET_BACKEND_DURATION,
            metrics::Unit::Seconds,
            "Duration of successful backend reads."
        );
        metrics::describe_counter!(GET_BACKEND_ERROR_TOTAL, "Failed backend reads.");
        metrics::describe_counter!(KEY_NOT_FOUND_TOTAL, "Backend reads that missed.");
        metrics::describe_counter!(MISSING_KEY_TOTAL, "Backend reads attempted without a key.");
        Self
    }
}

impl MetricsSink for TelemetrySink {
    fn record_put_total(&self) {
        metrics::counter!(PUT_REQUEST_TOTAL).increment(1);
    }

    fn record_put_bad_request(&self) {
        metrics::counter!(PUT_BAD_REQUEST_TOTAL).increment(1);
    }

    fn record_put_error(&self) {
        metrics::counter!(PUT_ERROR_TOTAL).increment(1);
    }

    fn record_put_duration(&self, duration: Duration) {
        metrics::histogram!(PUT_DURATION).record(duration.as_secs_f64());
    }

    fn record_get_total(&self) {
        metrics::counter!(GET_REQUEST_TOTAL).increment(1);
    }

    fn record_get_bad_request(&self) {
        metrics::counter!(GET_BAD_REQUEST_TOTAL).increment(1);
    }

    fn record_get_error(&self) {
        metrics::counter!(GET_ERROR_TOTAL).increment(1);
    }

    fn record_get_duration(&self, duration: Duration) {
        metrics::histogram!(GET_DURATION).record(duration.as_secs_f64());
    }

    fn record_put_backend_xml(&self, partition: &str) {
        metrics::counter!(PUT_BACKEND_XML_TOTAL, "partition" => partition.to_string()).increment(1);
    }

    fn record_put_backend_json(&self, partition: &str) {
        metrics::counter!(PUT_BACKEND_JSON_TOTAL, "partition" => partition.to_string())
            .increment(1);
    }

    fn record_put_backend_invalid(&self, partition: &str) {
        metrics::counter!(PUT_BACKEND_INVALID_TOTAL, "partition" => partition.to_string())
            .increment(1);
    }

    fn record_put_backend_duration(&self, duration: Duration) {
        metrics::histogram!(PUT_BACKEND_DURATION).record(duration.as_secs_f64());
    }

    fn record_put_backend_error(&self, partition: &str) {
        metrics::counter!(PUT_BACKEND_ERROR_TOTAL, "partition" => partition.to_string())
            .increment(1);
    }

    fn record_put_backend_size(&self, size_bytes: f64) {
        metrics::histogram!(PUT_BACKEND_SIZE).record(size_bytes);
    }

    fn record_put_backend_ttl(&self, ttl: Duration) {
        metrics::histogram!(PUT_BACKEND_TTL).record(ttl.as_secs_f64());
    }

    fn record_get_backend_total(&self, partition: &str) {
        metrics::counter!(GET_BACKEND_TOTAL, "partition" => partition.to_string()).increment(1);
    }

    fn record_get_backend_duration(&self, duration: Duration) {
        metrics::histogram!(GET_BACKEND_DURATION).record(duration.as_secs_f64());
    }

    fn record_get_backend_error(&self, partition: &str) {
        metrics::counter!(GET_BACKEND_ERROR_TOTAL, "partition" => partition.to_string())
            .increment(1);
    }

    fn record_key_not_found(&self, partition: &str) {
        metrics::counter!(KEY_NOT_FOUND_TOTAL, "partition" => partition.to_string()).increment(1);
    }

    fn record_missing_key(&self, partition: &str) {
        metrics::counter!(MISSING_KEY_TOTAL, "partition" => partition.to_string()).increment(1);
    }
}

/// In-process aggregating sink.
///
/// Counts every event in a concurrent map, keyed by event name (with the
/// partition appended for tagged events). Duration and size events count
/// samples; no percentile math happens here.
#[derive(Debug, Default)]
pub struct StatsSink {
    counters: DashMap<String, u64>,
}

impl StatsSink {
    /// Create an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self, name: &str) {
        *self.counters.entry(name.to_string()).or_insert(0) += 1;
    }

    fn bump_tagged(&self, name: &str, partition: &str) {
        *self
            .counters
            .entry(format!("{name}:{partition}"))
            .or_insert(0) += 1;
    }

    /// Current value of a counter, `0` if never bumped. Tagged events are
    /// addressed as `"<name>:<partition>"`.
    #[must_use]
    pub fn count(&self, name: &str) -> u64 {
        self.counters.get(name).map_or(0, |v| *v)
    }

    /// Snapshot of all counters, for health endpoints and tests.
    #[must_use]
    pub fn snapshot(&self) -> std::collections::HashMap<String, u64> {
        self.counters
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}

impl MetricsSink for StatsSink {
    fn record_put_total(&self) {
        self.bump("put.request_count");
    }

    fn record_put_bad_request(&self) {
        self.bump("put.bad_request_count");
    }

    fn record_put_error(&self) {
        self.bump("put.error_count");
    }

    fn record_put_duration(&self, _duration: Duration) {
        self.bump("put.request_duration_count");
    }

    fn record_get_total(&self) {
        self.bump("get.request_count");
    }

    fn record_get_bad_request(&self) {
        self.bump("get.bad_request_count");
    }

    fn record_get_error(&self) {
        self.bump("get.error_count");
    }

    fn record_get_duration(&self, _duration: Duration) {
        self.bump("get.request_duration_count");
    }

    fn record_put_backend_xml(&self, partition: &str) {
        self.bump_tagged("put_backend.xml_request_count", partition);
    }

    fn record_put_backend_json(&self, partition: &str) {
        self.bump_tagged("put_backend.json_request_count", partition);
    }

    fn record_put_backend_invalid(&self, partition: &str) {
        self.bump_tagged("put_backend.invalid_request_count", partition);
    }

    fn record_put_backend_duration(&self, _duration: Duration) {
        self.bump("put_backend.request_duration_count");
    }

    fn record_put_backend_error(&self, partition: &str) {
        self.bump_tagged("put_backend.error_count", partition);
    }

    fn record_put_backend_size(&self, _size_bytes: f64) {
        self.bump("put_backend.request_size_count");
    }

    fn record_put_backend_ttl(&self, _ttl: Duration) {
        self.bump("put_backend.request_ttl_count");
    }

    fn record_get_backend_total(&self, partition: &str) {
        self.bump_tagged("get_backend.request_count", partition);
    }

    fn record_get_backend_duration(&self, _duration: Duration) {
        self.bump("get_backend.request_duration_count");
    }

    fn record_get_backend_error(&self, partition: &str) {
        self.bump_tagged("get_backend.error_count", partition);
    }

    fn record_key_not_found(&self, partition: &str) {
        self.bump_tagged("get_backend.key_not_found_count", partition);
    }

    fn record_missing_key(&self, partition: &str) {
        self.bump_tagged("get_backend.missing_key_count", partition);
    }
}
