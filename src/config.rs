//! Configuration structs.
//!
//! Plain serde-deserializable structs with sensible defaults; how they get
//! populated (file, env, flags) is the embedding process's concern, not
//! this crate's.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::traits::SourceSets;

fn default_max_ttl_seconds() -> u64 {
    3600
}

fn default_max_payload_size_bytes() -> usize {
    10 * 1024
}

fn default_max_num_values() -> usize {
    10
}

fn default_request_timeout_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_partition() -> String {
    "cache".to_string()
}

/// Facade-level configuration: limits, routing, and request deadlines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Upper bound on the TTL any write may carry; requests above it are
    /// clamped, never rejected.
    #[serde(default = "default_max_ttl_seconds")]
    pub max_ttl_seconds: u64,

    /// Upper bound on stored payload size in bytes; writes above it are
    /// rejected before reaching the adapter.
    #[serde(default = "default_max_payload_size_bytes")]
    pub max_payload_size_bytes: usize,

    /// Maximum number of items accepted in one batch write.
    #[serde(default = "default_max_num_values")]
    pub max_num_values: usize,

    /// Whether callers may supply their own keys instead of receiving a
    /// generated identifier. Also relaxes the fixed-length check on reads.
    #[serde(default)]
    pub allow_setting_keys: bool,

    /// Uniform per-backend-call deadline in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Whether stored values are gzip-compressed.
    #[serde(default = "default_true")]
    pub compression: bool,

    /// Physical partition used for unmapped or empty logical sources.
    #[serde(default = "default_partition")]
    pub default_partition: String,

    /// Logical source name → physical partition name. Read-only after
    /// startup; many sources may share one partition.
    #[serde(default)]
    pub partitions: HashMap<String, String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_ttl_seconds: default_max_ttl_seconds(),
            max_payload_size_bytes: default_max_payload_size_bytes(),
            max_num_values: default_max_num_values(),
            allow_setting_keys: false,
            request_timeout_ms: default_request_timeout_ms(),
            compression: true,
            default_partition: default_partition(),
            partitions: HashMap::new(),
        }
    }
}

impl CacheConfig {
    /// Per-backend-call deadline as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Maximum TTL as a [`Duration`].
    #[must_use]
    pub fn max_ttl(&self) -> Duration {
        Duration::from_secs(self.max_ttl_seconds)
    }

    /// Build the source → partition lookup shared by adapters.
    ///
    /// # Errors
    ///
    /// Returns an error if the default partition name is empty.
    pub fn source_sets(&self) -> Result<SourceSets, CacheError> {
        SourceSets::new(self.partitions.clone(), self.default_partition.clone())
    }
}

/// Redis adapter configuration.
#[cfg(feature = "redis")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Connection string, e.g. `redis://127.0.0.1:6379`.
    pub url: String,
    /// Default per-write timeout in milliseconds. `0` = bounded only by the
    /// request deadline.
    #[serde(default)]
    pub write_timeout_ms: u64,
    /// Default number of additional write attempts after a failure.
    #[serde(default)]
    pub write_retries: u32,
}

#[cfg(feature = "redis")]
impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            write_timeout_ms: 0,
            write_retries: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let cfg = CacheConfig::default();
        assert_eq!(cfg.max_ttl_seconds, 3600);
        assert_eq!(cfg.max_payload_size_bytes, 10 * 1024);
        assert_eq!(cfg.max_num_values, 10);
        assert!(!cfg.allow_setting_keys);
        assert_eq!(cfg.request_timeout(), Duration::from_millis(500));
        assert!(cfg.compression);
    }

    #[test]
    fn partial_config_deserializes_over_defaults() {
        let cfg: CacheConfig = serde_json::from_str(
            r#"{"max_payload_size_bytes": 5, "partitions": {"app": "hot"}}"#,
        )
        .unwrap();
        assert_eq!(cfg.max_payload_size_bytes, 5);
        assert_eq!(cfg.max_ttl_seconds, 3600);
        let sources = cfg.source_sets().unwrap();
        assert_eq!(sources.resolve("app"), "hot");
        assert_eq!(sources.resolve("other"), "cache");
    }
}
