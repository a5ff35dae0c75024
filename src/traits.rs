//! Storage backend contract.
//!
//! This module defines the uniform interface every storage adapter
//! implements, the per-request write options carried alongside each put,
//! and the static logical-source → physical-partition lookup shared by
//! adapters and decorators.
//!
//! # Architecture
//!
//! - [`StorageBackend`]: the minimal contract (put / get / source routing)
//! - [`PutOptions`]: per-request overrides, falling back to adapter config
//! - [`SourceSets`]: read-only source → partition mapping with a default
//!
//! # Example: custom adapter
//!
//! ```rust,ignore
//! use payload_cache::{StorageBackend, PutOptions, CacheError, async_trait};
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! struct MyBackend { /* client handle, SourceSets */ }
//!
//! #[async_trait]
//! impl StorageBackend for MyBackend {
//!     async fn put(&self, key: &str, value: &[u8], ttl: Duration, options: &PutOptions) -> Result<(), CacheError> {
//!         // translate to the native client; opaque failures via CacheError::Internal
//!     }
//!
//!     async fn get(&self, key: &str, source: &str) -> Result<Bytes, CacheError> {
//!         // translate the native "absent" signal to CacheError::KeyNotFound
//!     }
//!
//!     fn fetch_source_set(&self, source: &str) -> String {
//!         // usually delegates to a SourceSets held by the adapter
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Per-request write options.
///
/// Carried alongside each write; zero/unset fields fall back to the
/// adapter-level configuration. Ephemeral; it lives for one request only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutOptions {
    /// Logical source name, resolved to a physical partition by the adapter.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    /// Per-write timeout override in milliseconds. `0` = use adapter config.
    #[serde(default, skip_serializing_if = "u64_is_zero")]
    pub write_timeout_ms: u64,
    /// Per-write retry override. `0` = use adapter config.
    #[serde(default, skip_serializing_if = "u32_is_zero")]
    pub write_retries: u32,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn u64_is_zero(n: &u64) -> bool {
    *n == 0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn u32_is_zero(n: &u32) -> bool {
    *n == 0
}

/// Uniform interface every storage adapter implements.
///
/// Adapters translate their native client errors into exactly one
/// distinguished signal ([`CacheError::KeyNotFound`] on a read miss) and
/// wrap everything else opaquely in [`CacheError::Internal`]. The contract
/// mandates nothing else about error shapes.
///
/// # Thread safety
///
/// Implementations must be `Send + Sync`; every inbound request is handled
/// concurrently and adapters are shared behind an `Arc`.
///
/// # Cancellation
///
/// Every call arrives wrapped in a caller-supplied deadline. Adapters must
/// return promptly when the surrounding future is dropped rather than
/// blocking past the deadline.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Persist `value` under `key` in the partition resolved from
    /// `options.source`, expiring after `ttl`.
    ///
    /// `key` and `value` are non-empty by the time they reach an adapter;
    /// the orchestration layer rejects empty input before the chain.
    async fn put(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
        options: &PutOptions,
    ) -> Result<(), CacheError>;

    /// Fetch the value stored under `key` from the partition resolved from
    /// `source`.
    ///
    /// # Errors
    ///
    /// [`CacheError::KeyNotFound`] when absent; anything else is an opaque
    /// adapter failure.
    async fn get(&self, key: &str, source: &str) -> Result<Bytes, CacheError>;

    /// Resolve a logical source name to a physical partition name.
    ///
    /// Pure and total: deterministic, side-effect-free, and never empty.
    /// Unmapped (and empty) sources resolve to the configured default. The
    /// metrics decorator and the orchestration layer call this
    /// independently of `put`/`get` and must agree with the adapter.
    fn fetch_source_set(&self, source: &str) -> String;

    /// Adapter name for logging and diagnostics.
    fn name(&self) -> &'static str {
        "unknown"
    }
}

/// Static lookup from logical source names to physical partition names.
///
/// Configured once at startup and read-only thereafter. Many logical
/// sources may map to one physical partition; anything unmapped falls back
/// to the default.
#[derive(Debug, Clone)]
pub struct SourceSets {
    sets: HashMap<String, String>,
    default_set: String,
}

impl SourceSets {
    /// Build the mapping. `default_set` must be non-empty so that
    /// resolution stays total.
    ///
    /// # Errors
    ///
    /// Returns an error if `default_set` is empty.
    pub fn new(
        sets: HashMap<String, String>,
        default_set: impl Into<String>,
    ) -> Result<Self, CacheError> {
        let default_set = default_set.into();
        if default_set.is_empty() {
            return Err(CacheError::BadRequest(
                "default partition name must not be empty".to_string(),
            ));
        }
        Ok(Self { sets, default_set })
    }

    /// Resolve a logical source to its partition, falling back to the
    /// default for unmapped or empty sources.
    #[must_use]
    pub fn resolve(&self, source: &str) -> &str {
        match self.sets.get(source) {
            Some(set) if !set.is_empty() => set,
            _ => &self.default_set,
        }
    }

    /// The configured default partition.
    #[must_use]
    pub fn default_set(&self) -> &str {
        &self.default_set
    }
}

impl Default for SourceSets {
    fn default() -> Self {
        Self {
            sets: HashMap::new(),
            default_set: "cache".to_string(),
        }
    }
}
