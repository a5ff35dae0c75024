//! # payload-cache
//!
//! A caching facade for short-lived XML and JSON payloads: callers store a
//! batch of values, receive one opaque identifier per value, and anyone
//! holding an identifier can fetch the payload back with its content type
//! reconstructed.
//!
//! The crate is the layer between a wire protocol and a storage engine:
//!
//! - **Adapters** ([`backends`]) translate the uniform [`StorageBackend`]
//!   contract to a concrete engine: in-process map, Redis, or Moka.
//! - **Decorators** ([`decorators`]) wrap any adapter with cross-cutting
//!   policy in a fixed order: metrics, payload-size limiting, TTL
//!   clamping, gzip compression.
//! - **Orchestration** ([`service`]) validates requests, mints UUID
//!   identifiers, applies uniform deadlines, and maps failures onto the
//!   [`CacheError`] taxonomy.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use payload_cache::{CacheServiceBuilder, GetQuery, PutRequest};
//!
//! # async fn run() -> Result<(), payload_cache::CacheError> {
//! let service = CacheServiceBuilder::new().with_telemetry().build()?;
//!
//! let request: PutRequest = serde_json::from_str(
//!     r#"{"puts": [{"type": "json", "ttlseconds": 300, "value": {"bid": 1}}]}"#,
//! )
//! .unwrap();
//! let response = service.put(&request).await?;
//! let uuid = response.responses[0].uuid.clone();
//!
//! let fetched = service.get(&GetQuery::by_uuid(uuid)).await?;
//! assert_eq!(fetched.content_type(), "application/json");
//! # Ok(())
//! # }
//! ```
//!
//! ## Reads hide their failure mode
//!
//! Identifiers are unguessable capability tokens. A read that fails for
//! any reason other than malformed input should look like a miss to the
//! outside; [`CacheError::read_status`] implements that collapse while the
//! full taxonomy stays available for logs and metrics.
//!
//! ## Feature flags
//!
//! - `redis` *(default)*: the Redis adapter.
//! - `moka` *(default)*: the Moka in-process adapter.

pub mod backends;
pub mod builder;
pub mod config;
pub mod decorators;
pub mod error;
pub mod metrics;
pub mod payload;
pub mod service;
pub mod traits;

pub use builder::CacheServiceBuilder;
pub use config::CacheConfig;
#[cfg(feature = "redis")]
pub use config::RedisConfig;
pub use error::CacheError;
pub use metrics::{Metrics, MetricsSink, StatsSink, TelemetrySink};
pub use payload::PayloadKind;
pub use service::{
    CacheService, FetchedPayload, GetQuery, PutRequest, PutResponse, PutResponseObject, UUID_LENGTH,
};
pub use traits::{PutOptions, SourceSets, StorageBackend};

pub use async_trait::async_trait;
