//! Storage adapter implementations.
//!
//! Each adapter is a thin translation from the uniform
//! [`StorageBackend`](crate::traits::StorageBackend) contract to one
//! concrete engine. The core never depends on a specific adapter; the
//! decorator chain wraps whichever one the builder selects.
//!
//! # Available adapters
//!
//! ## In-process
//! - [`MemoryBackend`]: mutex-guarded map, the default for tests and
//!   single-process use
//! - [`MokaBackend`]: bounded capacity with automatic eviction
//!   (feature: `moka`)
//!
//! ## Distributed
//! - [`RedisBackend`]: Redis over a reconnecting `ConnectionManager`
//!   (feature: `redis`)

pub mod memory;

#[cfg(feature = "moka")]
pub mod moka_backend;

#[cfg(feature = "redis")]
pub mod redis;

pub use memory::MemoryBackend;

#[cfg(feature = "moka")]
pub use moka_backend::{MokaBackend, MokaBackendConfig};

#[cfg(feature = "redis")]
pub use redis::RedisBackend;
