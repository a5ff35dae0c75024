//! Error taxonomy for the caching facade.
//!
//! Every failure that can cross the crate boundary is one of these variants.
//! Backend adapters surface exactly one distinguished signal ([`CacheError::KeyNotFound`]);
//! everything else an adapter produces is opaque and lands in [`CacheError::Internal`].
//! Classification above the adapters goes by shape only (timeout vs. other),
//! never by inspecting backend-specific codes.

use thiserror::Error;

/// Status code used for writes that timed out against the backend
/// (failed-dependency, mirroring the wire protocol this facade fronts).
pub const STATUS_DEPENDENCY_TIMEOUT: u16 = 424;

/// Unified error type for cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Read miss: the backend reports no record under the requested key.
    #[error("key not found")]
    KeyNotFound,

    /// The caller supplied no identifier at all.
    #[error("missing required parameter uuid")]
    MissingKey,

    /// The identifier fails the fixed-length sanity check, so the backend
    /// was never consulted.
    #[error("invalid uuid length")]
    KeyLength,

    /// A write exceeded the configured byte limit. Carries the offending
    /// size so callers can report it.
    #[error("payload size {size} exceeded max size {limit}")]
    PayloadTooLarge {
        /// Actual payload size in bytes.
        size: usize,
        /// Configured maximum in bytes.
        limit: usize,
    },

    /// Malformed input: unrecognized type, negative TTL, empty value,
    /// oversized batch.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The backend call exceeded its deadline.
    #[error("timeout writing or reading value against the backend")]
    Timeout,

    /// A stored value lacks a recognized type prefix. Never produced by this
    /// system on write; seeing it on read signals a data-integrity violation.
    #[error("cache data was corrupted, cannot determine type")]
    Corrupted,

    /// Catch-all for opaque backend failures.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CacheError {
    /// Protocol status for read failures.
    ///
    /// Reads deliberately collapse almost everything to "not found": the
    /// taxonomy is preserved in logs and metrics, not in the status code.
    /// Only a genuinely malformed request (no identifier) and corrupted
    /// stored data are distinguishable from a miss.
    #[must_use]
    pub fn read_status(&self) -> u16 {
        match self {
            Self::MissingKey | Self::BadRequest(_) => 400,
            Self::Corrupted => 500,
            _ => 404,
        }
    }

    /// Protocol status for write failures.
    #[must_use]
    pub fn write_status(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::PayloadTooLarge { .. } => 400,
            Self::Timeout => STATUS_DEPENDENCY_TIMEOUT,
            _ => 500,
        }
    }

    /// Whether this is the distinguished read-miss signal. Misses are
    /// expected traffic and get logged at debug level rather than error.
    #[must_use]
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound)
    }
}
