//! Stored-value type prefixes.
//!
//! Every value put through this facade starts with a short type tag that is
//! part of the stored bytes, not separate metadata: `"xml"` or `"json"`,
//! with no delimiter. The tag travels through the whole decorator chain and
//! is only stripped by the outermost reader when reconstructing the
//! content type. A stored value without a recognized prefix is corrupted
//! data; nothing in this crate produces one.

use bytes::Bytes;

use crate::error::CacheError;

/// Prefix for XML payloads.
pub const XML_PREFIX: &str = "xml";
/// Prefix for JSON payloads.
pub const JSON_PREFIX: &str = "json";

/// The two recognized payload kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// XML payload, stored behind the `"xml"` prefix.
    Xml,
    /// JSON payload, stored behind the `"json"` prefix.
    Json,
}

impl PayloadKind {
    /// Parse a declared wire type. Anything other than the two recognized
    /// kinds is a bad request.
    pub fn from_wire(declared: &str) -> Result<Self, CacheError> {
        match declared {
            XML_PREFIX => Ok(Self::Xml),
            JSON_PREFIX => Ok(Self::Json),
            other => Err(CacheError::BadRequest(format!(
                "Type must be one of [\"json\", \"xml\"]. Found {other}"
            ))),
        }
    }

    /// The stored prefix for this kind.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Xml => XML_PREFIX,
            Self::Json => JSON_PREFIX,
        }
    }

    /// Content type declared to readers of this kind.
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Xml => "application/xml",
            Self::Json => "application/json",
        }
    }
}

/// Prepend the type prefix onto a payload body, producing the stored form.
#[must_use]
pub fn tag(kind: PayloadKind, body: &[u8]) -> Vec<u8> {
    let prefix = kind.prefix().as_bytes();
    let mut stored = Vec::with_capacity(prefix.len() + body.len());
    stored.extend_from_slice(prefix);
    stored.extend_from_slice(body);
    stored
}

/// Classify a stored value by its prefix without stripping it.
///
/// Used by the metrics decorator, which must observe the value untouched.
#[must_use]
pub fn classify(stored: &[u8]) -> Option<PayloadKind> {
    // "json" starts with the byte 'j', "xml" with 'x'; check the longer
    // prefix first anyway so the logic stays order-independent.
    if stored.starts_with(JSON_PREFIX.as_bytes()) {
        Some(PayloadKind::Json)
    } else if stored.starts_with(XML_PREFIX.as_bytes()) {
        Some(PayloadKind::Xml)
    } else {
        None
    }
}

/// Split a stored value into its kind and the original payload bytes.
///
/// The prefix is a known fixed-length marker, so this strips by length and
/// never searches for a separator. Fails with [`CacheError::Corrupted`]
/// when no recognized prefix is present.
pub fn strip(stored: Bytes) -> Result<(PayloadKind, Bytes), CacheError> {
    match classify(&stored) {
        Some(kind) => Ok((kind, stored.slice(kind.prefix().len()..))),
        None => Err(CacheError::Corrupted),
    }
}
