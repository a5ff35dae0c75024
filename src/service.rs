//! Put/get request orchestration.
//!
//! The request-level logic between the wire and the decorator chain:
//! validates input, generates identifiers, decides whether a write is
//! permitted (fresh key vs. caller-supplied), invokes the decorated
//! backend under a uniform deadline, and maps failures into the public
//! taxonomy. HTTP framing is the embedding process's concern; the wire
//! structs here are plain serde types any router can feed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tokio::time::timeout;
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::metrics::Metrics;
use crate::payload::{self, PayloadKind};
use crate::traits::{PutOptions, StorageBackend};

/// Generated identifiers are UUID v4, hyphenated: always 36 characters.
/// Reads are sanity-checked against this length before touching the
/// backend, unless caller-supplied keys are allowed.
pub const UUID_LENGTH: usize = 36;

/// Batch write request.
#[derive(Debug, Default, Deserialize)]
pub struct PutRequest {
    /// Items to store, in order.
    #[serde(default)]
    pub puts: Vec<PutObject>,
    /// Batch-level write options; per-item sources override into this.
    #[serde(default, rename = "put_options")]
    pub options: PutOptions,
}

/// One item of a batch write.
#[derive(Debug, Deserialize)]
pub struct PutObject {
    /// Declared payload kind: `"json"` or `"xml"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Requested TTL in seconds. Negative values are rejected.
    #[serde(default)]
    pub ttlseconds: i64,
    /// Raw payload bytes, passed through without re-serialization.
    pub value: Option<Box<RawValue>>,
    /// Caller-supplied key; honored only when the facade is configured to
    /// allow it.
    #[serde(default)]
    pub key: String,
    /// Per-item logical source override.
    #[serde(default)]
    pub source: String,
}

/// One identifier per surviving batch item, in input order.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutResponse {
    /// Per-item outcomes.
    pub responses: Vec<PutResponseObject>,
}

/// Identifier assigned to one item; empty string = silently skipped.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutResponseObject {
    /// The assigned identifier.
    pub uuid: String,
}

/// Query parameters of a read request.
///
/// The identifier may arrive under the primary `uuid` parameter or two
/// legacy aliases kept for provider migration compatibility: `unk2`, and
/// `iurl` when the `ap` marker equals `AUDIT`. Preserved exactly as the
/// historical integrations expect; do not generalize further.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct GetQuery {
    /// Primary identifier parameter.
    #[serde(default)]
    pub uuid: Option<String>,
    /// Legacy plain alias for the identifier.
    #[serde(default)]
    pub unk2: Option<String>,
    /// Marker parameter; the value `AUDIT` activates the `iurl` alias.
    #[serde(default)]
    pub ap: Option<String>,
    /// Legacy alias, consulted only when `ap` is `AUDIT`.
    #[serde(default)]
    pub iurl: Option<String>,
}

impl GetQuery {
    /// A query carrying only the primary identifier.
    #[must_use]
    pub fn by_uuid(uuid: impl Into<String>) -> Self {
        Self {
            uuid: Some(uuid.into()),
            ..Self::default()
        }
    }

    /// Resolve the identifier from the primary parameter and the legacy
    /// aliases, then run the cheap length sanity check.
    fn resolve_id(&self, allow_keys: bool) -> Result<String, CacheError> {
        let mut id = self.uuid.clone().unwrap_or_default();

        if id.is_empty() {
            id = self.unk2.clone().unwrap_or_default();
        }

        // The AUDIT marker redirects the read to the audit entry cached
        // under iurl, even when a uuid is also present.
        if self.ap.as_deref() == Some("AUDIT") {
            id = self.iurl.clone().unwrap_or_default();
        }

        if id.is_empty() {
            return Err(CacheError::MissingKey);
        }
        // Generated identifiers are always 36 characters, so this filters
        // out most invalid ones before even checking the backend.
        if id.len() != UUID_LENGTH && !allow_keys {
            return Err(CacheError::KeyLength);
        }
        Ok(id)
    }
}

/// A value fetched back out of the cache, split into its declared kind and
/// the original payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPayload {
    /// Kind reconstructed from the stored prefix.
    pub kind: PayloadKind,
    /// Payload bytes with the prefix stripped.
    pub body: Bytes,
}

impl FetchedPayload {
    /// Content type to declare when returning the body.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        self.kind.content_type()
    }
}

/// Request orchestration over a decorated backend.
pub struct CacheService {
    backend: Arc<dyn StorageBackend>,
    metrics: Metrics,
    allow_setting_keys: bool,
    max_num_values: usize,
    request_timeout: Duration,
}

impl CacheService {
    /// Build the service over an already-decorated backend.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>, metrics: Metrics, cfg: &CacheConfig) -> Self {
        Self {
            backend,
            metrics,
            allow_setting_keys: cfg.allow_setting_keys,
            max_num_values: cfg.max_num_values,
            request_timeout: cfg.request_timeout(),
        }
    }

    /// The decorated backend this service drives.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Store a batch of payloads.
    ///
    /// Returns one identifier per item in input order; an empty string
    /// marks an item that lost a caller-supplied-key race and was silently
    /// skipped. The first failing item aborts the batch; items already
    /// written stay written.
    ///
    /// # Errors
    ///
    /// [`CacheError::BadRequest`] for malformed input (including size-limit
    /// rejections, which name the offending item), [`CacheError::Timeout`]
    /// when a backend call exceeds its deadline, [`CacheError::Internal`]
    /// otherwise.
    pub async fn put(&self, request: &PutRequest) -> Result<PutResponse, CacheError> {
        self.metrics.record_put_total();
        let start = Instant::now();

        match self.put_inner(request).await {
            Ok(response) => {
                self.metrics.record_put_duration(start.elapsed());
                Ok(response)
            }
            Err(err) => {
                if err.write_status() == 400 {
                    self.metrics.record_put_bad_request();
                } else {
                    self.metrics.record_put_error();
                }
                Err(err)
            }
        }
    }

    async fn put_inner(&self, request: &PutRequest) -> Result<PutResponse, CacheError> {
        if request.puts.len() > self.max_num_values {
            return Err(CacheError::BadRequest(format!(
                "More keys than allowed: {}",
                self.max_num_values
            )));
        }

        let mut options = request.options.clone();
        let mut responses = Vec::with_capacity(request.puts.len());

        for (index, item) in request.puts.iter().enumerate() {
            let stored = encode_item(index, item)?;
            #[allow(clippy::cast_sign_loss)]
            let ttl = Duration::from_secs(item.ttlseconds as u64);

            let mut id = Uuid::new_v4().to_string();

            // Caller-supplied keys are claimed through a best-effort
            // read-before-write probe: an existing value means the caller
            // lost the race and the item is skipped without an error.
            if self.allow_setting_keys && !item.key.is_empty() {
                let probe = timeout(
                    self.request_timeout,
                    self.backend.get(&item.key, &item.source),
                )
                .await;
                let occupied = matches!(&probe, Ok(Ok(value)) if !value.is_empty());
                id = if occupied {
                    debug!(key = %item.key, "put: key already holds a value, skipping item");
                    String::new()
                } else {
                    item.key.clone()
                };
            }

            if !id.is_empty() {
                if !item.source.is_empty() {
                    options.source.clone_from(&item.source);
                }

                match timeout(
                    self.request_timeout,
                    self.backend.put(&id, &stored, ttl, &options),
                )
                .await
                {
                    Err(_) => {
                        error!(uuid = %id, "put: timed out writing value to the backend");
                        return Err(CacheError::Timeout);
                    }
                    Ok(Err(CacheError::PayloadTooLarge { size, limit })) => {
                        return Err(CacheError::BadRequest(format!(
                            "request.puts[{index}] exceeded max size: payload size {size} exceeded max size {limit}"
                        )));
                    }
                    Ok(Err(CacheError::Timeout)) => {
                        error!(uuid = %id, "put: timed out writing value to the backend");
                        return Err(CacheError::Timeout);
                    }
                    Ok(Err(err)) => {
                        error!(uuid = %id, error = %err, "put: error while writing to the backend");
                        return Err(err);
                    }
                    Ok(Ok(())) => {
                        trace!(uuid = %id, "put: stored value");
                    }
                }
            }

            responses.push(PutResponseObject { uuid: id });
        }

        Ok(PutResponse { responses })
    }

    /// Fetch a stored payload by identifier.
    ///
    /// # Errors
    ///
    /// The full taxonomy is returned for logs and metrics, but readers at
    /// the protocol boundary should collapse everything to not-found via
    /// [`CacheError::read_status`].
    pub async fn get(&self, query: &GetQuery) -> Result<FetchedPayload, CacheError> {
        self.metrics.record_get_total();
        let start = Instant::now();

        match self.get_inner(query).await {
            Ok(fetched) => {
                self.metrics.record_get_duration(start.elapsed());
                Ok(fetched)
            }
            Err(err) => {
                if err.read_status() == 400 {
                    self.metrics.record_get_bad_request();
                } else {
                    self.metrics.record_get_error();
                }
                // Misses are routine traffic; everything else is worth an
                // error-level line.
                if err.is_key_not_found() {
                    debug!(error = %err, "get: miss");
                } else {
                    error!(error = %err, "get: failed");
                }
                Err(err)
            }
        }
    }

    async fn get_inner(&self, query: &GetQuery) -> Result<FetchedPayload, CacheError> {
        let id = query.resolve_id(self.allow_setting_keys)?;

        let value = match timeout(self.request_timeout, self.backend.get(&id, "")).await {
            Err(_) => return Err(CacheError::Timeout),
            Ok(Err(err)) => return Err(err),
            Ok(Ok(value)) => value,
        };

        let (kind, body) = payload::strip(value)?;
        trace!(uuid = %id, kind = ?kind, "get: hit");
        Ok(FetchedPayload { kind, body })
    }
}

/// Validate one batch item and produce its stored (prefixed) form.
fn encode_item(index: usize, item: &PutObject) -> Result<Vec<u8>, CacheError> {
    let raw = item.value.as_ref().map_or("", |value| value.get());
    if raw.is_empty() {
        return Err(CacheError::BadRequest("Missing value.".to_string()));
    }
    if item.ttlseconds < 0 {
        return Err(CacheError::BadRequest(format!(
            "request.puts[{index}].ttlseconds must not be negative."
        )));
    }

    match PayloadKind::from_wire(&item.kind)? {
        PayloadKind::Json => Ok(payload::tag(PayloadKind::Json, raw.as_bytes())),
        PayloadKind::Xml => {
            // JSON transports XML as a quoted string with escapes; require
            // the quotes and un-escape before prefixing.
            let bytes = raw.as_bytes();
            if bytes.len() < 2
                || bytes.first() != Some(&b'"')
                || bytes.last() != Some(&b'"')
            {
                return Err(CacheError::BadRequest(format!(
                    "XML messages must have a String value. Found {raw}"
                )));
            }
            let interpreted: String = serde_json::from_str(raw).map_err(|_| {
                CacheError::BadRequest(format!(
                    "XML messages must have a String value. Found {raw}"
                ))
            })?;
            Ok(payload::tag(PayloadKind::Xml, interpreted.as_bytes()))
        }
    }
}
