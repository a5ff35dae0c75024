//! End-to-end tests over the full service: orchestration, decorator chain
//! and the in-process backend wired together by the builder.

mod common;

use common::{default_service, put_request, random_key, service_with};
use payload_cache::{CacheConfig, CacheError, GetQuery};

#[tokio::test]
async fn stored_json_round_trips_with_content_type() {
    let (service, _) = default_service();

    let request = put_request(
        r#"{"puts": [{"type": "json", "ttlseconds": 300, "value": {"bid": 42, "cur": "USD"}}]}"#,
    );
    let response = service.put(&request).await.unwrap();
    assert_eq!(response.responses.len(), 1);

    let uuid = response.responses[0].uuid.clone();
    assert_eq!(uuid.len(), 36);

    let fetched = service.get(&GetQuery::by_uuid(uuid)).await.unwrap();
    assert_eq!(fetched.content_type(), "application/json");
    assert_eq!(&fetched.body[..], br#"{"bid": 42, "cur": "USD"}"#);
}

#[tokio::test]
async fn stored_xml_is_unescaped_and_typed() {
    let (service, _) = default_service();

    let request = put_request(
        r#"{"puts": [{"type": "xml", "ttlseconds": 60, "value": "<vast version=\"4.0\"/>"}]}"#,
    );
    let response = service.put(&request).await.unwrap();

    let fetched = service
        .get(&GetQuery::by_uuid(response.responses[0].uuid.clone()))
        .await
        .unwrap();
    assert_eq!(fetched.content_type(), "application/xml");
    // The JSON string escaping was removed before storage.
    assert_eq!(&fetched.body[..], br#"<vast version="4.0"/>"#);
}

#[tokio::test]
async fn batch_responses_keep_input_order() {
    let (service, _) = default_service();

    let request = put_request(
        r#"{"puts": [
            {"type": "json", "ttlseconds": 60, "value": {"n": 1}},
            {"type": "xml", "ttlseconds": 60, "value": "<a/>"},
            {"type": "json", "ttlseconds": 60, "value": {"n": 3}}
        ]}"#,
    );
    let response = service.put(&request).await.unwrap();
    assert_eq!(response.responses.len(), 3);

    let first = service
        .get(&GetQuery::by_uuid(response.responses[0].uuid.clone()))
        .await
        .unwrap();
    let third = service
        .get(&GetQuery::by_uuid(response.responses[2].uuid.clone()))
        .await
        .unwrap();
    assert_eq!(&first.body[..], br#"{"n": 1}"#);
    assert_eq!(&third.body[..], br#"{"n": 3}"#);
}

#[tokio::test]
async fn oversized_batch_is_rejected_before_any_write() {
    let (service, sink) = service_with(CacheConfig {
        max_num_values: 2,
        ..CacheConfig::default()
    });

    let request = put_request(
        r#"{"puts": [
            {"type": "json", "ttlseconds": 60, "value": {}},
            {"type": "json", "ttlseconds": 60, "value": {}},
            {"type": "json", "ttlseconds": 60, "value": {}}
        ]}"#,
    );
    let err = service.put(&request).await.unwrap_err();
    assert_eq!(err.write_status(), 400);
    assert_eq!(sink.count("put.bad_request_count"), 1);
    // Nothing reached the backend.
    assert_eq!(sink.count("put_backend.json_request_count:cache"), 0);
}

#[tokio::test]
async fn oversized_payload_names_the_offending_item() {
    // The stored form is the 4-byte "json" prefix plus the raw value, so an
    // 11-byte stored value against a 10-byte limit trips the size check.
    let (service, _) = service_with(CacheConfig {
        max_payload_size_bytes: 10,
        ..CacheConfig::default()
    });

    let request = put_request(
        r#"{"puts": [
            {"type": "json", "ttlseconds": 60, "value": 7},
            {"type": "json", "ttlseconds": 60, "value": {"a":1}}
        ]}"#,
    );
    let err = service.put(&request).await.unwrap_err();
    assert_eq!(err.write_status(), 400);
    let CacheError::BadRequest(msg) = err else {
        panic!("expected a bad request, got {err:?}");
    };
    assert!(msg.contains("puts[1]"), "message should name the item: {msg}");
    assert!(msg.contains("exceeded max size"), "message: {msg}");
}

#[tokio::test]
async fn caller_supplied_key_is_honored_when_allowed() {
    let (service, _) = service_with(CacheConfig {
        allow_setting_keys: true,
        ..CacheConfig::default()
    });
    let key = random_key("custom");

    let request = put_request(&format!(
        r#"{{"puts": [{{"type": "json", "ttlseconds": 60, "value": {{"v": 1}}, "key": "{key}"}}]}}"#,
    ));
    let response = service.put(&request).await.unwrap();
    assert_eq!(response.responses[0].uuid, key);

    let fetched = service.get(&GetQuery::by_uuid(key)).await.unwrap();
    assert_eq!(&fetched.body[..], br#"{"v": 1}"#);
}

#[tokio::test]
async fn losing_a_key_claim_race_skips_silently() {
    let (service, _) = service_with(CacheConfig {
        allow_setting_keys: true,
        ..CacheConfig::default()
    });
    let key = random_key("contested");

    let first = put_request(&format!(
        r#"{{"puts": [{{"type": "json", "ttlseconds": 60, "value": {{"winner": true}}, "key": "{key}"}}]}}"#,
    ));
    let response = service.put(&first).await.unwrap();
    assert_eq!(response.responses[0].uuid, key);

    // The second claim succeeds as a request but writes nothing: its
    // response slot carries an empty identifier.
    let second = put_request(&format!(
        r#"{{"puts": [{{"type": "json", "ttlseconds": 60, "value": {{"winner": false}}, "key": "{key}"}}]}}"#,
    ));
    let response = service.put(&second).await.unwrap();
    assert_eq!(response.responses[0].uuid, "");

    let fetched = service.get(&GetQuery::by_uuid(key)).await.unwrap();
    assert_eq!(&fetched.body[..], br#"{"winner": true}"#);
}

#[tokio::test]
async fn caller_supplied_keys_are_ignored_when_disallowed() {
    let (service, _) = default_service();
    let key = random_key("ignored");

    let request = put_request(&format!(
        r#"{{"puts": [{{"type": "json", "ttlseconds": 60, "value": {{}}, "key": "{key}"}}]}}"#,
    ));
    let response = service.put(&request).await.unwrap();
    // A generated identifier, not the requested key.
    assert_ne!(response.responses[0].uuid, key);
    assert_eq!(response.responses[0].uuid.len(), 36);
}

#[tokio::test]
async fn read_failures_collapse_to_not_found() {
    let (service, _) = default_service();

    // No identifier at all: the one read failure visible as a bad request.
    let err = service.get(&GetQuery::default()).await.unwrap_err();
    assert!(matches!(err, CacheError::MissingKey));
    assert_eq!(err.read_status(), 400);

    // Wrong length: rejected before the backend, still presented as 404.
    let err = service.get(&GetQuery::by_uuid("too-short")).await.unwrap_err();
    assert!(matches!(err, CacheError::KeyLength));
    assert_eq!(err.read_status(), 404);

    // Well-formed but absent: a plain miss.
    let err = service
        .get(&GetQuery::by_uuid("a".repeat(36)))
        .await
        .unwrap_err();
    assert!(err.is_key_not_found());
    assert_eq!(err.read_status(), 404);
}

#[tokio::test]
async fn legacy_read_aliases_resolve_the_same_entry() {
    let (service, _) = default_service();

    let request = put_request(r#"{"puts": [{"type": "json", "ttlseconds": 60, "value": {"x": 9}}]}"#);
    let uuid = service.put(&request).await.unwrap().responses[0].uuid.clone();

    let via_alias = GetQuery {
        unk2: Some(uuid.clone()),
        ..GetQuery::default()
    };
    assert_eq!(
        &service.get(&via_alias).await.unwrap().body[..],
        br#"{"x": 9}"#
    );

    let via_audit = GetQuery {
        ap: Some("AUDIT".to_string()),
        iurl: Some(uuid),
        ..GetQuery::default()
    };
    assert_eq!(
        &service.get(&via_audit).await.unwrap().body[..],
        br#"{"x": 9}"#
    );
}

#[tokio::test]
async fn zero_ttl_entries_stay_readable() {
    let (service, _) = default_service();

    let request = put_request(r#"{"puts": [{"type": "json", "ttlseconds": 0, "value": {"keep": 1}}]}"#);
    let uuid = service.put(&request).await.unwrap().responses[0].uuid.clone();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(service.get(&GetQuery::by_uuid(uuid)).await.is_ok());
}

#[tokio::test]
async fn negative_ttl_and_bad_type_are_rejected() {
    let (service, _) = default_service();

    let negative =
        put_request(r#"{"puts": [{"type": "json", "ttlseconds": -5, "value": {}}]}"#);
    assert_eq!(service.put(&negative).await.unwrap_err().write_status(), 400);

    let bad_type = put_request(r#"{"puts": [{"type": "html", "ttlseconds": 5, "value": "<b/>"}]}"#);
    assert_eq!(service.put(&bad_type).await.unwrap_err().write_status(), 400);
}

#[tokio::test]
async fn per_item_source_routes_backend_metrics() {
    let mut config = CacheConfig::default();
    config
        .partitions
        .insert("app-a".to_string(), "hot".to_string());
    let (service, sink) = service_with(config);

    let request = put_request(
        r#"{"puts": [
            {"type": "json", "ttlseconds": 60, "value": {}, "source": "app-a"},
            {"type": "json", "ttlseconds": 60, "value": {}, "source": "app-b"}
        ]}"#,
    );
    service.put(&request).await.unwrap();

    assert_eq!(sink.count("put_backend.json_request_count:hot"), 1);
    // Unmapped sources fall back to the default partition.
    assert_eq!(sink.count("put_backend.json_request_count:cache"), 1);
}

#[tokio::test]
async fn sticky_source_override_carries_to_later_items() {
    let mut config = CacheConfig::default();
    config
        .partitions
        .insert("app-a".to_string(), "hot".to_string());
    let (service, sink) = service_with(config);

    let request = put_request(
        r#"{"puts": [
            {"type": "json", "ttlseconds": 60, "value": {}, "source": "app-a"},
            {"type": "json", "ttlseconds": 60, "value": {}}
        ]}"#,
    );
    service.put(&request).await.unwrap();

    // Both items landed in the partition of the first item's source.
    assert_eq!(sink.count("put_backend.json_request_count:hot"), 2);
}

#[tokio::test]
async fn request_metrics_count_successes_and_misses() {
    let (service, sink) = default_service();

    let request = put_request(r#"{"puts": [{"type": "json", "ttlseconds": 60, "value": {}}]}"#);
    let uuid = service.put(&request).await.unwrap().responses[0].uuid.clone();
    service.get(&GetQuery::by_uuid(uuid)).await.unwrap();
    let _ = service.get(&GetQuery::by_uuid("b".repeat(36))).await;

    assert_eq!(sink.count("put.request_count"), 1);
    assert_eq!(sink.count("put.request_duration_count"), 1);
    assert_eq!(sink.count("get.request_count"), 2);
    assert_eq!(sink.count("get.request_duration_count"), 1);
    assert_eq!(sink.count("get.error_count"), 1);
    assert_eq!(sink.count("get_backend.key_not_found_count:cache"), 1);
}

/// Backend that never answers within any reasonable deadline.
struct StallingBackend;

#[payload_cache::async_trait]
impl payload_cache::StorageBackend for StallingBackend {
    async fn put(
        &self,
        _key: &str,
        _value: &[u8],
        _ttl: std::time::Duration,
        _options: &payload_cache::PutOptions,
    ) -> Result<(), CacheError> {
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        Ok(())
    }

    async fn get(&self, _key: &str, _source: &str) -> Result<bytes::Bytes, CacheError> {
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        Err(CacheError::KeyNotFound)
    }

    fn fetch_source_set(&self, _source: &str) -> String {
        "cache".to_string()
    }

    fn name(&self) -> &'static str {
        "stalling"
    }
}

#[tokio::test]
async fn backend_deadline_expiry_maps_to_timeout() {
    let service = payload_cache::CacheServiceBuilder::new()
        .with_config(CacheConfig {
            request_timeout_ms: 50,
            ..CacheConfig::default()
        })
        .with_backend(std::sync::Arc::new(StallingBackend))
        .build()
        .unwrap();

    let request = put_request(r#"{"puts": [{"type": "json", "ttlseconds": 60, "value": {}}]}"#);
    let err = service.put(&request).await.unwrap_err();
    assert!(matches!(err, CacheError::Timeout));
    assert_eq!(err.write_status(), 424);

    // On the read side the expired deadline still collapses to not-found.
    let err = service
        .get(&GetQuery::by_uuid("a".repeat(36)))
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::Timeout));
    assert_eq!(err.read_status(), 404);
}

#[tokio::test]
async fn disabled_compression_still_round_trips() {
    let (service, _) = service_with(CacheConfig {
        compression: false,
        ..CacheConfig::default()
    });

    let request = put_request(r#"{"puts": [{"type": "json", "ttlseconds": 60, "value": {"raw": true}}]}"#);
    let uuid = service.put(&request).await.unwrap().responses[0].uuid.clone();
    let fetched = service.get(&GetQuery::by_uuid(uuid)).await.unwrap();
    assert_eq!(&fetched.body[..], br#"{"raw": true}"#);
}
