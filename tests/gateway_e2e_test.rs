//! End-to-end gateway tests
//!
//! Drives the full router with a wiremock upstream transformation
//! service and a wiremock origin, covering the cache miss/hit cycle,
//! chunked range serving, source failover, the large-file passthrough,
//! validation failures, and version bumps.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use wiremock::matchers::{method, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vidgated::application::use_cases::transform_video::TransformVideoUseCase;
use vidgated::domain::entities::SourceKind;
use vidgated::domain::repositories::KvStore;
use vidgated::domain::value_objects::TransformOptions;
use vidgated::infrastructure::cache::{cache_key, InMemoryKvStore, VersionStore};
use vidgated::infrastructure::config::{
    ConfigManager, GatewayConfigDoc, OriginConfig, RuntimeConfig, SourceConfig,
};
use vidgated::infrastructure::origins::{PresignedUrlCache, S3ObjectStore, SourceFetcher};
use vidgated::infrastructure::tasks::BackgroundScheduler;
use vidgated::infrastructure::upstream::UpstreamClient;
use vidgated::presentation::http::handlers::admin_handlers::AdminToken;
use vidgated::presentation::http::{router, AppState};

struct TestGateway {
    app: Router,
    kv: Arc<InMemoryKvStore>,
    scheduler: Arc<BackgroundScheduler>,
    versions: Arc<VersionStore>,
}

fn remote_source(url: &str, path: &str, priority: i32) -> SourceConfig {
    SourceConfig {
        source_type: Some(SourceKind::Remote),
        priority,
        url: Some(url.to_string()),
        path: path.to_string(),
        ..Default::default()
    }
}

fn fallback_source(url: &str, path: &str, priority: i32) -> SourceConfig {
    SourceConfig {
        source_type: Some(SourceKind::Fallback),
        priority,
        url: Some(url.to_string()),
        path: path.to_string(),
        ..Default::default()
    }
}

fn config_doc(sources: Vec<SourceConfig>) -> GatewayConfigDoc {
    let mut doc = GatewayConfigDoc {
        version: "1.0.0".to_string(),
        ..Default::default()
    };
    doc.video.origins.items.push(OriginConfig {
        name: "videos".to_string(),
        matcher: r"/videos/(.+)".to_string(),
        sources,
        ..Default::default()
    });
    doc
}

fn gateway(doc: GatewayConfigDoc, upstream_base: &str) -> TestGateway {
    let kv_concrete = Arc::new(InMemoryKvStore::new());
    let kv: Arc<dyn KvStore> = kv_concrete.clone();

    let config = Arc::new(ConfigManager::new(
        RuntimeConfig::compile(doc).expect("test config compiles"),
        kv.clone(),
    ));
    let object_store = Arc::new(S3ObjectStore::new(HashMap::new()));
    let presigner = Arc::new(PresignedUrlCache::new(kv.clone(), object_store.clone()));
    let fetcher = Arc::new(SourceFetcher::new(object_store, presigner, 5).expect("fetcher"));
    let upstream = Arc::new(UpstreamClient::new(upstream_base, 5).expect("upstream client"));
    let versions = Arc::new(VersionStore::new(kv.clone()));
    let scheduler = Arc::new(BackgroundScheduler::new(Duration::from_secs(10)));

    let use_case = Arc::new(TransformVideoUseCase::new(
        config.clone(),
        kv,
        versions.clone(),
        upstream,
        fetcher,
    ));

    let app = router(AppState {
        config,
        use_case,
        scheduler: scheduler.clone(),
        admin_token: AdminToken(Some("secret".to_string())),
    });

    TestGateway {
        app,
        kv: kv_concrete,
        scheduler,
        versions,
    }
}

async fn get(
    app: &Router,
    uri: &str,
    headers: &[(&str, &str)],
) -> (StatusCode, HeaderMap, Bytes) {
    let mut builder = Request::builder().uri(uri).method("GET");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await.expect("body").to_bytes();
    (parts.status, parts.headers, bytes)
}

fn video_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn test_cache_miss_then_hit() {
    let upstream = MockServer::start().await;
    let body = video_bytes(2048);

    Mock::given(method("GET"))
        .and(path_regex(r"abc\.mp4$"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.clone(), "video/mp4"))
        .expect(1)
        .mount(&upstream)
        .await;

    let doc = config_doc(vec![remote_source("http://origin.test", "/${1}", 1)]);
    let gw = gateway(doc, &upstream.uri());

    let (status, headers, got) = get(&gw.app, "/videos/abc.mp4?width=640&height=360", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-cache-status"], "MISS");
    assert_eq!(headers["content-type"], "video/mp4");
    assert_eq!(&got[..], &body[..]);

    // Let the background cache write land, then the same request is a hit
    gw.scheduler.drain().await;

    let (status, headers, got) = get(&gw.app, "/videos/abc.mp4?width=640&height=360", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-cache-status"], "HIT");
    assert_eq!(&got[..], &body[..]);
}

#[tokio::test]
async fn test_invalid_option_combination_never_reaches_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let doc = config_doc(vec![remote_source("http://origin.test", "/${1}", 1)]);
    let gw = gateway(doc, &upstream.uri());

    let (status, headers, body) = get(&gw.app, "/videos/a.mp4?mode=frame&loop=true", &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers["x-error-type"], "INVALID_OPTION_COMBINATION");
    assert_eq!(headers["cache-control"], "no-store");

    let parsed: serde_json::Value = serde_json::from_slice(&body).expect("error body is JSON");
    assert_eq!(parsed["error"], "INVALID_OPTION_COMBINATION");
    assert_eq!(parsed["statusCode"], 400);

    gw.scheduler.drain().await;
    assert_eq!(gw.kv.len().await, 0, "no cache write on validation failure");
}

#[tokio::test]
async fn test_alt_source_failover() {
    let upstream = MockServer::start().await;
    let body = video_bytes(512);

    // Primary source: upstream reports the object missing there
    Mock::given(method("GET"))
        .and(path_regex("/primary/"))
        .respond_with(
            ResponseTemplate::new(502).insert_header("x-media-err", "err=9404"),
        )
        .mount(&upstream)
        .await;
    // Backup source succeeds
    Mock::given(method("GET"))
        .and(path_regex("/backup/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.clone(), "video/mp4"))
        .mount(&upstream)
        .await;

    let doc = config_doc(vec![
        remote_source("http://origin.test", "/primary/${1}", 1),
        fallback_source("http://origin.test", "/backup/${1}", 2),
    ]);
    let gw = gateway(doc, &upstream.uri());

    let (status, headers, got) = get(&gw.app, "/videos/abc.mp4?width=640&height=360", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-retry-applied"], "true");
    assert_eq!(headers["x-failed-source"], "remote");
    assert_eq!(headers["x-alternative-source"], "fallback");
    assert_eq!(&got[..], &body[..]);
}

#[tokio::test]
async fn test_large_file_direct_passthrough_and_background_chunking() {
    let upstream = MockServer::start().await;
    let origin = MockServer::start().await;
    let body = video_bytes(30_000);

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(502).insert_header("x-media-err", "err=9402"),
        )
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"/abc\.mp4$"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.clone(), "video/mp4"))
        .mount(&origin)
        .await;

    let mut doc = config_doc(vec![remote_source(&origin.uri(), "/${1}", 1)]);
    doc.cache.inline_threshold_bytes = 1000;
    doc.cache.chunk_size_bytes = 4096;
    let gw = gateway(doc, &upstream.uri());

    let (status, headers, got) = get(&gw.app, "/videos/abc.mp4?width=640&height=360", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-fallback-applied"], "true");
    assert_eq!(headers["x-video-too-large"], "true");
    assert_eq!(headers["x-video-exceeds-256mib"], "true");
    assert_eq!(headers["x-bypass-cache-api"], "true");
    assert_eq!(&got[..], &body[..]);

    // Background task re-fetches and stores in chunks
    gw.scheduler.drain().await;
    let chunks = gw.kv.list_keys("chunk:").await.expect("list");
    assert_eq!(chunks.len(), 8); // ceil(30000 / 4096)

    let (status, headers, got) = get(&gw.app, "/videos/abc.mp4?width=640&height=360", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-cache-status"], "HIT");
    assert_eq!(&got[..], &body[..]);
}

#[tokio::test]
async fn test_range_served_from_chunked_cache() {
    let upstream = MockServer::start().await;
    let body = video_bytes(10_000);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.clone(), "video/mp4"))
        .mount(&upstream)
        .await;

    let mut doc = config_doc(vec![remote_source("http://origin.test", "/${1}", 1)]);
    doc.cache.inline_threshold_bytes = 1000;
    doc.cache.chunk_size_bytes = 2048;
    let gw = gateway(doc, &upstream.uri());

    let (status, _, _) = get(&gw.app, "/videos/big.mp4?width=640&height=360", &[]).await;
    assert_eq!(status, StatusCode::OK);
    gw.scheduler.drain().await;

    let (status, headers, got) = get(
        &gw.app,
        "/videos/big.mp4?width=640&height=360",
        &[("range", "bytes=2500-4999")],
    )
    .await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers["x-cache-status"], "HIT");
    assert_eq!(headers["content-range"], "bytes 2500-4999/10000");
    assert_eq!(headers["content-length"], "2500");
    assert_eq!(&got[..], &body[2500..=4999]);

    // Unsatisfiable range against the cached entry
    let (status, headers, _) = get(
        &gw.app,
        "/videos/big.mp4?width=640&height=360",
        &[("range", "bytes=10000-")],
    )
    .await;
    assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(headers["content-range"], "bytes */10000");
}

#[tokio::test]
async fn test_full_body_equals_tiled_range_slices() {
    let upstream = MockServer::start().await;
    let body = video_bytes(9_000);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.clone(), "video/mp4"))
        .mount(&upstream)
        .await;

    let mut doc = config_doc(vec![remote_source("http://origin.test", "/${1}", 1)]);
    doc.cache.inline_threshold_bytes = 1000;
    doc.cache.chunk_size_bytes = 2048;
    let gw = gateway(doc, &upstream.uri());

    get(&gw.app, "/videos/t.mp4?width=640&height=360", &[]).await;
    gw.scheduler.drain().await;

    let mut assembled = Vec::new();
    for (start, end) in [(0u64, 2999u64), (3000, 6499), (6500, 8999)] {
        let range = format!("bytes={}-{}", start, end);
        let (status, _, slice) = get(
            &gw.app,
            "/videos/t.mp4?width=640&height=360",
            &[("range", &range)],
        )
        .await;
        assert_eq!(status, StatusCode::PARTIAL_CONTENT);
        assembled.extend_from_slice(&slice);
    }
    assert_eq!(assembled, body);
}

#[tokio::test]
async fn test_version_bump_busts_upstream_and_cache() {
    let upstream = MockServer::start().await;
    let first_body = video_bytes(600);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(first_body.clone(), "video/mp4"))
        .mount(&upstream)
        .await;

    let doc = config_doc(vec![remote_source("http://origin.test", "/${1}", 1)]);
    let gw = gateway(doc, &upstream.uri());

    let (_, headers, _) = get(&gw.app, "/videos/v.mp4?width=640&height=360", &[]).await;
    assert_eq!(headers["x-cache-status"], "MISS");
    gw.scheduler.drain().await;

    // Bump the version for the same (path, options) fingerprint
    let options = TransformOptions {
        width: Some(640),
        height: Some(360),
        ..Default::default()
    };
    let logical = cache_key::logical_key("/videos/v.mp4", &options);
    let bumped = gw.versions.bump(&logical, 300).await.expect("bump");
    assert_eq!(bumped, 2);

    // The next request must hit upstream again, with ?v=2 appended
    upstream.reset().await;
    let second_body = video_bytes(700);
    Mock::given(method("GET"))
        .and(query_param("v", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(second_body.clone(), "video/mp4"))
        .expect(1)
        .mount(&upstream)
        .await;

    let (status, headers, got) = get(&gw.app, "/videos/v.mp4?width=640&height=360", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-cache-status"], "MISS");
    assert_eq!(&got[..], &second_body[..]);

    // The old entry is still stored, just no longer addressable
    let old_key = cache_key::versioned_key(&logical, 1);
    assert!(gw.kv.get(&old_key).await.expect("kv").is_some());
}

#[tokio::test]
async fn test_unmatched_path_is_origin_not_found() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let doc = config_doc(vec![remote_source("http://origin.test", "/${1}", 1)]);
    let gw = gateway(doc, &upstream.uri());

    let (status, headers, _) = get(&gw.app, "/images/cat.png", &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers["x-error-type"], "ORIGIN_NOT_FOUND");
}

#[tokio::test]
async fn test_bypass_query_parameter_skips_cache() {
    let upstream = MockServer::start().await;
    let body = video_bytes(256);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.clone(), "video/mp4"))
        .expect(2)
        .mount(&upstream)
        .await;

    let doc = config_doc(vec![remote_source("http://origin.test", "/${1}", 1)]);
    let gw = gateway(doc, &upstream.uri());

    for _ in 0..2 {
        let (status, headers, _) =
            get(&gw.app, "/videos/b.mp4?width=640&height=360&nocache=1", &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["x-cache-status"], "BYPASS");
        gw.scheduler.drain().await;
    }
}

#[tokio::test]
async fn test_debug_view_returns_diagnostics_json() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(video_bytes(64), "video/mp4"))
        .mount(&upstream)
        .await;

    let doc = config_doc(vec![remote_source("http://origin.test", "/${1}", 1)]);
    let gw = gateway(doc, &upstream.uri());

    let (status, headers, body) =
        get(&gw.app, "/videos/d.mp4?width=640&height=360&debug=view", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "application/json");

    let report: serde_json::Value = serde_json::from_slice(&body).expect("diagnostics JSON");
    assert!(report["requestId"].is_string());
    assert!(report["breadcrumbs"].is_array());
    assert_eq!(report["diagnostics"]["path"], "/videos/d.mp4");
}
