//! Admin configuration endpoint tests

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use vidgated::application::use_cases::transform_video::TransformVideoUseCase;
use vidgated::domain::repositories::KvStore;
use vidgated::infrastructure::cache::{InMemoryKvStore, VersionStore};
use vidgated::infrastructure::config::{
    ConfigManager, GatewayConfigDoc, RuntimeConfig, CONFIG_KV_KEY,
};
use vidgated::infrastructure::origins::{PresignedUrlCache, S3ObjectStore, SourceFetcher};
use vidgated::infrastructure::tasks::BackgroundScheduler;
use vidgated::infrastructure::upstream::UpstreamClient;
use vidgated::presentation::http::handlers::admin_handlers::AdminToken;
use vidgated::presentation::http::{router, AppState};

fn app_with_token(token: Option<&str>) -> (Router, Arc<InMemoryKvStore>) {
    let kv_concrete = Arc::new(InMemoryKvStore::new());
    let kv: Arc<dyn KvStore> = kv_concrete.clone();

    let doc = GatewayConfigDoc {
        version: "1.0.0".to_string(),
        ..Default::default()
    };
    let config = Arc::new(ConfigManager::new(
        RuntimeConfig::compile(doc).expect("config"),
        kv.clone(),
    ));
    let object_store = Arc::new(S3ObjectStore::new(HashMap::new()));
    let presigner = Arc::new(PresignedUrlCache::new(kv.clone(), object_store.clone()));
    let fetcher = Arc::new(SourceFetcher::new(object_store, presigner, 5).expect("fetcher"));
    let upstream = Arc::new(UpstreamClient::new("http://upstream.test", 5).expect("upstream"));
    let versions = Arc::new(VersionStore::new(kv.clone()));
    let scheduler = Arc::new(BackgroundScheduler::new(Duration::from_secs(5)));
    let use_case = Arc::new(TransformVideoUseCase::new(
        config.clone(),
        kv,
        versions,
        upstream,
        fetcher,
    ));

    let app = router(AppState {
        config,
        use_case,
        scheduler,
        admin_token: AdminToken(token.map(String::from)),
    });
    (app, kv_concrete)
}

async fn send(
    app: &Router,
    method: &str,
    auth: Option<&str>,
    body: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().uri("/admin/config").method(method);
    if let Some(token) = auth {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let body = match body {
        Some(content) => Body::from(content.to_string()),
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let parsed = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, parsed)
}

#[tokio::test]
async fn test_missing_token_is_401() {
    let (app, _) = app_with_token(Some("secret"));
    let (status, _) = send(&app, "GET", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "POST", Some("wrong"), Some("{}")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unconfigured_token_rejects_everything() {
    let (app, _) = app_with_token(None);
    let (status, _) = send(&app, "GET", Some("anything"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_json_is_400() {
    let (app, _) = app_with_token(Some("secret"));
    let (status, body) = send(&app, "POST", Some("secret"), Some("not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_schema_invalid_document_is_400() {
    let (app, _) = app_with_token(Some("secret"));
    // Missing version
    let (status, body) = send(&app, "POST", Some("secret"), Some("{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_install_round_trip() {
    let (app, kv) = app_with_token(Some("secret"));

    let (status, body) = send(
        &app,
        "POST",
        Some("secret"),
        Some(r#"{"version": "9.9.9"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["version"], "9.9.9");

    let (status, body) = send(&app, "GET", Some("secret"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], "9.9.9");

    // The document is persisted under the worker-config key
    let persisted = kv.get(CONFIG_KV_KEY).await.expect("kv").expect("persisted");
    let doc: serde_json::Value = serde_json::from_slice(&persisted.bytes).expect("json");
    assert_eq!(doc["version"], "9.9.9");
}

#[tokio::test]
async fn test_other_methods_are_405() {
    let (app, _) = app_with_token(Some("secret"));
    let (status, _) = send(&app, "PUT", Some("secret"), Some("{}")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
