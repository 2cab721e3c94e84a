//! Admin Handlers
//!
//! Configuration endpoint: GET returns the active snapshot, POST
//! validates, installs, persists, and distributes a new document. Both
//! require the bearer token; unsupported methods get the router's 405.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::infrastructure::config::{ConfigManager, GatewayConfigDoc};
use crate::shared::error::ConfigError;

/// Bearer token the admin endpoint is protected with
#[derive(Clone)]
pub struct AdminToken(pub Option<String>);

fn authorize(token: &AdminToken, headers: &HeaderMap) -> Result<(), (StatusCode, Json<serde_json::Value>)> {
    let expected = token.0.as_deref().ok_or_else(|| unauthorized("admin token not configured"))?;
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| unauthorized("missing bearer token"))?;

    if presented != expected {
        return Err(unauthorized("invalid bearer token"));
    }
    Ok(())
}

fn unauthorized(message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "error": message })),
    )
}

/// Returns the active configuration document
pub async fn get_config(
    State(config): State<Arc<ConfigManager>>,
    State(token): State<AdminToken>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Err(denied) = authorize(&token, &headers) {
        return denied.into_response();
    }
    Json(config.snapshot().doc.clone()).into_response()
}

/// Validates and installs a new configuration document
pub async fn update_config(
    State(config): State<Arc<ConfigManager>>,
    State(token): State<AdminToken>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Err(denied) = authorize(&token, &headers) {
        return denied.into_response();
    }

    let doc: GatewayConfigDoc = match serde_json::from_slice(&body) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(error = %e, "config upload is not valid JSON");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": format!("invalid JSON: {}", e) })),
            )
                .into_response();
        }
    };

    match config.install(doc).await {
        Ok(installed) => {
            info!(version = %installed.doc.version, "config updated via admin endpoint");
            Json(json!({ "success": true, "version": installed.doc.version })).into_response()
        }
        Err(ConfigError::Storage(message)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": message })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": e.to_string() })),
        )
            .into_response(),
    }
}
