//! Health Handlers
//!
//! Liveness probe for the gateway process.

use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

/// Liveness payload
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Liveness endpoint.
///
/// Answers from process state alone: no origin, upstream, or KV calls
/// are made, so a degraded backend never fails the probe. Routed ahead
/// of the wildcard video path and excluded from request logging.
pub async fn health_check() -> impl IntoResponse {
    Json(HealthStatus {
        status: "ok",
        service: "vidgated",
        version: env!("CARGO_PKG_VERSION"),
    })
}
