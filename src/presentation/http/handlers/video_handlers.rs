//! Video Handlers
//!
//! The wildcard GET/HEAD handler every playback request lands on.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

use crate::application::context::RequestContext;
use crate::application::use_cases::transform_video::TransformVideoUseCase;
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::tasks::BackgroundScheduler;
use crate::presentation::http::response::build_response;

/// Header checked against the configured cache-bypass value
pub const BYPASS_HEADER: &str = "x-bypass-cache";

/// Serves a transformed video (or its recovery fallback)
pub async fn serve_video(
    State(use_case): State<Arc<TransformVideoUseCase>>,
    State(config): State<Arc<ConfigManager>>,
    State(scheduler): State<Arc<BackgroundScheduler>>,
    method: Method,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response<Body> {
    let path = format!("/{}", path.trim_start_matches('/'));
    let snapshot = config.snapshot();

    let ctx = RequestContext::new(
        method.as_str(),
        &path,
        &query,
        snapshot.doc.debug.enabled,
        snapshot.doc.debug.verbose,
        Some(scheduler),
    );
    ctx.add_breadcrumb("request", "received", serde_json::json!({ "path": path }));

    let bypass_header_present = match &snapshot.doc.cache.bypass_header_value {
        Some(expected) => headers
            .get(BYPASS_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v == expected)
            .unwrap_or(false),
        None => false,
    };

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let result = use_case
        .execute(&ctx, &path, &query, bypass_header_present)
        .await;

    if let Err(e) = &result {
        if e.http_status() >= 500 {
            error!(path = %path, error = %e, "request failed");
        }
    }

    build_response(&ctx, result, range.as_deref(), if_none_match.as_deref())
}
