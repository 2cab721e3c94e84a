//! Request logging middleware
//!
//! One line per request with the gateway outcome: latency, status, and
//! the pipeline verdict read back off the response headers (cache
//! status, error type, recovery flags). Health probes are kept out of
//! the log stream.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::info;

fn header_str<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Logs each video/admin request with its pipeline outcome
pub async fn logging_middleware(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    if path == "/health" {
        return response;
    }

    info!(
        %method,
        path = %path,
        status = %response.status(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        cache = header_str(&response, "x-cache-status").unwrap_or("-"),
        error_type = header_str(&response, "x-error-type").unwrap_or("-"),
        fallback = header_str(&response, "x-fallback-applied").is_some(),
        "request served"
    );

    response
}
