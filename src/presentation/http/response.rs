//! Response builder
//!
//! The single place pipeline outcomes become HTTP. Stamps cache status,
//! recovery and debug headers, applies the TTL-derived cache-control,
//! satisfies range and conditional requests uniformly across body
//! variants, and renders the JSON error contract.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use futures::StreamExt;
use serde_json::json;

use super::range::slice_stream;
use crate::application::context::RequestContext;
use crate::application::services::error_recovery::RecoveryHeaders;
use crate::application::use_cases::transform_video::{GatewayResponse, ResponseBody};
use crate::domain::value_objects::{byte_range, ByteRange};
use crate::shared::error::GatewayError;

/// Builds the final HTTP response from the pipeline outcome
pub fn build_response(
    ctx: &RequestContext,
    result: Result<GatewayResponse, GatewayError>,
    range_header: Option<&str>,
    if_none_match: Option<&str>,
) -> Response<Body> {
    match result {
        Ok(response) => success_response(ctx, response, range_header, if_none_match),
        Err(error) => error_response(ctx, &error),
    }
}

fn success_response(
    ctx: &RequestContext,
    response: GatewayResponse,
    range_header: Option<&str>,
    if_none_match: Option<&str>,
) -> Response<Body> {
    // debug=view replaces the body with the diagnostics dump
    if ctx.debug.view {
        return debug_view_response(ctx);
    }

    let mut headers = HeaderMap::new();
    insert(&mut headers, header::CONTENT_TYPE.as_str(), &response.content_type);
    insert(&mut headers, header::ACCEPT_RANGES.as_str(), "bytes");
    insert(&mut headers, "x-cache-status", response.cache_status.as_str());
    apply_recovery_headers(&mut headers, &response.recovery);

    let cache_control = if (200..300).contains(&response.status) && response.cacheable {
        format!("public, max-age={}", response.ttl.ok)
    } else {
        "no-store".to_string()
    };
    insert(&mut headers, header::CACHE_CONTROL.as_str(), &cache_control);

    if let Some(etag) = &response.etag {
        insert(&mut headers, header::ETAG.as_str(), &format!("\"{}\"", etag));
    }
    apply_debug_headers(ctx, &mut headers);

    // Conditional revalidation against the stored ETag
    if let (Some(candidate), Some(etag)) = (if_none_match, &response.etag) {
        if candidate.trim_matches('"') == etag {
            return with_headers(StatusCode::NOT_MODIFIED, headers, Body::empty());
        }
    }

    if let (Some(range_value), Some(total)) = (range_header, response.content_length) {
        return match ByteRange::parse(range_value, total) {
            Ok(range) => {
                insert(
                    &mut headers,
                    header::CONTENT_RANGE.as_str(),
                    &range.content_range(total),
                );
                insert(
                    &mut headers,
                    header::CONTENT_LENGTH.as_str(),
                    &range.len().to_string(),
                );
                let body = range_body(ctx, response.body, range);
                with_headers(StatusCode::PARTIAL_CONTENT, headers, body)
            }
            Err(unsatisfiable) => {
                insert(
                    &mut headers,
                    header::CONTENT_RANGE.as_str(),
                    &byte_range::unsatisfiable_content_range(unsatisfiable.total),
                );
                insert(&mut headers, header::CACHE_CONTROL.as_str(), "no-store");
                insert(
                    &mut headers,
                    header::CONTENT_TYPE.as_str(),
                    "application/json",
                );
                let body = Body::from(
                    json!({
                        "error": "RANGE_NOT_SATISFIABLE",
                        "message": format!("range '{}' cannot be satisfied against {} bytes", range_value, total),
                        "statusCode": 416,
                    })
                    .to_string(),
                );
                with_headers(StatusCode::RANGE_NOT_SATISFIABLE, headers, body)
            }
        };
    }

    if let Some(length) = response.content_length {
        insert(
            &mut headers,
            header::CONTENT_LENGTH.as_str(),
            &length.to_string(),
        );
    }
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
    let body = full_body(ctx, response.body);
    with_headers(status, headers, body)
}

fn error_response(ctx: &RequestContext, error: &GatewayError) -> Response<Body> {
    let status_code = error.http_status();
    let status = StatusCode::from_u16(status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut headers = HeaderMap::new();
    insert(&mut headers, "x-error-type", error.error_type());
    insert(&mut headers, header::CACHE_CONTROL.as_str(), "no-store");
    insert(&mut headers, header::CONTENT_TYPE.as_str(), "application/json");
    apply_debug_headers(ctx, &mut headers);

    if ctx.debug.view {
        return debug_view_response(ctx);
    }

    let body = Body::from(
        json!({
            "error": error.error_type(),
            "message": error.to_string(),
            "statusCode": status_code,
        })
        .to_string(),
    );
    with_headers(status, headers, body)
}

fn debug_view_response(ctx: &RequestContext) -> Response<Body> {
    let mut headers = HeaderMap::new();
    insert(&mut headers, header::CONTENT_TYPE.as_str(), "application/json");
    insert(&mut headers, header::CACHE_CONTROL.as_str(), "no-store");
    let report = ctx.diagnostics_report();
    with_headers(
        StatusCode::OK,
        headers,
        Body::from(serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())),
    )
}

fn full_body(ctx: &RequestContext, body: ResponseBody) -> Body {
    match body {
        ResponseBody::Buffered(bytes) => Body::from(bytes),
        ResponseBody::Stream { stream, .. } => {
            let handle = ctx.register_stream();
            Body::from_stream(stream.take_until(handle.token().cancelled_owned()))
        }
        ResponseBody::Cached { cache, hit } => Body::from_stream(cache.full_stream(&hit)),
    }
}

fn range_body(ctx: &RequestContext, body: ResponseBody, range: ByteRange) -> Body {
    match body {
        ResponseBody::Buffered(bytes) => {
            Body::from(bytes.slice(range.start as usize..(range.end + 1) as usize))
        }
        ResponseBody::Stream { stream, .. } => {
            let handle = ctx.register_stream();
            Body::from_stream(
                slice_stream(stream, range).take_until(handle.token().cancelled_owned()),
            )
        }
        ResponseBody::Cached { cache, hit } => Body::from_stream(cache.range_stream(&hit, range)),
    }
}

fn apply_recovery_headers(headers: &mut HeaderMap, recovery: &RecoveryHeaders) {
    if recovery.retry_applied {
        insert(headers, "x-retry-applied", "true");
        if let Some(failed) = &recovery.failed_source {
            insert(headers, "x-failed-source", failed);
        }
        if let Some(alternative) = &recovery.alternative_source {
            insert(headers, "x-alternative-source", alternative);
        }
    }
    if recovery.fallback_applied {
        insert(headers, "x-fallback-applied", "true");
    }
    if recovery.video_too_large {
        insert(headers, "x-video-too-large", "true");
        insert(headers, "x-video-exceeds-256mib", "true");
        insert(headers, "x-file-size-error", "true");
    }
    if recovery.bypass_cache {
        insert(headers, "x-bypass-cache-api", "true");
        insert(headers, "x-direct-stream-only", "true");
    }
}

fn apply_debug_headers(ctx: &RequestContext, headers: &mut HeaderMap) {
    if !ctx.debug.enabled {
        return;
    }
    insert(headers, "x-request-id", &ctx.id.to_string());
    insert(headers, "x-response-time-ms", &ctx.elapsed_ms().to_string());
    for (category, count) in ctx.breadcrumb_counts() {
        let name = format!("x-breadcrumbs-{}", sanitize_header_token(&category));
        insert(headers, &name, &count.to_string());
    }
}

fn sanitize_header_token(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

fn insert(headers: &mut HeaderMap, name: &str, value: &str) {
    if let (Ok(name), Ok(value)) = (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        headers.insert(name, value);
    }
}

fn with_headers(status: StatusCode, headers: HeaderMap, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
