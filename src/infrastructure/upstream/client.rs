//! Upstream transformation client
//!
//! Issues the constructed transformation URL against the media CDN,
//! classifies the reply (status, error header, content-type allowlist),
//! and feeds limit declarations in error text back into the learned
//! limits cell.

use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::error_codes::{classify, parse_error_header, UPSTREAM_ERROR_HEADER};
use super::learned_limits;
use super::transform_url::build_transform_url;
use crate::domain::value_objects::{TransformMode, TransformOptions};
use crate::shared::error::ProcessingError;

/// Default upstream fetch timeout
pub const DEFAULT_UPSTREAM_TIMEOUT_SECONDS: u64 = 30;

/// A classified successful transformation
#[derive(Debug, Clone)]
pub struct UpstreamSuccess {
    pub status: u16,
    pub content_type: String,
    pub etag: Option<String>,
    pub bytes: Bytes,
}

/// Client for the upstream transformation service
pub struct UpstreamClient {
    http: Client,
    base_url: String,
    timeout_seconds: u64,
}

impl UpstreamClient {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Result<Self, ProcessingError> {
        Ok(Self {
            http: Client::builder()
                .timeout(Duration::from_secs(timeout_seconds))
                .build()
                .map_err(|e| ProcessingError::FetchFailed(e.to_string()))?,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_seconds,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Runs one transformation attempt and classifies the reply
    pub async fn transform(
        &self,
        options: &TransformOptions,
        source_url: &str,
        version: u64,
    ) -> Result<UpstreamSuccess, ProcessingError> {
        let url = build_transform_url(&self.base_url, options, source_url, version);
        debug!(url = %url, "upstream transform request");

        let response = self.http.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProcessingError::Timeout(self.timeout_seconds)
            } else {
                ProcessingError::FetchFailed(e.to_string())
            }
        })?;

        let status = response.status().as_u16();

        let error_code = response
            .headers()
            .get(UPSTREAM_ERROR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_error_header);

        if let Some(code) = error_code {
            let body = response.text().await.unwrap_or_default();
            if learned_limits::learn_from_error_text(&body) {
                debug!(code, "learned new upstream limits from error reply");
            }
            let spec = classify(code);
            warn!(code, status = spec.http_status, "upstream signalled error");
            return Err(ProcessingError::TransformFailed {
                code: Some(code),
                status: spec.http_status,
                message: truncate(&body, 256),
                retryable: spec.retryable,
                should_fallback: spec.should_fallback,
            });
        }

        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            learned_limits::learn_from_error_text(&body);
            return Err(ProcessingError::TransformFailed {
                code: None,
                status: 502,
                message: format!("upstream returned {}: {}", status, truncate(&body, 256)),
                retryable: status >= 500,
                should_fallback: true,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        if !content_type_allowed(&content_type, options.mode) {
            return Err(ProcessingError::TransformFailed {
                code: None,
                status: 502,
                message: format!("upstream returned non-media content-type: {}", content_type),
                retryable: false,
                should_fallback: true,
            });
        }

        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string());

        if let Some(length) = response.content_length() {
            let max = learned_limits::current().max_file_size_bytes;
            if length > max {
                return Err(ProcessingError::TransformFailed {
                    code: Some(super::error_codes::FILE_SIZE_LIMIT_CODE),
                    status: 502,
                    message: format!("transformed body of {} bytes exceeds limit {}", length, max),
                    retryable: false,
                    should_fallback: true,
                });
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProcessingError::FetchFailed(e.to_string()))?;

        Ok(UpstreamSuccess {
            status,
            content_type,
            etag,
            bytes,
        })
    }
}

/// Media content-type allowlist, per transformation mode
pub fn content_type_allowed(content_type: &str, mode: TransformMode) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();

    if essence.starts_with("video/")
        || essence == "application/x-mpegurl"
        || essence == "application/dash+xml"
    {
        return true;
    }
    match mode {
        TransformMode::Frame | TransformMode::Spritesheet => essence.starts_with("image/"),
        TransformMode::Audio => essence.starts_with("audio/"),
        TransformMode::Video => false,
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        text.to_string()
    } else {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &text[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_allowlist() {
        assert!(content_type_allowed("video/mp4", TransformMode::Video));
        assert!(content_type_allowed(
            "application/x-mpegURL",
            TransformMode::Video
        ));
        assert!(content_type_allowed("image/jpeg", TransformMode::Frame));
        assert!(content_type_allowed("audio/mp4", TransformMode::Audio));

        assert!(!content_type_allowed("image/jpeg", TransformMode::Video));
        assert!(!content_type_allowed("text/html", TransformMode::Video));
        assert!(!content_type_allowed("audio/mp4", TransformMode::Frame));
    }

    #[test]
    fn test_content_type_parameters_ignored() {
        assert!(content_type_allowed(
            "video/mp4; codecs=\"avc1\"",
            TransformMode::Video
        ));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "aé".repeat(200);
        let cut = truncate(&text, 257);
        assert!(cut.len() <= 261);
    }
}
