//! Error recovery state machine
//!
//! One function walks the chart: retry the same source with backoff when
//! the failure is retryable, re-resolve with exclusions for an
//! alternative source, and finally fetch the original bytes directly and
//! serve them untransformed. Oversized-input failures skip straight to
//! the direct fetch. Every outcome is a value; nothing is thrown through
//! layers.

use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::application::context::RequestContext;
use crate::domain::entities::{Origin, OriginMatch, Source};
use crate::domain::services::{next_source, ExclusionSet};
use crate::domain::value_objects::TransformOptions;
use crate::infrastructure::origins::{SourceFetcher, SourceResponse};
use crate::infrastructure::upstream::error_codes::{is_file_size_limit, is_resource_not_found};
use crate::infrastructure::upstream::{UpstreamClient, UpstreamSuccess};
use crate::shared::error::{GatewayError, ProcessingError};

/// Same-source retry budget
pub const MAX_RETRIES: u32 = 2;
/// Base backoff; attempt n waits `100ms * 2^n` plus jitter
pub const BASE_BACKOFF_MS: u64 = 100;

/// Headers the response builder stamps for each recovery outcome
#[derive(Debug, Clone, Default)]
pub struct RecoveryHeaders {
    pub retry_applied: bool,
    pub failed_source: Option<String>,
    pub alternative_source: Option<String>,
    pub fallback_applied: bool,
    pub video_too_large: bool,
    pub bypass_cache: bool,
}

/// Terminal states of the recovery chart
pub enum RecoveryOutcome {
    /// An alternative attempt produced a transformed artifact
    Transformed {
        success: UpstreamSuccess,
        headers: RecoveryHeaders,
    },
    /// Direct fetch succeeded; the client gets the original bytes
    Fallback {
        response: SourceResponse,
        headers: RecoveryHeaders,
        /// Which source served the fallback, for the background writer
        source: Source,
    },
}

/// Everything the machine needs to walk the chart
pub struct RecoveryInput<'a> {
    pub upstream: &'a UpstreamClient,
    pub fetcher: &'a SourceFetcher,
    pub origin: &'a Origin,
    pub captures: &'a OriginMatch,
    pub request_path: &'a str,
    pub options: &'a TransformOptions,
    pub version: u64,
    /// The source whose attempt triggered recovery
    pub failed_source: &'a Source,
    /// The source URL of the failed attempt, for same-source retries
    pub failed_source_url: &'a str,
}

/// Runs the state machine for an upstream failure
pub async fn recover(
    ctx: &RequestContext,
    input: RecoveryInput<'_>,
    initial_error: ProcessingError,
) -> Result<RecoveryOutcome, GatewayError> {
    ctx.add_breadcrumb(
        "recovery",
        "entering error recovery",
        json!({ "error": initial_error.to_string() }),
    );

    let too_large = matches!(
        initial_error,
        ProcessingError::TransformFailed { code: Some(code), .. } if is_file_size_limit(code)
    );
    if too_large {
        ctx.add_breadcrumb("recovery", "file size limit, direct fetch", json!(null));
        return direct_fetch(ctx, &input, initial_error, true).await;
    }

    // RETRY_SAME_SOURCE
    if initial_error.is_retryable() {
        for attempt in 0..MAX_RETRIES {
            tokio::time::sleep(backoff_delay(attempt)).await;
            ctx.add_breadcrumb(
                "recovery",
                "retrying same source",
                json!({ "attempt": attempt + 1 }),
            );
            match input
                .upstream
                .transform(input.options, input.failed_source_url, input.version)
                .await
            {
                Ok(success) => {
                    info!(attempt, "same-source retry succeeded");
                    return Ok(RecoveryOutcome::Transformed {
                        success,
                        headers: RecoveryHeaders::default(),
                    });
                }
                Err(e) if matches!(&e, ProcessingError::TransformFailed { code: Some(code), .. } if is_file_size_limit(*code)) =>
                {
                    return direct_fetch(ctx, &input, e, true).await;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "same-source retry failed");
                    if !e.is_retryable() {
                        break;
                    }
                }
            }
        }
    } else if !initial_error.should_fallback() {
        // A not-found from one source may still exist on another; every
        // other non-fallback failure is the client's and surfaces as-is
        let not_found = matches!(
            initial_error,
            ProcessingError::TransformFailed { code: Some(code), .. } if is_resource_not_found(code)
        );
        if !not_found {
            return Err(GatewayError::Processing(initial_error));
        }
    }

    // ALT_SOURCE
    let mut exclusions = ExclusionSet::new();
    exclusions.exclude(&input.origin.name, input.failed_source);

    loop {
        let source = match next_source(input.origin, &exclusions) {
            Ok(source) => source.clone(),
            Err(_) => break,
        };
        ctx.add_breadcrumb(
            "recovery",
            "trying alternative source",
            json!({ "source": source.kind().as_str(), "priority": source.priority() }),
        );

        let resolved = match input
            .fetcher
            .resolve_source_url(&source, input.captures, input.request_path)
            .await
        {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(error = %e, "alternative source URL resolution failed");
                exclusions.exclude(&input.origin.name, &source);
                continue;
            }
        };

        match input
            .upstream
            .transform(input.options, &resolved.url, input.version)
            .await
        {
            Ok(success) => {
                info!(
                    failed = %input.failed_source.kind(),
                    alternative = %source.kind(),
                    "alternative source succeeded"
                );
                return Ok(RecoveryOutcome::Transformed {
                    success,
                    headers: RecoveryHeaders {
                        retry_applied: true,
                        failed_source: Some(input.failed_source.kind().to_string()),
                        alternative_source: Some(source.kind().to_string()),
                        ..Default::default()
                    },
                });
            }
            Err(e) if matches!(&e, ProcessingError::TransformFailed { code: Some(code), .. } if is_file_size_limit(*code)) =>
            {
                return direct_fetch(ctx, &input, e, true).await;
            }
            Err(e) => {
                warn!(source = %source.kind(), error = %e, "alternative source failed");
                exclusions.exclude(&input.origin.name, &source);
            }
        }
    }

    // DIRECT_FETCH
    direct_fetch(ctx, &input, initial_error, false).await
}

/// Fetches original bytes from the first viable source
async fn direct_fetch(
    ctx: &RequestContext,
    input: &RecoveryInput<'_>,
    terminal_error: ProcessingError,
    too_large: bool,
) -> Result<RecoveryOutcome, GatewayError> {
    for source in input.origin.sources_by_priority() {
        ctx.add_breadcrumb(
            "recovery",
            "direct fetch attempt",
            json!({ "source": source.kind().as_str() }),
        );
        match input
            .fetcher
            .fetch_direct(source, input.captures, input.request_path)
            .await
        {
            Ok(response) => {
                info!(source = %source.kind(), "direct fetch fallback succeeded");
                return Ok(RecoveryOutcome::Fallback {
                    response,
                    headers: RecoveryHeaders {
                        fallback_applied: true,
                        video_too_large: too_large,
                        bypass_cache: true,
                        ..Default::default()
                    },
                    source: (*source).clone(),
                });
            }
            Err(e) => {
                warn!(source = %source.kind(), error = %e, "direct fetch failed");
            }
        }
    }

    ctx.add_breadcrumb("recovery", "all recovery paths exhausted", json!(null));
    Err(GatewayError::Processing(terminal_error))
}

/// Exponential backoff with a little jitter so synchronized retries from
/// concurrent requests spread out
fn backoff_delay(attempt: u32) -> Duration {
    let base = BASE_BACKOFF_MS.saturating_mul(1 << attempt);
    let jitter = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 % 50)
        .unwrap_or(0);
    Duration::from_millis(base + jitter)
}
