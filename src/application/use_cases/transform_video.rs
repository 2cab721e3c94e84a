//! Transform video use case
//!
//! The request pipeline: resolve options, match an origin, consult the
//! versioned cache, call the upstream transformation service on a miss,
//! run error recovery when it fails, and hand a body (buffered, cached,
//! or streamed) to the response builder. Cache writes, TTL refreshes,
//! purges, and presign renewals all leave through the background
//! scheduler so the response is never blocked.

use bytes::Bytes;
use chrono::Utc;
use futures::stream::BoxStream;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::context::RequestContext;
use crate::application::services::error_recovery::{
    self, RecoveryHeaders, RecoveryInput, RecoveryOutcome,
};
use crate::domain::entities::{OriginMatch, Source, TtlPolicy};
use crate::domain::repositories::KvStore;
use crate::domain::services::{next_source, resolve_origin, ExclusionSet, OptionsResolver};
use crate::domain::value_objects::TransformOptions;
use crate::infrastructure::cache::{cache_key, CacheHit, CacheMetadata, VersionStore, VideoCache};
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::origins::{SourceBody, SourceFetcher};
use crate::infrastructure::upstream::{learned_limits, UpstreamClient, UpstreamSuccess};
use crate::shared::error::GatewayError;

/// TTL applied when the config asks to store indefinitely
const INDEFINITE_TTL_SECONDS: u64 = 10 * 365 * 24 * 3600;

/// Where the served body came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Bypass,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

/// Response body variants the range adapter knows how to slice
pub enum ResponseBody {
    /// Fully buffered artifact (fresh transform or inline cache hit)
    Buffered(Bytes),
    /// Live stream from a direct origin fetch
    Stream {
        stream: BoxStream<'static, Result<Bytes, std::io::Error>>,
        length: Option<u64>,
    },
    /// Chunked cache entry served straight from KV
    Cached { cache: VideoCache, hit: CacheHit },
}

/// The pipeline's answer, consumed by the response builder
pub struct GatewayResponse {
    pub status: u16,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub etag: Option<String>,
    pub cache_status: CacheStatus,
    pub ttl: TtlPolicy,
    pub use_ttl_by_status: bool,
    pub cacheable: bool,
    pub recovery: RecoveryHeaders,
    pub body: ResponseBody,
}

/// Caching decisions for one request: the addressable key and the
/// effective TTL/cacheability after origin and profile overrides
#[derive(Debug, Clone)]
struct CachePlan {
    key: String,
    version: u64,
    ttl: TtlPolicy,
    use_ttl_by_status: bool,
    cacheable: bool,
    origin_name: String,
    bypass: bool,
    store_indefinitely: bool,
    max_size_bytes: u64,
}

impl CachePlan {
    fn ttl_for(&self, status: u16) -> u64 {
        if self.store_indefinitely {
            return INDEFINITE_TTL_SECONDS;
        }
        if self.use_ttl_by_status {
            self.ttl.for_status(status)
        } else {
            self.ttl.ok
        }
    }

    fn should_write(&self, body_len: u64) -> bool {
        !self.bypass && self.cacheable && body_len <= self.max_size_bytes
    }
}

/// Orchestrates one video request end to end
pub struct TransformVideoUseCase {
    config: Arc<ConfigManager>,
    content_store: Arc<dyn KvStore>,
    version_store: Arc<VersionStore>,
    upstream: Arc<UpstreamClient>,
    fetcher: Arc<SourceFetcher>,
}

impl TransformVideoUseCase {
    pub fn new(
        config: Arc<ConfigManager>,
        content_store: Arc<dyn KvStore>,
        version_store: Arc<VersionStore>,
        upstream: Arc<UpstreamClient>,
        fetcher: Arc<SourceFetcher>,
    ) -> Self {
        Self {
            config,
            content_store,
            version_store,
            upstream,
            fetcher,
        }
    }

    pub async fn execute(
        &self,
        ctx: &RequestContext,
        path: &str,
        query: &HashMap<String, String>,
        bypass_header_present: bool,
    ) -> Result<GatewayResponse, GatewayError> {
        let snapshot = self.config.snapshot();
        let limits = learned_limits::current();

        let resolver = OptionsResolver::new(
            &snapshot.doc.video.defaults,
            &snapshot.doc.video.derivatives,
            &snapshot.doc.video.param_mapping,
            snapshot.doc.video.responsive.tolerance,
        );
        let mut options = resolver.resolve(query, limits.max_duration_seconds)?;
        ctx.add_breadcrumb(
            "options",
            "resolved",
            json!({ "mode": options.mode.as_str(), "derivative": options.derivative }),
        );

        let resolved = resolve_origin(&snapshot.origins, path)?;
        let origin = resolved.origin;
        let captures = resolved.captures;
        ctx.add_breadcrumb("origin", "matched", json!({ "origin": origin.name }));
        ctx.set_diagnostic("origin", json!(origin.name));

        // Per-origin quality defaults fill in what the request left on auto
        if let Some(quality) = origin.quality {
            if options.quality.is_auto() {
                options.quality = quality;
            }
        }
        if let Some(compression) = origin.video_compression {
            if options.compression.is_auto() {
                options.compression = compression;
            }
        }

        // Effective cache policy: origin values, then a matching profile
        let mut cacheable = origin.cacheable;
        let mut ttl = origin.ttl;
        if let Some(profile) = snapshot.cache_profile_for(path) {
            ctx.add_breadcrumb(
                "cache",
                "profile applied",
                json!({ "profile": profile.name }),
            );
            cacheable = cacheable && profile.cacheability;
            ttl = profile.ttl;
        }

        let cache = VideoCache::new(self.content_store.clone(), snapshot.cache_policy);
        let logical = cache_key::logical_key(path, &options);
        let version = if snapshot.doc.cache.enable_versioning {
            match self.version_store.current(&logical).await {
                Ok(version) => version,
                Err(e) => {
                    ctx.add_breadcrumb(
                        "cache",
                        "version counter unreadable, assuming 1",
                        json!({ "error": e.to_string() }),
                    );
                    1
                }
            }
        } else {
            1
        };

        let bypass = bypass_header_present
            || !snapshot.doc.cache.enable_kv_cache
            || !cacheable
            || query.contains_key("debug")
            || snapshot
                .doc
                .cache
                .bypass_query_parameters
                .iter()
                .any(|p| query.contains_key(p));

        let plan = CachePlan {
            key: cache_key::versioned_key(&logical, version),
            version,
            ttl,
            use_ttl_by_status: origin.use_ttl_by_status,
            cacheable,
            origin_name: origin.name.clone(),
            bypass,
            store_indefinitely: snapshot.doc.cache.store_indefinitely,
            max_size_bytes: snapshot.doc.cache.max_size_bytes,
        };
        ctx.set_diagnostic("cacheKey", json!(plan.key));
        ctx.set_diagnostic("cacheVersion", json!(plan.version));

        if plan.bypass {
            ctx.add_breadcrumb("cache", "bypassed", json!(null));
        } else {
            match cache.lookup(&plan.key).await {
                Ok(Some(hit)) => {
                    return self.respond_from_cache(ctx, &plan, cache, hit).await;
                }
                Ok(None) => {
                    ctx.add_breadcrumb("cache", "miss", json!({ "key": plan.key }));
                }
                Err(e) => {
                    warn!(key = %plan.key, error = %e, "cache read failed, treating as miss");
                    ctx.add_breadcrumb(
                        "cache",
                        "read error, treating as miss",
                        json!({ "error": e.to_string() }),
                    );
                    let purge_cache = cache.clone();
                    let purge_key = plan.key.clone();
                    let versions = self.version_store.clone();
                    let purge_logical = logical.clone();
                    let bump_ttl = plan.ttl_for(200);
                    ctx.schedule_background("corrupt-entry-purge", async move {
                        if let Err(e) = purge_cache.purge(&purge_key).await {
                            warn!(error = %e, "corrupt entry purge failed");
                        }
                        if let Err(e) = versions.bump(&purge_logical, bump_ttl).await {
                            warn!(error = %e, "version bump after corrupt entry failed");
                        }
                    })
                    .await;
                }
            }
        }

        // MISS (or bypass): call the upstream transformation service
        let source = next_source(origin, &ExclusionSet::new())?.clone();
        let resolved_url = self
            .fetcher
            .resolve_source_url(&source, &captures, path)
            .await?;
        if let Some(refresh) = resolved_url.presign_refresh.clone() {
            let fetcher = (*self.fetcher).clone();
            ctx.schedule_background("presign-refresh", async move {
                if let Err(e) = fetcher.refresh_presigned(&refresh).await {
                    warn!(error = %e, "presigned URL refresh failed");
                }
            })
            .await;
        }

        match self
            .upstream
            .transform(&options, &resolved_url.url, plan.version)
            .await
        {
            Ok(success) => {
                self.respond_transformed(
                    ctx,
                    success,
                    RecoveryHeaders::default(),
                    &options,
                    cache,
                    &plan,
                )
                .await
            }
            Err(error) => {
                let input = RecoveryInput {
                    upstream: &self.upstream,
                    fetcher: &self.fetcher,
                    origin,
                    captures: &captures,
                    request_path: path,
                    options: &options,
                    version: plan.version,
                    failed_source: &source,
                    failed_source_url: &resolved_url.url,
                };
                match error_recovery::recover(ctx, input, error).await? {
                    RecoveryOutcome::Transformed { success, headers } => {
                        self.respond_transformed(ctx, success, headers, &options, cache, &plan)
                            .await
                    }
                    RecoveryOutcome::Fallback {
                        response,
                        headers,
                        source,
                    } => {
                        if headers.video_too_large && !plan.bypass && plan.cacheable {
                            self.schedule_large_file_write(
                                ctx, &source, &captures, path, &options, &cache, &plan,
                            )
                            .await;
                        }

                        ctx.set_diagnostic("fallback", json!(true));
                        let content_length = response.content_length;
                        let body = match response.body {
                            SourceBody::Buffered(bytes) => ResponseBody::Buffered(bytes),
                            SourceBody::Stream(stream) => ResponseBody::Stream {
                                stream,
                                length: content_length,
                            },
                        };
                        Ok(GatewayResponse {
                            status: response.status,
                            content_type: response.content_type,
                            content_length,
                            etag: response.etag,
                            cache_status: CacheStatus::Bypass,
                            ttl: plan.ttl,
                            use_ttl_by_status: plan.use_ttl_by_status,
                            cacheable: false,
                            recovery: headers,
                            body,
                        })
                    }
                }
            }
        }
    }

    async fn respond_from_cache(
        &self,
        ctx: &RequestContext,
        plan: &CachePlan,
        cache: VideoCache,
        hit: CacheHit,
    ) -> Result<GatewayResponse, GatewayError> {
        ctx.add_breadcrumb(
            "cache",
            "hit",
            json!({ "chunked": hit.is_chunked(), "length": hit.metadata.content_length }),
        );
        ctx.set_diagnostic("cacheStatus", json!("HIT"));

        let now = Utc::now().timestamp();
        if cache.should_refresh_ttl(&hit.metadata, now) {
            let refresh_cache = cache.clone();
            let refresh_hit = hit.clone();
            ctx.schedule_background("ttl-refresh", async move {
                if let Err(e) = refresh_cache.refresh_ttl(&refresh_hit).await {
                    warn!(error = %e, "TTL refresh failed");
                }
            })
            .await;
        }

        Ok(GatewayResponse {
            status: 200,
            content_type: hit.metadata.content_type.clone(),
            content_length: Some(hit.metadata.content_length),
            etag: hit.metadata.etag.clone(),
            cache_status: CacheStatus::Hit,
            ttl: plan.ttl,
            use_ttl_by_status: plan.use_ttl_by_status,
            cacheable: plan.cacheable,
            recovery: RecoveryHeaders::default(),
            body: ResponseBody::Cached { cache, hit },
        })
    }

    async fn respond_transformed(
        &self,
        ctx: &RequestContext,
        success: UpstreamSuccess,
        recovery: RecoveryHeaders,
        options: &TransformOptions,
        cache: VideoCache,
        plan: &CachePlan,
    ) -> Result<GatewayResponse, GatewayError> {
        ctx.set_diagnostic(
            "cacheStatus",
            json!(if plan.bypass { "BYPASS" } else { "MISS" }),
        );

        if plan.should_write(success.bytes.len() as u64) {
            // The writer owns its own clone of the bytes; the response
            // body is independent of the background task
            let ttl = plan.ttl_for(success.status);
            let write_cache = cache;
            let write_key = plan.key.clone();
            let write_bytes = success.bytes.clone();
            let mut metadata = CacheMetadata::new(
                &success.content_type,
                plan.version,
                &cache_key::options_digest(options),
                &plan.origin_name,
                ttl,
            );
            metadata.etag = success.etag.clone();
            ctx.schedule_background("cache-write", async move {
                match write_cache
                    .store_entry(&write_key, write_bytes, metadata, ttl)
                    .await
                {
                    Ok(()) => info!(key = %write_key, "cache write complete"),
                    Err(e) => warn!(key = %write_key, error = %e, "cache write failed"),
                }
            })
            .await;
        }

        Ok(GatewayResponse {
            status: success.status,
            content_type: success.content_type,
            content_length: Some(success.bytes.len() as u64),
            etag: success.etag,
            cache_status: if plan.bypass {
                CacheStatus::Bypass
            } else {
                CacheStatus::Miss
            },
            ttl: plan.ttl,
            use_ttl_by_status: plan.use_ttl_by_status,
            cacheable: plan.cacheable,
            recovery,
            body: ResponseBody::Buffered(success.bytes),
        })
    }

    /// Oversized originals are streamed to the client now and re-fetched
    /// in the background for a chunked cache write, so the next request
    /// is a hit even though transformation was impossible
    #[allow(clippy::too_many_arguments)]
    async fn schedule_large_file_write(
        &self,
        ctx: &RequestContext,
        source: &Source,
        captures: &OriginMatch,
        path: &str,
        options: &TransformOptions,
        cache: &VideoCache,
        plan: &CachePlan,
    ) {
        let fetcher = (*self.fetcher).clone();
        let cache = cache.clone();
        let source = source.clone();
        let captures = captures.clone();
        let path = path.to_string();
        let key = plan.key.clone();
        let version = plan.version;
        let digest = cache_key::options_digest(options);
        let origin_name = plan.origin_name.clone();
        let ttl = plan.ttl_for(200);

        ctx.schedule_background("large-file-cache-write", async move {
            let response = match fetcher.fetch_direct(&source, &captures, &path).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "large-file background fetch failed");
                    return;
                }
            };
            let original_length = response.content_length;
            let content_type = response.content_type.clone();
            let etag = response.etag.clone();
            let bytes = match response.body.collect().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(error = %e, "large-file background body read failed");
                    return;
                }
            };

            let mut metadata =
                CacheMetadata::new(&content_type, version, &digest, &origin_name, ttl);
            metadata.original_length = original_length;
            metadata.etag = etag;
            match cache.store_entry(&key, bytes, metadata, ttl).await {
                Ok(()) => info!(key = %key, "large file cached in chunks"),
                Err(e) => warn!(key = %key, error = %e, "large-file cache write failed"),
            }
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(use_by_status: bool, store_indefinitely: bool) -> CachePlan {
        CachePlan {
            key: "v1:abc".to_string(),
            version: 1,
            ttl: TtlPolicy {
                ok: 3600,
                redirects: 300,
                client_error: 60,
                server_error: 10,
            },
            use_ttl_by_status: use_by_status,
            cacheable: true,
            origin_name: "videos".to_string(),
            bypass: false,
            store_indefinitely,
            max_size_bytes: 1024,
        }
    }

    #[test]
    fn test_ttl_prefers_status_bucket_when_enabled() {
        assert_eq!(plan(false, false).ttl_for(404), 3600);
        assert_eq!(plan(true, false).ttl_for(404), 60);
        assert_eq!(plan(true, false).ttl_for(200), 3600);
    }

    #[test]
    fn test_store_indefinitely_overrides_ttl() {
        assert_eq!(plan(true, true).ttl_for(200), INDEFINITE_TTL_SECONDS);
    }

    #[test]
    fn test_write_gated_by_bypass_and_size() {
        let p = plan(false, false);
        assert!(p.should_write(1024));
        assert!(!p.should_write(1025));

        let mut bypassed = plan(false, false);
        bypassed.bypass = true;
        assert!(!bypassed.should_write(10));

        let mut uncacheable = plan(false, false);
        uncacheable.cacheable = false;
        assert!(!uncacheable.should_write(10));
    }

    #[test]
    fn test_cache_status_strings() {
        assert_eq!(CacheStatus::Hit.as_str(), "HIT");
        assert_eq!(CacheStatus::Miss.as_str(), "MISS");
        assert_eq!(CacheStatus::Bypass.as_str(), "BYPASS");
    }
}
