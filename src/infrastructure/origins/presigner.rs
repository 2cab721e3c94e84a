//! Presigned URL cache
//!
//! Signed GET URLs are cached in their own KV namespace keyed by
//! (bucket, key, expiry) with a TTL slightly shorter than the signature
//! lifetime. When a cached URL drops below 20% of its lifetime the
//! caller is told to schedule a background refresh.

use bytes::Bytes;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::domain::repositories::KvStore;
use crate::interfaces::external_services::ObjectStore;
use crate::shared::error::ProcessingError;

/// Default signature lifetime
pub const DEFAULT_PRESIGN_EXPIRES_SECONDS: u64 = 3600;

/// Remaining-lifetime fraction below which a refresh is scheduled
const REFRESH_THRESHOLD: f64 = 0.20;

/// A cached or freshly-signed URL
#[derive(Debug, Clone)]
pub struct PresignedUrl {
    pub url: String,
    /// True when the cached signature is nearing expiry and should be
    /// re-signed in the background
    pub needs_refresh: bool,
}

/// Cache of SigV4 presigned URLs
pub struct PresignedUrlCache {
    store: Arc<dyn KvStore>,
    object_store: Arc<dyn ObjectStore>,
}

impl PresignedUrlCache {
    pub fn new(store: Arc<dyn KvStore>, object_store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            object_store,
        }
    }

    fn kv_key(bucket_binding: &str, key: &str, expires_in_seconds: u64) -> String {
        format!(
            "presigned:{}:{}:{}",
            bucket_binding,
            key.trim_start_matches('/'),
            expires_in_seconds
        )
    }

    /// Returns a presigned URL, serving from cache when a live one exists
    pub async fn presigned_url(
        &self,
        bucket_binding: &str,
        key: &str,
        expires_in_seconds: u64,
    ) -> Result<PresignedUrl, ProcessingError> {
        let kv_key = Self::kv_key(bucket_binding, key, expires_in_seconds);

        // Cache read errors degrade to a fresh signature
        if let Ok(Some(cached)) = self.store.get(&kv_key).await {
            if let Ok(url) = String::from_utf8(cached.bytes.to_vec()) {
                let issued_at = cached
                    .metadata
                    .as_ref()
                    .and_then(|m| m.get("issuedAt"))
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0);
                let now = Utc::now().timestamp();
                let remaining = issued_at + expires_in_seconds as i64 - now;

                if remaining > 0 {
                    let needs_refresh =
                        (remaining as f64) < expires_in_seconds as f64 * REFRESH_THRESHOLD;
                    return Ok(PresignedUrl { url, needs_refresh });
                }
            }
        }

        let url = self.sign_and_store(bucket_binding, key, expires_in_seconds).await?;
        Ok(PresignedUrl {
            url,
            needs_refresh: false,
        })
    }

    /// Re-signs and rewrites the cached entry; background refresh path
    pub async fn refresh(
        &self,
        bucket_binding: &str,
        key: &str,
        expires_in_seconds: u64,
    ) -> Result<(), ProcessingError> {
        debug!(bucket_binding, key, "refreshing presigned URL");
        self.sign_and_store(bucket_binding, key, expires_in_seconds)
            .await?;
        Ok(())
    }

    async fn sign_and_store(
        &self,
        bucket_binding: &str,
        key: &str,
        expires_in_seconds: u64,
    ) -> Result<String, ProcessingError> {
        let url = self
            .object_store
            .presign_get(bucket_binding, key, expires_in_seconds)
            .await?;

        let kv_key = Self::kv_key(bucket_binding, key, expires_in_seconds);
        let metadata = json!({ "issuedAt": Utc::now().timestamp() });
        // Stored TTL sits below the signature lifetime so the cache
        // never serves a URL that has already expired
        let ttl = expires_in_seconds.saturating_mul(9) / 10;

        if let Err(e) = self
            .store
            .put(&kv_key, Bytes::from(url.clone()), Some(metadata), Some(ttl))
            .await
        {
            debug!(error = %e, "presigned URL cache write failed");
        }

        Ok(url)
    }
}
