//! Versioned content cache with chunked storage
//!
//! Transformed artifacts are stored under their versioned fingerprint.
//! Small bodies are a single inline entry; large bodies are split into
//! fixed-size chunks under `chunk:<key>:<index>` sub-keys with a
//! manifest entry written last, so a partially-written entry is never
//! observable. Range requests stream only the chunks that overlap the
//! requested window.

use bytes::Bytes;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::cache_key::{chunk_key, chunk_prefix};
use crate::domain::repositories::KvStore;
use crate::domain::value_objects::ByteRange;
use crate::shared::error::KvError;

/// Bodies at or below this size are stored inline (bytes)
pub const DEFAULT_INLINE_THRESHOLD: u64 = 20 * 1024 * 1024;
/// Fixed chunk size for larger bodies (bytes); the last chunk may be smaller
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Cache sizing and TTL-refresh policy
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub inline_threshold: u64,
    pub chunk_size: u64,
    /// Refresh only after this fraction of the TTL has elapsed
    pub min_elapsed_percent: f64,
    /// Refresh only while at least this much TTL remains
    pub min_remaining_seconds: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            inline_threshold: DEFAULT_INLINE_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            min_elapsed_percent: 0.10,
            min_remaining_seconds: 60,
        }
    }
}

/// Chunk layout recorded on a manifest entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkManifest {
    pub count: usize,
    pub chunk_size: u64,
}

/// Metadata stored alongside every cache entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    pub content_type: String,
    /// Transformed byte length; equals the sum of chunk lengths
    pub content_length: u64,
    /// Original (untransformed) byte length when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_length: Option<u64>,
    pub created_at: i64,
    pub expires_at: i64,
    pub version: u64,
    pub options_digest: String,
    pub origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<ChunkManifest>,
}

impl CacheMetadata {
    pub fn new(
        content_type: &str,
        version: u64,
        options_digest: &str,
        origin: &str,
        ttl_seconds: u64,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            content_type: content_type.to_string(),
            content_length: 0,
            original_length: None,
            created_at: now,
            expires_at: now + ttl_seconds as i64,
            version,
            options_digest: options_digest.to_string(),
            origin: origin.to_string(),
            etag: None,
            chunks: None,
        }
    }

    /// Full TTL this entry was written with
    pub fn ttl_seconds(&self) -> u64 {
        (self.expires_at - self.created_at).max(0) as u64
    }

    pub fn remaining_seconds(&self, now: i64) -> u64 {
        (self.expires_at - now).max(0) as u64
    }
}

#[derive(Debug, Clone)]
enum CachedBody {
    Inline(Bytes),
    Chunked(ChunkManifest),
}

/// A successful cache read: metadata plus a handle to the body
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub key: String,
    pub metadata: CacheMetadata,
    body: CachedBody,
}

impl CacheHit {
    pub fn is_chunked(&self) -> bool {
        matches!(self.body, CachedBody::Chunked(_))
    }
}

/// The versioned KV content cache
#[derive(Clone)]
pub struct VideoCache {
    store: Arc<dyn KvStore>,
    policy: CachePolicy,
}

impl VideoCache {
    pub fn new(store: Arc<dyn KvStore>, policy: CachePolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Reads the manifest/inline entry for a key. Errors mean a corrupt
    /// entry; callers treat them as misses and purge in the background.
    pub async fn lookup(&self, key: &str) -> Result<Option<CacheHit>, KvError> {
        let value = match self.store.get(key).await? {
            Some(value) => value,
            None => return Ok(None),
        };

        let metadata_json = value.metadata.ok_or_else(|| KvError::CorruptEntry {
            key: key.to_string(),
            message: "entry has no metadata".to_string(),
        })?;
        let metadata: CacheMetadata =
            serde_json::from_value(metadata_json).map_err(|e| KvError::CorruptEntry {
                key: key.to_string(),
                message: format!("metadata parse error: {}", e),
            })?;

        let body = match metadata.chunks {
            Some(manifest) => CachedBody::Chunked(manifest),
            None => {
                if value.bytes.len() as u64 != metadata.content_length {
                    return Err(KvError::CorruptEntry {
                        key: key.to_string(),
                        message: format!(
                            "inline length {} does not match metadata {}",
                            value.bytes.len(),
                            metadata.content_length
                        ),
                    });
                }
                CachedBody::Inline(value.bytes)
            }
        };

        Ok(Some(CacheHit {
            key: key.to_string(),
            metadata,
            body,
        }))
    }

    /// Writes an entry. Chunks are written in order first; the manifest
    /// goes last, so a failed chunk write abandons the entry and the
    /// orphaned chunks simply expire at their own TTL.
    pub async fn store_entry(
        &self,
        key: &str,
        bytes: Bytes,
        mut metadata: CacheMetadata,
        ttl_seconds: u64,
    ) -> Result<(), KvError> {
        metadata.content_length = bytes.len() as u64;

        if bytes.len() as u64 <= self.policy.inline_threshold {
            metadata.chunks = None;
            let metadata_json = serde_json::to_value(&metadata)?;
            return self
                .store
                .put(key, bytes, Some(metadata_json), Some(ttl_seconds))
                .await;
        }

        let chunk_size = self.policy.chunk_size as usize;
        let count = bytes.len().div_ceil(chunk_size);
        for index in 0..count {
            let start = index * chunk_size;
            let end = ((index + 1) * chunk_size).min(bytes.len());
            self.store
                .put(
                    &chunk_key(key, index),
                    bytes.slice(start..end),
                    None,
                    Some(ttl_seconds),
                )
                .await?;
        }

        metadata.chunks = Some(ChunkManifest {
            count,
            chunk_size: self.policy.chunk_size,
        });
        let metadata_json = serde_json::to_value(&metadata)?;
        self.store
            .put(key, Bytes::new(), Some(metadata_json), Some(ttl_seconds))
            .await
    }

    /// Lazily streams the full body, chunk by chunk for chunked entries
    pub fn full_stream(&self, hit: &CacheHit) -> BoxStream<'static, Result<Bytes, KvError>> {
        if hit.metadata.content_length == 0 {
            return stream::empty().boxed();
        }
        let range = ByteRange {
            start: 0,
            end: hit.metadata.content_length - 1,
        };
        self.range_stream(hit, range)
    }

    /// Streams exactly the requested window, touching only the chunks
    /// in `[start/chunk_size, end/chunk_size]` and slicing the first and
    /// last to the intra-chunk offsets.
    pub fn range_stream(
        &self,
        hit: &CacheHit,
        range: ByteRange,
    ) -> BoxStream<'static, Result<Bytes, KvError>> {
        match &hit.body {
            CachedBody::Inline(bytes) => {
                let slice = bytes.slice(range.start as usize..(range.end + 1) as usize);
                stream::once(async move { Ok(slice) }).boxed()
            }
            CachedBody::Chunked(manifest) => {
                let store = self.store.clone();
                let key = hit.key.clone();
                let chunk_size = manifest.chunk_size;
                let total = hit.metadata.content_length;
                let last_index = range.end / chunk_size;
                let (start, end) = (range.start, range.end);

                stream::try_unfold(range.start / chunk_size, move |index| {
                    let store = store.clone();
                    let key = key.clone();
                    async move {
                        if index > last_index {
                            return Ok(None);
                        }
                        let sub_key = chunk_key(&key, index as usize);
                        let chunk = store.get(&sub_key).await?.ok_or_else(|| {
                            KvError::CorruptEntry {
                                key: sub_key.clone(),
                                message: "chunk missing under a present manifest".to_string(),
                            }
                        })?;

                        let chunk_start = index * chunk_size;
                        let expected = chunk_size.min(total - chunk_start);
                        if chunk.bytes.len() as u64 != expected {
                            return Err(KvError::CorruptEntry {
                                key: sub_key,
                                message: format!(
                                    "chunk length {} does not match expected {}",
                                    chunk.bytes.len(),
                                    expected
                                ),
                            });
                        }

                        let lo = start.saturating_sub(chunk_start) as usize;
                        let hi = (end + 1 - chunk_start).min(chunk.bytes.len() as u64) as usize;
                        Ok(Some((chunk.bytes.slice(lo..hi), index + 1)))
                    }
                })
                .boxed()
            }
        }
    }

    /// Collects the full body into memory; background cache-write and
    /// test paths use this, the response path streams instead
    pub async fn read_full(&self, hit: &CacheHit) -> Result<Bytes, KvError> {
        let chunks: Vec<Bytes> = self.full_stream(hit).try_collect().await?;
        let mut out = Vec::with_capacity(hit.metadata.content_length as usize);
        for chunk in chunks {
            out.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(out))
    }

    /// Whether a served entry qualifies for a background TTL refresh
    pub fn should_refresh_ttl(&self, metadata: &CacheMetadata, now: i64) -> bool {
        let ttl = metadata.ttl_seconds();
        if ttl == 0 {
            return false;
        }
        let elapsed = (now - metadata.created_at).max(0) as f64;
        elapsed / ttl as f64 >= self.policy.min_elapsed_percent
            && metadata.remaining_seconds(now) >= self.policy.min_remaining_seconds
    }

    /// Rewrites an entry with a fresh TTL window
    pub async fn refresh_ttl(&self, hit: &CacheHit) -> Result<(), KvError> {
        let ttl = hit.metadata.ttl_seconds();
        let now = Utc::now().timestamp();
        let mut metadata = hit.metadata.clone();
        metadata.created_at = now;
        metadata.expires_at = now + ttl as i64;

        match &hit.body {
            CachedBody::Inline(bytes) => {
                let metadata_json = serde_json::to_value(&metadata)?;
                self.store
                    .put(&hit.key, bytes.clone(), Some(metadata_json), Some(ttl))
                    .await
            }
            CachedBody::Chunked(manifest) => {
                for index in 0..manifest.count {
                    let sub_key = chunk_key(&hit.key, index);
                    let chunk =
                        self.store
                            .get(&sub_key)
                            .await?
                            .ok_or_else(|| KvError::CorruptEntry {
                                key: sub_key.clone(),
                                message: "chunk missing during TTL refresh".to_string(),
                            })?;
                    self.store
                        .put(&sub_key, chunk.bytes, None, Some(ttl))
                        .await?;
                }
                let metadata_json = serde_json::to_value(&metadata)?;
                self.store
                    .put(&hit.key, Bytes::new(), Some(metadata_json), Some(ttl))
                    .await
            }
        }
    }

    /// Best-effort removal of an entry and its chunks
    pub async fn purge(&self, key: &str) -> Result<(), KvError> {
        for sub_key in self.store.list_keys(&chunk_prefix(key)).await? {
            self.store.delete(&sub_key).await?;
        }
        self.store.delete(key).await
    }
}
