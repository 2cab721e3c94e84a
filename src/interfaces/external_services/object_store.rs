//! ObjectStore trait
//!
//! Interface over S3-compatible bucket bindings. The gateway never
//! speaks the object-store wire protocol itself; this seam wraps the
//! client crate and lets tests substitute an in-memory double.

use async_trait::async_trait;
use bytes::Bytes;

use crate::shared::error::ProcessingError;

/// A fetched object
#[derive(Debug, Clone)]
pub struct ObjectData {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// S3-compatible object storage reachable through named bucket bindings
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetches an object; `None` when the key does not exist
    async fn fetch(
        &self,
        bucket_binding: &str,
        key: &str,
    ) -> Result<Option<ObjectData>, ProcessingError>;

    /// Produces a SigV4 presigned GET URL for the object
    async fn presign_get(
        &self,
        bucket_binding: &str,
        key: &str,
        expires_in_seconds: u64,
    ) -> Result<String, ProcessingError>;

    /// Public URL for the object when the bucket is world-readable
    fn public_url(&self, bucket_binding: &str, key: &str) -> Option<String>;
}
