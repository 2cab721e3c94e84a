//! KvStore trait
//!
//! Repository interface over the host key-value namespaces. Values carry
//! optional JSON metadata and an optional TTL; the content cache, the
//! version counters, the presigned-URL cache, and the persisted config
//! snapshot all live behind this interface.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::shared::error::KvError;

/// A stored value with its metadata and expiry
#[derive(Debug, Clone)]
pub struct KvValue {
    pub bytes: Bytes,
    pub metadata: Option<serde_json::Value>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl KvValue {
    pub fn new(bytes: Bytes) -> Self {
        Self {
            bytes,
            metadata: None,
            expires_at: None,
        }
    }
}

/// Key-value storage backend
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Gets a value with its metadata; `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<KvValue>, KvError>;

    /// Gets only the metadata for a key, when the backend can avoid
    /// transferring the value
    async fn get_metadata(&self, key: &str) -> Result<Option<serde_json::Value>, KvError>;

    /// Puts a value; `ttl_seconds` of `None` stores without expiry
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        metadata: Option<serde_json::Value>,
        ttl_seconds: Option<u64>,
    ) -> Result<(), KvError>;

    /// Deletes a key; deleting an absent key is not an error
    async fn delete(&self, key: &str) -> Result<(), KvError>;

    /// Lists keys with the given prefix
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, KvError>;
}
