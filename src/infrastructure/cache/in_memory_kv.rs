//! In-Memory KV Store Implementation
//!
//! Provides an in-memory implementation of the KvStore interface.
//! Backs tests and single-node deployments without a host KV namespace.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::repositories::{KvStore, KvValue};
use crate::shared::error::KvError;

struct StoredEntry {
    bytes: Bytes,
    metadata: Option<serde_json::Value>,
    expires_at: Option<i64>,
}

impl StoredEntry {
    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now().timestamp() > expires_at,
            None => false,
        }
    }
}

/// In-memory KV store
pub struct InMemoryKvStore {
    entries: Arc<RwLock<HashMap<String, StoredEntry>>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of live (unexpired) entries; test helper
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.is_expired()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<KvValue>, KvError> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => Ok(Some(KvValue {
                bytes: entry.bytes.clone(),
                metadata: entry.metadata.clone(),
                expires_at: entry
                    .expires_at
                    .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0)),
            })),
            _ => Ok(None),
        }
    }

    async fn get_metadata(&self, key: &str) -> Result<Option<serde_json::Value>, KvError> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => Ok(entry.metadata.clone()),
            _ => Ok(None),
        }
    }

    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        metadata: Option<serde_json::Value>,
        ttl_seconds: Option<u64>,
    ) -> Result<(), KvError> {
        let expires_at =
            ttl_seconds.map(|ttl| (Utc::now() + Duration::seconds(ttl as i64)).timestamp());

        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            StoredEntry {
                bytes,
                metadata,
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && !e.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let store = InMemoryKvStore::new();
        store
            .put("k", Bytes::from_static(b"value"), None, Some(60))
            .await
            .unwrap();

        let value = store.get("k").await.unwrap().unwrap();
        assert_eq!(&value.bytes[..], b"value");
        assert!(value.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_metadata_round_trip() {
        let store = InMemoryKvStore::new();
        let metadata = serde_json::json!({"contentType": "video/mp4"});
        store
            .put("k", Bytes::new(), Some(metadata.clone()), None)
            .await
            .unwrap();

        assert_eq!(store.get_metadata("k").await.unwrap(), Some(metadata));
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let store = InMemoryKvStore::new();
        assert!(store.get("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryKvStore::new();
        store
            .put("k", Bytes::from_static(b"v"), None, None)
            .await
            .unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_keys_by_prefix() {
        let store = InMemoryKvStore::new();
        for key in ["chunk:a:0", "chunk:a:1", "chunk:b:0", "a"] {
            store.put(key, Bytes::new(), None, None).await.unwrap();
        }

        let keys = store.list_keys("chunk:a:").await.unwrap();
        assert_eq!(keys, vec!["chunk:a:0", "chunk:a:1"]);
    }
}
