//! Version counters
//!
//! Per-key monotonic counters stored under the `v:<logical_key>`
//! namespace. Counters start at 1; bumps are advisory and make prior
//! cache entries unreachable without deleting them. A bumped counter
//! lives twice as long as the content it invalidates so readers keep
//! observing the newest version until the old entries expire.

use bytes::Bytes;
use std::sync::Arc;

use crate::domain::repositories::KvStore;
use crate::infrastructure::cache::cache_key::version_counter_key;
use crate::shared::error::KvError;

/// The version every key starts at
pub const INITIAL_VERSION: u64 = 1;

/// Monotonic version counter store
pub struct VersionStore {
    store: Arc<dyn KvStore>,
}

impl VersionStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Current version for a logical key; absent counters read as 1
    pub async fn current(&self, logical_key: &str) -> Result<u64, KvError> {
        let key = version_counter_key(logical_key);
        match self.store.get(&key).await? {
            Some(value) => {
                let text = std::str::from_utf8(&value.bytes).map_err(|_| KvError::CorruptEntry {
                    key: key.clone(),
                    message: "version counter is not UTF-8".to_string(),
                })?;
                let version = text.trim().parse().map_err(|_| KvError::CorruptEntry {
                    key,
                    message: format!("version counter is not a number: '{}'", text),
                })?;
                Ok(std::cmp::max(version, INITIAL_VERSION))
            }
            None => Ok(INITIAL_VERSION),
        }
    }

    /// Bumps the counter, returning the new version. The counter TTL is
    /// twice the content TTL so the bump outlives what it invalidates.
    pub async fn bump(&self, logical_key: &str, content_ttl_seconds: u64) -> Result<u64, KvError> {
        let next = self.current(logical_key).await? + 1;
        let key = version_counter_key(logical_key);
        self.store
            .put(
                &key,
                Bytes::from(next.to_string()),
                None,
                Some(content_ttl_seconds.saturating_mul(2)),
            )
            .await?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::InMemoryKvStore;

    #[tokio::test]
    async fn test_absent_counter_reads_as_one() {
        let store = VersionStore::new(Arc::new(InMemoryKvStore::new()));
        assert_eq!(store.current("abc").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_bump_is_monotonic() {
        let store = VersionStore::new(Arc::new(InMemoryKvStore::new()));

        let mut prev = store.current("abc").await.unwrap();
        for _ in 0..3 {
            let bumped = store.bump("abc", 300).await.unwrap();
            assert!(bumped >= prev + 1);
            assert_eq!(store.current("abc").await.unwrap(), bumped);
            prev = bumped;
        }
    }

    #[tokio::test]
    async fn test_corrupt_counter_is_an_error() {
        let kv = Arc::new(InMemoryKvStore::new());
        kv.put("v:abc", Bytes::from_static(b"not a number"), None, None)
            .await
            .unwrap();

        let store = VersionStore::new(kv);
        assert!(matches!(
            store.current("abc").await,
            Err(KvError::CorruptEntry { .. })
        ));
    }
}
