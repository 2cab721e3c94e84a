//! Configuration manager
//!
//! Holds the active snapshot behind a read-mostly lock and swaps it
//! atomically on install. Installs validate first, persist to the KV
//! `worker-config` key, then notify subscribing managers. Request paths
//! only ever clone the `Arc`, never hold the lock across awaits.

use std::sync::{Arc, RwLock};
use tracing::info;

use super::schema::GatewayConfigDoc;
use super::validator::validate;
use crate::domain::entities::Origin;
use crate::domain::repositories::KvStore;
use crate::infrastructure::cache::CachePolicy;
use crate::shared::error::ConfigError;

/// KV key the active document is persisted under
pub const CONFIG_KV_KEY: &str = "worker-config";

/// A cache profile with its matcher compiled
#[derive(Debug, Clone)]
pub struct CompiledCacheProfile {
    pub name: String,
    pub matcher: regex::Regex,
    pub cacheability: bool,
    pub ttl: crate::domain::entities::TtlPolicy,
}

/// A validated document compiled for request-path use
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub doc: GatewayConfigDoc,
    pub origins: Vec<Origin>,
    pub cache_policy: CachePolicy,
    pub cache_profiles: Vec<CompiledCacheProfile>,
}

impl RuntimeConfig {
    /// Validates and compiles a document
    pub fn compile(doc: GatewayConfigDoc) -> Result<Self, ConfigError> {
        validate(&doc)?;

        let origins = if doc.video.origins.enabled {
            doc.video
                .origins
                .items
                .iter()
                .map(|o| o.compile())
                .collect::<Result<Vec<_>, _>>()?
        } else {
            Vec::new()
        };

        let cache_policy = doc.cache.cache_policy();

        // Profiles come out of a map; order them by name so matching is
        // deterministic across installs
        let mut cache_profiles: Vec<CompiledCacheProfile> = doc
            .cache
            .profiles
            .iter()
            .map(|(name, profile)| {
                Ok(CompiledCacheProfile {
                    name: name.clone(),
                    matcher: regex::Regex::new(&profile.regex)?,
                    cacheability: profile.cacheability,
                    ttl: profile.ttl,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        cache_profiles.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self {
            doc,
            origins,
            cache_policy,
            cache_profiles,
        })
    }

    /// First cache profile (by name order) whose matcher matches the path
    pub fn cache_profile_for(&self, path: &str) -> Option<&CompiledCacheProfile> {
        self.cache_profiles
            .iter()
            .find(|profile| profile.matcher.is_match(path))
    }
}

/// Notified whenever a new snapshot is installed
pub trait ConfigSubscriber: Send + Sync {
    fn on_config_installed(&self, config: &Arc<RuntimeConfig>);
}

/// Owner of the active config snapshot
pub struct ConfigManager {
    current: RwLock<Arc<RuntimeConfig>>,
    subscribers: RwLock<Vec<Arc<dyn ConfigSubscriber>>>,
    store: Arc<dyn KvStore>,
}

impl ConfigManager {
    pub fn new(initial: RuntimeConfig, store: Arc<dyn KvStore>) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            subscribers: RwLock::new(Vec::new()),
            store,
        }
    }

    /// The active snapshot; cheap to call per request
    pub fn snapshot(&self) -> Arc<RuntimeConfig> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn subscribe(&self, subscriber: Arc<dyn ConfigSubscriber>) {
        self.subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(subscriber);
    }

    /// Validates, persists, atomically swaps, and distributes a new
    /// document. The previous snapshot stays active on any failure.
    pub async fn install(&self, doc: GatewayConfigDoc) -> Result<Arc<RuntimeConfig>, ConfigError> {
        let compiled = Arc::new(RuntimeConfig::compile(doc)?);

        let serialized = serde_json::to_vec(&compiled.doc)?;
        self.store
            .put(CONFIG_KV_KEY, serialized.into(), None, None)
            .await
            .map_err(|e| ConfigError::Storage(e.to_string()))?;

        {
            let mut current = self
                .current
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *current = compiled.clone();
        }

        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for subscriber in subscribers {
            subscriber.on_config_installed(&compiled);
        }

        info!(version = %compiled.doc.version, "configuration installed");
        Ok(compiled)
    }

    /// Loads the persisted document from KV, when one exists
    pub async fn load_persisted(
        store: &Arc<dyn KvStore>,
    ) -> Result<Option<GatewayConfigDoc>, ConfigError> {
        let value = store
            .get(CONFIG_KV_KEY)
            .await
            .map_err(|e| ConfigError::Storage(e.to_string()))?;
        match value {
            Some(value) => Ok(Some(serde_json::from_slice(&value.bytes)?)),
            None => Ok(None),
        }
    }
}
