//! Configuration document schema
//!
//! The persisted JSON document installed through the admin endpoint.
//! Serde defaults make every section optional; compilation turns origin
//! and source records into their domain entities with compiled matchers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::entities::{Derivative, Origin, Source, SourceAuth, SourceKind, TtlPolicy};
use crate::infrastructure::cache::{CachePolicy, DEFAULT_CHUNK_SIZE, DEFAULT_INLINE_THRESHOLD};
use crate::domain::value_objects::QualityLevel;
use crate::shared::error::ConfigError;

/// Top-level configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfigDoc {
    pub version: String,
    pub last_updated: Option<String>,
    pub video: VideoConfig,
    pub cache: CacheConfig,
    pub debug: DebugConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoConfig {
    pub origins: OriginsSection,
    pub derivatives: HashMap<String, Derivative>,
    pub defaults: Derivative,
    pub responsive: ResponsiveConfig,
    pub param_mapping: HashMap<String, String>,
    pub cdn_cgi: CdnCgiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OriginsSection {
    pub enabled: bool,
    pub items: Vec<OriginConfig>,
}

impl Default for OriginsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponsiveConfig {
    /// IMQuery matching tolerance as a fraction of the requested size
    pub tolerance: f64,
}

impl Default for ResponsiveConfig {
    fn default() -> Self {
        Self { tolerance: 0.25 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CdnCgiConfig {
    /// Base path of the upstream transformation service
    pub base_path: String,
}

impl Default for CdnCgiConfig {
    fn default() -> Self {
        Self {
            base_path: "https://cdn.example.com/cdn-cgi/media".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OriginConfig {
    pub name: String,
    pub matcher: String,
    pub capture_groups: Vec<String>,
    pub sources: Vec<SourceConfig>,
    pub ttl: TtlPolicy,
    pub use_ttl_by_status: bool,
    pub cacheable: bool,
    pub quality: Option<QualityLevel>,
    pub video_compression: Option<QualityLevel>,
    pub process_path: bool,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            matcher: String::new(),
            capture_groups: Vec::new(),
            sources: Vec::new(),
            ttl: TtlPolicy::default(),
            use_ttl_by_status: false,
            cacheable: true,
            quality: None,
            video_compression: None,
            process_path: true,
        }
    }
}

impl OriginConfig {
    /// Compiles the record into a domain origin with an anchored matcher
    pub fn compile(&self) -> Result<Origin, ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::MissingProperty("origin.name".to_string()));
        }
        if self.matcher.is_empty() {
            return Err(ConfigError::MissingProperty(format!(
                "origin '{}' has no matcher",
                self.name
            )));
        }

        let mut pattern = self.matcher.clone();
        if !pattern.starts_with('^') {
            pattern.insert(0, '^');
        }
        if !pattern.ends_with('$') {
            pattern.push('$');
        }
        let matcher = regex::Regex::new(&pattern)?;

        let sources = self
            .sources
            .iter()
            .map(|s| s.compile(&self.name))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Origin {
            name: self.name.clone(),
            matcher,
            capture_groups: self.capture_groups.clone(),
            sources,
            ttl: self.ttl,
            use_ttl_by_status: self.use_ttl_by_status,
            cacheable: self.cacheable,
            quality: self.quality,
            video_compression: self.video_compression,
            process_path: self.process_path,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceConfig {
    #[serde(rename = "type")]
    pub source_type: Option<SourceKind>,
    pub priority: i32,
    pub bucket_binding: Option<String>,
    pub url: Option<String>,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub auth: SourceAuth,
}

impl SourceConfig {
    pub fn compile(&self, origin_name: &str) -> Result<Source, ConfigError> {
        let source_type = self.source_type.ok_or_else(|| {
            ConfigError::MissingProperty(format!("source type in origin '{}'", origin_name))
        })?;

        match source_type {
            SourceKind::R2 => {
                let bucket_binding = self.bucket_binding.clone().ok_or_else(|| {
                    ConfigError::MissingProperty(format!(
                        "r2 source in origin '{}' has no bucketBinding",
                        origin_name
                    ))
                })?;
                Ok(Source::R2 {
                    bucket_binding,
                    path: self.path.clone(),
                    priority: self.priority,
                })
            }
            SourceKind::Remote => {
                let url = self.url.clone().ok_or_else(|| {
                    ConfigError::MissingProperty(format!(
                        "remote source in origin '{}' has no url",
                        origin_name
                    ))
                })?;
                Ok(Source::Remote {
                    url,
                    path: self.path.clone(),
                    headers: self.headers.clone(),
                    auth: self.auth.clone(),
                    priority: self.priority,
                })
            }
            SourceKind::Fallback => {
                let url = self.url.clone().ok_or_else(|| {
                    ConfigError::MissingProperty(format!(
                        "fallback source in origin '{}' has no url",
                        origin_name
                    ))
                })?;
                Ok(Source::Fallback {
                    url,
                    path: self.path.clone(),
                    auth: self.auth.clone(),
                    priority: self.priority,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    pub method: String,
    pub default_max_age: u64,
    pub ttl: TtlPolicy,
    pub bypass_query_parameters: Vec<String>,
    pub bypass_header_value: Option<String>,
    pub enable_kv_cache: bool,
    pub max_size_bytes: u64,
    pub inline_threshold_bytes: u64,
    pub chunk_size_bytes: u64,
    pub store_indefinitely: bool,
    pub enable_versioning: bool,
    pub ttl_refresh: TtlRefreshConfig,
    pub profiles: HashMap<String, CacheProfile>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            method: "kv".to_string(),
            default_max_age: 300,
            ttl: TtlPolicy::default(),
            bypass_query_parameters: vec!["nocache".to_string(), "bypass".to_string()],
            bypass_header_value: None,
            enable_kv_cache: true,
            max_size_bytes: 256 * 1024 * 1024,
            inline_threshold_bytes: DEFAULT_INLINE_THRESHOLD,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
            store_indefinitely: false,
            enable_versioning: true,
            ttl_refresh: TtlRefreshConfig::default(),
            profiles: HashMap::new(),
        }
    }
}

impl CacheConfig {
    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            inline_threshold: self.inline_threshold_bytes,
            chunk_size: self.chunk_size_bytes,
            min_elapsed_percent: self.ttl_refresh.min_elapsed_percent / 100.0,
            min_remaining_seconds: self.ttl_refresh.min_remaining_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TtlRefreshConfig {
    /// Percent of the TTL that must have elapsed before a refresh
    pub min_elapsed_percent: f64,
    pub min_remaining_seconds: u64,
}

impl Default for TtlRefreshConfig {
    fn default() -> Self {
        Self {
            min_elapsed_percent: 10.0,
            min_remaining_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheProfile {
    pub regex: String,
    pub cacheability: bool,
    pub ttl: TtlPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DebugConfig {
    pub enabled: bool,
    pub verbose: bool,
    pub allowed_ips: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_document_deserializes_with_defaults() {
        let doc: GatewayConfigDoc = serde_json::from_str(r#"{"version": "1.0.0"}"#).unwrap();
        assert_eq!(doc.version, "1.0.0");
        assert_eq!(doc.cache.method, "kv");
        assert!(doc.video.origins.enabled);
        assert_eq!(doc.video.responsive.tolerance, 0.25);
    }

    #[test]
    fn test_origin_compiles_with_anchored_matcher() {
        let config = OriginConfig {
            name: "videos".to_string(),
            matcher: r"/videos/(.+\.mp4)".to_string(),
            sources: vec![SourceConfig {
                source_type: Some(SourceKind::R2),
                priority: 1,
                bucket_binding: Some("VIDEOS".to_string()),
                path: "${1}".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let origin = config.compile().unwrap();
        assert!(origin.matches("/videos/a.mp4").is_some());
        // Anchoring: the matcher must not match inside a longer path
        assert!(origin.matches("/x/videos/a.mp4").is_none());
    }

    #[test]
    fn test_source_without_required_fields_fails() {
        let config = SourceConfig {
            source_type: Some(SourceKind::Remote),
            priority: 1,
            path: "${1}".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.compile("videos"),
            Err(ConfigError::MissingProperty(_))
        ));
    }

    #[test]
    fn test_full_document_round_trips() {
        let doc = GatewayConfigDoc {
            version: "2.0.0".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&doc).unwrap();
        let parsed: GatewayConfigDoc = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.version, "2.0.0");
    }
}
