//! Configuration validation
//!
//! Checks a parsed document before it is installed. Validation failures
//! surface as 400s on the admin endpoint; nothing invalid ever becomes
//! the active snapshot.

use super::schema::GatewayConfigDoc;
use crate::domain::value_objects::transform_options::{MAX_DIMENSION, MIN_DIMENSION};
use crate::shared::error::ConfigError;

/// Cache methods this build understands. `cache-api` is accepted for
/// legacy documents and served through the KV path.
const KNOWN_CACHE_METHODS: &[&str] = &["kv", "cache-api"];

/// Validates the whole document
pub fn validate(doc: &GatewayConfigDoc) -> Result<(), ConfigError> {
    if doc.version.is_empty() {
        return Err(ConfigError::MissingProperty("version".to_string()));
    }

    if !KNOWN_CACHE_METHODS.contains(&doc.cache.method.as_str()) {
        return Err(ConfigError::InvalidValue {
            field: "cache.method".to_string(),
            message: format!("unknown method '{}'", doc.cache.method),
        });
    }

    let refresh = &doc.cache.ttl_refresh;
    if !(0.0..=100.0).contains(&refresh.min_elapsed_percent) {
        return Err(ConfigError::InvalidValue {
            field: "cache.ttlRefresh.minElapsedPercent".to_string(),
            message: format!("{} is not a percentage", refresh.min_elapsed_percent),
        });
    }

    if doc.cache.chunk_size_bytes == 0 {
        return Err(ConfigError::InvalidValue {
            field: "cache.chunkSizeBytes".to_string(),
            message: "chunk size must be positive".to_string(),
        });
    }

    if !(0.0..=1.0).contains(&doc.video.responsive.tolerance) {
        return Err(ConfigError::InvalidValue {
            field: "video.responsive.tolerance".to_string(),
            message: format!("{} is not a fraction", doc.video.responsive.tolerance),
        });
    }

    let mut seen_names = std::collections::HashSet::new();
    for origin in &doc.video.origins.items {
        origin.compile()?;
        if !seen_names.insert(origin.name.clone()) {
            return Err(ConfigError::InvalidValue {
                field: "video.origins.items".to_string(),
                message: format!("duplicate origin name '{}'", origin.name),
            });
        }
    }

    for (name, derivative) in &doc.video.derivatives {
        for (field, value) in [("width", derivative.width), ("height", derivative.height)] {
            if let Some(v) = value {
                if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&v) {
                    return Err(ConfigError::InvalidValue {
                        field: format!("video.derivatives.{}.{}", name, field),
                        message: format!("{} is out of range", v),
                    });
                }
            }
        }
    }

    for (name, profile) in &doc.cache.profiles {
        regex::Regex::new(&profile.regex).map_err(|e| ConfigError::InvalidValue {
            field: format!("cache.profiles.{}.regex", name),
            message: e.to_string(),
        })?;
    }

    Ok(())
}
