//! Shared error types for the gateway
//!
//! This module defines all error types used across the application.
//! Components return tagged results; the response builder nearest the
//! request boundary maps each tag to an HTTP status and a stable
//! `X-Error-Type` short string.

use thiserror::Error;

/// Validation errors - invalid client-supplied transformation parameters
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid parameter '{field}': {message}")]
    InvalidParameter { field: String, message: String },

    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    #[error("Invalid dimension '{field}': {value} (must be 10-3840)")]
    InvalidDimension { field: String, value: i64 },

    #[error("Invalid time value '{field}': {value}")]
    InvalidTimeValue { field: String, value: String },

    #[error("Invalid option combination: {0}")]
    InvalidOptionCombination(String),

    #[error("Unknown derivative: {0}")]
    UnknownDerivative(String),
}

impl ValidationError {
    /// Stable short error code carried in JSON bodies and `X-Error-Type`
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::InvalidParameter { .. } => "INVALID_PARAMETER",
            ValidationError::InvalidMode(_) => "INVALID_MODE",
            ValidationError::InvalidDimension { .. } => "INVALID_DIMENSION",
            ValidationError::InvalidTimeValue { .. } => "INVALID_TIME_VALUE",
            ValidationError::InvalidOptionCombination(_) => "INVALID_OPTION_COMBINATION",
            ValidationError::UnknownDerivative(_) => "UNKNOWN_DERIVATIVE",
        }
    }
}

/// Resolution errors - mapping a request path onto an origin and source
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    #[error("No origin matches path: {0}")]
    OriginNotFound(String),

    #[error("All sources exhausted for origin: {0}")]
    SourceExhausted(String),

    #[error("Path resolution failed: {0}")]
    PathResolutionFailed(String),

    #[error("Auth misconfigured for source: {0}")]
    AuthMisconfigured(String),
}

/// KV store errors - raised by storage backends, treated as cache misses
/// on the read path
#[derive(Debug, Clone, Error)]
pub enum KvError {
    #[error("KV backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt entry at key {key}: {message}")]
    CorruptEntry { key: String, message: String },
}

impl From<serde_json::Error> for KvError {
    fn from(err: serde_json::Error) -> Self {
        KvError::Serialization(err.to_string())
    }
}

/// Processing errors - upstream transformation and origin fetching
#[derive(Debug, Clone, Error)]
pub enum ProcessingError {
    #[error("Transformation failed ({status}): {message}")]
    TransformFailed {
        /// Upstream error code, when the error header carried one
        code: Option<u32>,
        /// HTTP status the classification maps to
        status: u16,
        message: String,
        retryable: bool,
        should_fallback: bool,
    },

    #[error("URL construction failed: {0}")]
    UrlConstructionFailed(String),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Upstream timeout after {0}s")]
    Timeout(u64),
}

impl ProcessingError {
    /// Whether the recovery state machine may retry the same source
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcessingError::TransformFailed { retryable, .. } => *retryable,
            ProcessingError::Timeout(_) => true,
            ProcessingError::FetchFailed(_) => true,
            ProcessingError::UrlConstructionFailed(_) => false,
        }
    }

    /// Whether the recovery state machine should try an alternative source
    pub fn should_fallback(&self) -> bool {
        match self {
            ProcessingError::TransformFailed {
                should_fallback, ..
            } => *should_fallback,
            ProcessingError::Timeout(_) => true,
            ProcessingError::FetchFailed(_) => true,
            ProcessingError::UrlConstructionFailed(_) => false,
        }
    }
}

impl From<reqwest::Error> for ProcessingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProcessingError::Timeout(0)
        } else if err.is_connect() {
            ProcessingError::FetchFailed("connection failed".to_string())
        } else {
            ProcessingError::FetchFailed(err.to_string())
        }
    }
}

/// Configuration errors - schema validation and distribution
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Schema invalid: {0}")]
    SchemaInvalid(String),

    #[error("Missing property: {0}")]
    MissingProperty(String),

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("Config storage failed: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::SchemaInvalid(err.to_string())
    }
}

impl From<regex::Error> for ConfigError {
    fn from(err: regex::Error) -> Self {
        ConfigError::InvalidValue {
            field: "matcher".to_string(),
            message: err.to_string(),
        }
    }
}

/// Top-level gateway error - everything a request can fail with
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("KV error: {0}")]
    Kv(#[from] KvError),

    #[error("Internal error: {0}")]
    Unknown(String),
}

impl GatewayError {
    /// Stable short string for the `X-Error-Type` header
    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::Validation(e) => e.code(),
            GatewayError::Resolution(ResolutionError::OriginNotFound(_)) => "ORIGIN_NOT_FOUND",
            GatewayError::Resolution(ResolutionError::SourceExhausted(_)) => "SOURCE_EXHAUSTED",
            GatewayError::Resolution(ResolutionError::PathResolutionFailed(_)) => {
                "PATH_RESOLUTION_FAILED"
            }
            GatewayError::Resolution(ResolutionError::AuthMisconfigured(_)) => "AUTH_MISCONFIGURED",
            GatewayError::Processing(ProcessingError::TransformFailed { .. }) => {
                "TRANSFORMATION_FAILED"
            }
            GatewayError::Processing(ProcessingError::UrlConstructionFailed(_)) => {
                "URL_CONSTRUCTION_FAILED"
            }
            GatewayError::Processing(ProcessingError::FetchFailed(_)) => "FETCH_FAILED",
            GatewayError::Processing(ProcessingError::Timeout(_)) => "UPSTREAM_TIMEOUT",
            GatewayError::NotFound(_) => "NOT_FOUND",
            GatewayError::Config(_) => "CONFIG_ERROR",
            GatewayError::Kv(_) => "CACHE_ERROR",
            GatewayError::Unknown(_) => "UNKNOWN",
        }
    }

    /// HTTP status this error surfaces as when recovery does not apply
    pub fn http_status(&self) -> u16 {
        match self {
            GatewayError::Validation(_) => 400,
            GatewayError::Resolution(ResolutionError::OriginNotFound(_)) => 404,
            GatewayError::Resolution(_) => 502,
            GatewayError::Processing(ProcessingError::TransformFailed { status, .. }) => *status,
            GatewayError::Processing(ProcessingError::Timeout(_)) => 502,
            GatewayError::Processing(_) => 502,
            GatewayError::NotFound(_) => 404,
            GatewayError::Config(_) => 500,
            GatewayError::Kv(_) => 500,
            GatewayError::Unknown(_) => 500,
        }
    }

    /// Recovery is attempted only for processing and resolution errors
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GatewayError::Processing(_) | GatewayError::Resolution(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_codes_are_stable() {
        let err = ValidationError::InvalidOptionCombination("loop requires mode=video".into());
        assert_eq!(err.code(), "INVALID_OPTION_COMBINATION");
        assert_eq!(GatewayError::from(err).http_status(), 400);
    }

    #[test]
    fn test_origin_not_found_maps_to_404() {
        let err = GatewayError::from(ResolutionError::OriginNotFound("/x.mp4".into()));
        assert_eq!(err.http_status(), 404);
        assert_eq!(err.error_type(), "ORIGIN_NOT_FOUND");
    }

    #[test]
    fn test_transform_failed_carries_classified_status() {
        let err = GatewayError::from(ProcessingError::TransformFailed {
            code: Some(9404),
            status: 404,
            message: "resource not found".into(),
            retryable: false,
            should_fallback: false,
        });
        assert_eq!(err.http_status(), 404);
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_validation_is_not_recoverable() {
        let err = GatewayError::from(ValidationError::InvalidMode("giffy".into()));
        assert!(!err.is_recoverable());
    }
}
