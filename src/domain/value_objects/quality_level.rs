//! QualityLevel value object
//!
//! Shared by the `quality` and `compression` transformation parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quality / compression level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Low,
    Medium,
    High,
    /// Let the upstream service decide; omitted from the encoded URL
    Auto,
}

impl QualityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLevel::Low => "low",
            QualityLevel::Medium => "medium",
            QualityLevel::High => "high",
            QualityLevel::Auto => "auto",
        }
    }

    /// Auto levels do not materially affect the output URL
    pub fn is_auto(&self) -> bool {
        matches!(self, QualityLevel::Auto)
    }
}

impl Default for QualityLevel {
    fn default() -> Self {
        QualityLevel::Auto
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for QualityLevel {
    type Err = crate::shared::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(QualityLevel::Low),
            "medium" => Ok(QualityLevel::Medium),
            "high" => Ok(QualityLevel::High),
            "auto" => Ok(QualityLevel::Auto),
            _ => Err(crate::shared::error::ValidationError::InvalidParameter {
                field: "quality".to_string(),
                message: format!("unknown level: {}", s),
            }),
        }
    }
}
