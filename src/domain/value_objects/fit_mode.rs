//! FitMode value object

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the output is fitted into the requested dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitMode {
    /// Fit entirely within the box, preserving aspect ratio
    Contain,
    /// Like contain, but never upscale
    ScaleDown,
    /// Fill the box, cropping overflow
    Cover,
}

impl FitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitMode::Contain => "contain",
            FitMode::ScaleDown => "scale-down",
            FitMode::Cover => "cover",
        }
    }
}

impl fmt::Display for FitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FitMode {
    type Err = crate::shared::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "contain" => Ok(FitMode::Contain),
            "scale-down" => Ok(FitMode::ScaleDown),
            "cover" => Ok(FitMode::Cover),
            _ => Err(crate::shared::error::ValidationError::InvalidParameter {
                field: "fit".to_string(),
                message: format!("unknown fit mode: {}", s),
            }),
        }
    }
}
