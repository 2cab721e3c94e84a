//! OutputFormat value object

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Requested output container/image format
///
/// A format is only permitted with `mode=frame` (image outputs) or
/// `mode=audio` (m4a); the combination check lives in options validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Mp4,
    Webm,
    Gif,
    Jpg,
    Webp,
    Png,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Webm => "webm",
            OutputFormat::Gif => "gif",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Webp => "webp",
            OutputFormat::Png => "png",
        }
    }

    /// Whether this format is an image format (valid for frame mode)
    pub fn is_image(&self) -> bool {
        matches!(
            self,
            OutputFormat::Gif | OutputFormat::Jpg | OutputFormat::Webp | OutputFormat::Png
        )
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = crate::shared::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mp4" => Ok(OutputFormat::Mp4),
            "webm" => Ok(OutputFormat::Webm),
            "gif" => Ok(OutputFormat::Gif),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpg),
            "webp" => Ok(OutputFormat::Webp),
            "png" => Ok(OutputFormat::Png),
            _ => Err(crate::shared::error::ValidationError::InvalidParameter {
                field: "format".to_string(),
                message: format!("unknown format: {}", s),
            }),
        }
    }
}
