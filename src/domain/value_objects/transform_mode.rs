//! TransformMode value object
//!
//! Represents the requested output kind (video, still frame, spritesheet, audio)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transformation mode enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformMode {
    /// Transcoded video output
    Video,
    /// Single still frame (image output)
    Frame,
    /// Grid of frames in a single image
    Spritesheet,
    /// Audio-only output
    Audio,
}

impl TransformMode {
    /// Returns the canonical wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformMode::Video => "video",
            TransformMode::Frame => "frame",
            TransformMode::Spritesheet => "spritesheet",
            TransformMode::Audio => "audio",
        }
    }

    /// Whether the output of this mode is an image
    pub fn is_image_output(&self) -> bool {
        matches!(self, TransformMode::Frame | TransformMode::Spritesheet)
    }

    /// Whether playback flags (loop, autoplay) apply to this mode
    pub fn supports_playback_flags(&self) -> bool {
        matches!(self, TransformMode::Video)
    }
}

impl Default for TransformMode {
    fn default() -> Self {
        TransformMode::Video
    }
}

impl fmt::Display for TransformMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransformMode {
    type Err = crate::shared::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "video" => Ok(TransformMode::Video),
            "frame" => Ok(TransformMode::Frame),
            "spritesheet" => Ok(TransformMode::Spritesheet),
            "audio" => Ok(TransformMode::Audio),
            _ => Err(crate::shared::error::ValidationError::InvalidMode(
                s.to_string(),
            )),
        }
    }
}
