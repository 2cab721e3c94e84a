//! TransformOptions value object
//!
//! The immutable transformation request. Built by the options resolver
//! from query parameters, derivative presets, and configured defaults;
//! never mutated afterwards. The canonical parameter encoding produced
//! here feeds both the upstream URL and the cache fingerprint, so it is
//! alphabetical and omits fields that do not materially affect output.

use serde::{Deserialize, Serialize};

use super::{FitMode, OutputFormat, QualityLevel, TimeValue, TransformMode};
use crate::shared::error::ValidationError;

/// Dimension bounds accepted by the upstream service
pub const MIN_DIMENSION: u32 = 10;
pub const MAX_DIMENSION: u32 = 3840;

/// Time bounds (seconds); the duration maximum is a default that the
/// upstream fetcher refines at runtime from error replies
pub const MAX_TIME_SECONDS: f64 = 600.0;
pub const MIN_DURATION_SECONDS: f64 = 1.0;
pub const DEFAULT_MAX_DURATION_SECONDS: f64 = 300.0;

/// Immutable transformation options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    pub mode: TransformMode,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: Option<FitMode>,
    pub format: Option<OutputFormat>,
    pub quality: QualityLevel,
    pub compression: QualityLevel,
    pub time: Option<TimeValue>,
    pub duration: Option<TimeValue>,
    pub audio: bool,
    #[serde(rename = "loop")]
    pub loop_playback: bool,
    pub autoplay: bool,
    pub muted: bool,
    /// Name of the derivative preset that contributed fields, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derivative: Option<String>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            mode: TransformMode::Video,
            width: None,
            height: None,
            fit: None,
            format: None,
            quality: QualityLevel::Auto,
            compression: QualityLevel::Auto,
            time: None,
            duration: None,
            audio: true,
            loop_playback: false,
            autoplay: false,
            muted: false,
            derivative: None,
        }
    }
}

impl TransformOptions {
    /// Validates enumerations, numeric ranges, and cross-field rules.
    ///
    /// `max_duration_seconds` is the current duration ceiling, which may
    /// have been learned from upstream error replies.
    pub fn validate(&self, max_duration_seconds: f64) -> Result<(), ValidationError> {
        for (field, value) in [("width", self.width), ("height", self.height)] {
            if let Some(v) = value {
                if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&v) {
                    return Err(ValidationError::InvalidDimension {
                        field: field.to_string(),
                        value: v as i64,
                    });
                }
            }
        }

        if let Some(time) = self.time {
            let secs = time.as_seconds();
            if !(0.0..=MAX_TIME_SECONDS).contains(&secs) {
                return Err(ValidationError::InvalidTimeValue {
                    field: "time".to_string(),
                    value: time.encode(),
                });
            }
        }

        if let Some(duration) = self.duration {
            let secs = duration.as_seconds();
            if secs < MIN_DURATION_SECONDS || secs > max_duration_seconds {
                return Err(ValidationError::InvalidTimeValue {
                    field: "duration".to_string(),
                    value: duration.encode(),
                });
            }
        }

        if let Some(format) = self.format {
            let permitted = match self.mode {
                TransformMode::Frame | TransformMode::Spritesheet => format.is_image(),
                TransformMode::Audio => format == OutputFormat::Mp4,
                TransformMode::Video => false,
            };
            if !permitted {
                return Err(ValidationError::InvalidOptionCombination(format!(
                    "format={} is not valid with mode={}",
                    format, self.mode
                )));
            }
        }

        if (self.loop_playback || self.autoplay) && !self.mode.supports_playback_flags() {
            return Err(ValidationError::InvalidOptionCombination(format!(
                "loop/autoplay require mode=video, got mode={}",
                self.mode
            )));
        }

        if self.autoplay && self.audio && !self.muted {
            return Err(ValidationError::InvalidOptionCombination(
                "autoplay requires audio=false or muted=true".to_string(),
            ));
        }

        Ok(())
    }

    /// Canonical key=value pairs, alphabetical by key.
    ///
    /// Only fields that materially affect the output are emitted: `None`
    /// and `auto` values are omitted, flags only when they differ from
    /// their defaults. Two options that encode identically are
    /// interchangeable for caching purposes.
    pub fn canonical_params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = Vec::new();

        if !self.audio {
            params.push(("audio".into(), "false".into()));
        }
        if self.autoplay {
            params.push(("autoplay".into(), "true".into()));
        }
        if !self.compression.is_auto() {
            params.push(("compression".into(), self.compression.to_string()));
        }
        if let Some(duration) = self.duration {
            params.push(("duration".into(), duration.encode()));
        }
        if let Some(fit) = self.fit {
            params.push(("fit".into(), fit.to_string()));
        }
        if let Some(format) = self.format {
            params.push(("format".into(), format.to_string()));
        }
        if let Some(height) = self.height {
            params.push(("height".into(), height.to_string()));
        }
        if self.loop_playback {
            params.push(("loop".into(), "true".into()));
        }
        params.push(("mode".into(), self.mode.to_string()));
        if self.muted {
            params.push(("muted".into(), "true".into()));
        }
        if !self.quality.is_auto() {
            params.push(("quality".into(), self.quality.to_string()));
        }
        if let Some(time) = self.time {
            params.push(("time".into(), time.encode()));
        }
        if let Some(width) = self.width {
            params.push(("width".into(), width.to_string()));
        }

        debug_assert!(params.windows(2).all(|w| w[0].0 <= w[1].0));
        params
    }
}
