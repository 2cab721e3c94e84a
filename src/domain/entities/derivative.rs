//! Derivative entity
//!
//! A named preset of partial transformation options. Explicit query
//! fields win over derivative fields, except when an IMQuery dimension
//! request mapped onto the derivative; then the preset's dimensions
//! replace the requested ones.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{
    FitMode, OutputFormat, QualityLevel, TimeValue, TransformMode, TransformOptions,
};

/// Partial options record attached to a derivative name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Derivative {
    pub mode: Option<TransformMode>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: Option<FitMode>,
    pub format: Option<OutputFormat>,
    pub quality: Option<QualityLevel>,
    pub compression: Option<QualityLevel>,
    pub time: Option<TimeValue>,
    pub duration: Option<TimeValue>,
    pub audio: Option<bool>,
    #[serde(rename = "loop")]
    pub loop_playback: Option<bool>,
    pub autoplay: Option<bool>,
    pub muted: Option<bool>,
}

impl Derivative {
    /// Writes every present field into the working options
    pub fn apply(&self, options: &mut TransformOptions) {
        if let Some(mode) = self.mode {
            options.mode = mode;
        }
        if self.width.is_some() {
            options.width = self.width;
        }
        if self.height.is_some() {
            options.height = self.height;
        }
        if self.fit.is_some() {
            options.fit = self.fit;
        }
        if self.format.is_some() {
            options.format = self.format;
        }
        if let Some(quality) = self.quality {
            options.quality = quality;
        }
        if let Some(compression) = self.compression {
            options.compression = compression;
        }
        if self.time.is_some() {
            options.time = self.time;
        }
        if self.duration.is_some() {
            options.duration = self.duration;
        }
        if let Some(audio) = self.audio {
            options.audio = audio;
        }
        if let Some(loop_playback) = self.loop_playback {
            options.loop_playback = loop_playback;
        }
        if let Some(autoplay) = self.autoplay {
            options.autoplay = autoplay;
        }
        if let Some(muted) = self.muted {
            options.muted = muted;
        }
    }

    /// Distance to a requested display size; usable for IMQuery mapping
    /// only when the preset carries both dimensions
    pub fn dimension_distance(&self, width: f64, height: f64) -> Option<f64> {
        let (w, h) = (self.width? as f64, self.height? as f64);
        Some(((w - width).powi(2) + (h - height).powi(2)).sqrt())
    }
}
