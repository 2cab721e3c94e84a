//! Runtime-learned upstream limits
//!
//! The upstream service's duration and input-size ceilings are not
//! published; they surface in error text. When a reply matches the known
//! shapes, the parsed bound overwrites the process-wide cell
//! (last-writer-wins) and subsequent requests validate against it.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::RwLock;

use crate::domain::value_objects::transform_options::DEFAULT_MAX_DURATION_SECONDS;

/// Default input size ceiling: 256 MiB
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 256 * 1024 * 1024;

/// Current process-wide limits snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LearnedLimits {
    pub max_duration_seconds: f64,
    pub max_file_size_bytes: u64,
}

impl Default for LearnedLimits {
    fn default() -> Self {
        Self {
            max_duration_seconds: DEFAULT_MAX_DURATION_SECONDS,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
        }
    }
}

static LIMITS: Lazy<RwLock<LearnedLimits>> = Lazy::new(|| RwLock::new(LearnedLimits::default()));

static DURATION_LIMIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"duration: attribute must be between (\d+)ms and (\d+)s").expect("static pattern")
});

static FILE_SIZE_LIMIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"must be less than (\d+) bytes").expect("static pattern"));

/// Reads the current limits
pub fn current() -> LearnedLimits {
    *LIMITS.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Overwrites the duration ceiling
pub fn learn_max_duration(seconds: f64) {
    if seconds > 0.0 {
        let mut limits = LIMITS.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        limits.max_duration_seconds = seconds;
    }
}

/// Overwrites the input-size ceiling
pub fn learn_max_file_size(bytes: u64) {
    if bytes > 0 {
        let mut limits = LIMITS.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        limits.max_file_size_bytes = bytes;
    }
}

/// Scans upstream error text for limit declarations; returns whether
/// anything was learned
pub fn learn_from_error_text(text: &str) -> bool {
    let mut learned = false;

    if let Some(caps) = DURATION_LIMIT.captures(text) {
        if let Ok(max_seconds) = caps[2].parse::<f64>() {
            learn_max_duration(max_seconds);
            learned = true;
        }
    }
    if let Some(caps) = FILE_SIZE_LIMIT.captures(text) {
        if let Ok(max_bytes) = caps[1].parse::<u64>() {
            learn_max_file_size(max_bytes);
            learned = true;
        }
    }

    learned
}

#[cfg(test)]
pub fn reset_for_tests() {
    let mut limits = LIMITS.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    *limits = LearnedLimits::default();
}
