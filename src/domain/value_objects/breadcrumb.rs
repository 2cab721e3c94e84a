//! Breadcrumb value object
//!
//! In-memory structured log events bounded per request. The ring drops
//! the oldest entry on overflow; the response builder reads the trail
//! when stamping debug headers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;

/// Default per-request breadcrumb capacity
pub const DEFAULT_BREADCRUMB_CAPACITY: usize = 25;

/// A single breadcrumb event
#[derive(Debug, Clone, Serialize)]
pub struct Breadcrumb {
    pub timestamp: DateTime<Utc>,
    pub category: String,
    pub message: String,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub data: serde_json::Map<String, Value>,
}

impl Breadcrumb {
    pub fn new(category: &str, message: &str, data: serde_json::Map<String, Value>) -> Self {
        Self {
            timestamp: Utc::now(),
            category: category.to_string(),
            message: message.to_string(),
            data,
        }
    }
}

/// Bounded FIFO ring of breadcrumbs
#[derive(Debug)]
pub struct BreadcrumbRing {
    entries: VecDeque<Breadcrumb>,
    capacity: usize,
}

impl BreadcrumbRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Appends an event, silently dropping the oldest at capacity
    pub fn push(&mut self, crumb: Breadcrumb) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(crumb);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Breadcrumb> {
        self.entries.iter()
    }

    /// Event counts per category, in first-seen order
    pub fn category_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for crumb in &self.entries {
            match counts.iter_mut().find(|(c, _)| c == &crumb.category) {
                Some((_, n)) => *n += 1,
                None => counts.push((crumb.category.clone(), 1)),
            }
        }
        counts
    }
}

impl Default for BreadcrumbRing {
    fn default() -> Self {
        Self::new(DEFAULT_BREADCRUMB_CAPACITY)
    }
}
