//! Origin entity
//!
//! A named path matcher plus an ordered list of backend sources. Origins
//! are compiled once from configuration and shared read-only; the first
//! origin (in document order) whose matcher matches a request path wins.

use regex::Regex;
use std::collections::HashMap;

use super::Source;
use crate::domain::value_objects::QualityLevel;

/// TTL buckets in seconds, selected by response status class when
/// `use_ttl_by_status` is set
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TtlPolicy {
    pub ok: u64,
    pub redirects: u64,
    pub client_error: u64,
    pub server_error: u64,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            ok: 300,
            redirects: 300,
            client_error: 60,
            server_error: 10,
        }
    }
}

impl TtlPolicy {
    /// TTL bucket for a response status class
    pub fn for_status(&self, status: u16) -> u64 {
        match status {
            200..=299 => self.ok,
            300..=399 => self.redirects,
            400..=499 => self.client_error,
            _ => self.server_error,
        }
    }
}

/// Captures produced by an origin match, addressable by name and position
#[derive(Debug, Clone, Default)]
pub struct OriginMatch {
    captures: HashMap<String, String>,
}

impl OriginMatch {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.captures.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: String, value: String) {
        self.captures.insert(name, value);
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }
}

/// A configured origin: matcher, captures, sources, and cache policy
#[derive(Debug, Clone)]
pub struct Origin {
    pub name: String,
    /// Anchored regex applied to the request path
    pub matcher: Regex,
    /// Names for positional capture groups (index 0 names group 1)
    pub capture_groups: Vec<String>,
    /// Sources ordered by ascending priority
    pub sources: Vec<Source>,
    pub ttl: TtlPolicy,
    pub use_ttl_by_status: bool,
    pub cacheable: bool,
    pub quality: Option<QualityLevel>,
    pub video_compression: Option<QualityLevel>,
    pub process_path: bool,
}

impl Origin {
    /// Matches the request path, returning captures by position
    /// (`${1}`, `${2}`, …), by configured name, and by regex group name.
    pub fn matches(&self, path: &str) -> Option<OriginMatch> {
        let caps = self.matcher.captures(path)?;
        let mut result = OriginMatch::default();

        for i in 1..caps.len() {
            if let Some(m) = caps.get(i) {
                result.insert(i.to_string(), m.as_str().to_string());
                if let Some(name) = self.capture_groups.get(i - 1) {
                    if !name.is_empty() {
                        result.insert(name.clone(), m.as_str().to_string());
                    }
                }
            }
        }
        for name in self.matcher.capture_names().flatten() {
            if let Some(m) = caps.name(name) {
                result.insert(name.to_string(), m.as_str().to_string());
            }
        }

        Some(result)
    }

    /// Sources in ascending priority order (lower tried first)
    pub fn sources_by_priority(&self) -> Vec<&Source> {
        let mut sources: Vec<&Source> = self.sources.iter().collect();
        sources.sort_by_key(|s| s.priority());
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Source, SourceAuth};

    fn origin_with(matcher: &str, capture_groups: Vec<&str>) -> Origin {
        Origin {
            name: "videos".to_string(),
            matcher: Regex::new(matcher).unwrap(),
            capture_groups: capture_groups.into_iter().map(String::from).collect(),
            sources: vec![
                Source::Remote {
                    url: "https://media.example.com".to_string(),
                    path: "/${1}".to_string(),
                    headers: Default::default(),
                    auth: SourceAuth::disabled(),
                    priority: 2,
                },
                Source::R2 {
                    bucket_binding: "VIDEOS".to_string(),
                    path: "${1}".to_string(),
                    priority: 1,
                },
            ],
            ttl: TtlPolicy::default(),
            use_ttl_by_status: false,
            cacheable: true,
            quality: None,
            video_compression: None,
            process_path: true,
        }
    }

    #[test]
    fn test_match_binds_positional_and_named_captures() {
        let origin = origin_with(r"^/videos/(.+\.mp4)$", vec!["file"]);
        let m = origin.matches("/videos/abc.mp4").unwrap();
        assert_eq!(m.get("1"), Some("abc.mp4"));
        assert_eq!(m.get("file"), Some("abc.mp4"));
    }

    #[test]
    fn test_no_match_for_other_paths() {
        let origin = origin_with(r"^/videos/(.+\.mp4)$", vec![]);
        assert!(origin.matches("/images/abc.png").is_none());
    }

    #[test]
    fn test_sources_ordered_by_priority() {
        let origin = origin_with(r"^/videos/(.+)$", vec![]);
        let ordered = origin.sources_by_priority();
        assert_eq!(ordered[0].priority(), 1);
        assert_eq!(ordered[1].priority(), 2);
    }

    #[test]
    fn test_ttl_policy_by_status_class() {
        let ttl = TtlPolicy {
            ok: 3600,
            redirects: 300,
            client_error: 60,
            server_error: 10,
        };
        assert_eq!(ttl.for_status(200), 3600);
        assert_eq!(ttl.for_status(301), 300);
        assert_eq!(ttl.for_status(404), 60);
        assert_eq!(ttl.for_status(502), 10);
    }
}
