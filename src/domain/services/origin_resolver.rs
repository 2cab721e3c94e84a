//! Origin resolution
//!
//! Maps a request path to the first matching origin (document order) and
//! enumerates that origin's sources by ascending priority. Error
//! recovery feeds failed sources back in as exclusions so a retry never
//! lands on a backend that already failed for this request.

use std::collections::HashSet;

use crate::domain::entities::{Origin, OriginMatch, Source, SourceKind};
use crate::shared::error::ResolutionError;

/// Sources excluded from selection: (origin name, source kind, priority)
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    excluded: HashSet<(String, SourceKind, i32)>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude(&mut self, origin_name: &str, source: &Source) {
        let (kind, priority) = source.identity();
        self.excluded
            .insert((origin_name.to_string(), kind, priority));
    }

    pub fn contains(&self, origin_name: &str, source: &Source) -> bool {
        let (kind, priority) = source.identity();
        self.excluded
            .contains(&(origin_name.to_string(), kind, priority))
    }

    pub fn len(&self) -> usize {
        self.excluded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.excluded.is_empty()
    }
}

/// A successful origin resolution
#[derive(Debug)]
pub struct ResolvedOrigin<'a> {
    pub origin: &'a Origin,
    pub captures: OriginMatch,
}

/// Returns the first origin whose matcher matches the path
pub fn resolve_origin<'a>(
    origins: &'a [Origin],
    path: &str,
) -> Result<ResolvedOrigin<'a>, ResolutionError> {
    for origin in origins {
        if let Some(captures) = origin.matches(path) {
            return Ok(ResolvedOrigin { origin, captures });
        }
    }
    Err(ResolutionError::OriginNotFound(path.to_string()))
}

/// Returns the highest-priority source not present in the exclusion set
pub fn next_source<'a>(
    origin: &'a Origin,
    exclusions: &ExclusionSet,
) -> Result<&'a Source, ResolutionError> {
    origin
        .sources_by_priority()
        .into_iter()
        .find(|source| !exclusions.contains(&origin.name, source))
        .ok_or_else(|| ResolutionError::SourceExhausted(origin.name.clone()))
}
