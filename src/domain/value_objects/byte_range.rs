//! ByteRange value object
//!
//! Parsed HTTP `Range: bytes=S-E` request against a known body length.
//! Only single ranges are supported; anything else is not satisfiable.

use std::fmt;

/// An inclusive byte range, validated against a total length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

/// Range request that cannot be satisfied against the body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeNotSatisfiable {
    pub total: u64,
}

impl fmt::Display for RangeNotSatisfiable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "range not satisfiable against {} bytes", self.total)
    }
}

impl ByteRange {
    /// Parses a `Range` header value against `total` body bytes.
    ///
    /// Supports `bytes=S-E`, `bytes=S-`, and the suffix form `bytes=-N`.
    /// Multi-range, malformed, or out-of-bounds requests fail with
    /// `RangeNotSatisfiable` (served as 416 with `bytes */total`).
    pub fn parse(header: &str, total: u64) -> Result<Self, RangeNotSatisfiable> {
        let fail = RangeNotSatisfiable { total };
        let spec = header.strip_prefix("bytes=").ok_or(fail)?;

        if spec.contains(',') {
            return Err(fail);
        }

        let (start_str, end_str) = spec.split_once('-').ok_or(fail)?;

        if start_str.is_empty() {
            // Suffix form: last N bytes
            let suffix: u64 = end_str.parse().map_err(|_| fail)?;
            if suffix == 0 || total == 0 {
                return Err(fail);
            }
            let len = suffix.min(total);
            return Ok(Self {
                start: total - len,
                end: total - 1,
            });
        }

        let start: u64 = start_str.parse().map_err(|_| fail)?;
        let end: u64 = if end_str.is_empty() {
            total.checked_sub(1).ok_or(fail)?
        } else {
            end_str.parse().map_err(|_| fail)?
        };

        if start > end || start >= total {
            return Err(fail);
        }

        Ok(Self {
            start,
            end: end.min(total - 1),
        })
    }

    /// Number of bytes in the range (inclusive bounds, never zero)
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value for a 206 response
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// `Content-Range` header value for a 416 response
pub fn unsatisfiable_content_range(total: u64) -> String {
    format!("bytes */{}", total)
}
