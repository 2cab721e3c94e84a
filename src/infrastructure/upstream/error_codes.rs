//! Upstream error-code taxonomy
//!
//! The transformation service signals failure through a response header
//! carrying `err=NNNN`. Each code maps to an error class, the HTTP
//! status we surface, and the retry/fallback behavior of the recovery
//! state machine. Unknown codes fail safe: retryable and fallback-able,
//! because showing something beats showing nothing.

use serde::Serialize;

/// Header the upstream service sets on failed transformations
pub const UPSTREAM_ERROR_HEADER: &str = "x-media-err";

/// Error code signalled for oversized inputs
pub const FILE_SIZE_LIMIT_CODE: u32 = 9402;

/// Error code signalled when the source object does not exist
pub const RESOURCE_NOT_FOUND_CODE: u32 = 9404;

/// Who is at fault for a failed transformation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    Client,
    Origin,
    Upstream,
}

/// Classification of one upstream error code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeSpec {
    pub code: u32,
    pub class: ErrorClass,
    pub http_status: u16,
    pub retryable: bool,
    pub should_fallback: bool,
}

/// Maps an upstream error code to its behavior
pub fn classify(code: u32) -> CodeSpec {
    let (class, http_status, retryable, should_fallback) = match code {
        // invalid options
        9401 => (ErrorClass::Client, 400, false, false),
        // origin too large / no response
        9402 => (ErrorClass::Origin, 502, false, true),
        // resource not found
        9404 => (ErrorClass::Client, 404, false, false),
        // malformed URL
        9406 => (ErrorClass::Client, 400, false, false),
        // DNS error
        9407 => (ErrorClass::Origin, 502, true, true),
        // origin returned 4xx
        9408 => (ErrorClass::Origin, 502, false, true),
        // origin response is not media
        9412 => (ErrorClass::Origin, 502, false, true),
        // URL format error
        9419 => (ErrorClass::Client, 400, false, false),
        // origin unreachable
        9504 => (ErrorClass::Origin, 502, true, true),
        // origin returned 5xx
        9509 => (ErrorClass::Origin, 502, true, true),
        // upstream internal errors
        9517 | 9523 => (ErrorClass::Upstream, 500, true, true),
        // unknown codes fail safe
        _ => (ErrorClass::Upstream, 500, true, true),
    };
    CodeSpec {
        code,
        class,
        http_status,
        retryable,
        should_fallback,
    }
}

/// Whether a code denotes the oversized-input case, which skips straight
/// to the direct-fetch fallback
pub fn is_file_size_limit(code: u32) -> bool {
    code == FILE_SIZE_LIMIT_CODE
}

/// Whether a code means the object was absent from the tried source. The
/// status surfaces as 404 without retries, but another source of the
/// same origin may still hold the object, so recovery searches the
/// alternatives before giving up.
pub fn is_resource_not_found(code: u32) -> bool {
    code == RESOURCE_NOT_FOUND_CODE
}

/// Parses `err=NNNN` out of the error header value
pub fn parse_error_header(value: &str) -> Option<u32> {
    value.split(|c| c == ';' || c == ',' || c == ' ').find_map(|part| {
        part.trim()
            .strip_prefix("err=")
            .and_then(|code| code.parse().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_codes_do_not_retry_or_fall_back() {
        for code in [9401, 9404, 9406, 9419] {
            let spec = classify(code);
            assert_eq!(spec.class, ErrorClass::Client, "{}", code);
            assert!(!spec.retryable, "{}", code);
            assert!(!spec.should_fallback, "{}", code);
        }
        assert_eq!(classify(9404).http_status, 404);
        assert_eq!(classify(9401).http_status, 400);
    }

    #[test]
    fn test_origin_codes_fall_back() {
        for code in [9402, 9407, 9408, 9412, 9504, 9509] {
            let spec = classify(code);
            assert_eq!(spec.http_status, 502, "{}", code);
            assert!(spec.should_fallback, "{}", code);
        }
        assert!(classify(9407).retryable);
        assert!(!classify(9408).retryable);
    }

    #[test]
    fn test_unknown_codes_fail_safe() {
        let spec = classify(9999);
        assert!(spec.retryable);
        assert!(spec.should_fallback);
        assert_eq!(spec.http_status, 500);
    }

    #[test]
    fn test_parse_error_header() {
        assert_eq!(parse_error_header("err=9404"), Some(9404));
        assert_eq!(parse_error_header("internal; err=9517"), Some(9517));
        assert_eq!(parse_error_header("ok"), None);
        assert_eq!(parse_error_header("err=abc"), None);
    }

    #[test]
    fn test_file_size_limit_code() {
        assert!(is_file_size_limit(FILE_SIZE_LIMIT_CODE));
        assert!(!is_file_size_limit(9404));
    }
}
