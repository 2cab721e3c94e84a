//! Path template resolution
//!
//! Source path templates reference origin captures as `${name}` or
//! `${1}`, allow literal defaults as `${name:default}`, and accept the
//! special token `${request_path}`. Substitutions are performed as-is;
//! percent-encoding already present in captures is preserved.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::entities::OriginMatch;
use crate::shared::error::ResolutionError;

static TEMPLATE_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z0-9_]+)(?::([^}]*))?\}").expect("static pattern"));

/// Token substituted with the raw request path
pub const REQUEST_PATH_TOKEN: &str = "request_path";

/// Substitutes template variables from origin captures.
///
/// A reference with no matching capture and no default fails with
/// `PathResolutionFailed`; an empty capture falls back to the default
/// when one is given.
pub fn resolve_template(
    template: &str,
    captures: &OriginMatch,
    request_path: &str,
) -> Result<String, ResolutionError> {
    let mut result = String::with_capacity(template.len());
    let mut last = 0;

    for caps in TEMPLATE_VAR.captures_iter(template) {
        let full = caps.get(0).expect("match");
        let name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str());

        result.push_str(&template[last..full.start()]);

        let value = if name == REQUEST_PATH_TOKEN {
            Some(request_path)
        } else {
            captures.get(name).filter(|v| !v.is_empty())
        };

        match value.or(default) {
            Some(v) => result.push_str(v),
            None => {
                return Err(ResolutionError::PathResolutionFailed(format!(
                    "no capture or default for ${{{}}} in template '{}'",
                    name, template
                )))
            }
        }

        last = full.end();
    }
    result.push_str(&template[last..]);

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captures(pairs: &[(&str, &str)]) -> OriginMatch {
        let mut m = OriginMatch::default();
        for (k, v) in pairs {
            m.insert(k.to_string(), v.to_string());
        }
        m
    }

    #[test]
    fn test_named_and_positional_substitution() {
        let caps = captures(&[("1", "abc.mp4"), ("file", "abc.mp4")]);
        assert_eq!(
            resolve_template("videos/${file}", &caps, "/videos/abc.mp4").unwrap(),
            "videos/abc.mp4"
        );
        assert_eq!(
            resolve_template("videos/${1}", &caps, "/videos/abc.mp4").unwrap(),
            "videos/abc.mp4"
        );
    }

    #[test]
    fn test_request_path_token() {
        let caps = captures(&[]);
        assert_eq!(
            resolve_template("${request_path}", &caps, "/videos/abc.mp4").unwrap(),
            "/videos/abc.mp4"
        );
    }

    #[test]
    fn test_default_applies_when_capture_absent_or_empty() {
        let caps = captures(&[("quality", "")]);
        assert_eq!(
            resolve_template("${quality:hd}/${name:movie}.mp4", &caps, "/").unwrap(),
            "hd/movie.mp4"
        );
    }

    #[test]
    fn test_missing_capture_without_default_fails() {
        let caps = captures(&[]);
        let err = resolve_template("videos/${missing}", &caps, "/").unwrap_err();
        assert!(matches!(err, ResolutionError::PathResolutionFailed(_)));
    }

    #[test]
    fn test_percent_encoding_preserved() {
        let caps = captures(&[("1", "a%20b.mp4")]);
        assert_eq!(
            resolve_template("${1}", &caps, "/").unwrap(),
            "a%20b.mp4"
        );
    }

    #[test]
    fn test_literal_text_untouched() {
        let caps = captures(&[("1", "x")]);
        assert_eq!(
            resolve_template("static/path.mp4", &caps, "/").unwrap(),
            "static/path.mp4"
        );
    }
}
