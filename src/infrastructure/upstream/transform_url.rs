//! Upstream transformation URL construction
//!
//! `<cdn_base>/<k>=<v>,<k>=<v>,…/<source_url>[?v=<version>]`. The
//! parameter segment comes from the canonical options encoding, so two
//! identical requests always produce byte-identical URLs and intermediate
//! caches see one spelling per transformation.

use crate::domain::value_objects::TransformOptions;

/// Encodes the comma-separated parameter segment
pub fn encode_params_segment(options: &TransformOptions) -> String {
    options
        .canonical_params()
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(&value)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Builds the full upstream URL. Versions above 1 are appended as a
/// cache-busting query parameter.
pub fn build_transform_url(
    cdn_base: &str,
    options: &TransformOptions,
    source_url: &str,
    version: u64,
) -> String {
    let base = cdn_base.trim_end_matches('/');
    let segment = encode_params_segment(options);
    let mut url = format!("{}/{}/{}", base, segment, source_url);

    if version > 1 {
        let separator = if url.contains('?') { '&' } else { '?' };
        url.push(separator);
        url.push_str(&format!("v={}", version));
    }

    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{QualityLevel, TimeValue};

    fn options() -> TransformOptions {
        TransformOptions {
            width: Some(640),
            height: Some(360),
            quality: QualityLevel::High,
            time: Some(TimeValue::parse("time", "90s").unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn test_segment_is_alphabetical_and_normalized() {
        assert_eq!(
            encode_params_segment(&options()),
            "height=360,mode=video,quality=high,time=1.5m,width=640"
        );
    }

    #[test]
    fn test_url_shape() {
        let url = build_transform_url(
            "https://cdn.example.com/media",
            &options(),
            "https://bucket.example.com/videos/a.mp4",
            1,
        );
        assert_eq!(
            url,
            "https://cdn.example.com/media/height=360,mode=video,quality=high,time=1.5m,width=640/https://bucket.example.com/videos/a.mp4"
        );
    }

    #[test]
    fn test_version_above_one_appends_query() {
        let url = build_transform_url("https://cdn.example.com", &options(), "https://o/x.mp4", 3);
        assert!(url.ends_with("?v=3"));

        let url = build_transform_url("https://cdn.example.com", &options(), "https://o/x.mp4", 1);
        assert!(!url.contains("v=1"));
    }

    #[test]
    fn test_version_appends_with_ampersand_after_presigned_query() {
        let url = build_transform_url(
            "https://cdn.example.com",
            &options(),
            "https://o/x.mp4?X-Amz-Signature=abc",
            2,
        );
        assert!(url.ends_with("&v=2"));
    }

    #[test]
    fn test_construction_is_deterministic() {
        let a = build_transform_url("https://c", &options(), "https://o/x.mp4", 2);
        let b = build_transform_url("https://c", &options(), "https://o/x.mp4", 2);
        assert_eq!(a, b);
    }
}
