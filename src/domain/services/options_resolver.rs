//! Options resolution
//!
//! Produces an immutable `TransformOptions` from URL query parameters, a
//! derivative preset table, and configured defaults. Resolution is pure
//! and deterministic: defaults, then the derivative (explicit or mapped
//! from an IMQuery dimension request), then explicit query fields, with
//! the IMQuery mapping re-asserting the preset's dimensions last.

use std::collections::HashMap;
use std::str::FromStr;

use crate::domain::entities::Derivative;
use crate::domain::value_objects::{
    FitMode, OutputFormat, QualityLevel, TimeValue, TransformMode, TransformOptions,
};
use crate::shared::error::ValidationError;

/// Default IMQuery matching tolerance (fraction of requested magnitude)
pub const DEFAULT_IMQUERY_TOLERANCE: f64 = 0.25;

/// Fixed legacy parameter aliases; `mute` is handled separately because
/// it inverts into `audio`
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("w", "width"),
    ("h", "height"),
    ("obj-fit", "fit"),
    ("start", "time"),
    ("dur", "duration"),
];

/// Resolver over a config snapshot's derivative table and defaults
pub struct OptionsResolver<'a> {
    defaults: &'a Derivative,
    derivatives: &'a HashMap<String, Derivative>,
    extra_aliases: &'a HashMap<String, String>,
    imquery_tolerance: f64,
}

impl<'a> OptionsResolver<'a> {
    pub fn new(
        defaults: &'a Derivative,
        derivatives: &'a HashMap<String, Derivative>,
        extra_aliases: &'a HashMap<String, String>,
        imquery_tolerance: f64,
    ) -> Self {
        Self {
            defaults,
            derivatives,
            extra_aliases,
            imquery_tolerance,
        }
    }

    /// Resolves query parameters into validated options.
    ///
    /// `max_duration_seconds` is the current (possibly learned) duration
    /// ceiling used for validation.
    pub fn resolve(
        &self,
        query: &HashMap<String, String>,
        max_duration_seconds: f64,
    ) -> Result<TransformOptions, ValidationError> {
        let params = self.translate_aliases(query);

        let mut options = TransformOptions::default();
        self.defaults.apply(&mut options);

        // Select a derivative: explicit name first, IMQuery mapping second
        let imquery = parse_imquery(&params)?;
        let mut imquery_mapped: Option<&Derivative> = None;

        if let Some(name) = params.get("derivative") {
            let derivative = self
                .derivatives
                .get(name)
                .ok_or_else(|| ValidationError::UnknownDerivative(name.clone()))?;
            derivative.apply(&mut options);
            options.derivative = Some(name.clone());
        } else if let Some((im_width, im_height)) = imquery {
            if let Some((name, derivative)) = self.closest_derivative(im_width, im_height) {
                derivative.apply(&mut options);
                options.derivative = Some(name.to_string());
                imquery_mapped = Some(derivative);
            }
        }

        self.apply_explicit_fields(&params, &mut options)?;

        match (imquery, imquery_mapped) {
            // The mapped preset's dimensions replace the requested ones
            (Some(_), Some(derivative)) => {
                if derivative.width.is_some() {
                    options.width = derivative.width;
                }
                if derivative.height.is_some() {
                    options.height = derivative.height;
                }
            }
            // No preset qualified: fall through to explicit dimensions
            (Some((im_width, im_height)), None) => {
                if im_width.is_some() {
                    options.width = im_width;
                }
                if im_height.is_some() {
                    options.height = im_height;
                }
            }
            _ => {}
        }

        options.validate(max_duration_seconds)?;
        Ok(options)
    }

    /// Rewrites legacy keys to canonical ones. A canonical key already
    /// present always wins over its alias; `mute` inverts into `audio`.
    fn translate_aliases(&self, query: &HashMap<String, String>) -> HashMap<String, String> {
        let mut params: HashMap<String, String> = query.clone();

        for (alias, canonical) in BUILTIN_ALIASES {
            if let Some(value) = query.get(*alias) {
                params
                    .entry(canonical.to_string())
                    .or_insert_with(|| value.clone());
            }
        }
        for (alias, canonical) in self.extra_aliases {
            if let Some(value) = query.get(alias) {
                params
                    .entry(canonical.clone())
                    .or_insert_with(|| value.clone());
            }
        }
        if let Some(value) = query.get("mute") {
            let muted = matches!(value.as_str(), "true" | "1");
            params
                .entry("audio".to_string())
                .or_insert_with(|| (!muted).to_string());
        }

        params
    }

    fn apply_explicit_fields(
        &self,
        params: &HashMap<String, String>,
        options: &mut TransformOptions,
    ) -> Result<(), ValidationError> {
        if let Some(v) = params.get("mode") {
            options.mode = TransformMode::from_str(v)?;
        }
        if let Some(v) = params.get("width") {
            options.width = Some(parse_u32("width", v)?);
        }
        if let Some(v) = params.get("height") {
            options.height = Some(parse_u32("height", v)?);
        }
        if let Some(v) = params.get("fit") {
            options.fit = Some(FitMode::from_str(v)?);
        }
        if let Some(v) = params.get("format") {
            options.format = Some(OutputFormat::from_str(v)?);
        }
        if let Some(v) = params.get("quality") {
            options.quality = QualityLevel::from_str(v)?;
        }
        if let Some(v) = params.get("compression") {
            options.compression = QualityLevel::from_str(v)?;
        }
        if let Some(v) = params.get("time") {
            options.time = Some(TimeValue::parse("time", v)?);
        }
        if let Some(v) = params.get("duration") {
            options.duration = Some(TimeValue::parse("duration", v)?);
        }
        if let Some(v) = params.get("audio") {
            options.audio = parse_bool("audio", v)?;
        }
        if let Some(v) = params.get("loop") {
            options.loop_playback = parse_bool("loop", v)?;
        }
        if let Some(v) = params.get("autoplay") {
            options.autoplay = parse_bool("autoplay", v)?;
        }
        if let Some(v) = params.get("muted") {
            options.muted = parse_bool("muted", v)?;
        }
        Ok(())
    }

    /// Closest derivative to the requested display size, if any lies
    /// within the tolerance. Distance is Euclidean when both dimensions
    /// are requested, single-axis otherwise.
    fn closest_derivative(
        &self,
        im_width: Option<u32>,
        im_height: Option<u32>,
    ) -> Option<(&str, &Derivative)> {
        let magnitude = match (im_width, im_height) {
            (Some(w), Some(h)) => ((w as f64).powi(2) + (h as f64).powi(2)).sqrt(),
            (Some(w), None) => w as f64,
            (None, Some(h)) => h as f64,
            (None, None) => return None,
        };

        let mut best: Option<(&str, &Derivative, f64)> = None;
        for (name, derivative) in self.derivatives {
            let distance = match (im_width, im_height) {
                (Some(w), Some(h)) => match derivative.dimension_distance(w as f64, h as f64) {
                    Some(d) => d,
                    None => continue,
                },
                (Some(w), None) => match derivative.width {
                    Some(dw) => (dw as f64 - w as f64).abs(),
                    None => continue,
                },
                (None, Some(h)) => match derivative.height {
                    Some(dh) => (dh as f64 - h as f64).abs(),
                    None => continue,
                },
                (None, None) => return None,
            };
            if distance / magnitude > self.imquery_tolerance {
                continue;
            }
            // Ties break on name so the mapping stays deterministic
            let better = match best {
                None => true,
                Some((best_name, _, best_distance)) => {
                    distance < best_distance
                        || (distance == best_distance && name.as_str() < best_name)
                }
            };
            if better {
                best = Some((name.as_str(), derivative, distance));
            }
        }

        best.map(|(name, derivative, _)| (name, derivative))
    }
}

fn parse_u32(field: &str, value: &str) -> Result<u32, ValidationError> {
    value
        .parse()
        .map_err(|_| ValidationError::InvalidParameter {
            field: field.to_string(),
            message: format!("expected a positive integer, got '{}'", value),
        })
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ValidationError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ValidationError::InvalidParameter {
            field: field.to_string(),
            message: format!("expected true or false, got '{}'", value),
        }),
    }
}

fn parse_imquery(
    params: &HashMap<String, String>,
) -> Result<Option<(Option<u32>, Option<u32>)>, ValidationError> {
    let width = params
        .get("imwidth")
        .map(|v| parse_u32("imwidth", v))
        .transpose()?;
    let height = params
        .get("imheight")
        .map(|v| parse_u32("imheight", v))
        .transpose()?;

    if width.is_none() && height.is_none() {
        Ok(None)
    } else {
        Ok(Some((width, height)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn derivatives() -> HashMap<String, Derivative> {
        let mut table = HashMap::new();
        table.insert(
            "mobile".to_string(),
            Derivative {
                width: Some(640),
                height: Some(360),
                quality: Some(QualityLevel::Low),
                ..Default::default()
            },
        );
        table.insert(
            "desktop".to_string(),
            Derivative {
                width: Some(1920),
                height: Some(1080),
                quality: Some(QualityLevel::High),
                ..Default::default()
            },
        );
        table
    }

    fn resolver<'a>(
        defaults: &'a Derivative,
        table: &'a HashMap<String, Derivative>,
        aliases: &'a HashMap<String, String>,
    ) -> OptionsResolver<'a> {
        OptionsResolver::new(defaults, table, aliases, DEFAULT_IMQUERY_TOLERANCE)
    }

    #[test]
    fn test_defaults_then_query() {
        let defaults = Derivative {
            fit: Some(FitMode::Contain),
            ..Default::default()
        };
        let table = derivatives();
        let aliases = HashMap::new();
        let r = resolver(&defaults, &table, &aliases);

        let opts = r
            .resolve(&query(&[("width", "800"), ("height", "450")]), 300.0)
            .unwrap();
        assert_eq!(opts.width, Some(800));
        assert_eq!(opts.fit, Some(FitMode::Contain));
    }

    #[test]
    fn test_explicit_query_beats_derivative() {
        let defaults = Derivative::default();
        let table = derivatives();
        let aliases = HashMap::new();
        let r = resolver(&defaults, &table, &aliases);

        let opts = r
            .resolve(
                &query(&[("derivative", "mobile"), ("width", "800")]),
                300.0,
            )
            .unwrap();
        assert_eq!(opts.width, Some(800));
        assert_eq!(opts.height, Some(360));
        assert_eq!(opts.quality, QualityLevel::Low);
        assert_eq!(opts.derivative.as_deref(), Some("mobile"));
    }

    #[test]
    fn test_unknown_derivative_rejected() {
        let defaults = Derivative::default();
        let table = derivatives();
        let aliases = HashMap::new();
        let r = resolver(&defaults, &table, &aliases);

        assert!(matches!(
            r.resolve(&query(&[("derivative", "cinema")]), 300.0),
            Err(ValidationError::UnknownDerivative(_))
        ));
    }

    #[test]
    fn test_imquery_maps_to_closest_derivative() {
        let defaults = Derivative::default();
        let table = derivatives();
        let aliases = HashMap::new();
        let r = resolver(&defaults, &table, &aliases);

        let opts = r
            .resolve(&query(&[("imwidth", "700"), ("imheight", "380")]), 300.0)
            .unwrap();
        // Derivative dimensions replace the requested ones
        assert_eq!(opts.width, Some(640));
        assert_eq!(opts.height, Some(360));
        assert_eq!(opts.derivative.as_deref(), Some("mobile"));
    }

    #[test]
    fn test_imquery_outside_tolerance_uses_explicit_dimensions() {
        let defaults = Derivative::default();
        let table = derivatives();
        let aliases = HashMap::new();
        let r = resolver(&defaults, &table, &aliases);

        let opts = r
            .resolve(&query(&[("imwidth", "3000"), ("imheight", "200")]), 300.0)
            .unwrap();
        assert_eq!(opts.width, Some(3000));
        assert_eq!(opts.height, Some(200));
        assert!(opts.derivative.is_none());
    }

    #[test]
    fn test_legacy_aliases_translate() {
        let defaults = Derivative::default();
        let table = derivatives();
        let aliases = HashMap::new();
        let r = resolver(&defaults, &table, &aliases);

        let opts = r
            .resolve(
                &query(&[
                    ("w", "640"),
                    ("h", "360"),
                    ("obj-fit", "cover"),
                    ("start", "5s"),
                    ("dur", "30s"),
                    ("mute", "true"),
                ]),
                300.0,
            )
            .unwrap();
        assert_eq!(opts.width, Some(640));
        assert_eq!(opts.height, Some(360));
        assert_eq!(opts.fit, Some(FitMode::Cover));
        assert_eq!(opts.time.unwrap().as_seconds(), 5.0);
        assert_eq!(opts.duration.unwrap().as_seconds(), 30.0);
        assert!(!opts.audio);
    }

    #[test]
    fn test_canonical_key_wins_over_alias() {
        let defaults = Derivative::default();
        let table = derivatives();
        let aliases = HashMap::new();
        let r = resolver(&defaults, &table, &aliases);

        let opts = r
            .resolve(&query(&[("w", "320"), ("width", "640")]), 300.0)
            .unwrap();
        assert_eq!(opts.width, Some(640));
    }

    #[test]
    fn test_resolution_is_idempotent_over_emitted_fields() {
        let defaults = Derivative::default();
        let table = derivatives();
        let aliases = HashMap::new();
        let r = resolver(&defaults, &table, &aliases);

        let first = r
            .resolve(&query(&[("width", "640"), ("height", "360")]), 300.0)
            .unwrap();

        // Feed the canonical encoding back through the resolver
        let reencoded: HashMap<String, String> =
            first.canonical_params().into_iter().collect();
        let second = r.resolve(&reencoded, 300.0).unwrap();
        assert_eq!(first.canonical_params(), second.canonical_params());
    }

    #[test]
    fn test_invalid_combination_surfaces() {
        let defaults = Derivative::default();
        let table = derivatives();
        let aliases = HashMap::new();
        let r = resolver(&defaults, &table, &aliases);

        assert!(matches!(
            r.resolve(&query(&[("mode", "frame"), ("loop", "true")]), 300.0),
            Err(ValidationError::InvalidOptionCombination(_))
        ));
    }
}
