//! Config validation: unknown-key detection with Levenshtein suggestions
//! and threshold sanity checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use crate::types::METRIC_MAX;

/// A non-fatal config warning (typo, inert threshold).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for `PipelineConfig`.
///
/// Maintained by hand to match the struct hierarchy in pipeline_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [analyzer]
        "analyzer",
        "analyzer.sharpness_threshold",
        "analyzer.brightness_lower_threshold",
        "analyzer.brightness_upper_threshold",
        "analyzer.noise_threshold",
        "analyzer.contrast_threshold",
        "analyzer.saturation_lower_threshold",
        "analyzer.saturation_upper_threshold",
        "analyzer.feedback_duration_ms",
        "analyzer.analysis_delay_ms",
        // [generator]
        "generator",
        "generator.interval_ms",
        "generator.enabled",
        "generator.seed",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Ties resolve to the lexicographically smallest key so suggestions are stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (levenshtein(unknown, k), k))
        .filter(|&(dist, _)| dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Threshold Sanity Checks
// ============================================================================

/// Flag thresholds that make a check impossible to trigger.
///
/// Such configs are legal (a user may want a check switched off) but are
/// usually a mistake, so they surface as warnings at load time instead of
/// silently producing a classifier that never reports that issue.
pub fn validate_threshold_ranges(config: &super::PipelineConfig) -> Vec<ValidationWarning> {
    let a = &config.analyzer;
    let mut warnings = Vec::new();

    let mut inert = |field: &str, why: String| {
        warnings.push(ValidationWarning {
            field: format!("analyzer.{field}"),
            message: format!("analyzer.{field}: {why}"),
            suggestion: None,
        });
    };

    // Lower bounds fire on value < threshold
    if a.sharpness_threshold == 0 {
        inert("sharpness_threshold", "0 disables the 'too blurry' check".to_string());
    }
    if a.contrast_threshold == 0 {
        inert("contrast_threshold", "0 disables the 'low contrast' check".to_string());
    }
    // Upper bound fires on value > threshold
    if a.noise_threshold >= METRIC_MAX {
        inert(
            "noise_threshold",
            format!("{} disables the 'too noisy' check", a.noise_threshold),
        );
    }
    // Bands fire outside [lower, upper]
    if a.brightness_lower_threshold == 0 && a.brightness_upper_threshold >= METRIC_MAX {
        inert(
            "brightness_lower_threshold",
            "band covers 0-100, brightness is never flagged".to_string(),
        );
    }
    if a.saturation_lower_threshold == 0 && a.saturation_upper_threshold >= METRIC_MAX {
        inert(
            "saturation_lower_threshold",
            "band covers 0-100, saturation is never flagged".to_string(),
        );
    }

    warnings
}

// ============================================================================
// Tests
// ============================================================================
