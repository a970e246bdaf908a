//! Pipeline Configuration - analyzer thresholds and generator timing as TOML values
//!
//! Every struct implements `Default` with the built-in thresholds, so a
//! missing file, a missing section or a missing key all fall back to the
//! same values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults::{
    CONFIG_ENV_VAR, DEFAULT_GENERATION_INTERVAL_MS, LOCAL_CONFIG_FILE, MIN_ANALYSIS_LATENCY_MS,
};
use crate::types::METRIC_MAX;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one pipeline instance.
///
/// Load with `PipelineConfig::load()` which searches:
/// 1. `$QUALITY_WATCH_CONFIG` env var
/// 2. `./quality_watch.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Classification thresholds and timings
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Sample production
    #[serde(default)]
    pub generator: GeneratorConfig,
}

/// Where a loaded config came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::File(p) => Some(p),
            ConfigSource::Defaults => None,
        }
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(p) => write!(f, "{}", p.display()),
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

impl PipelineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$QUALITY_WATCH_CONFIG` environment variable
    /// 2. `./quality_watch.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> (Self, ConfigSource) {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded pipeline config from {}", CONFIG_ENV_VAR);
                        return (config, ConfigSource::File(p));
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        // 2. Check ./quality_watch.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded pipeline config from ./{}", LOCAL_CONFIG_FILE);
                    return (config, ConfigSource::File(local));
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        (Self::default(), ConfigSource::Defaults)
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::ParseStr(source) => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are logged as warnings (with suggestions) and never
    /// fail the load; impossible values do.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        // Two-pass: check for unknown keys first (warnings only)
        for w in &super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents).map_err(ConfigError::ParseStr)?;
        config.validate()?;

        for w in &super::validation::validate_threshold_ranges(&config) {
            warn!("{}", w);
        }
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Pipeline config saved");
        Ok(())
    }

    /// Validate every section, collecting all problems before failing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = self.analyzer.collect_errors();
        errors.extend(self.generator.collect_errors());
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Config parse error ({}): {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Config parse error: {0}")]
    ParseStr(#[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[source] toml::ser::Error),

    #[error("Config validation failed:\n{}", format_errors(.0))]
    Validation(Vec<String>),

    #[error("No config file is active; running on built-in defaults")]
    NoSource,
}

fn format_errors(errors: &[String]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Analyzer Config
// ============================================================================

/// Thresholds and timings for classifying one sample.
///
/// Lower bounds (`sharpness`, `contrast`) flag values strictly below the
/// threshold, the upper bound (`noise`) flags values strictly above it,
/// and bands (`brightness`, `saturation`) flag values strictly outside
/// `[lower, upper]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub sharpness_threshold: u8,
    pub brightness_lower_threshold: u8,
    pub brightness_upper_threshold: u8,
    pub noise_threshold: u8,
    pub contrast_threshold: u8,
    pub saturation_lower_threshold: u8,
    pub saturation_upper_threshold: u8,
    /// How long each produced message stays live (ms)
    pub feedback_duration_ms: u64,
    /// Nominal analysis latency (ms); never below `MIN_ANALYSIS_LATENCY_MS`
    pub analysis_delay_ms: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            sharpness_threshold: 60,
            brightness_lower_threshold: 30,
            brightness_upper_threshold: 70,
            noise_threshold: 50,
            contrast_threshold: 40,
            saturation_lower_threshold: 30,
            saturation_upper_threshold: 70,
            feedback_duration_ms: 2000,
            analysis_delay_ms: 500,
        }
    }
}

impl AnalyzerConfig {
    /// Effective analysis latency: `max(analysis_delay_ms, 500)`.
    pub fn effective_latency(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.analysis_delay_ms.max(MIN_ANALYSIS_LATENCY_MS))
    }

    /// Validate this section on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let errors = self.collect_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn collect_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let bounds = [
            ("analyzer.sharpness_threshold", self.sharpness_threshold),
            ("analyzer.brightness_lower_threshold", self.brightness_lower_threshold),
            ("analyzer.brightness_upper_threshold", self.brightness_upper_threshold),
            ("analyzer.noise_threshold", self.noise_threshold),
            ("analyzer.contrast_threshold", self.contrast_threshold),
            ("analyzer.saturation_lower_threshold", self.saturation_lower_threshold),
            ("analyzer.saturation_upper_threshold", self.saturation_upper_threshold),
        ];
        for (name, value) in bounds {
            if value > METRIC_MAX {
                errors.push(format!("{name} = {value} is outside the metric range 0-{METRIC_MAX}"));
            }
        }

        Self::check_band(
            self.brightness_lower_threshold,
            self.brightness_upper_threshold,
            "analyzer.brightness",
            &mut errors,
        );
        Self::check_band(
            self.saturation_lower_threshold,
            self.saturation_upper_threshold,
            "analyzer.saturation",
            &mut errors,
        );

        if self.feedback_duration_ms == 0 {
            errors.push("analyzer.feedback_duration_ms must be > 0".to_string());
        }

        errors
    }

    fn check_band(lower: u8, upper: u8, name: &str, errors: &mut Vec<String>) {
        if lower > upper {
            errors.push(format!(
                "{name}: lower threshold ({lower}) must be <= upper threshold ({upper})"
            ));
        }
    }
}

// ============================================================================
// Generator Config
// ============================================================================

/// Sample production settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Period between samples (ms)
    pub interval_ms: u64,
    /// Start producing immediately
    pub enabled: bool,
    /// Fixed RNG seed for reproducible synthetic samples
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_GENERATION_INTERVAL_MS,
            enabled: true,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.interval_ms)
    }

    fn collect_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.interval_ms == 0 {
            errors.push("generator.interval_ms must be > 0".to_string());
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config_validates() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok(), "Default config must always validate");
    }

    #[test]
    fn test_empty_toml_produces_defaults() {
        let config = PipelineConfig::from_toml_str("").expect("empty TOML should parse");
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.analyzer.sharpness_threshold, 60);
        assert_eq!(config.analyzer.feedback_duration_ms, 2000);
        assert_eq!(config.generator.interval_ms, 200);
    }

    #[test]
    fn test_partial_toml_override() {
        let toml_str = r#"
[analyzer]
sharpness_threshold = 50
analysis_delay_ms = 800

[generator]
seed = 7
"#;
        let config = PipelineConfig::from_toml_str(toml_str).expect("partial TOML should parse");
        // Overridden values
        assert_eq!(config.analyzer.sharpness_threshold, 50);
        assert_eq!(config.analyzer.analysis_delay_ms, 800);
        assert_eq!(config.generator.seed, Some(7));
        // Non-overridden values retain defaults
        assert_eq!(config.analyzer.noise_threshold, 50);
        assert_eq!(config.analyzer.brightness_upper_threshold, 70);
        assert!(config.generator.enabled);
    }

    #[test]
    fn test_validation_catches_inverted_band() {
        let mut config = PipelineConfig::default();
        config.analyzer.brightness_lower_threshold = 80;
        config.analyzer.brightness_upper_threshold = 20;
        let result = config.validate();
        assert!(result.is_err(), "Inverted band should fail validation");
        if let Err(ConfigError::Validation(errors)) = result {
            assert!(errors.iter().any(|e| e.contains("analyzer.brightness")));
        }
    }

    #[test]
    fn test_validation_collects_every_error() {
        let mut config = PipelineConfig::default();
        config.analyzer.noise_threshold = 150;
        config.analyzer.feedback_duration_ms = 0;
        config.generator.interval_ms = 0;
        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.len(), 3, "got: {errors:?}");
    }

    #[test]
    fn test_negative_duration_is_a_parse_error() {
        let result = PipelineConfig::from_toml_str("[analyzer]\nfeedback_duration_ms = -5\n");
        assert!(matches!(result, Err(ConfigError::ParseStr(_))));
    }

    #[test]
    fn test_effective_latency_has_floor() {
        let mut config = AnalyzerConfig::default();
        config.analysis_delay_ms = 0;
        assert_eq!(config.effective_latency(), Duration::from_millis(500));
        config.analysis_delay_ms = 1000;
        assert_eq!(config.effective_latency(), Duration::from_millis(1000));
    }

    #[test]
    fn test_toml_round_trip_preserves_values() {
        let mut config = PipelineConfig::default();
        config.analyzer.contrast_threshold = 45;
        config.generator.seed = Some(99);
        let text = config.to_toml().expect("serialize");
        let back = PipelineConfig::from_toml_str(&text).expect("parse back");
        assert_eq!(back, config);
    }

    #[test]
    fn test_load_from_file_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[analyzer\nsharpness_threshold = 1").expect("write");
        let err = PipelineConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { path: ref p, .. } if p == &path));
    }
}
