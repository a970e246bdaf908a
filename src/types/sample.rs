//! Quality sample types: SampleId, QualityMetrics, QualitySample

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Upper bound of every quality metric (inclusive).
pub const METRIC_MAX: u8 = 100;

/// Opaque sample identity, assigned once at generation.
///
/// The analyzer deduplicates on this value, never on metric equality:
/// two samples with identical metrics are still distinct samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(Uuid);

impl SampleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SampleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SampleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// The five measured quality channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Sharpness,
    Brightness,
    Noise,
    Contrast,
    Saturation,
}

impl Metric {
    pub const ALL: [Self; 5] = [
        Self::Sharpness,
        Self::Brightness,
        Self::Noise,
        Self::Contrast,
        Self::Saturation,
    ];
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Sharpness => write!(f, "sharpness"),
            Metric::Brightness => write!(f, "brightness"),
            Metric::Noise => write!(f, "noise"),
            Metric::Contrast => write!(f, "contrast"),
            Metric::Saturation => write!(f, "saturation"),
        }
    }
}

/// A metric value outside [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{metric} = {value} is outside the valid range 0-100")]
pub struct MetricRangeError {
    pub metric: Metric,
    pub value: u8,
}

/// Quality measurements for one sample, each in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Higher is sharper
    pub sharpness: u8,
    /// Optimal band, deviation either way is a defect
    pub brightness: u8,
    /// Lower is better
    pub noise: u8,
    /// Higher is more contrast
    pub contrast: u8,
    /// Optimal band, deviation either way is a defect
    pub saturation: u8,
}

impl QualityMetrics {
    pub fn get(&self, metric: Metric) -> u8 {
        match metric {
            Metric::Sharpness => self.sharpness,
            Metric::Brightness => self.brightness,
            Metric::Noise => self.noise,
            Metric::Contrast => self.contrast,
            Metric::Saturation => self.saturation,
        }
    }

    /// Check every channel is within [0, 100].
    ///
    /// Reports the first offending channel in declaration order.
    pub fn validate(&self) -> Result<(), MetricRangeError> {
        Metric::ALL
            .into_iter()
            .map(|metric| (metric, self.get(metric)))
            .find(|&(_, value)| value > METRIC_MAX)
            .map_or(Ok(()), |(metric, value)| {
                Err(MetricRangeError { metric, value })
            })
    }
}

// ============================================================================
// Sample
// ============================================================================

/// One unit of measured quality data flowing through the pipeline.
///
/// Read-only after creation. Handed from the generator to the analyzer
/// by value and dropped once analyzed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySample {
    id: SampleId,
    metrics: QualityMetrics,
    created_at: DateTime<Utc>,
    /// Presentation artifact (e.g. an encoded preview), never read by the core
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rendered: Option<String>,
}

impl QualitySample {
    /// Create a sample with a fresh id, stamped now.
    pub fn new(metrics: QualityMetrics) -> Self {
        Self {
            id: SampleId::new(),
            metrics,
            created_at: Utc::now(),
            rendered: None,
        }
    }

    /// Attach a presentation artifact.
    pub fn with_rendered(mut self, rendered: impl Into<String>) -> Self {
        self.rendered = Some(rendered.into());
        self
    }

    pub fn id(&self) -> SampleId {
        self.id
    }

    pub fn metrics(&self) -> &QualityMetrics {
        &self.metrics
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn rendered(&self) -> Option<&str> {
        self.rendered.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(s: u8, b: u8, n: u8, c: u8, sat: u8) -> QualityMetrics {
        QualityMetrics {
            sharpness: s,
            brightness: b,
            noise: n,
            contrast: c,
            saturation: sat,
        }
    }

    #[test]
    fn in_range_metrics_validate() {
        assert!(metrics(0, 50, 100, 40, 50).validate().is_ok());
    }

    #[test]
    fn out_of_range_metric_is_reported() {
        let err = metrics(80, 50, 101, 40, 200).validate().unwrap_err();
        assert_eq!(err.metric, Metric::Noise);
        assert_eq!(err.value, 101);
        assert!(err.to_string().contains("noise = 101"));
    }

    #[test]
    fn identical_metrics_get_distinct_ids() {
        let m = metrics(70, 50, 20, 60, 50);
        let a = QualitySample::new(m);
        let b = QualitySample::new(m);
        assert_eq!(a.metrics(), b.metrics());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn rendered_artifact_is_optional_in_json() {
        let sample = QualitySample::new(metrics(70, 50, 20, 60, 50));
        let json = serde_json::to_string(&sample).unwrap();
        assert!(!json.contains("rendered"));

        let with = sample.with_rendered("preview");
        assert_eq!(with.rendered(), Some("preview"));
    }
}
