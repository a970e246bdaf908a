//! Threshold classification: metrics + config -> issues, severity, text
//!
//! Pure and deterministic. The check order below fixes the phrase order in
//! the composed text; severity is a lattice join and does not depend on it.

use crate::config::AnalyzerConfig;
use crate::types::{FeedbackMessage, QualityMetrics, Severity};

/// Text used when no check fires.
pub const GOOD_QUALITY_TEXT: &str = "Good image quality";

/// One detected defect, in check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Issue {
    TooBlurry,
    TooDark,
    TooBright,
    TooNoisy,
    LowContrast,
    UnderSaturated,
    OverSaturated,
}

impl Issue {
    /// Phrase used in the composed message text.
    pub fn phrase(self) -> &'static str {
        match self {
            Issue::TooBlurry => "too blurry",
            Issue::TooDark => "too dark",
            Issue::TooBright => "too bright",
            Issue::TooNoisy => "too noisy",
            Issue::LowContrast => "low contrast",
            Issue::UnderSaturated => "under-saturated",
            Issue::OverSaturated => "over-saturated",
        }
    }

    /// Severity this issue contributes to the join.
    pub fn severity(self) -> Severity {
        match self {
            Issue::TooBlurry => Severity::Error,
            Issue::TooDark | Issue::TooBright | Issue::TooNoisy | Issue::LowContrast => {
                Severity::Warning
            }
            Issue::UnderSaturated | Issue::OverSaturated => Severity::Info,
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.phrase())
    }
}

/// Result of classifying one set of metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub issues: Vec<Issue>,
    pub severity: Severity,
    pub text: String,
}

impl Classification {
    pub fn is_good(&self) -> bool {
        self.issues.is_empty()
    }

    /// Turn the classification into a live message with a fresh id.
    pub fn into_message(self, duration_ms: u64) -> FeedbackMessage {
        FeedbackMessage::new(self.text, self.severity, duration_ms)
    }
}

/// Collect issues in check order.
pub fn detect_issues(m: &QualityMetrics, config: &AnalyzerConfig) -> Vec<Issue> {
    let mut issues = Vec::new();

    if m.sharpness < config.sharpness_threshold {
        issues.push(Issue::TooBlurry);
    }

    if m.brightness < config.brightness_lower_threshold {
        issues.push(Issue::TooDark);
    } else if m.brightness > config.brightness_upper_threshold {
        issues.push(Issue::TooBright);
    }

    if m.noise > config.noise_threshold {
        issues.push(Issue::TooNoisy);
    }

    if m.contrast < config.contrast_threshold {
        issues.push(Issue::LowContrast);
    }

    if m.saturation < config.saturation_lower_threshold {
        issues.push(Issue::UnderSaturated);
    } else if m.saturation > config.saturation_upper_threshold {
        issues.push(Issue::OverSaturated);
    }

    issues
}

/// Join phrases as "Image is a, b and c".
pub fn compose_text(issues: &[Issue]) -> String {
    match issues {
        [] => GOOD_QUALITY_TEXT.to_string(),
        [only] => format!("Image is {only}"),
        [init @ .., last] => {
            let head = init
                .iter()
                .map(|i| i.phrase())
                .collect::<Vec<_>>()
                .join(", ");
            format!("Image is {head} and {last}")
        }
    }
}

/// Classify a set of metrics against the configured thresholds.
///
/// Zero issues always yields `Severity::Success`.
pub fn classify(metrics: &QualityMetrics, config: &AnalyzerConfig) -> Classification {
    let issues = detect_issues(metrics, config);
    let severity = issues
        .iter()
        .fold(Severity::Success, |acc, issue| acc.escalate(issue.severity()));
    let text = compose_text(&issues);

    Classification {
        issues,
        severity,
        text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every metric comfortably inside its good zone under default config.
    fn good() -> QualityMetrics {
        QualityMetrics {
            sharpness: 80,
            brightness: 50,
            noise: 20,
            contrast: 60,
            saturation: 50,
        }
    }

    #[test]
    fn good_sample_is_success() {
        let c = classify(&good(), &AnalyzerConfig::default());
        assert!(c.is_good());
        assert_eq!(c.text, "Good image quality");
        assert_eq!(c.severity, Severity::Success);
    }

    #[test]
    fn single_issue_text() {
        let mut m = good();
        m.contrast = 10;
        let c = classify(&m, &AnalyzerConfig::default());
        assert_eq!(c.text, "Image is low contrast");
        assert_eq!(c.severity, Severity::Warning);
    }

    #[test]
    fn blurry_and_noisy() {
        let mut m = good();
        m.sharpness = 30;
        m.noise = 90;
        let c = classify(&m, &AnalyzerConfig::default());
        assert_eq!(c.text, "Image is too blurry and too noisy");
        assert_eq!(c.severity, Severity::Error);
    }

    #[test]
    fn four_issues_join_with_commas_and_and() {
        let mut m = good();
        m.brightness = 10;
        m.noise = 75;
        m.contrast = 5;
        m.saturation = 95;
        let c = classify(&m, &AnalyzerConfig::default());
        assert_eq!(
            c.text,
            "Image is too dark, too noisy, low contrast and over-saturated"
        );
        assert_eq!(c.severity, Severity::Warning);
    }

    #[test]
    fn brightness_plus_sharpness_is_error_not_warning() {
        let mut m = good();
        m.sharpness = 0;
        m.brightness = 100;
        let c = classify(&m, &AnalyzerConfig::default());
        assert_eq!(c.issues, vec![Issue::TooBlurry, Issue::TooBright]);
        assert_eq!(c.severity, Severity::Error);
    }

    #[test]
    fn saturation_alone_is_info() {
        let mut m = good();
        m.saturation = 10;
        let c = classify(&m, &AnalyzerConfig::default());
        assert_eq!(c.text, "Image is under-saturated");
        assert_eq!(c.severity, Severity::Info);
    }

    #[test]
    fn all_checks_fire_in_order() {
        let m = QualityMetrics {
            sharpness: 0,
            brightness: 0,
            noise: 100,
            contrast: 0,
            saturation: 100,
        };
        let c = classify(&m, &AnalyzerConfig::default());
        assert_eq!(
            c.text,
            "Image is too blurry, too dark, too noisy, low contrast and over-saturated"
        );
        assert_eq!(c.severity, Severity::Error);
    }

    #[test]
    fn thresholds_are_strict() {
        // Exactly on every boundary: nothing fires
        let config = AnalyzerConfig::default();
        let m = QualityMetrics {
            sharpness: config.sharpness_threshold,
            brightness: config.brightness_upper_threshold,
            noise: config.noise_threshold,
            contrast: config.contrast_threshold,
            saturation: config.saturation_lower_threshold,
        };
        assert!(classify(&m, &config).is_good());
    }

    #[test]
    fn severity_is_independent_of_check_order() {
        // Info-level issue first in the severity fold must not cap a later warning
        let issues = [Issue::UnderSaturated, Issue::TooNoisy];
        let forward = issues
            .iter()
            .fold(Severity::Success, |acc, i| acc.escalate(i.severity()));
        let backward = issues
            .iter()
            .rev()
            .fold(Severity::Success, |acc, i| acc.escalate(i.severity()));
        assert_eq!(forward, Severity::Warning);
        assert_eq!(forward, backward);
    }

    #[test]
    fn classification_is_deterministic() {
        let config = AnalyzerConfig::default();
        let mut m = good();
        m.brightness = 90;
        m.saturation = 5;
        let first = classify(&m, &config);
        for _ in 0..10 {
            assert_eq!(classify(&m, &config), first);
        }
    }

    #[test]
    fn into_message_copies_duration() {
        let c = classify(&good(), &AnalyzerConfig::default());
        let msg = c.into_message(1234);
        assert_eq!(msg.text, GOOD_QUALITY_TEXT);
        assert_eq!(msg.duration_ms, 1234);
        assert_eq!(msg.severity, Severity::Success);
    }
}
