//! Feedback message types: MessageId, Severity, FeedbackMessage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Opaque feedback message identity, generated at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

// ============================================================================
// Severity
// ============================================================================

/// Classification severity.
///
/// Variants are declared in escalation order, so the derived `Ord` is the
/// lattice `Success < Info < Warning < Error` and [`Severity::escalate`] is
/// its join.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Success,
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Join two severities: the result never ranks below either input.
    #[must_use]
    pub fn escalate(self, other: Self) -> Self {
        self.max(other)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Success => write!(f, "SUCCESS"),
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

// ============================================================================
// Feedback Message
// ============================================================================

/// Time-boxed feedback produced by one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackMessage {
    pub id: MessageId,
    /// Human-readable summary, e.g. "Image is too dark and too noisy"
    pub text: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
    /// How long the message stays live (ms)
    pub duration_ms: u64,
}

impl FeedbackMessage {
    /// Create a message with a fresh id, stamped now.
    pub fn new(text: impl Into<String>, severity: Severity, duration_ms: u64) -> Self {
        Self {
            id: MessageId::new(),
            text: text.into(),
            severity,
            created_at: Utc::now(),
            duration_ms,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}
