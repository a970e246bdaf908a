//! Feedback Pipeline
//!
//! ```text
//! SampleGenerator ──sample──▶ Analyzer ──message──▶ FeedbackLifecycleManager
//!   (every period)        (single-flight,         (per-message expiry,
//!                          ≥ 500ms latency)         watch subscribers)
//! ```
//!
//! The [`Orchestrator`] owns one of each and wires them together.
//! Samples arriving while an analysis is in flight are dropped.

mod orchestrator;

pub use orchestrator::Orchestrator;

use serde::Serialize;

use crate::types::Severity;

/// Pipeline statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub samples_generated: u64,
    pub samples_accepted: u64,
    pub samples_dropped_busy: u64,
    pub samples_duplicate: u64,
    pub samples_rejected: u64,
    pub success_messages: u64,
    pub info_messages: u64,
    pub warning_messages: u64,
    pub error_messages: u64,
}

impl PipelineStats {
    pub fn record_message(&mut self, severity: Severity) {
        match severity {
            Severity::Success => self.success_messages += 1,
            Severity::Info => self.info_messages += 1,
            Severity::Warning => self.warning_messages += 1,
            Severity::Error => self.error_messages += 1,
        }
    }

    pub fn messages_emitted(&self) -> u64 {
        self.success_messages + self.info_messages + self.warning_messages + self.error_messages
    }

    /// Share of generated samples that were analyzed, in percent.
    pub fn acceptance_rate(&self) -> f64 {
        if self.samples_generated == 0 {
            return 0.0;
        }
        self.samples_accepted as f64 / self.samples_generated as f64 * 100.0
    }
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "generated={} accepted={} busy={} duplicate={} rejected={} | \
             success={} info={} warning={} error={}",
            self.samples_generated,
            self.samples_accepted,
            self.samples_dropped_busy,
            self.samples_duplicate,
            self.samples_rejected,
            self.success_messages,
            self.info_messages,
            self.warning_messages,
            self.error_messages,
        )
    }
}
