//! Single-flight Analyzer
//!
//! Accepts one sample at a time, waits out the analysis latency, then
//! classifies the sample and hands exactly one [`FeedbackMessage`] to the
//! caller's completion callback.
//!
//! ```text
//!          submit (new id, idle)              latency elapsed
//!   Idle ─────────────────────────▶ Analyzing ───────────────▶ Idle
//!                                       │        emits message
//!                                       │ cancel / drop
//!                                       ▼
//!                                      Idle   (nothing emitted)
//! ```
//!
//! A submit while Analyzing is dropped (`Busy`), and a submit of the
//! sample being analyzed or most recently analyzed is ignored
//! (`Duplicate`). Nothing is queued.

pub mod classify;

pub use classify::{classify, Classification, Issue};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{AnalyzerConfig, ConfigError};
use crate::types::{FeedbackMessage, MetricRangeError, QualitySample, SampleId};

// ============================================================================
// Errors & Outcomes
// ============================================================================

#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The producer handed over a sample with a metric outside [0, 100]
    #[error("sample {sample} rejected: {source}")]
    MetricOutOfRange {
        sample: SampleId,
        source: MetricRangeError,
    },

    #[error("invalid analyzer config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("analyzer requires a running tokio runtime")]
    NoRuntime,
}

/// What happened to a submitted sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Analysis started; one message will follow unless cancelled
    Accepted,
    /// Another analysis is in flight, sample dropped
    Busy,
    /// Same sample as the one in flight or most recently analyzed
    Duplicate,
}

/// Counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyzerStats {
    pub accepted: u64,
    pub completed: u64,
    pub dropped_busy: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub cancelled: u64,
}

// ============================================================================
// Analyzer
// ============================================================================

struct InFlight {
    ticket: u64,
    sample: SampleId,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<AnalyzerState>,
    /// Held by a completing task from its ticket check until its callback
    /// returns. `cancel` takes it first.
    emitting: Mutex<()>,
}

#[derive(Default)]
struct AnalyzerState {
    /// Sample in flight, or the most recently analyzed one
    last_sample: Option<SampleId>,
    in_flight: Option<InFlight>,
    next_ticket: u64,
    stats: AnalyzerStats,
}

/// Single-flight sample analyzer.
///
/// Dropping the analyzer cancels any pending analysis.
///
/// The completion callback runs while emission is locked against
/// [`Analyzer::cancel`], so it must not cancel or drop the analyzer
/// that invoked it.
pub struct Analyzer {
    shared: Arc<Shared>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
        }
    }

    /// Request analysis of `sample` under `config`.
    ///
    /// On `Accepted`, `on_result` is called exactly once after
    /// `config.effective_latency()` unless the analysis is cancelled first.
    /// On any other outcome `on_result` is dropped uncalled.
    pub fn submit<F>(
        &self,
        sample: QualitySample,
        config: &AnalyzerConfig,
        on_result: F,
    ) -> Result<SubmitOutcome, AnalyzerError>
    where
        F: FnOnce(FeedbackMessage) + Send + 'static,
    {
        let mut state = lock(&self.shared.state);

        if let Err(e) = config.validate() {
            state.stats.rejected += 1;
            return Err(e.into());
        }
        if let Err(source) = sample.metrics().validate() {
            state.stats.rejected += 1;
            warn!(sample = %sample.id(), error = %source, "Rejecting out-of-range sample");
            return Err(AnalyzerError::MetricOutOfRange {
                sample: sample.id(),
                source,
            });
        }

        if state.last_sample == Some(sample.id()) {
            state.stats.duplicates += 1;
            debug!(sample = %sample.id(), "Sample already analyzed, ignoring");
            return Ok(SubmitOutcome::Duplicate);
        }
        if let Some(current) = state.in_flight.as_ref().map(|f| f.sample) {
            state.stats.dropped_busy += 1;
            debug!(
                sample = %sample.id(),
                in_flight = %current,
                "Analysis in flight, dropping sample"
            );
            return Ok(SubmitOutcome::Busy);
        }

        let runtime = Handle::try_current().map_err(|_| AnalyzerError::NoRuntime)?;

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        let sample_id = sample.id();
        let latency = config.effective_latency();
        let config = config.clone();
        let owner = Arc::downgrade(&self.shared);
        let accepted_at = Instant::now();

        // The lock is held until `in_flight` is recorded, so completion
        // always observes its own ticket.
        let task = runtime.spawn(async move {
            tokio::time::sleep(latency).await;
            complete(&owner, ticket, &sample, &config, accepted_at, on_result);
        });

        state.last_sample = Some(sample_id);
        state.in_flight = Some(InFlight {
            ticket,
            sample: sample_id,
            task,
        });
        state.stats.accepted += 1;
        debug!(sample = %sample_id, latency_ms = latency.as_millis() as u64, "Analysis started");

        Ok(SubmitOutcome::Accepted)
    }

    /// Cancel the pending analysis, if any. No message is emitted for it.
    ///
    /// The cancelled sample is forgotten, so it may be submitted again.
    /// If a completion callback is already running on another thread, this
    /// waits for it to return. Safe to call any number of times.
    pub fn cancel(&self) {
        let _emitting = lock(&self.shared.emitting);
        let mut state = lock(&self.shared.state);
        if let Some(in_flight) = state.in_flight.take() {
            in_flight.task.abort();
            if state.last_sample == Some(in_flight.sample) {
                state.last_sample = None;
            }
            state.stats.cancelled += 1;
            info!(sample = %in_flight.sample, "Pending analysis cancelled");
        }
    }

    pub fn is_analyzing(&self) -> bool {
        lock(&self.shared.state).in_flight.is_some()
    }

    /// Sample in flight, or the most recently analyzed one.
    pub fn last_sample(&self) -> Option<SampleId> {
        lock(&self.shared.state).last_sample
    }

    pub fn stats(&self) -> AnalyzerStats {
        lock(&self.shared.state).stats
    }
}

impl Drop for Analyzer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Timer side of an analysis: verify it is still current, then emit.
fn complete<F>(
    owner: &Weak<Shared>,
    ticket: u64,
    sample: &QualitySample,
    config: &AnalyzerConfig,
    accepted_at: Instant,
    on_result: F,
) where
    F: FnOnce(FeedbackMessage),
{
    // Analyzer dropped while we slept
    let Some(shared) = owner.upgrade() else {
        return;
    };
    let _emitting = lock(&shared.emitting);
    {
        let mut guard = lock(&shared.state);
        match guard.in_flight {
            Some(ref f) if f.ticket == ticket => {}
            // Cancelled and possibly replaced
            _ => return,
        }
        guard.in_flight = None;
        guard.stats.completed += 1;
    }

    let classification = classify(sample.metrics(), config);
    let message = classification.into_message(config.feedback_duration_ms);
    info!(
        sample = %sample.id(),
        severity = %message.severity,
        elapsed_ms = accepted_at.elapsed().as_millis() as u64,
        "{}",
        message.text
    );
    on_result(message);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
