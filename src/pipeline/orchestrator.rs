//! Wires generator -> analyzer -> lifecycle manager and runs the event loop.

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::PipelineStats;
use crate::analyzer::{Analyzer, SubmitOutcome};
use crate::config::defaults::STATS_LOG_INTERVAL_SECS;
use crate::config::watcher::ConfigEvent;
use crate::config::{self, AnalyzerConfig, ConfigError, PipelineConfig};
use crate::feedback::FeedbackLifecycleManager;
use crate::generator::{SampleFactory, SampleGenerator, SyntheticQuality};
use crate::types::{FeedbackMessage, QualitySample};

/// Owns one generator, one analyzer and one lifecycle manager.
///
/// The analyzer config is read per sample, so `apply_config` affects the
/// next submission without restarting anything.
pub struct Orchestrator<F: SampleFactory = SyntheticQuality> {
    generator: SampleGenerator<F>,
    analyzer: Arc<Analyzer>,
    feedback: Arc<FeedbackLifecycleManager>,
    analyzer_config: Arc<ArcSwap<AnalyzerConfig>>,
    period: Duration,
    stats: Arc<Mutex<PipelineStats>>,
}

impl Orchestrator<SyntheticQuality> {
    /// Build a pipeline fed by synthetic samples.
    pub fn synthetic(config: &PipelineConfig) -> Result<Self, ConfigError> {
        Self::with_factory(SyntheticQuality::new(config.generator.seed), config)
    }
}

impl<F: SampleFactory> Orchestrator<F> {
    pub fn with_factory(factory: F, config: &PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            generator: SampleGenerator::new(factory),
            analyzer: Arc::new(Analyzer::new()),
            feedback: Arc::new(FeedbackLifecycleManager::new()),
            analyzer_config: Arc::new(ArcSwap::from_pointee(config.analyzer.clone())),
            period: config.generator.interval(),
            stats: Arc::new(Mutex::new(PipelineStats::default())),
        })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Switch sample generation on. Restarts the run if already on.
    pub fn start(&mut self) -> Result<()> {
        let on_sample = self.sample_handler();
        self.generator
            .start(on_sample, self.period)
            .context("Failed to start sample generator")?;
        Ok(())
    }

    /// Switch sample generation off. In-flight analysis and live messages
    /// run their course.
    pub fn pause(&mut self) {
        self.generator.stop();
    }

    /// Flip generation on/off; returns whether it is now running.
    pub fn toggle(&mut self) -> Result<bool> {
        if self.generator.is_running() {
            self.pause();
            Ok(false)
        } else {
            self.start()?;
            Ok(true)
        }
    }

    pub fn is_running(&self) -> bool {
        self.generator.is_running()
    }

    /// Swap in new thresholds and timing.
    ///
    /// When the analyzer section changed, an analysis in flight under the
    /// old thresholds is cancelled and emits nothing. A changed interval
    /// restarts a running generator.
    pub fn apply_config(&mut self, config: &PipelineConfig) -> Result<(), ConfigError> {
        config.validate()?;

        if **self.analyzer_config.load() != config.analyzer {
            self.analyzer_config.store(Arc::new(config.analyzer.clone()));
            if self.analyzer.is_analyzing() {
                info!("Analyzer reconfigured, dropping in-flight analysis");
            }
            self.analyzer.cancel();
        }

        let period = config.generator.interval();
        if period != self.period {
            info!(
                old_ms = self.period.as_millis() as u64,
                new_ms = period.as_millis() as u64,
                "Generation interval changed"
            );
            self.period = period;
            if self.generator.is_running() {
                let on_sample = self.sample_handler();
                // Period already validated non-zero
                if let Err(e) = self.generator.start(on_sample, self.period) {
                    warn!(error = %e, "Failed to restart generator with new interval");
                }
            }
        }
        Ok(())
    }

    /// Stop generation, cancel any analysis, and clear live feedback.
    /// Safe to call any number of times.
    pub fn shutdown(&mut self) {
        self.generator.stop();
        self.analyzer.cancel();
        self.feedback.clear();
        debug!("Pipeline shut down");
    }

    // ========================================================================
    // Observation
    // ========================================================================

    pub fn snapshot(&self) -> Vec<FeedbackMessage> {
        self.feedback.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<FeedbackMessage>> {
        self.feedback.subscribe()
    }

    pub fn stats(&self) -> PipelineStats {
        *lock(&self.stats)
    }

    pub fn analyzer_config(&self) -> Arc<AnalyzerConfig> {
        self.analyzer_config.load_full()
    }

    // ========================================================================
    // Event Loop
    // ========================================================================

    /// Run until `cancel` fires, applying config reloads as they arrive.
    ///
    /// Shuts the pipeline down before returning final statistics.
    pub async fn run(
        &mut self,
        cancel: CancellationToken,
        mut config_events: Option<mpsc::Receiver<ConfigEvent>>,
    ) -> PipelineStats {
        let mut stats_log = tokio::time::interval(Duration::from_secs(STATS_LOG_INTERVAL_SECS));
        // Skip the immediate first tick
        stats_log.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
                event = next_event(&mut config_events) => match event {
                    Some(ConfigEvent::Reloaded(changes)) if !changes.is_empty() => {
                        info!(changed = changes.len(), "Applying reloaded config");
                        if let Err(e) = self.apply_config(&config::get()) {
                            warn!(error = %e, "Reloaded config rejected, keeping previous");
                        }
                    }
                    Some(ConfigEvent::Reloaded(_)) => {
                        debug!("Config file touched, no value changed");
                    }
                    Some(ConfigEvent::Error(e)) => {
                        warn!(error = %e, "Config reload failed, keeping previous");
                    }
                    None => {
                        debug!("Config watcher ended");
                        config_events = None;
                    }
                },
                _ = stats_log.tick() => {
                    let stats = self.stats();
                    info!(
                        acceptance_pct = stats.acceptance_rate(),
                        live = self.feedback.len(),
                        "{stats}"
                    );
                }
            }
        }

        self.shutdown();
        self.stats()
    }

    /// Per-sample callback handed to the generator.
    fn sample_handler(&self) -> impl FnMut(QualitySample) + Send + 'static {
        let analyzer = Arc::clone(&self.analyzer);
        let feedback = Arc::clone(&self.feedback);
        let analyzer_config = Arc::clone(&self.analyzer_config);
        let stats = Arc::clone(&self.stats);

        move |sample: QualitySample| {
            lock(&stats).samples_generated += 1;

            let on_result = {
                let feedback = Arc::clone(&feedback);
                let stats = Arc::clone(&stats);
                move |message: FeedbackMessage| {
                    lock(&stats).record_message(message.severity);
                    if let Err(e) = feedback.post(message) {
                        warn!(error = %e, "Failed to post feedback");
                    }
                }
            };

            let outcome = analyzer.submit(sample, &analyzer_config.load(), on_result);
            let mut stats = lock(&stats);
            match outcome {
                Ok(SubmitOutcome::Accepted) => stats.samples_accepted += 1,
                Ok(SubmitOutcome::Busy) => stats.samples_dropped_busy += 1,
                Ok(SubmitOutcome::Duplicate) => stats.samples_duplicate += 1,
                Err(e) => {
                    stats.samples_rejected += 1;
                    warn!(error = %e, "Sample rejected by analyzer");
                }
            }
        }
    }
}

impl<F: SampleFactory> Drop for Orchestrator<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Next config event, or never when there is no watcher.
fn next_event(
    rx: &mut Option<mpsc::Receiver<ConfigEvent>>,
) -> impl Future<Output = Option<ConfigEvent>> + '_ {
    async move {
        match rx {
            Some(rx) => rx.recv().await,
            None => std::future::pending().await,
        }
    }
}

fn lock(stats: &Mutex<PipelineStats>) -> MutexGuard<'_, PipelineStats> {
    stats.lock().unwrap_or_else(PoisonError::into_inner)
}
