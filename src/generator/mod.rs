//! Periodic Sample Generator
//!
//! Delivers one sample immediately on start, then one per period until
//! stopped. Missed ticks are delayed rather than bursted, so a slow
//! consumer never receives a backlog.

pub mod synthetic;

pub use synthetic::{SampleFactory, SyntheticQuality};

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::types::QualitySample;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generation period must be greater than zero")]
    InvalidPeriod,

    #[error("generator requires a running tokio runtime")]
    NoRuntime,
}

/// Stop handle for one generator run.
///
/// Cloneable; stopping through any clone, or through the owning
/// [`SampleGenerator`], ends the run.
#[derive(Debug, Clone)]
pub struct GeneratorHandle {
    cancel: CancellationToken,
}

impl GeneratorHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

struct Run {
    handle: GeneratorHandle,
    task: JoinHandle<()>,
}

/// Owns the sample factory and at most one active production run.
pub struct SampleGenerator<F: SampleFactory = SyntheticQuality> {
    factory: Arc<Mutex<F>>,
    run: Option<Run>,
}

impl SampleGenerator<SyntheticQuality> {
    pub fn synthetic(seed: Option<u64>) -> Self {
        Self::new(SyntheticQuality::new(seed))
    }
}

impl<F: SampleFactory> SampleGenerator<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory: Arc::new(Mutex::new(factory)),
            run: None,
        }
    }

    /// Begin producing samples, stopping any previous run first.
    pub fn start<C>(&mut self, mut on_sample: C, period: Duration) -> Result<GeneratorHandle, GeneratorError>
    where
        C: FnMut(QualitySample) + Send + 'static,
    {
        if period.is_zero() {
            return Err(GeneratorError::InvalidPeriod);
        }
        let runtime = Handle::try_current().map_err(|_| GeneratorError::NoRuntime)?;

        self.stop();

        let handle = GeneratorHandle {
            cancel: CancellationToken::new(),
        };
        let cancel = handle.cancel.clone();
        let factory = Arc::clone(&self.factory);
        let source = factory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .source_name()
            .to_string();

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let sample = factory
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .next_sample();
                debug!(sample = %sample.id(), "Sample generated");
                on_sample(sample);
            }
        });

        info!(source = %source, period_ms = period.as_millis() as u64, "Sample generator started");
        self.run = Some(Run {
            handle: handle.clone(),
            task,
        });
        Ok(handle)
    }

    /// Halt production. No-op when already stopped.
    pub fn stop(&mut self) {
        if let Some(run) = self.run.take() {
            let was_running = !run.handle.is_stopped() && !run.task.is_finished();
            run.handle.stop();
            run.task.abort();
            if was_running {
                info!("Sample generator stopped");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|run| !run.handle.is_stopped() && !run.task.is_finished())
    }
}

impl<F: SampleFactory> Drop for SampleGenerator<F> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    fn channel_sink() -> (
        impl FnMut(QualitySample) + Send + 'static,
        mpsc::UnboundedReceiver<QualitySample>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            move |s| {
                let _ = tx.send(s);
            },
            rx,
        )
    }

    /// Let spawned tasks observe the current instant.
    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_sample_is_immediate() {
        let mut generator = SampleGenerator::synthetic(Some(3));
        let (sink, mut rx) = channel_sink();
        let start = Instant::now();

        generator.start(sink, Duration::from_millis(200)).unwrap();
        rx.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(generator.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn one_sample_per_period() {
        let mut generator = SampleGenerator::synthetic(Some(3));
        let (sink, mut rx) = channel_sink();

        generator.start(sink, Duration::from_millis(200)).unwrap();
        tokio::time::sleep(Duration::from_millis(1010)).await;
        settle().await;

        // t = 0, 200, 400, 600, 800, 1000
        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_delivery() {
        let mut generator = SampleGenerator::synthetic(None);
        let (sink, mut rx) = channel_sink();

        generator.start(sink, Duration::from_millis(100)).unwrap();
        rx.recv().await.unwrap();
        generator.stop();
        generator.stop();
        assert!(!generator.is_running());

        // Task aborted: the sink is dropped and nothing else arrives
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn handle_stop_ends_the_run() {
        let mut generator = SampleGenerator::synthetic(None);
        let (sink, mut rx) = channel_sink();

        let handle = generator.start(sink, Duration::from_millis(100)).unwrap();
        rx.recv().await.unwrap();
        handle.stop();
        assert!(handle.is_stopped());
        assert!(rx.recv().await.is_none());
        assert!(!generator.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_previous_run() {
        let mut generator = SampleGenerator::synthetic(None);
        let (first_sink, mut first_rx) = channel_sink();
        let (second_sink, mut second_rx) = channel_sink();

        let first = generator.start(first_sink, Duration::from_millis(100)).unwrap();
        first_rx.recv().await.unwrap();
        generator.start(second_sink, Duration::from_millis(100)).unwrap();

        assert!(first.is_stopped());
        assert!(first_rx.recv().await.is_none());
        assert!(second_rx.recv().await.is_some());
        assert!(generator.is_running());
    }

    #[tokio::test]
    async fn zero_period_is_rejected() {
        let mut generator = SampleGenerator::synthetic(None);
        let err = tokio_test::assert_err!(generator.start(|_| {}, Duration::ZERO));
        assert!(matches!(err, GeneratorError::InvalidPeriod));
        assert!(!generator.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn seeded_generators_agree_across_restarts() {
        let mut a = SampleGenerator::synthetic(Some(9));
        let mut b = SampleGenerator::synthetic(Some(9));
        let (sink_a, mut rx_a) = channel_sink();
        let (sink_b, mut rx_b) = channel_sink();

        a.start(sink_a, Duration::from_millis(50)).unwrap();
        b.start(sink_b, Duration::from_millis(50)).unwrap();
        for _ in 0..3 {
            let (sa, sb) = (rx_a.recv().await.unwrap(), rx_b.recv().await.unwrap());
            assert_eq!(sa.metrics(), sb.metrics());
        }
    }
}
