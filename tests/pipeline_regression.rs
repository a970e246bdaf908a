//! Pipeline Regression Tests
//!
//! Drives the full generator -> analyzer -> feedback pipeline on a paused
//! clock and asserts on throughput, single-flight dropping, expiry, and
//! config reload handling.

use quality_watch::config::watcher::ConfigEvent;
use quality_watch::config::{self, ConfigChange, ConfigSource, PipelineConfig};
use quality_watch::{Orchestrator, QualityMetrics, QualitySample, SampleFactory, Severity};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Same metrics every tick, fresh id each time.
struct Fixed(QualityMetrics);

impl SampleFactory for Fixed {
    fn next_sample(&mut self) -> QualitySample {
        QualitySample::new(self.0)
    }

    fn source_name(&self) -> &str {
        "fixed"
    }
}

fn good() -> QualityMetrics {
    QualityMetrics {
        sharpness: 80,
        brightness: 50,
        noise: 20,
        contrast: 60,
        saturation: 50,
    }
}

fn severity_matches_text(severity: Severity, text: &str) -> bool {
    match severity {
        Severity::Success => text == "Good image quality",
        Severity::Error => text.contains("too blurry"),
        Severity::Warning => {
            !text.contains("too blurry")
                && ["too dark", "too bright", "too noisy", "low contrast"]
                    .iter()
                    .any(|p| text.contains(p))
        }
        Severity::Info => {
            text.contains("saturated") && !text.contains("too ") && !text.contains("low contrast")
        }
    }
}

#[tokio::test(start_paused = true)]
async fn seeded_ten_second_run() {
    let mut config = PipelineConfig::default();
    config.generator.seed = Some(2024);
    let mut orchestrator = Orchestrator::synthetic(&config).unwrap();

    let mut live = orchestrator.subscribe();
    let observer = tokio::spawn(async move {
        let mut max_live = 0;
        let mut seen = HashSet::new();
        while live.changed().await.is_ok() {
            let snapshot = live.borrow_and_update().clone();
            max_live = max_live.max(snapshot.len());
            for message in snapshot {
                assert!(
                    severity_matches_text(message.severity, &message.text),
                    "{} does not fit {:?}",
                    message.text,
                    message.severity
                );
                assert_eq!(message.duration_ms, 2000);
                seen.insert(message.id);
            }
        }
        (max_live, seen.len())
    });

    orchestrator.start().unwrap();
    // Ticks every 200ms through t=10000; analyses accepted at 0, 600, ..,
    // 9600 and completed 500ms later
    sleep(Duration::from_millis(10_050)).await;

    let stats = orchestrator.stats();
    assert_eq!(stats.samples_generated, 51);
    assert_eq!(stats.samples_accepted, 17);
    assert_eq!(stats.samples_dropped_busy, 34);
    assert_eq!(stats.samples_rejected, 0);
    assert_eq!(stats.messages_emitted(), 16);

    drop(orchestrator);
    let (max_live, distinct) = observer.await.unwrap();

    // One message every 600ms, each live for 2000ms
    assert_eq!(max_live, 4);
    assert_eq!(distinct as u64, stats.messages_emitted());
}

#[tokio::test(start_paused = true)]
async fn slow_analysis_drops_more_samples() {
    let mut config = PipelineConfig::default();
    config.analyzer.analysis_delay_ms = 1000;
    let mut orchestrator = Orchestrator::with_factory(Fixed(good()), &config).unwrap();

    orchestrator.start().unwrap();
    // First analysis completes at t=1000, the same instant as a tick, so the
    // second is accepted at 1000 or 1200. Either way it is still in flight.
    sleep(Duration::from_millis(1_950)).await;

    let stats = orchestrator.stats();
    assert_eq!(stats.samples_generated, 10);
    assert_eq!(stats.samples_accepted, 2);
    assert_eq!(stats.success_messages, 1);
    assert_eq!(
        stats.samples_accepted + stats.samples_dropped_busy,
        stats.samples_generated
    );
}

#[tokio::test(start_paused = true)]
async fn reload_cancels_in_flight_and_applies_new_thresholds() {
    let mut stricter = PipelineConfig::default();
    stricter.analyzer.sharpness_threshold = 90;
    config::init(stricter, ConfigSource::Defaults);

    let mut orchestrator =
        Orchestrator::with_factory(Fixed(good()), &PipelineConfig::default()).unwrap();
    orchestrator.start().unwrap();

    let (tx, rx) = mpsc::channel(4);
    let cancel = CancellationToken::new();
    let driver = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            tx.send(ConfigEvent::Reloaded(vec![ConfigChange {
                key: "analyzer.sharpness_threshold".to_string(),
                old: "60".to_string(),
                new: "90".to_string(),
            }]))
            .await
            .unwrap();
            sleep(Duration::from_millis(700)).await;
            cancel.cancel();
        })
    };

    let stats = orchestrator.run(cancel, Some(rx)).await;
    driver.await.unwrap();

    // t=0 analysis cancelled by the reload; t=200 analysis completes at 700
    assert_eq!(stats.success_messages, 0);
    assert_eq!(stats.error_messages, 1);
    assert_eq!(orchestrator.analyzer_config().sharpness_threshold, 90);
    assert!(orchestrator.snapshot().is_empty(), "shutdown clears the live set");
}

#[tokio::test(start_paused = true)]
async fn failed_reload_keeps_running_config() {
    let mut orchestrator =
        Orchestrator::with_factory(Fixed(good()), &PipelineConfig::default()).unwrap();
    orchestrator.start().unwrap();

    let (tx, rx) = mpsc::channel(4);
    let cancel = CancellationToken::new();
    let driver = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            tx.send(ConfigEvent::Error("bad toml".to_string()))
                .await
                .unwrap();
            sleep(Duration::from_millis(500)).await;
            cancel.cancel();
        })
    };

    let stats = orchestrator.run(cancel, Some(rx)).await;
    driver.await.unwrap();

    assert_eq!(stats.success_messages, 1);
    assert_eq!(orchestrator.analyzer_config().sharpness_threshold, 60);
}
