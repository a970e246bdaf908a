//! Sample factories.
//!
//! `SyntheticQuality` stands in for a camera: every metric is drawn
//! uniformly from a fixed range, optionally from a fixed seed so a run
//! can be replayed exactly.

use rand::prelude::*;
use std::ops::RangeInclusive;

use crate::types::{QualityMetrics, QualitySample};

/// Produces one sample per generator tick.
pub trait SampleFactory: Send + 'static {
    fn next_sample(&mut self) -> QualitySample;

    /// Human-readable name for logging
    fn source_name(&self) -> &str;
}

// ============================================================================
// Synthetic metric ranges
// ============================================================================

pub const SHARPNESS_RANGE: RangeInclusive<u8> = 10..=100;
pub const BRIGHTNESS_RANGE: RangeInclusive<u8> = 20..=80;
pub const NOISE_RANGE: RangeInclusive<u8> = 0..=100;
pub const CONTRAST_RANGE: RangeInclusive<u8> = 20..=100;
pub const SATURATION_RANGE: RangeInclusive<u8> = 20..=80;

/// Uniform random metrics, one fresh sample id per call.
pub struct SyntheticQuality {
    rng: StdRng,
    produced: u64,
}

impl SyntheticQuality {
    /// `None` seeds from OS entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { rng, produced: 0 }
    }

    pub fn produced(&self) -> u64 {
        self.produced
    }

    fn draw(&mut self) -> QualityMetrics {
        QualityMetrics {
            sharpness: self.rng.gen_range(SHARPNESS_RANGE),
            brightness: self.rng.gen_range(BRIGHTNESS_RANGE),
            noise: self.rng.gen_range(NOISE_RANGE),
            contrast: self.rng.gen_range(CONTRAST_RANGE),
            saturation: self.rng.gen_range(SATURATION_RANGE),
        }
    }
}

impl Default for SyntheticQuality {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SampleFactory for SyntheticQuality {
    fn next_sample(&mut self) -> QualitySample {
        let metrics = self.draw();
        self.produced += 1;
        QualitySample::new(metrics).with_rendered(format!("synthetic-frame-{}", self.produced))
    }

    fn source_name(&self) -> &str {
        "synthetic"
    }
}
