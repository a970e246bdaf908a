//! quality-watch: real-time image quality feedback
//!
//! A periodic sample source feeds a single-flight analyzer whose results
//! become time-boxed feedback messages.
//!
//! ## Architecture
//!
//! - **Generator**: one sample immediately, then one per period
//! - **Analyzer**: one analysis at a time, threshold classification,
//!   at least 500ms latency
//! - **Feedback**: live message set with an independent expiry timer per
//!   message
//! - **Pipeline**: wires the three together and applies config reloads

pub mod config;
pub mod types;
pub mod analyzer;
pub mod generator;
pub mod feedback;
pub mod pipeline;

// Re-export configuration
pub use config::{AnalyzerConfig, ConfigError, GeneratorConfig, PipelineConfig};

// Re-export commonly used types
pub use types::{FeedbackMessage, MessageId, QualityMetrics, QualitySample, SampleId, Severity};

// Re-export components
pub use analyzer::{Analyzer, AnalyzerError, SubmitOutcome};
pub use feedback::{FeedbackError, FeedbackLifecycleManager, PostOutcome};
pub use generator::{GeneratorError, GeneratorHandle, SampleFactory, SampleGenerator, SyntheticQuality};
pub use pipeline::{Orchestrator, PipelineStats};
