//! Shared data structures for the quality feedback pipeline
//!
//! - `QualitySample`: one generated measurement (generator -> analyzer)
//! - `FeedbackMessage`: one classification result (analyzer -> lifecycle manager)

mod sample;
mod feedback;

pub use sample::*;
pub use feedback::*;
