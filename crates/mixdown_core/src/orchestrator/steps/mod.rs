//! Pipeline step implementations.
//!
//! Each step handles one stage of the mix pipeline.

mod gain;
mod loop_to_length;
mod mix;
mod probe;

use std::path::Path;

use crate::orchestrator::errors::{StepError, StepResult};

pub use gain::GainStep;
pub use loop_to_length::{LoopPlan, LoopToLengthStep};
pub use mix::MixStep;
pub use probe::{background_role, ProbeStep};

/// Largest accepted difference between a produced and an expected duration.
///
/// Intermediates are PCM, so trimming is sample-accurate; 50 ms also covers
/// one compressed-audio frame at any common sample rate.
pub const DURATION_TOLERANCE_SECS: f64 = 0.05;

/// Check that a step produced a non-empty file.
fn require_non_empty(path: &Path) -> StepResult<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(StepError::invalid_output(format!(
            "{} is empty",
            path.display()
        ))),
        Err(_) => Err(StepError::invalid_output(format!(
            "{} was not created",
            path.display()
        ))),
    }
}
