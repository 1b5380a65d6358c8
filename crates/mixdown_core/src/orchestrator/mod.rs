//! Running mix jobs.
//!
//! ```text
//! Mixer::run / Mixer::spawn        one job per request, id = UUID v4
//!   └── Pipeline
//!         ├── Probe          Probing
//!         ├── Gain           Transforming
//!         ├── LoopToLength   Transforming
//!         └── Mix            Mixing
//! ```
//!
//! Steps share a [`Context`] (settings, engine, logger, progress) and
//! record results in [`JobState`], whose workspace owns every file the
//! job creates. Custom step lists can be run directly:
//!
//! ```ignore
//! let pipeline = Pipeline::new()
//!     .with_step(ProbeStep::new())
//!     .with_step(MixStep::new());
//! let run = pipeline.run(&ctx, &mut state).await?;
//! ```

mod errors;
mod mixer;
mod pipeline;
mod step;
pub mod steps;
mod types;

pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use mixer::{MixInputs, MixOutcome, MixRequest, Mixer};
pub use pipeline::{CancelHandle, Pipeline, PipelineRunResult};
pub use step::PipelineStep;
pub use steps::{
    GainStep, LoopPlan, LoopToLengthStep, MixStep, ProbeStep, DURATION_TOLERANCE_SECS,
};
pub use types::{Context, JobState, ProgressCallback, StepOutcome};

/// Probe, attenuate and loop the background, then mix.
pub fn create_standard_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(ProbeStep::new())
        .with_step(GainStep::new())
        .with_step(LoopToLengthStep::new())
        .with_step(MixStep::new())
}
