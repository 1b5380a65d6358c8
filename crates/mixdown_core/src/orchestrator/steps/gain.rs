//! Gain step - attenuates the background input.

use async_trait::async_trait;

use crate::engine::args::INTERMEDIATE_CODEC;
use crate::models::{validate_gain_factor, AudioStream, JobStatus, ProbeInfo};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};

/// Applies the job's gain factor to the background input, once.
///
/// A factor of exactly 1.0 changes nothing, so the step is skipped and no
/// artifact is produced.
pub struct GainStep;

impl GainStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GainStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStep for GainStep {
    fn name(&self) -> &str {
        "Gain"
    }

    fn phase(&self) -> JobStatus {
        JobStatus::Transforming
    }

    fn description(&self) -> &str {
        "Attenuate the background input"
    }

    fn validate_input(&self, ctx: &Context, state: &JobState) -> StepResult<()> {
        validate_gain_factor(ctx.gain_factor).map_err(StepError::invalid_input)?;
        if state.background.is_none() {
            return Err(StepError::precondition_failed("inputs have not been probed"));
        }
        if state.gained.is_some() {
            return Err(StepError::precondition_failed("gain already applied"));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let factor = ctx.gain_factor;
        if factor == 1.0 {
            return Ok(StepOutcome::Skipped("unity gain".to_string()));
        }

        let (input_path, duration_secs) = {
            let input = state
                .background_stream()
                .ok_or_else(|| StepError::precondition_failed("no background input"))?;
            (input.path().to_path_buf(), input.duration_secs())
        };

        let output = state.workspace.allocate("gain", "wav");
        ctx.logger.info(&format!(
            "Applying gain {} to {}",
            factor,
            input_path.display()
        ));

        ctx.engine
            .apply_gain(&input_path, factor, &output, &ctx.logger)
            .await
            .map_err(|e| StepError::engine("Gain", e))?;

        let mut stream = AudioStream::artifact(&output);
        if let Some(duration_secs) = duration_secs {
            stream = stream.with_probe(ProbeInfo {
                duration_secs,
                format: "wav".to_string(),
                codec: Some(INTERMEDIATE_CODEC.to_string()),
            });
        }
        state.gained = Some(stream);

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let gained = state
            .gained
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("gain result not recorded"))?;
        super::require_non_empty(gained.path())
    }
}
