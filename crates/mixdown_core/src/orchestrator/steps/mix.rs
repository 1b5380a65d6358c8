//! Mix step - combines the two streams and encodes the final output.

use async_trait::async_trait;

use crate::models::{AudioStream, JobStatus, ProbeInfo};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};

use super::DURATION_TOLERANCE_SECS;

/// Additively mixes input A and input B under the job's duration policy.
///
/// The output is written to the outputs folder with the configured
/// encoding. Its size is checked against `mix.max_output_bytes`.
pub struct MixStep;

impl MixStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MixStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStep for MixStep {
    fn name(&self) -> &str {
        "Mix"
    }

    fn phase(&self) -> JobStatus {
        JobStatus::Mixing
    }

    fn description(&self) -> &str {
        "Mix both streams into the encoded output"
    }

    fn validate_input(&self, ctx: &Context, state: &JobState) -> StepResult<()> {
        let (a, b) = state
            .mix_inputs()
            .ok_or_else(|| StepError::precondition_failed("inputs have not been probed"))?;
        if a.duration_secs().is_none() || b.duration_secs().is_none() {
            return Err(StepError::precondition_failed("mix input durations unknown"));
        }
        if ctx.settings.mix.output_codec.trim().is_empty() {
            return Err(StepError::invalid_input("no output codec configured"));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let (first, second, first_secs, second_secs) = {
            let (a, b) = state
                .mix_inputs()
                .ok_or_else(|| StepError::precondition_failed("no mix inputs"))?;
            (
                a.path().to_path_buf(),
                b.path().to_path_buf(),
                a.duration_secs().unwrap_or_default(),
                b.duration_secs().unwrap_or_default(),
            )
        };

        let policy = ctx.duration_policy;
        let encoding = ctx.encoding();
        let expected_secs = policy.expected_duration(first_secs, second_secs);
        let output = state
            .workspace
            .allocate_result(ctx.settings.mix.output_extension());

        ctx.logger.info(&format!(
            "Mixing {:.3}s + {:.3}s, duration={} ({} @ {}k), expecting {:.3}s",
            first_secs, second_secs, policy, encoding.codec, encoding.bitrate_kbps, expected_secs
        ));

        ctx.engine
            .mix(&first, &second, policy, &encoding, &output, &ctx.logger)
            .await
            .map_err(|e| StepError::engine("Mix", e))?;

        let size = tokio::fs::metadata(&output)
            .await
            .map_err(|e| StepError::io_error("reading mixed output", e))?
            .len();
        let limit = ctx.settings.mix.max_output_bytes;
        if limit > 0 && size > limit {
            return Err(StepError::resource_exhausted(format!(
                "mixed output is {} bytes, limit is {}",
                size, limit
            )));
        }

        // Encoded containers may report estimated lengths; mismatch only warns
        let info = match ctx.engine.probe(&output, &ctx.logger).await {
            Ok(info) => {
                if (info.duration_secs - expected_secs).abs() > DURATION_TOLERANCE_SECS {
                    ctx.logger.warn(&format!(
                        "mixed output reports {:.3}s, expected {:.3}s",
                        info.duration_secs, expected_secs
                    ));
                }
                info
            }
            Err(e) => {
                ctx.logger
                    .warn(&format!("could not probe mixed output: {}", e));
                ProbeInfo {
                    duration_secs: expected_secs,
                    format: ctx.settings.mix.output_extension().to_string(),
                    codec: Some(encoding.codec.clone()),
                }
            }
        };

        ctx.logger.info(&format!("Output: {} ({} bytes)", output.display(), size));
        state.mixed = Some(AudioStream::artifact(output).with_probe(info));
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let mixed = state
            .mixed
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("mixed output not recorded"))?;
        super::require_non_empty(mixed.path())
    }
}
