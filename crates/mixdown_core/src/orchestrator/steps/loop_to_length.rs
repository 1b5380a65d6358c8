//! Loop-to-length step - repeats the background until it covers the
//! foreground, then trims it to exactly that length.

use async_trait::async_trait;

use crate::engine::args::{self, INTERMEDIATE_CODEC};
use crate::models::{AudioStream, JobStatus, ProbeInfo};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};

use super::DURATION_TOLERANCE_SECS;

/// How many copies of a clip cover a target duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopPlan {
    pub source_secs: f64,
    pub target_secs: f64,
    pub repeat_count: u32,
}

impl LoopPlan {
    /// `repeat_count = ceil(target / source)`.
    ///
    /// Rejects non-positive durations and a source longer than the target
    /// with `InvalidInput`, and counts above `max_repeat` with
    /// `ResourceExhausted`.
    pub fn new(source_secs: f64, target_secs: f64, max_repeat: u32) -> StepResult<Self> {
        if !source_secs.is_finite() || source_secs <= 0.0 {
            return Err(StepError::invalid_input(format!(
                "source duration must be positive, got {}",
                source_secs
            )));
        }
        if !target_secs.is_finite() || target_secs <= 0.0 {
            return Err(StepError::invalid_input(format!(
                "target duration must be positive, got {}",
                target_secs
            )));
        }
        if source_secs > target_secs {
            return Err(StepError::invalid_input(format!(
                "source ({:.3}s) is longer than target ({:.3}s)",
                source_secs, target_secs
            )));
        }

        let repeats = (target_secs / source_secs).ceil();
        if repeats > max_repeat as f64 {
            return Err(StepError::resource_exhausted(format!(
                "loop factor too large: {} repeats needed, limit is {}",
                repeats, max_repeat
            )));
        }

        Ok(Self {
            source_secs,
            target_secs,
            repeat_count: repeats as u32,
        })
    }

    /// Whether the clip has to be concatenated at all.
    pub fn needs_concat(&self) -> bool {
        self.repeat_count > 1
    }

    /// Length of the concatenated clip before trimming.
    pub fn concat_secs(&self) -> f64 {
        self.source_secs * self.repeat_count as f64
    }
}

/// Stretches the background to the foreground's duration.
///
/// Skipped when the background already covers the target.
pub struct LoopToLengthStep;

impl LoopToLengthStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoopToLengthStep {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineStep for LoopToLengthStep {
    fn name(&self) -> &str {
        "LoopToLength"
    }

    fn phase(&self) -> JobStatus {
        JobStatus::Transforming
    }

    fn description(&self) -> &str {
        "Repeat and trim the background to the foreground's length"
    }

    fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let background = state
            .background_stream()
            .ok_or_else(|| StepError::precondition_failed("inputs have not been probed"))?;
        if background.duration_secs().is_none() {
            return Err(StepError::precondition_failed("background duration unknown"));
        }
        if state
            .foreground_stream()
            .and_then(|s| s.duration_secs())
            .is_none()
        {
            return Err(StepError::precondition_failed("foreground duration unknown"));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let (source_path, source_secs) = {
            let bg = state
                .background_stream()
                .ok_or_else(|| StepError::precondition_failed("no background input"))?;
            (
                bg.path().to_path_buf(),
                bg.duration_secs().unwrap_or_default(),
            )
        };
        let target_secs = state
            .foreground_stream()
            .and_then(|s| s.duration_secs())
            .unwrap_or_default();

        if source_secs >= target_secs {
            return Ok(StepOutcome::Skipped(format!(
                "background ({:.3}s) already covers target ({:.3}s)",
                source_secs, target_secs
            )));
        }

        let plan = LoopPlan::new(
            source_secs,
            target_secs,
            ctx.settings.mix.max_loop_repeat_count,
        )?;
        ctx.logger.info(&format!(
            "Looping {:.3}s x{} = {:.3}s, trimming to {:.3}s",
            plan.source_secs,
            plan.repeat_count,
            plan.concat_secs(),
            plan.target_secs
        ));

        let trim_input = if plan.needs_concat() {
            ctx.logger.section("Concatenate");
            let list_body = args::concat_list(&source_path, plan.repeat_count);
            let list = state
                .workspace
                .write_artifact("concat-list", "txt", &list_body)
                .await?;
            let concat_out = state.workspace.allocate("concat", "wav");
            ctx.engine
                .concat(&list, &concat_out, &ctx.logger)
                .await
                .map_err(|e| StepError::engine("Concatenation", e))?;
            concat_out
        } else {
            source_path
        };

        ctx.logger.section("Trim");
        let trimmed = state.workspace.allocate("trim", "wav");
        ctx.engine
            .trim(&trim_input, plan.target_secs, &trimmed, &ctx.logger)
            .await
            .map_err(|e| StepError::engine("Trim", e))?;

        let info = if ctx.settings.mix.verify_durations {
            let info = ctx
                .engine
                .probe(&trimmed, &ctx.logger)
                .await
                .map_err(|e| StepError::engine("Loop verification probe", e))?;
            let drift = (info.duration_secs - plan.target_secs).abs();
            if drift > DURATION_TOLERANCE_SECS {
                return Err(StepError::invalid_output(format!(
                    "looped stream is {:.3}s, expected {:.3}s",
                    info.duration_secs, plan.target_secs
                )));
            }
            info
        } else {
            ProbeInfo {
                duration_secs: plan.target_secs,
                format: "wav".to_string(),
                codec: Some(INTERMEDIATE_CODEC.to_string()),
            }
        };

        state.looped = Some(AudioStream::artifact(trimmed).with_probe(info));
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let looped = state
            .looped
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("looped stream not recorded"))?;
        super::require_non_empty(looped.path())
    }
}
