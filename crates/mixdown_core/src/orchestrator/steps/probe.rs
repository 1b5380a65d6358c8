//! Probe step - reads the duration of both inputs and picks the background.

use async_trait::async_trait;

use crate::models::{AudioStream, InputRole, JobStatus, ProbeInfo};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};

use super::DURATION_TOLERANCE_SECS;

/// Probes both inputs concurrently.
///
/// Either probe failing fails the job with `ProbeError` before any
/// transform runs. The shorter input becomes the background; on a tie
/// the secondary input does.
pub struct ProbeStep;

impl ProbeStep {
    pub fn new() -> Self {
        Self
    }

    /// Attach `info` to `stream`, keeping an earlier probe if there was one.
    fn record(ctx: &Context, role: InputRole, stream: &AudioStream, info: ProbeInfo) -> f64 {
        let fresh = info.duration_secs;
        let kept = stream.record_probe(info);
        if (kept.duration_secs - fresh).abs() > DURATION_TOLERANCE_SECS {
            ctx.logger.warn(&format!(
                "{} input re-probed as {:.3}s, keeping {:.3}s",
                role, fresh, kept.duration_secs
            ));
        }
        ctx.logger.info(&format!(
            "{} input: {:.3}s, format {}, codec {}",
            role,
            kept.duration_secs,
            kept.format,
            kept.codec.as_deref().unwrap_or("unknown")
        ));
        kept.duration_secs
    }
}

impl Default for ProbeStep {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the background role from the two input durations.
pub fn background_role(primary_secs: f64, secondary_secs: f64) -> InputRole {
    if primary_secs < secondary_secs {
        InputRole::Primary
    } else {
        InputRole::Secondary
    }
}

#[async_trait]
impl PipelineStep for ProbeStep {
    fn name(&self) -> &str {
        "Probe"
    }

    fn phase(&self) -> JobStatus {
        JobStatus::Probing
    }

    fn description(&self) -> &str {
        "Read the duration of both inputs"
    }

    fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        for role in [InputRole::Primary, InputRole::Secondary] {
            let path = state.input(role).path();
            if !path.is_file() {
                return Err(StepError::invalid_input(format!(
                    "{} input not found: {}",
                    role,
                    path.display()
                )));
            }
        }
        Ok(())
    }

    async fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let engine = ctx.engine.as_ref();
        let log = ctx.logger.as_ref();
        let primary_path = state.primary.path().to_path_buf();
        let secondary_path = state.secondary.path().to_path_buf();

        let (primary_info, secondary_info) = tokio::try_join!(
            async {
                engine
                    .probe(&primary_path, log)
                    .await
                    .map_err(|e| StepError::probe_failed(InputRole::Primary, e))
            },
            async {
                engine
                    .probe(&secondary_path, log)
                    .await
                    .map_err(|e| StepError::probe_failed(InputRole::Secondary, e))
            },
        )?;

        let primary_secs = Self::record(ctx, InputRole::Primary, &state.primary, primary_info);
        let secondary_secs =
            Self::record(ctx, InputRole::Secondary, &state.secondary, secondary_info);

        let background = background_role(primary_secs, secondary_secs);
        ctx.logger.info(&format!(
            "Background: {} input ({:.3}s), foreground: {} input",
            background,
            primary_secs.min(secondary_secs),
            background.other()
        ));
        state.background = Some(background);

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        if state.primary.duration_secs().is_none() || state.secondary.duration_secs().is_none() {
            return Err(StepError::invalid_output("input durations not recorded"));
        }
        if state.background.is_none() {
            return Err(StepError::invalid_output("background input not chosen"));
        }
        Ok(())
    }
}
