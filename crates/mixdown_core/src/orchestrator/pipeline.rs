//! Sequential step runner.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::errors::{PipelineError, PipelineResult, StepError};
use super::step::PipelineStep;
use super::types::{Context, JobState, StepOutcome};
use crate::models::JobStatus;

/// Shared flag that stops a job at its next step boundary.
///
/// Clones observe the same flag, so one can be handed to a signal
/// handler or a progress callback while another sits in the pipeline.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Names of the steps that ran, split by outcome.
#[derive(Debug, Clone, Default)]
pub struct PipelineRunResult {
    pub steps_completed: Vec<String>,
    pub steps_skipped: Vec<String>,
}

/// Ordered list of steps run against one [`JobState`].
///
/// The job's status follows each step's phase and ends at `Done`, or at
/// `Failed` on the first error. Files are not removed here; that is the
/// job workspace's job when it drops.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
    cancel: CancelHandle,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(mut self, step: impl PipelineStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Stop when `handle` is cancelled instead of using a private flag.
    pub fn with_cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancel = handle;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step in order.
    pub async fn run(
        &self,
        ctx: &Context,
        state: &mut JobState,
    ) -> PipelineResult<PipelineRunResult> {
        let outcome = self.run_steps(ctx, state).await;
        if outcome.is_err() {
            // Failed is reachable from every non-terminal status.
            let _ = state.advance(JobStatus::Failed);
        }
        outcome
    }

    async fn run_steps(
        &self,
        ctx: &Context,
        state: &mut JobState,
    ) -> PipelineResult<PipelineRunResult> {
        let mut run = PipelineRunResult::default();
        let total = self.steps.len().max(1);

        for (index, step) in self.steps.iter().enumerate() {
            let name = step.name();
            if self.cancel.is_cancelled() {
                ctx.logger.warn(&format!("Cancelled before {}", name));
                return Err(PipelineError::cancelled(&ctx.job_id));
            }

            let percent = (index * 100 / total) as u32;
            let outcome = self
                .run_step(step.as_ref(), percent, ctx, state)
                .await
                .map_err(|e| {
                    ctx.logger.error(&e.to_string());
                    PipelineError::step_failed(&ctx.job_id, name, e)
                })?;

            match outcome {
                StepOutcome::Success => {
                    ctx.logger.success(&format!("{} done", name));
                    run.steps_completed.push(name.to_string());
                }
                StepOutcome::Skipped(reason) => {
                    ctx.logger.info(&format!("{} skipped: {}", name, reason));
                    run.steps_skipped.push(name.to_string());
                }
            }
        }

        state
            .advance(JobStatus::Done)
            .map_err(|e| PipelineError::step_failed(&ctx.job_id, "Finish", e))?;
        ctx.report_progress("Complete", 100, "Mix finished");
        ctx.logger.success("All steps finished");

        Ok(run)
    }

    async fn run_step(
        &self,
        step: &dyn PipelineStep,
        percent: u32,
        ctx: &Context,
        state: &mut JobState,
    ) -> Result<StepOutcome, StepError> {
        state.advance(step.phase())?;
        ctx.logger.phase(step.name());
        ctx.report_progress(step.name(), percent, &format!("Starting {}", step.description()));

        step.validate_input(ctx, state)?;
        let outcome = step.execute(ctx, state).await?;
        if outcome == StepOutcome::Success {
            step.validate_output(ctx, state)?;
        }
        Ok(outcome)
    }
}
