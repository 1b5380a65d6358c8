//! The unit of work a [`Pipeline`](super::Pipeline) runs.

use async_trait::async_trait;

use super::errors::StepResult;
use super::types::{Context, JobState, StepOutcome};
use crate::models::JobStatus;

/// One stage of a mix job.
///
/// For each step the runner advances the job to [`phase`](Self::phase),
/// then calls `validate_input`, `execute` and, unless the step reported
/// [`StepOutcome::Skipped`], `validate_output`. Any error stops the job.
///
/// Steps read earlier results from [`JobState`] and record their own there;
/// every file they create must come from `state.workspace` so the job can
/// remove it.
#[async_trait]
pub trait PipelineStep: Send + Sync {
    /// Name used in logs, progress and failure context.
    fn name(&self) -> &str;

    fn phase(&self) -> JobStatus;

    /// Preconditions, checked before any engine work.
    fn validate_input(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
        Ok(())
    }

    async fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome>;

    /// Postconditions on what `execute` recorded.
    fn validate_output(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
        Ok(())
    }

    /// Shown in the "Starting ..." progress message.
    fn description(&self) -> &str {
        self.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl PipelineStep for Noop {
        fn name(&self) -> &str {
            "Noop"
        }

        fn phase(&self) -> JobStatus {
            JobStatus::Transforming
        }

        async fn execute(&self, _ctx: &Context, _state: &mut JobState) -> StepResult<StepOutcome> {
            Ok(StepOutcome::Skipped("nothing to do".to_string()))
        }
    }

    #[test]
    fn boxed_step_uses_defaults() {
        let step: Box<dyn PipelineStep> = Box::new(Noop);
        assert_eq!(step.name(), "Noop");
        assert_eq!(step.description(), "Noop");
        assert_eq!(step.phase(), JobStatus::Transforming);
    }
}
