//! What steps share: the read-only [`Context`] and the per-job [`JobState`].

use std::sync::Arc;

use crate::config::Settings;
use crate::engine::{MediaEngine, OutputEncoding};
use crate::logging::JobLogger;
use crate::models::{AudioStream, DurationPolicy, InputRole, JobStatus, MixOptions};
use crate::store::JobWorkspace;

use super::errors::{StepError, StepResult};

/// Called with `(step, percent, message)` as a job moves through its steps.
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// Settings and services for one job, with request options already
/// resolved against the configured defaults.
pub struct Context {
    pub job_id: String,
    pub settings: Settings,
    /// Gain applied to the background input.
    pub gain_factor: f64,
    pub duration_policy: DurationPolicy,
    pub engine: Arc<dyn MediaEngine>,
    pub logger: Arc<JobLogger>,
    on_progress: Option<ProgressCallback>,
}

impl Context {
    /// Create a context, resolving per-request options against settings.
    pub fn new(
        job_id: impl Into<String>,
        settings: Settings,
        options: &MixOptions,
        engine: Arc<dyn MediaEngine>,
        logger: Arc<JobLogger>,
    ) -> Self {
        let gain_factor = options.gain_factor.unwrap_or(settings.mix.gain_factor);
        let duration_policy = options
            .duration_policy
            .unwrap_or(settings.mix.duration_policy);
        Self {
            job_id: job_id.into(),
            settings,
            gain_factor,
            duration_policy,
            engine,
            logger,
            on_progress: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Notify the callback, then record the percentage in the job log.
    pub fn report_progress(&self, step: &str, percent: u32, message: &str) {
        if let Some(notify) = &self.on_progress {
            notify(step, percent, message);
        }
        self.logger.progress(percent);
    }

    /// Declared encoding of the final output.
    pub fn encoding(&self) -> OutputEncoding {
        OutputEncoding::new(
            self.settings.mix.output_codec.trim(),
            self.settings.mix.output_bitrate_kbps,
        )
    }
}

/// Streams produced so far by one job.
///
/// Steps add new streams but never replace one written by an earlier
/// step. Every file a step creates is allocated through `workspace`.
#[derive(Debug)]
pub struct JobState {
    pub job_id: String,
    /// RFC 3339, local time.
    pub started_at: String,
    pub status: JobStatus,
    /// Files owned by the job.
    pub workspace: JobWorkspace,
    /// First input (mix input A).
    pub primary: AudioStream,
    /// Second input (mix input B).
    pub secondary: AudioStream,
    /// Role of the shorter input, decided after probing.
    pub background: Option<InputRole>,
    /// Background after gain.
    pub gained: Option<AudioStream>,
    /// Background after loop-to-length.
    pub looped: Option<AudioStream>,
    /// Final mixed output.
    pub mixed: Option<AudioStream>,
}

impl JobState {
    pub fn new(workspace: JobWorkspace, primary: AudioStream, secondary: AudioStream) -> Self {
        Self {
            job_id: workspace.job_id().to_string(),
            started_at: chrono::Local::now().to_rfc3339(),
            status: JobStatus::Pending,
            workspace,
            primary,
            secondary,
            background: None,
            gained: None,
            looped: None,
            mixed: None,
        }
    }

    /// Move to `next`, enforcing the job lifecycle.
    pub fn advance(&mut self, next: JobStatus) -> StepResult<()> {
        if !self.status.can_advance_to(next) {
            return Err(StepError::precondition_failed(format!(
                "illegal status transition {} -> {}",
                self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Original input in `role`.
    pub fn input(&self, role: InputRole) -> &AudioStream {
        match role {
            InputRole::Primary => &self.primary,
            InputRole::Secondary => &self.secondary,
        }
    }

    /// Most recent version of the background stream.
    pub fn background_stream(&self) -> Option<&AudioStream> {
        let role = self.background?;
        Some(
            self.looped
                .as_ref()
                .or(self.gained.as_ref())
                .unwrap_or_else(|| self.input(role)),
        )
    }

    /// The input that sets the target length.
    pub fn foreground_stream(&self) -> Option<&AudioStream> {
        self.background.map(|role| self.input(role.other()))
    }

    /// Mix inputs A and B in input order, with the background replaced by
    /// its adjusted version.
    pub fn mix_inputs(&self) -> Option<(&AudioStream, &AudioStream)> {
        let role = self.background?;
        let adjusted = self.background_stream()?;
        let other = self.input(role.other());
        Some(match role {
            InputRole::Primary => (adjusted, other),
            InputRole::Secondary => (other, adjusted),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    /// Nothing to do; carries the reason for the log.
    Skipped(String),
}
