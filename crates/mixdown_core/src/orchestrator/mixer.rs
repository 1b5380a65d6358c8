//! Job runner for mix requests.
//!
//! The `Mixer` takes a pair of inputs, runs them through the standard
//! pipeline inside a fresh job workspace, and turns the outcome into a
//! [`JobSummary`] plus, on success, the [`ResultArtifact`] guard.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::Settings;
use crate::engine::{FfmpegEngine, MediaEngine};
use crate::logging::{prune_job_logs, JobLogger, LogConfig, LogSink};
use crate::models::{validate_gain_factor, AudioStream, InputRole, JobSummary, MixOptions};
use crate::store::{
    ArtifactStore, InputStream, JobWorkspace, ResultArtifact, StoreError, WorkspaceConfig,
};

use super::errors::{PipelineError, PipelineResult};
use super::pipeline::CancelHandle;
use super::types::{Context, JobState, ProgressCallback};
use super::create_standard_pipeline;

/// The two inputs of a job.
#[derive(Debug)]
pub enum MixInputs {
    /// Local files. They are read but never deleted.
    Files { primary: PathBuf, secondary: PathBuf },
    /// Byte-streams staged into the uploads folder for the job's lifetime.
    Uploads(Vec<InputStream>),
}

/// One mix request with its optional side channels.
pub struct MixRequest {
    pub inputs: MixInputs,
    pub options: MixOptions,
    cancel: Option<CancelHandle>,
    progress: Option<ProgressCallback>,
    log_sink: Option<LogSink>,
}

impl MixRequest {
    pub fn new(inputs: MixInputs, options: MixOptions) -> Self {
        Self {
            inputs,
            options,
            cancel: None,
            progress: None,
            log_sink: None,
        }
    }

    pub fn files(
        primary: impl Into<PathBuf>,
        secondary: impl Into<PathBuf>,
        options: MixOptions,
    ) -> Self {
        Self::new(
            MixInputs::Files {
                primary: primary.into(),
                secondary: secondary.into(),
            },
            options,
        )
    }

    pub fn uploads(uploads: Vec<InputStream>, options: MixOptions) -> Self {
        Self::new(MixInputs::Uploads(uploads), options)
    }

    /// Stop the job at the next step boundary when `handle` is cancelled.
    pub fn with_cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancel = Some(handle);
        self
    }

    /// Receive `(step, percent, message)` updates.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Receive every job log line.
    pub fn with_log_sink(mut self, sink: LogSink) -> Self {
        self.log_sink = Some(sink);
        self
    }
}

/// What a finished job hands back.
#[derive(Debug)]
pub struct MixOutcome {
    /// Structured record for the caller.
    pub summary: JobSummary,
    /// The mixed output (successful jobs only).
    pub result: Option<ResultArtifact>,
}

impl MixOutcome {
    fn failed(summary: JobSummary) -> Self {
        Self {
            summary,
            result: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.summary.is_success()
    }
}

/// Runs mix jobs.
///
/// Cheap to clone; clones share the engine and the artifact store. Every
/// job gets its own UUID, workspace and log file, so any number of jobs
/// may run at once.
///
/// # Example
///
/// ```ignore
/// let mixer = Mixer::from_settings(settings);
/// let outcome = mixer.mix_files("voice.mp3", "music.mp3", MixOptions::new()).await;
/// if let Some(result) = outcome.result {
///     result.copy_to(Path::new("mixed.aac")).await?;
///     result.confirm_delivery();
/// }
/// ```
#[derive(Clone)]
pub struct Mixer {
    settings: Settings,
    engine: Arc<dyn MediaEngine>,
    store: ArtifactStore,
}

impl Mixer {
    /// Create a mixer with an explicit engine and store.
    pub fn new(settings: Settings, engine: Arc<dyn MediaEngine>, store: ArtifactStore) -> Self {
        Self {
            settings,
            engine,
            store,
        }
    }

    /// Create a mixer driving FFmpeg, with storage laid out per `settings.paths`.
    pub fn from_settings(settings: Settings) -> Self {
        let engine = FfmpegEngine::from_settings(&settings.engine)
            .with_arg_logging(settings.logging.show_engine_args);
        let store = ArtifactStore::new(WorkspaceConfig::from_settings(&settings));
        Self::new(settings, Arc::new(engine), store)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Mix two local files.
    pub async fn mix_files(
        &self,
        primary: impl Into<PathBuf>,
        secondary: impl Into<PathBuf>,
        options: MixOptions,
    ) -> MixOutcome {
        self.run(MixRequest::files(primary, secondary, options)).await
    }

    /// Mix two uploaded byte-streams.
    pub async fn mix_uploads(&self, uploads: Vec<InputStream>, options: MixOptions) -> MixOutcome {
        self.run(MixRequest::uploads(uploads, options)).await
    }

    /// Run a job as an independent task.
    pub fn spawn(&self, request: MixRequest) -> JoinHandle<MixOutcome> {
        let mixer = self.clone();
        tokio::spawn(async move { mixer.run(request).await })
    }

    /// Run one job to completion.
    ///
    /// Never returns an error: failures are reported in the summary, and
    /// every file the job created has been removed by the time this returns.
    pub async fn run(&self, request: MixRequest) -> MixOutcome {
        let job_id = Uuid::new_v4().to_string();
        let MixRequest {
            inputs,
            options,
            cancel,
            progress,
            log_sink,
        } = request;

        let logger = match JobLogger::new(
            &job_id,
            self.settings.paths.logs_dir(),
            LogConfig::from(&self.settings.logging),
            log_sink,
        ) {
            Ok(l) => Arc::new(l),
            Err(e) => {
                let err = PipelineError::setup_failed(
                    &job_id,
                    format!("Failed to create logger: {}", e),
                );
                tracing::error!("{}", err);
                return MixOutcome::failed(failure_summary(&job_id, &err));
            }
        };

        logger.info(&format!("Starting job: {}", job_id));
        tracing::info!(job = %job_id, "mix job started");

        let outcome = match self
            .run_job(&job_id, &logger, inputs, options, cancel, progress)
            .await
        {
            Ok(outcome) => {
                logger.success(&format!(
                    "Job finished: {}",
                    outcome
                        .summary
                        .download_reference
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default()
                ));
                outcome
            }
            Err(e) => {
                logger.error(&e.to_string());
                tracing::warn!(
                    job = %job_id,
                    kind = %e.kind(),
                    "mix job failed: {}",
                    e.user_message()
                );
                MixOutcome::failed(failure_summary(&job_id, &e))
            }
        };

        logger.flush();
        self.prune_logs();
        outcome
    }

    fn prune_logs(&self) {
        let dir = self.settings.paths.logs_dir();
        match prune_job_logs(&dir, self.settings.cleanup.max_job_logs) {
            Ok(0) => {}
            Ok(n) => tracing::debug!("Removed {} old job logs from {}", n, dir.display()),
            Err(e) => tracing::warn!("Could not prune job logs in {}: {}", dir.display(), e),
        }
    }

    async fn run_job(
        &self,
        job_id: &str,
        logger: &Arc<JobLogger>,
        inputs: MixInputs,
        options: MixOptions,
        cancel: Option<CancelHandle>,
        progress: Option<ProgressCallback>,
    ) -> PipelineResult<MixOutcome> {
        let gain = options.gain_factor.unwrap_or(self.settings.mix.gain_factor);
        validate_gain_factor(gain).map_err(|m| PipelineError::validation_failed(job_id, m))?;

        if let MixInputs::Uploads(ref uploads) = inputs {
            if uploads.len() != 2 {
                return Err(PipelineError::ingest_failed(
                    job_id,
                    StoreError::InputCount(uploads.len()),
                ));
            }
        }

        let mut workspace = self
            .store
            .open_job(job_id)
            .map_err(|e| PipelineError::setup_failed(job_id, e.to_string()))?;

        let (primary, secondary) = match inputs {
            MixInputs::Files { primary, secondary } => {
                (AudioStream::source(primary), AudioStream::source(secondary))
            }
            MixInputs::Uploads(uploads) => self.stage_uploads(&mut workspace, uploads).await?,
        };

        logger.info(&format!("Primary: {}", primary.path().display()));
        logger.info(&format!("Secondary: {}", secondary.path().display()));

        let mut ctx = Context::new(
            job_id,
            self.settings.clone(),
            &options,
            Arc::clone(&self.engine),
            Arc::clone(logger),
        );
        if let Some(callback) = progress {
            ctx = ctx.with_progress_callback(callback);
        }

        let mut pipeline = create_standard_pipeline();
        if let Some(handle) = cancel {
            pipeline = pipeline.with_cancel_handle(handle);
        }

        let mut state = JobState::new(workspace, primary, secondary);
        let run = pipeline.run(&ctx, &mut state).await?;

        let JobState {
            workspace, mixed, ..
        } = state;
        let mixed = mixed.ok_or_else(|| {
            PipelineError::setup_failed(job_id, "pipeline finished without an output")
        })?;

        let result = workspace.into_result(mixed.path());
        let mut summary = JobSummary::done(job_id, result.path().to_path_buf());
        summary.output_duration_secs = mixed.duration_secs();
        summary.steps_completed = run.steps_completed;
        summary.steps_skipped = run.steps_skipped;

        Ok(MixOutcome {
            summary,
            result: Some(result),
        })
    }

    /// Stage both uploads into the store under the job's name.
    async fn stage_uploads(
        &self,
        workspace: &mut JobWorkspace,
        uploads: Vec<InputStream>,
    ) -> PipelineResult<(AudioStream, AudioStream)> {
        let job_id = workspace.job_id().to_string();
        let [first, second]: [InputStream; 2] = uploads.try_into().map_err(|v: Vec<InputStream>| {
            PipelineError::ingest_failed(&job_id, StoreError::InputCount(v.len()))
        })?;

        let primary = self
            .store
            .ingest(workspace, InputRole::Primary, first)
            .await
            .map_err(|e| PipelineError::ingest_failed(&job_id, e))?;
        let secondary = self
            .store
            .ingest(workspace, InputRole::Secondary, second)
            .await
            .map_err(|e| PipelineError::ingest_failed(&job_id, e))?;

        Ok((primary, secondary))
    }
}

fn failure_summary(job_id: &str, err: &PipelineError) -> JobSummary {
    let mut summary = JobSummary::failed(job_id, err.kind(), err.user_message());
    summary.failed_step = err.step_name().map(str::to_string);
    summary
}
