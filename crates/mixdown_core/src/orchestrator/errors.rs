//! Job and step errors.
//!
//! A failure reads outward from the operation: engine or store error,
//! wrapped by the step that ran it, wrapped by the job. Every layer
//! reduces to an [`ErrorKind`] for the caller.

use std::io;

use thiserror::Error;

use crate::engine::EngineError;
use crate::models::{ErrorKind, InputRole};
use crate::store::StoreError;

/// Why a job did not produce a result.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("job {job_id}: step {step_name} failed: {source}")]
    StepFailed {
        job_id: String,
        step_name: String,
        #[source]
        source: StepError,
    },

    /// Rejected before any step ran.
    #[error("job {job_id}: rejected: {message}")]
    ValidationFailed { job_id: String, message: String },

    #[error("job {job_id}: staging inputs failed: {source}")]
    IngestFailed {
        job_id: String,
        #[source]
        source: StoreError,
    },

    #[error("job {job_id}: cancelled")]
    Cancelled { job_id: String },

    /// Workspace or job log could not be created, or the run ended
    /// without an output.
    #[error("job {job_id}: {message}")]
    SetupFailed { job_id: String, message: String },
}

impl PipelineError {
    pub fn step_failed(
        job_id: impl Into<String>,
        step_name: impl Into<String>,
        source: StepError,
    ) -> Self {
        Self::StepFailed {
            job_id: job_id.into(),
            step_name: step_name.into(),
            source,
        }
    }

    pub fn validation_failed(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    pub fn ingest_failed(job_id: impl Into<String>, source: StoreError) -> Self {
        Self::IngestFailed {
            job_id: job_id.into(),
            source,
        }
    }

    pub fn setup_failed(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SetupFailed {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    pub fn cancelled(job_id: impl Into<String>) -> Self {
        Self::Cancelled {
            job_id: job_id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::StepFailed { source, .. } => source.kind(),
            PipelineError::IngestFailed { source, .. } => source.kind(),
            PipelineError::ValidationFailed { .. } | PipelineError::Cancelled { .. } => {
                ErrorKind::InvalidInput
            }
            PipelineError::SetupFailed { .. } => ErrorKind::EncodeError,
        }
    }

    /// Step that was running when the job failed.
    pub fn step_name(&self) -> Option<&str> {
        match self {
            PipelineError::StepFailed { step_name, .. } => Some(step_name),
            _ => None,
        }
    }

    /// Text for the job summary: the innermost cause, no job id.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::StepFailed { source, .. } => source.to_string(),
            PipelineError::IngestFailed { source, .. } => source.to_string(),
            PipelineError::ValidationFailed { message, .. }
            | PipelineError::SetupFailed { message, .. } => message.clone(),
            PipelineError::Cancelled { .. } => "job was cancelled".to_string(),
        }
    }
}

/// Failure inside one step.
#[derive(Error, Debug)]
pub enum StepError {
    /// Caller-supplied value or input file is unusable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The step ran but what it recorded is inconsistent.
    #[error("unexpected result: {0}")]
    InvalidOutput(String),

    #[error("Probe of {role} input failed: {source}")]
    ProbeFailed {
        role: InputRole,
        #[source]
        source: EngineError,
    },

    #[error("{operation} failed: {source}")]
    EngineFailed {
        operation: String,
        #[source]
        source: EngineError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    ResourceExhausted(String),

    #[error("{operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// An earlier step did not leave what this one needs, or the job
    /// status cannot move to this step's phase.
    #[error("precondition not met: {0}")]
    PreconditionFailed(String),
}

impl StepError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    pub fn probe_failed(role: InputRole, source: EngineError) -> Self {
        Self::ProbeFailed { role, source }
    }

    /// `operation` names the engine call, e.g. "Gain" or "Trim".
    pub fn engine(operation: impl Into<String>, source: EngineError) -> Self {
        Self::EngineFailed {
            operation: operation.into(),
            source,
        }
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::ResourceExhausted(message.into())
    }

    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StepError::InvalidInput(_) => ErrorKind::InvalidInput,
            StepError::ProbeFailed { source, .. } if source.is_timeout() => ErrorKind::Timeout,
            StepError::ProbeFailed { .. } => ErrorKind::ProbeError,
            StepError::EngineFailed { source, .. } => source.kind(),
            StepError::Store(e) => e.kind(),
            StepError::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            StepError::InvalidOutput(_)
            | StepError::Io { .. }
            | StepError::PreconditionFailed(_) => ErrorKind::EncodeError,
        }
    }
}

pub type StepResult<T> = Result<T, StepError>;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_failure_hides_stderr() {
        let err = StepError::engine("Gain", EngineError::failed("ffmpeg", 1, "Invalid argument"));
        let msg = err.to_string();
        assert!(msg.contains("Gain failed"));
        assert!(msg.contains("exit"));
        assert!(!msg.contains("Invalid argument"));
    }

    #[test]
    fn job_error_wraps_step_error() {
        let step_err = StepError::probe_failed(
            InputRole::Secondary,
            EngineError::invalid_media("no audio stream found"),
        );
        let err = PipelineError::step_failed("job-xyz", "Probe", step_err);

        let msg = err.to_string();
        assert!(msg.contains("job-xyz"));
        assert!(msg.contains("Probe"));
        assert_eq!(err.kind(), ErrorKind::ProbeError);
        assert_eq!(err.step_name(), Some("Probe"));
        assert_eq!(
            err.user_message(),
            "Probe of secondary input failed: no audio stream found"
        );
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            StepError::probe_failed(InputRole::Primary, EngineError::timeout("ffprobe", 5)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            StepError::engine("Mix", EngineError::timeout("ffmpeg", 5)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            StepError::resource_exhausted("loop factor too large").kind(),
            ErrorKind::ResourceExhausted
        );
        assert_eq!(StepError::invalid_input("gain").kind(), ErrorKind::InvalidInput);
        assert_eq!(PipelineError::cancelled("j").kind(), ErrorKind::InvalidInput);
        assert_eq!(PipelineError::setup_failed("j", "no dir").kind(), ErrorKind::EncodeError);
    }
}
