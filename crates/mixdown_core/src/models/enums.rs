//! Core enums used throughout the pipeline.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Rule selecting the output length when two streams of different lengths are mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationPolicy {
    /// Output ends with the shorter input.
    Shortest,
    /// Output runs to the end of the longer input; the shorter one is padded with silence.
    #[default]
    Longest,
    /// Output length follows the first (primary) input exactly.
    First,
}

impl DurationPolicy {
    /// Value of the `duration` option of FFmpeg's `amix` filter.
    pub fn amix_value(&self) -> &'static str {
        match self {
            DurationPolicy::Shortest => "shortest",
            DurationPolicy::Longest => "longest",
            DurationPolicy::First => "first",
        }
    }

    /// Output duration this policy yields for inputs of the given lengths.
    pub fn expected_duration(&self, first_secs: f64, second_secs: f64) -> f64 {
        match self {
            DurationPolicy::Shortest => first_secs.min(second_secs),
            DurationPolicy::Longest => first_secs.max(second_secs),
            DurationPolicy::First => first_secs,
        }
    }
}

impl std::fmt::Display for DurationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.amix_value())
    }
}

impl FromStr for DurationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shortest" => Ok(DurationPolicy::Shortest),
            "longest" => Ok(DurationPolicy::Longest),
            "first" => Ok(DurationPolicy::First),
            other => Err(format!(
                "unknown duration policy '{}' (expected shortest, longest or first)",
                other
            )),
        }
    }
}

/// Lifecycle state of a mix job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Probing,
    Transforming,
    Mixing,
    Done,
    Failed,
}

impl JobStatus {
    /// Whether the job has finished (successfully or not).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Jobs move strictly forward through
    /// `Pending → Probing → Transforming → Mixing → Done`, and may drop to
    /// `Failed` from any non-terminal state. Re-entering the current state
    /// is allowed so that consecutive steps can share a phase.
    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (*self, next) {
            (from, _) if from.is_terminal() => false,
            (_, Failed) => true,
            (from, to) if from == to => true,
            (Pending, Probing)
            | (Probing, Transforming)
            | (Transforming, Mixing)
            | (Mixing, Done) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Probing => write!(f, "probing"),
            JobStatus::Transforming => write!(f, "transforming"),
            JobStatus::Mixing => write!(f, "mixing"),
            JobStatus::Done => write!(f, "done"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Category of a job failure, as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or wrong number of inputs, zero-length source, bad parameter.
    InvalidInput,
    /// An input could not be parsed as audio.
    ProbeError,
    /// The engine failed or crashed while producing a stream.
    EncodeError,
    /// An engine invocation exceeded its time budget.
    Timeout,
    /// A configured cap (loop repeat count, output size) was exceeded.
    ResourceExhausted,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidInput => write!(f, "invalid_input"),
            ErrorKind::ProbeError => write!(f, "probe_error"),
            ErrorKind::EncodeError => write!(f, "encode_error"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::ResourceExhausted => write!(f, "resource_exhausted"),
        }
    }
}

/// Where a stream came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamOrigin {
    /// Supplied by the caller; read-only to the pipeline.
    Source,
    /// Produced by a pipeline stage and owned by the job.
    Artifact,
}

/// Position of an input within the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputRole {
    Primary,
    Secondary,
}

impl InputRole {
    /// The other role.
    pub fn other(&self) -> InputRole {
        match self {
            InputRole::Primary => InputRole::Secondary,
            InputRole::Secondary => InputRole::Primary,
        }
    }

    /// Short name used in artifact and log names.
    pub fn label(&self) -> &'static str {
        match self {
            InputRole::Primary => "primary",
            InputRole::Secondary => "secondary",
        }
    }
}

impl std::fmt::Display for InputRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
