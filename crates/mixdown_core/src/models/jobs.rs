//! Job-related data structures (per-request options and reported results).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::enums::{DurationPolicy, ErrorKind, JobStatus};

/// Per-request overrides of the configured mix parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MixOptions {
    /// Linear gain applied to the background input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain_factor: Option<f64>,
    /// Output duration policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_policy: Option<DurationPolicy>,
}

impl MixOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gain(mut self, gain_factor: f64) -> Self {
        self.gain_factor = Some(gain_factor);
        self
    }

    pub fn with_policy(mut self, policy: DurationPolicy) -> Self {
        self.duration_policy = Some(policy);
        self
    }
}

/// Check that a gain factor lies in `(0, 1]`.
///
/// The pipeline only attenuates; amplification beyond unity, zero and
/// non-finite values are rejected.
pub fn validate_gain_factor(factor: f64) -> Result<f64, String> {
    if factor.is_finite() && factor > 0.0 && factor <= 1.0 {
        Ok(factor)
    } else {
        Err(format!("gain factor {} is outside (0, 1]", factor))
    }
}

/// Structured outcome of a job, as handed to the caller.
///
/// Internal diagnostics (exit codes, engine stderr) stay in the job log;
/// `error_message` only carries the top-level description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    /// Job identifier.
    pub job_id: String,
    /// Final status (`Done` or `Failed`).
    pub status: JobStatus,
    /// Location of the mixed output (successful jobs only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_reference: Option<PathBuf>,
    /// Output duration reported by the engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_duration_secs: Option<f64>,
    /// Failure category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Human-readable failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Step that failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    /// Steps that completed.
    #[serde(default)]
    pub steps_completed: Vec<String>,
    /// Steps that were skipped.
    #[serde(default)]
    pub steps_skipped: Vec<String>,
}

impl JobSummary {
    /// Summary of a successful job.
    pub fn done(job_id: impl Into<String>, download_reference: PathBuf) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Done,
            download_reference: Some(download_reference),
            output_duration_secs: None,
            error_kind: None,
            error_message: None,
            failed_step: None,
            steps_completed: Vec::new(),
            steps_skipped: Vec::new(),
        }
    }

    /// Summary of a failed job.
    pub fn failed(job_id: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Failed,
            download_reference: None,
            output_duration_secs: None,
            error_kind: Some(kind),
            error_message: Some(message.into()),
            failed_step: None,
            steps_completed: Vec::new(),
            steps_skipped: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_summary_omits_download() {
        let summary = JobSummary::failed("job-1", ErrorKind::ProbeError, "input 'a' is not audio");
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"status\":\"failed\""));
        assert!(json.contains("\"error_kind\":\"probe_error\""));
        assert!(!json.contains("download_reference"));
        assert!(!summary.is_success());
    }

    #[test]
    fn done_summary_carries_reference() {
        let summary = JobSummary::done("job-2", PathBuf::from("/out/job-2-mixed.aac"));
        assert!(summary.is_success());
        assert!(summary.error_kind.is_none());
    }

    #[test]
    fn gain_factor_range() {
        assert!(validate_gain_factor(0.0).is_err());
        assert!(validate_gain_factor(1.5).is_err());
        assert!(validate_gain_factor(-0.2).is_err());
        assert!(validate_gain_factor(f64::NAN).is_err());
        assert_eq!(validate_gain_factor(0.6), Ok(0.6));
        assert_eq!(validate_gain_factor(1.0), Ok(1.0));
    }

    #[test]
    fn options_builder_sets_overrides() {
        let opts = MixOptions::new()
            .with_gain(0.6)
            .with_policy(DurationPolicy::Shortest);
        assert_eq!(opts.gain_factor, Some(0.6));
        assert_eq!(opts.duration_policy, Some(DurationPolicy::Shortest));
    }
}
