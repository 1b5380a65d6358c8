//! Data models for Mixdown.
//!
//! This module contains the core data structures used throughout the pipeline:
//! - Enums for duration policy, job status and error categories
//! - Audio stream handles with write-once probe metadata
//! - Per-request options and the reported job summary

mod enums;
mod jobs;
mod stream;

// Re-export all public types
pub use enums::{DurationPolicy, ErrorKind, InputRole, JobStatus, StreamOrigin};
pub use jobs::{validate_gain_factor, JobSummary, MixOptions};
pub use stream::{AudioStream, ProbeInfo};
