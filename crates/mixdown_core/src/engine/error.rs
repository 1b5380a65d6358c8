//! Error type for engine invocations.

use std::io;

use thiserror::Error;

use crate::models::ErrorKind;

/// Failure of a single FFmpeg / FFprobe invocation.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The executable could not be started.
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// The tool ran and exited unsuccessfully.
    ///
    /// `stderr` keeps the captured diagnostics for the job log; it is not
    /// part of the display string.
    #[error("{tool} exited with code {exit_code}")]
    Failed {
        tool: String,
        exit_code: i32,
        stderr: String,
    },

    /// The tool exceeded its wall-clock budget and was killed.
    #[error("{tool} did not finish within {secs}s")]
    Timeout { tool: String, secs: u64 },

    /// The tool's output could not be interpreted.
    #[error("Failed to parse {tool} output: {message}")]
    Parse { tool: String, message: String },

    /// The input was readable but is not usable audio.
    #[error("{0}")]
    InvalidMedia(String),

    /// Local file handling around the invocation failed.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl EngineError {
    pub fn failed(tool: impl Into<String>, exit_code: i32, stderr: impl Into<String>) -> Self {
        Self::Failed {
            tool: tool.into(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    pub fn timeout(tool: impl Into<String>, secs: u64) -> Self {
        Self::Timeout {
            tool: tool.into(),
            secs,
        }
    }

    pub fn parse(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn invalid_media(message: impl Into<String>) -> Self {
        Self::InvalidMedia(message.into())
    }

    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Whether the invocation was cut off by its time budget.
    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::Timeout { .. })
    }

    /// Captured stderr, if the tool produced any before failing.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            EngineError::Failed { stderr, .. } if !stderr.trim().is_empty() => Some(stderr),
            _ => None,
        }
    }

    /// Error category when the failing call was producing audio.
    ///
    /// Probe calls map everything except timeouts to `ProbeError` instead.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Timeout { .. } => ErrorKind::Timeout,
            _ => ErrorKind::EncodeError,
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
