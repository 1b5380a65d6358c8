//! Error type for artifact store operations.

use std::io;

use thiserror::Error;

use crate::models::{ErrorKind, InputRole};

/// Errors from staging uploads and managing job files.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// An upload contained no bytes.
    #[error("{slot} upload is empty")]
    EmptyUpload { slot: InputRole },

    /// An upload declared a content type that is not audio.
    #[error("{slot} upload has unsupported content type '{content_type}'")]
    UnsupportedType {
        slot: InputRole,
        content_type: String,
    },

    /// Wrong number of uploads for a mix request.
    #[error("expected 2 inputs, got {0}")]
    InputCount(usize),
}

impl StoreError {
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Category reported to the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Io { .. } => ErrorKind::EncodeError,
            StoreError::EmptyUpload { .. }
            | StoreError::UnsupportedType { .. }
            | StoreError::InputCount(_) => ErrorKind::InvalidInput,
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
