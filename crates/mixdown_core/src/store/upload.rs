//! Incoming audio byte-streams.

use std::fmt;
use std::path::Path;

use tokio::io::AsyncRead;

/// A named upload as delivered by the collaborator (HTTP handler, CLI).
///
/// `name` is only used for logging and to pick a file extension; stored
/// files are always named after the job.
pub struct InputStream {
    name: String,
    content_type: Option<String>,
    reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl InputStream {
    pub fn new(name: impl Into<String>, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            reader: Box::new(reader),
        }
    }

    /// Upload backed by an in-memory buffer.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(name, std::io::Cursor::new(bytes))
    }

    /// Upload read from a local file.
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Self::new(name, file))
    }

    /// Declared MIME type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub(super) fn reader_mut(&mut self) -> &mut (dyn AsyncRead + Send + Unpin) {
        self.reader.as_mut()
    }

    /// Extension derived from the upload name, if it looks like one.
    pub(super) fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .filter(|e| {
                !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .unwrap_or_else(|| "bin".to_string())
    }
}

impl fmt::Debug for InputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputStream")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Whether a declared MIME type may carry audio.
///
/// Accepts `audio/*` and `application/octet-stream`, ignoring parameters
/// and case.
pub fn is_acceptable_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match essence.split_once('/') {
        Some(("audio", sub)) => !sub.is_empty(),
        _ => essence == "application/octet-stream",
    }
}
