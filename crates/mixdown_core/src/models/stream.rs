//! Audio stream handles.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use super::enums::StreamOrigin;

/// Metadata recorded by the media probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeInfo {
    /// Duration in seconds (always > 0).
    pub duration_secs: f64,
    /// Container format name as reported by the engine (e.g. "wav", "mp3").
    pub format: String,
    /// Codec of the first audio stream.
    #[serde(default)]
    pub codec: Option<String>,
}

/// Handle to encoded audio addressable by a stable path.
///
/// Probe metadata is written at most once; later probes of the same
/// unmodified stream must agree with the first.
#[derive(Debug, Clone)]
pub struct AudioStream {
    path: PathBuf,
    origin: StreamOrigin,
    probe: OnceLock<ProbeInfo>,
}

impl AudioStream {
    /// Stream supplied by the caller.
    pub fn source(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            origin: StreamOrigin::Source,
            probe: OnceLock::new(),
        }
    }

    /// Stream produced by a pipeline stage.
    pub fn artifact(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            origin: StreamOrigin::Artifact,
            probe: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn origin(&self) -> StreamOrigin {
        self.origin
    }

    pub fn is_artifact(&self) -> bool {
        self.origin == StreamOrigin::Artifact
    }

    /// Probe metadata, if the stream has been probed.
    pub fn probe_info(&self) -> Option<&ProbeInfo> {
        self.probe.get()
    }

    /// Duration in seconds, if known.
    pub fn duration_secs(&self) -> Option<f64> {
        self.probe.get().map(|p| p.duration_secs)
    }

    /// Container format, if known.
    pub fn format(&self) -> Option<&str> {
        self.probe.get().map(|p| p.format.as_str())
    }

    /// Record probe metadata.
    ///
    /// The first call wins. Returns the metadata that is now attached to the
    /// stream, which differs from `info` only if the stream was already probed.
    pub fn record_probe(&self, info: ProbeInfo) -> &ProbeInfo {
        self.probe.get_or_init(|| info)
    }

    /// Same stream with a known duration, used by stages that compute the
    /// length of what they produced.
    pub fn with_probe(self, info: ProbeInfo) -> Self {
        let _ = self.probe.set(info);
        self
    }
}
