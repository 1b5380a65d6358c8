//! External audio engine.
//!
//! Every transform the pipeline needs is one awaited call on a
//! [`MediaEngine`]. [`FfmpegEngine`] drives the FFmpeg tools; tests plug in
//! a simulated engine instead.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use mixdown_core::engine::{FfmpegEngine, MediaEngine};
//! use mixdown_core::logging::{JobLogger, LogConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = FfmpegEngine::default();
//! let log = JobLogger::new("probe", "/tmp/logs", LogConfig::default(), None)?;
//! let info = engine.probe(Path::new("voice.mp3"), &log).await?;
//! println!("{}s of {}", info.duration_secs, info.format);
//! # Ok(())
//! # }
//! ```

pub mod args;
mod error;
mod ffmpeg;
mod runner;

use std::path::Path;

use async_trait::async_trait;

use crate::logging::JobLogger;
use crate::models::{DurationPolicy, ProbeInfo};

pub use args::OutputEncoding;
pub use error::{EngineError, EngineResult};
pub use ffmpeg::{parse_probe_report, FfmpegEngine};
pub use runner::{run_tool, tool_name, ToolOutput};

/// Operations the pipeline delegates to the audio engine.
///
/// Every operation writes a new file at `output` and never modifies its
/// inputs. Implementations must be safe to call concurrently from
/// independent jobs.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Read duration, container and codec of an audio file.
    async fn probe(&self, input: &Path, log: &JobLogger) -> EngineResult<ProbeInfo>;

    /// Multiply the volume of `input` by `factor`.
    async fn apply_gain(
        &self,
        input: &Path,
        factor: f64,
        output: &Path,
        log: &JobLogger,
    ) -> EngineResult<()>;

    /// Join the files named in a concat list file, in order.
    async fn concat(&self, list_file: &Path, output: &Path, log: &JobLogger) -> EngineResult<()>;

    /// Keep the first `duration_secs` seconds of `input`.
    async fn trim(
        &self,
        input: &Path,
        duration_secs: f64,
        output: &Path,
        log: &JobLogger,
    ) -> EngineResult<()>;

    /// Additively mix two inputs under `policy` and encode the result.
    async fn mix(
        &self,
        first: &Path,
        second: &Path,
        policy: DurationPolicy,
        encoding: &OutputEncoding,
        output: &Path,
        log: &JobLogger,
    ) -> EngineResult<()>;
}
