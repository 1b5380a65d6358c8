//! Shared fixtures for the pipeline tests.
//!
//! `SimulatedEngine` stands in for FFmpeg. Its "audio" files are text files
//! holding a single `duration=<secs>` line, which every operation reads and
//! writes, so durations flow through the pipeline the way they would with
//! real media.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use mixdown_core::config::Settings;
use mixdown_core::engine::{args, EngineError, EngineResult, MediaEngine, OutputEncoding};
use mixdown_core::logging::JobLogger;
use mixdown_core::models::{DurationPolicy, ProbeInfo};
use mixdown_core::store::{ArtifactStore, WorkspaceConfig};
use mixdown_core::Mixer;

/// How an injected fault behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultMode {
    /// Write a partial output, then exit non-zero.
    Fail,
    /// Write a partial output, then report a timeout.
    Timeout,
}

/// Engine whose operations compute durations instead of audio.
#[derive(Default)]
pub struct SimulatedEngine {
    calls: Mutex<Vec<String>>,
    faults: Mutex<Vec<(String, FaultMode)>>,
    output_padding: usize,
    trim_drift_secs: f64,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `op` ("probe", "gain", "concat", "trim", "mix") fail.
    pub fn with_fault(self, op: &str, mode: FaultMode) -> Self {
        self.faults.lock().push((op.to_string(), mode));
        self
    }

    /// Pad mixed outputs with `bytes` extra bytes.
    pub fn with_output_padding(mut self, bytes: usize) -> Self {
        self.output_padding = bytes;
        self
    }

    /// Make trim outputs `secs` longer (or shorter, if negative) than asked.
    pub fn with_trim_drift(mut self, secs: f64) -> Self {
        self.trim_drift_secs = secs;
        self
    }

    /// Every operation invoked so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Number of calls whose name starts with `op`.
    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.starts_with(op)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn fault(&self, op: &str) -> Option<FaultMode> {
        self.faults
            .lock()
            .iter()
            .find(|(name, _)| name == op)
            .map(|(_, mode)| *mode)
    }

    /// Produce `output`, or leave a partial file behind if `op` is faulted.
    async fn produce(&self, op: &str, output: &Path, duration_secs: f64) -> EngineResult<()> {
        if let Some(mode) = self.fault(op) {
            tokio::fs::write(output, b"dura")
                .await
                .map_err(|e| EngineError::io(op, e))?;
            return Err(match mode {
                FaultMode::Fail => {
                    EngineError::failed("ffmpeg", 1, format!("simulated {} failure", op))
                }
                FaultMode::Timeout => EngineError::timeout("ffmpeg", 1),
            });
        }
        let mut body = clip_body(duration_secs);
        if op == "mix" {
            body.push_str(&"#".repeat(self.output_padding));
        }
        tokio::fs::write(output, body)
            .await
            .map_err(|e| EngineError::io(op, e))
    }

    async fn duration_of(&self, path: &Path) -> EngineResult<f64> {
        let body = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| EngineError::io("reading clip", e))?;
        body.lines()
            .find_map(|line| line.strip_prefix("duration="))
            .and_then(|v| v.trim().parse::<f64>().ok())
            .ok_or_else(|| {
                EngineError::failed("ffprobe", 1, format!("{}: Invalid data found", path.display()))
            })
    }
}

#[async_trait]
impl MediaEngine for SimulatedEngine {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn probe(&self, input: &Path, _log: &JobLogger) -> EngineResult<ProbeInfo> {
        self.record(format!("probe:{}", file_name(input)));
        if let Some(mode) = self.fault("probe") {
            return Err(match mode {
                FaultMode::Fail => EngineError::failed("ffprobe", 1, "simulated probe failure"),
                FaultMode::Timeout => EngineError::timeout("ffprobe", 1),
            });
        }
        let duration_secs = self.duration_of(input).await?;
        if duration_secs <= 0.0 {
            return Err(EngineError::invalid_media(format!(
                "{} has no duration",
                input.display()
            )));
        }
        Ok(ProbeInfo {
            duration_secs,
            format: input
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
            codec: None,
        })
    }

    async fn apply_gain(
        &self,
        input: &Path,
        factor: f64,
        output: &Path,
        _log: &JobLogger,
    ) -> EngineResult<()> {
        self.record(format!("gain:{}", factor));
        let secs = self.duration_of(input).await?;
        self.produce("gain", output, secs).await
    }

    async fn concat(&self, list_file: &Path, output: &Path, _log: &JobLogger) -> EngineResult<()> {
        let body = tokio::fs::read_to_string(list_file)
            .await
            .map_err(|e| EngineError::io("reading concat list", e))?;
        let entries = args::parse_concat_list(&body);
        self.record(format!("concat:{}", entries.len()));

        let mut total = 0.0;
        for entry in &entries {
            total += self.duration_of(entry).await?;
        }
        self.produce("concat", output, total).await
    }

    async fn trim(
        &self,
        input: &Path,
        duration_secs: f64,
        output: &Path,
        _log: &JobLogger,
    ) -> EngineResult<()> {
        self.record(format!("trim:{}", duration_secs));
        let secs = self.duration_of(input).await?;
        let produced = secs.min(duration_secs) + self.trim_drift_secs;
        self.produce("trim", output, produced).await
    }

    async fn mix(
        &self,
        first: &Path,
        second: &Path,
        policy: DurationPolicy,
        _encoding: &OutputEncoding,
        output: &Path,
        _log: &JobLogger,
    ) -> EngineResult<()> {
        self.record(format!("mix:{}", policy));
        let first_secs = self.duration_of(first).await?;
        let second_secs = self.duration_of(second).await?;
        self.produce("mix", output, policy.expected_duration(first_secs, second_secs))
            .await
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Contents of a simulated clip.
pub fn clip_body(duration_secs: f64) -> String {
    format!("duration={:.3}\n", duration_secs)
}

/// Write a simulated clip of `secs` seconds into `dir`.
pub fn write_clip(dir: &Path, name: &str, secs: f64) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, clip_body(secs)).unwrap();
    path
}

/// Settings with every folder under `root`.
pub fn test_settings(root: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.paths.uploads_folder = root.join("uploads").display().to_string();
    settings.paths.output_folder = root.join("outputs").display().to_string();
    settings.paths.temp_root = root.join("work").display().to_string();
    settings.paths.logs_folder = root.join("logs").display().to_string();
    settings.cleanup.result_grace_secs = 0;
    settings
}

/// Mixer over `engine` with storage laid out per `settings`.
pub fn test_mixer(engine: Arc<SimulatedEngine>, settings: Settings) -> Mixer {
    let store = ArtifactStore::new(WorkspaceConfig::from_settings(&settings));
    store.ensure_dirs().unwrap();
    Mixer::new(settings, engine, store)
}

/// Files in `dir` whose name starts with `prefix`.
pub fn files_with_prefix(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with(prefix))
        .map(|e| e.path())
        .collect()
}
