//! Typed settings, one struct per TOML table.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;
use crate::models::{validate_gain_factor, DurationPolicy};

/// Contents of `mixdown.toml`. Every table and key is optional on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Storage directories.
    #[serde(default)]
    pub paths: PathSettings,

    /// External engine settings.
    #[serde(default)]
    pub engine: EngineSettings,

    /// Mix parameters and output encoding.
    #[serde(default)]
    pub mix: MixSettings,

    /// Artifact retention.
    #[serde(default)]
    pub cleanup: CleanupSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Check that every value is usable by the pipeline.
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        validate_gain_factor(self.mix.gain_factor).map_err(|e| format!("mix.gain_factor: {}", e))?;

        if self.mix.output_codec.trim().is_empty() {
            return Err("mix.output_codec must not be empty".to_string());
        }
        if self.mix.output_bitrate_kbps == 0 {
            return Err("mix.output_bitrate_kbps must be greater than zero".to_string());
        }
        if self.mix.max_loop_repeat_count == 0 {
            return Err("mix.max_loop_repeat_count must be at least 1".to_string());
        }
        if self.engine.timeout_secs == 0 {
            return Err("engine.timeout_secs must be greater than zero".to_string());
        }
        if self.logging.progress_step == 0 {
            return Err("logging.progress_step must be greater than zero".to_string());
        }

        Ok(())
    }
}

/// Storage locations for uploads, outputs, intermediates and logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Folder holding staged uploads.
    #[serde(default = "default_uploads_folder")]
    pub uploads_folder: String,

    /// Folder for mixed outputs.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Root folder for per-job intermediate files.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_uploads_folder() -> String {
    "uploads".to_string()
}

fn default_output_folder() -> String {
    "output".to_string()
}

fn default_temp_root() -> String {
    ".temp".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            uploads_folder: default_uploads_folder(),
            output_folder: default_output_folder(),
            temp_root: default_temp_root(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// FFmpeg / FFprobe invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// ffmpeg executable (name on PATH or absolute path).
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// ffprobe executable (name on PATH or absolute path).
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,

    /// Wall-clock budget for a single engine invocation, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

impl EngineSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Mix parameters and output encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixSettings {
    /// Linear gain applied to the background input, in (0, 1].
    #[serde(default = "default_gain_factor")]
    pub gain_factor: f64,

    /// Output duration policy.
    #[serde(default)]
    pub duration_policy: DurationPolicy,

    /// FFmpeg audio encoder for the final output.
    #[serde(default = "default_output_codec")]
    pub output_codec: String,

    /// Output bitrate in kbit/s.
    #[serde(default = "default_output_bitrate")]
    pub output_bitrate_kbps: u32,

    /// Maximum number of times a clip may be concatenated with itself.
    #[serde(default = "default_max_loop_repeat_count")]
    pub max_loop_repeat_count: u32,

    /// Maximum size of the mixed output in bytes (0 = unlimited).
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: u64,

    /// Re-probe looped output and reject it when off by more than the tolerance.
    #[serde(default = "default_true")]
    pub verify_durations: bool,
}

fn default_gain_factor() -> f64 {
    0.6
}

fn default_output_codec() -> String {
    "aac".to_string()
}

fn default_output_bitrate() -> u32 {
    128
}

fn default_max_loop_repeat_count() -> u32 {
    1000
}

fn default_max_output_bytes() -> u64 {
    512 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

impl MixSettings {
    /// File extension matching the configured output codec.
    pub fn output_extension(&self) -> &'static str {
        let codec = self.output_codec.trim().to_ascii_lowercase();
        match codec.as_str() {
            "aac" | "libfdk_aac" => "aac",
            "libmp3lame" | "mp3" => "mp3",
            "libopus" | "opus" => "opus",
            "libvorbis" | "vorbis" => "ogg",
            "flac" => "flac",
            c if c.starts_with("pcm_") => "wav",
            _ => "mka",
        }
    }
}

impl Default for MixSettings {
    fn default() -> Self {
        Self {
            gain_factor: default_gain_factor(),
            duration_policy: DurationPolicy::default(),
            output_codec: default_output_codec(),
            output_bitrate_kbps: default_output_bitrate(),
            max_loop_repeat_count: default_max_loop_repeat_count(),
            max_output_bytes: default_max_output_bytes(),
            verify_durations: true,
        }
    }
}

/// Retention of uploads and results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupSettings {
    /// Seconds an unconfirmed result is kept before it is deleted.
    #[serde(default = "default_result_grace")]
    pub result_grace_secs: u64,

    /// Delete staged uploads when their job closes.
    #[serde(default = "default_true")]
    pub remove_uploads: bool,

    /// Job log files kept in the logs folder; older ones are deleted after
    /// each job. 0 keeps every log.
    #[serde(default = "default_max_job_logs")]
    pub max_job_logs: usize,
}

fn default_result_grace() -> u64 {
    300
}

fn default_max_job_logs() -> usize {
    200
}

impl CleanupSettings {
    pub fn result_grace(&self) -> Duration {
        Duration::from_secs(self.result_grace_secs)
    }
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            result_grace_secs: default_result_grace(),
            remove_uploads: true,
            max_job_logs: default_max_job_logs(),
        }
    }
}

/// Per-job log files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Minimum level written to job logs.
    #[serde(default)]
    pub level: LogLevel,

    /// Keep engine stderr for the failure tail only and throttle progress lines.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of engine output lines kept for the error tail.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Log progress each time it crosses a multiple of this percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Log the full engine argument list for every invocation.
    #[serde(default)]
    pub show_engine_args: bool,
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            compact: true,
            error_tail: default_error_tail(),
            progress_step: default_progress_step(),
            show_engine_args: false,
        }
    }
}

impl PathSettings {
    pub fn uploads_dir(&self) -> PathBuf {
        PathBuf::from(&self.uploads_folder)
    }

    pub fn outputs_dir(&self) -> PathBuf {
        PathBuf::from(&self.output_folder)
    }

    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.temp_root)
    }

    pub fn logs_dir(&self) -> PathBuf {
        PathBuf::from(&self.logs_folder)
    }
}

/// A top-level table of the settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Engine,
    Mix,
    Cleanup,
    Logging,
}

impl ConfigSection {
    /// All sections in file order.
    pub const ALL: [ConfigSection; 5] = [
        ConfigSection::Paths,
        ConfigSection::Engine,
        ConfigSection::Mix,
        ConfigSection::Cleanup,
        ConfigSection::Logging,
    ];

    pub fn from_table_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.table_name() == name)
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Engine => "engine",
            ConfigSection::Mix => "mix",
            ConfigSection::Cleanup => "cleanup",
            ConfigSection::Logging => "logging",
        }
    }

    /// Comment written above the section in generated files.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "# Upload, output, working and log directories",
            ConfigSection::Engine => "# FFmpeg / FFprobe executables and time budget",
            ConfigSection::Mix => "# Mix parameters and output encoding",
            ConfigSection::Cleanup => "# Retention of uploads and results",
            ConfigSection::Logging => "# Logging configuration",
        }
    }
}
