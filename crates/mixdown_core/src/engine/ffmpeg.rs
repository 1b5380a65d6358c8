//! `MediaEngine` backed by the FFmpeg command-line tools.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::EngineSettings;
use crate::logging::JobLogger;
use crate::models::{DurationPolicy, ProbeInfo};

use super::args::{self, OutputEncoding};
use super::error::{EngineError, EngineResult};
use super::runner::{run_tool, tool_name, ToolOutput};
use super::MediaEngine;

/// Runs `ffmpeg` / `ffprobe` as child processes with a per-call time budget.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: String,
    ffprobe: String,
    timeout: Duration,
    log_args: bool,
}

impl FfmpegEngine {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            timeout,
            log_args: false,
        }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(
            settings.ffmpeg_path.clone(),
            settings.ffprobe_path.clone(),
            settings.timeout(),
        )
    }

    /// Also log every argument on its own line.
    pub fn with_arg_logging(mut self, enabled: bool) -> Self {
        self.log_args = enabled;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one tool invocation, routing its output through the job log.
    async fn invoke(
        &self,
        program: &str,
        args: Vec<String>,
        log: &JobLogger,
    ) -> EngineResult<ToolOutput> {
        let tool = tool_name(program);
        log.command(&args::display_command(program, &args));
        if self.log_args {
            log.log_engine_args(&tool, &args);
        }

        match run_tool(program, &args, self.timeout).await {
            Ok(output) => {
                log.engine_output(&tool, &output.stderr);
                Ok(output)
            }
            Err(e) => {
                if let Some(stderr) = e.stderr() {
                    log.engine_output(&tool, stderr);
                }
                log.dump_tail(&tool);
                Err(e)
            }
        }
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default())
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, input: &Path, log: &JobLogger) -> EngineResult<ProbeInfo> {
        let output = self.invoke(&self.ffprobe, args::probe_args(input), log).await?;
        parse_probe_report(&output.stdout)
    }

    async fn apply_gain(
        &self,
        input: &Path,
        factor: f64,
        output: &Path,
        log: &JobLogger,
    ) -> EngineResult<()> {
        self.invoke(&self.ffmpeg, args::gain_args(input, factor, output), log)
            .await
            .map(|_| ())
    }

    async fn concat(&self, list_file: &Path, output: &Path, log: &JobLogger) -> EngineResult<()> {
        self.invoke(&self.ffmpeg, args::concat_args(list_file, output), log)
            .await
            .map(|_| ())
    }

    async fn trim(
        &self,
        input: &Path,
        duration_secs: f64,
        output: &Path,
        log: &JobLogger,
    ) -> EngineResult<()> {
        self.invoke(&self.ffmpeg, args::trim_args(input, duration_secs, output), log)
            .await
            .map(|_| ())
    }

    async fn mix(
        &self,
        first: &Path,
        second: &Path,
        policy: DurationPolicy,
        encoding: &OutputEncoding,
        output: &Path,
        log: &JobLogger,
    ) -> EngineResult<()> {
        let args = args::mix_args(first, second, policy, encoding, output);
        self.invoke(&self.ffmpeg, args, log).await.map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    format_name: Option<String>,
}

/// Interpret the JSON report written by `ffprobe -of json`.
///
/// Rejects reports without an audio stream or without a positive duration.
pub fn parse_probe_report(json: &str) -> EngineResult<ProbeInfo> {
    let report: ProbeReport =
        serde_json::from_str(json).map_err(|e| EngineError::parse("ffprobe", e.to_string()))?;

    let audio = report
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .ok_or_else(|| EngineError::invalid_media("no audio stream found"))?;

    let format = report
        .format
        .ok_or_else(|| EngineError::parse("ffprobe", "report has no format section"))?;

    let duration_secs = format
        .duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite())
        .ok_or_else(|| EngineError::invalid_media("duration is unknown"))?;

    if duration_secs <= 0.0 {
        return Err(EngineError::invalid_media("stream has zero length"));
    }

    Ok(ProbeInfo {
        duration_secs,
        format: format.format_name.unwrap_or_else(|| "unknown".to_string()),
        codec: audio.codec_name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAV_REPORT: &str = r#"{
        "programs": [],
        "streams": [{ "codec_name": "pcm_s16le", "codec_type": "audio" }],
        "format": { "format_name": "wav", "duration": "3.000000" }
    }"#;

    #[test]
    fn parses_audio_report() {
        let info = parse_probe_report(WAV_REPORT).unwrap();
        assert_eq!(info.duration_secs, 3.0);
        assert_eq!(info.format, "wav");
        assert_eq!(info.codec.as_deref(), Some("pcm_s16le"));
    }

    #[test]
    fn picks_audio_stream_after_cover_art() {
        let json = r#"{
            "streams": [
                { "codec_name": "mjpeg", "codec_type": "video" },
                { "codec_name": "mp3", "codec_type": "audio" }
            ],
            "format": { "format_name": "mp3", "duration": "10.031020" }
        }"#;
        let info = parse_probe_report(json).unwrap();
        assert_eq!(info.codec.as_deref(), Some("mp3"));
        assert!((info.duration_secs - 10.03102).abs() < 1e-9);
    }

    #[test]
    fn rejects_missing_audio() {
        let json = r#"{
            "streams": [{ "codec_name": "h264", "codec_type": "video" }],
            "format": { "format_name": "mov,mp4", "duration": "5.0" }
        }"#;
        let err = parse_probe_report(json).unwrap_err();
        assert!(matches!(err, EngineError::InvalidMedia(_)));
    }

    #[test]
    fn rejects_zero_or_missing_duration() {
        let zero = r#"{"streams":[{"codec_type":"audio"}],"format":{"duration":"0.000000"}}"#;
        assert!(matches!(
            parse_probe_report(zero),
            Err(EngineError::InvalidMedia(_))
        ));

        let missing = r#"{"streams":[{"codec_type":"audio"}],"format":{"format_name":"wav"}}"#;
        assert!(matches!(
            parse_probe_report(missing),
            Err(EngineError::InvalidMedia(_))
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_probe_report("not json"),
            Err(EngineError::Parse { .. })
        ));
    }

    #[test]
    fn settings_configure_binaries() {
        let mut settings = EngineSettings::default();
        settings.ffmpeg_path = "/opt/ff/ffmpeg".to_string();
        settings.timeout_secs = 12;
        let engine = FfmpegEngine::from_settings(&settings);
        assert_eq!(engine.ffmpeg, "/opt/ff/ffmpeg");
        assert_eq!(engine.timeout(), Duration::from_secs(12));
    }
}
