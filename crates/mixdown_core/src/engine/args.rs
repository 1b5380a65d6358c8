//! FFmpeg / FFprobe argument builders.
//!
//! Pure functions so the exact command lines can be unit tested without
//! the tools installed.

use std::path::{Path, PathBuf};

use crate::models::DurationPolicy;

/// Codec used for every intermediate file. PCM keeps concatenation and
/// trimming sample-exact.
pub const INTERMEDIATE_CODEC: &str = "pcm_s16le";

/// Declared encoding of the final mixed output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEncoding {
    /// FFmpeg encoder name (`aac`, `libmp3lame`, ...).
    pub codec: String,
    /// Bitrate in kbit/s.
    pub bitrate_kbps: u32,
}

impl OutputEncoding {
    pub fn new(codec: impl Into<String>, bitrate_kbps: u32) -> Self {
        Self {
            codec: codec.into(),
            bitrate_kbps,
        }
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Seconds with millisecond precision, trailing zeros removed.
pub fn format_seconds(secs: f64) -> String {
    let s = format!("{:.3}", secs);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Common prefix for every ffmpeg run.
fn ffmpeg_prelude() -> Vec<String> {
    ["-hide_banner", "-nostdin", "-y"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// `ffprobe` arguments reporting duration, container and stream codecs as JSON.
pub fn probe_args(input: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration,format_name:stream=codec_type,codec_name".to_string(),
        "-of".to_string(),
        "json".to_string(),
        path_arg(input),
    ]
}

/// Scale the volume of `input` by `factor`, writing PCM to `output`.
pub fn gain_args(input: &Path, factor: f64, output: &Path) -> Vec<String> {
    let mut args = ffmpeg_prelude();
    args.extend([
        "-i".to_string(),
        path_arg(input),
        "-vn".to_string(),
        "-filter:a".to_string(),
        format!("volume={}", factor),
        "-c:a".to_string(),
        INTERMEDIATE_CODEC.to_string(),
        path_arg(output),
    ]);
    args
}

/// Concatenate the files named in a concat list, decoding to PCM.
///
/// The list may name an untouched source (gain skipped at unity), so the
/// packets cannot be stream-copied into the WAV intermediate.
pub fn concat_args(list_file: &Path, output: &Path) -> Vec<String> {
    let mut args = ffmpeg_prelude();
    args.extend([
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        path_arg(list_file),
        "-vn".to_string(),
        "-c:a".to_string(),
        INTERMEDIATE_CODEC.to_string(),
        path_arg(output),
    ]);
    args
}

/// Keep the first `duration_secs` seconds of `input`.
pub fn trim_args(input: &Path, duration_secs: f64, output: &Path) -> Vec<String> {
    let mut args = ffmpeg_prelude();
    args.extend([
        "-i".to_string(),
        path_arg(input),
        "-t".to_string(),
        format_seconds(duration_secs),
        "-c:a".to_string(),
        INTERMEDIATE_CODEC.to_string(),
        path_arg(output),
    ]);
    args
}

/// Additive mix of two inputs, encoded with the declared output encoding.
pub fn mix_args(
    first: &Path,
    second: &Path,
    policy: DurationPolicy,
    encoding: &OutputEncoding,
    output: &Path,
) -> Vec<String> {
    let mut args = ffmpeg_prelude();
    args.extend([
        "-i".to_string(),
        path_arg(first),
        "-i".to_string(),
        path_arg(second),
        "-filter_complex".to_string(),
        format!(
            "[0:a][1:a]amix=inputs=2:duration={}[outa]",
            policy.amix_value()
        ),
        "-map".to_string(),
        "[outa]".to_string(),
        "-c:a".to_string(),
        encoding.codec.clone(),
        "-b:a".to_string(),
        format!("{}k", encoding.bitrate_kbps),
        path_arg(output),
    ]);
    args
}

/// Body of a concat-demuxer list file naming `source` `repeat` times.
///
/// Paths are made absolute and single quotes escaped the way the demuxer
/// expects (`'` becomes `'\''`).
pub fn concat_list(source: &Path, repeat: u32) -> String {
    let absolute: PathBuf = if source.is_absolute() {
        source.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(source))
            .unwrap_or_else(|_| source.to_path_buf())
    };
    let escaped = absolute.to_string_lossy().replace('\'', "'\\''");

    let mut body = String::new();
    for _ in 0..repeat {
        body.push_str(&format!("file '{}'\n", escaped));
    }
    body
}

/// Paths named by a concat list body, in order.
pub fn parse_concat_list(body: &str) -> Vec<PathBuf> {
    body.lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("file ")?;
            let inner = rest.trim().strip_prefix('\'')?.strip_suffix('\'')?;
            Some(PathBuf::from(inner.replace("'\\''", "'")))
        })
        .collect()
}

/// Render an argument list as a copy-pasteable command line for the log.
pub fn display_command(program: &str, args: &[String]) -> String {
    let mut out = program.to_string();
    for arg in args {
        out.push(' ');
        if arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || "[]'\"".contains(c)) {
            out.push('"');
            out.push_str(&arg.replace('"', "\\\""));
            out.push('"');
        } else {
            out.push_str(arg);
        }
    }
    out
}
