//! Per-job log file.
//!
//! Every job writes `<logs>/<job_id>.log`. Lines are tagged with the step
//! that was running when they were written, copied to an optional sink and
//! mirrored to `tracing` under the `mixdown::job` target. Engine stderr is
//! held back in a tail buffer and only written out when an invocation fails
//! (or always, outside compact mode).

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogConfig, LogLevel, LogSink, MessagePrefix};

/// Logger owned by one mix job.
///
/// Shared between the pipeline steps and the engine through `Arc`; all
/// methods take `&self`.
pub struct JobLogger {
    job_id: String,
    log_path: PathBuf,
    config: LogConfig,
    started: Instant,
    sink: Option<LogSink>,
    state: Mutex<LogState>,
}

struct LogState {
    writer: Option<BufWriter<File>>,
    step: Option<String>,
    progress_bucket: Option<u32>,
    tail: VecDeque<String>,
}

impl JobLogger {
    /// Create the log file for `job_id` inside `log_dir`.
    pub fn new(
        job_id: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        sink: Option<LogSink>,
    ) -> std::io::Result<Self> {
        let job_id = job_id.into();
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&job_id)));
        let writer = BufWriter::new(File::create(&log_path)?);

        Ok(Self {
            state: Mutex::new(LogState {
                writer: Some(writer),
                step: None,
                progress_bucket: None,
                tail: VecDeque::with_capacity(config.error_tail),
            }),
            job_id,
            log_path,
            config,
            started: Instant::now(),
            sink,
        })
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Write `message` if `level` passes the configured threshold.
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }
        self.mirror(level, message);
        self.write_line(message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    /// Log an engine command line.
    pub fn command(&self, command: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Command.format(command));
    }

    /// Mark the start of a pipeline step. Later lines carry its name.
    pub fn phase(&self, step: &str) {
        {
            let mut state = self.state.lock();
            state.step = Some(step.to_string());
            state.tail.clear();
        }
        self.log(LogLevel::Info, &MessagePrefix::Phase.format(step));
    }

    /// Mark a sub-stage within the current step.
    pub fn section(&self, name: &str) {
        self.log(LogLevel::Debug, &MessagePrefix::Section.format(name));
    }

    /// Log job progress.
    ///
    /// In compact mode only the first value in each `progress_step` bucket
    /// is written. Returns whether the line was written.
    pub fn progress(&self, percent: u32) -> bool {
        let percent = percent.min(100);
        if self.config.compact {
            let bucket = percent / self.config.progress_step.max(1);
            let mut state = self.state.lock();
            if state.progress_bucket == Some(bucket) {
                return false;
            }
            state.progress_bucket = Some(bucket);
        }
        self.info(&format!("Progress: {}%", percent));
        true
    }

    /// Record the stderr of one engine invocation.
    ///
    /// The tail buffer afterwards holds the last `error_tail` lines of this
    /// invocation only. Outside compact mode every line is also logged.
    pub fn engine_output(&self, tool: &str, stderr: &str) {
        let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
        {
            let mut state = self.state.lock();
            state.tail.clear();
            let keep = self.config.error_tail;
            let skip = lines.len().saturating_sub(keep);
            state
                .tail
                .extend(lines.iter().skip(skip).map(|l| l.to_string()));
        }

        if !self.config.compact {
            for line in lines {
                self.write_line(&format!("[{}] {}", tool, line));
            }
        }
    }

    /// Write the tail buffer under a header naming `tool`.
    pub fn dump_tail(&self, tool: &str) {
        let tail = self.tail();
        if tail.is_empty() {
            return;
        }
        self.write_line(&format!("[{} stderr, last {} lines]", tool, tail.len()));
        for line in &tail {
            self.write_line(&format!("  {}", line));
        }
    }

    /// Lines currently held in the tail buffer.
    pub fn tail(&self) -> Vec<String> {
        self.state.lock().tail.iter().cloned().collect()
    }

    /// Log an engine argument vector one argument per line.
    pub fn log_engine_args(&self, tool: &str, args: &[String]) {
        self.debug(&format!("{} arguments:", tool));
        for (i, arg) in args.iter().enumerate() {
            self.debug(&format!("  [{:2}] {}", i, arg));
        }
    }

    pub fn flush(&self) {
        if let Some(writer) = self.state.lock().writer.as_mut() {
            let _ = writer.flush();
        }
    }

    /// Flush and close the file. Later lines only reach the sink.
    pub fn close(&self) {
        if let Some(mut writer) = self.state.lock().writer.take() {
            let _ = writer.flush();
        }
    }

    fn write_line(&self, message: &str) {
        let line = {
            let mut state = self.state.lock();
            let line = self.format_line(state.step.as_deref(), message);
            if let Some(writer) = state.writer.as_mut() {
                let _ = writeln!(writer, "{}", line);
            }
            line
        };

        if let Some(sink) = &self.sink {
            sink(&line);
        }
    }

    fn format_line(&self, step: Option<&str>, message: &str) -> String {
        let mut line = String::with_capacity(message.len() + 32);
        if self.config.show_timestamps {
            line.push_str(&format!(
                "[{} +{:.1}s] ",
                Local::now().format("%H:%M:%S"),
                self.started.elapsed().as_secs_f64()
            ));
        }
        if let Some(step) = step {
            if !message.starts_with("===") {
                line.push_str(&format!("[{}] ", step));
            }
        }
        line.push_str(message);
        line
    }

    fn mirror(&self, level: LogLevel, message: &str) {
        let job = self.job_id.as_str();
        match level {
            LogLevel::Trace => tracing::trace!(target: "mixdown::job", job, "{}", message),
            LogLevel::Debug => tracing::debug!(target: "mixdown::job", job, "{}", message),
            LogLevel::Info => tracing::info!(target: "mixdown::job", job, "{}", message),
            LogLevel::Warn => tracing::warn!(target: "mixdown::job", job, "{}", message),
            LogLevel::Error => tracing::error!(target: "mixdown::job", job, "{}", message),
        }
    }
}

impl Drop for JobLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Replace characters that are not allowed in file names.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn read_log(logger: &JobLogger) -> String {
        logger.flush();
        fs::read_to_string(logger.log_path()).unwrap()
    }

    #[test]
    fn log_file_is_named_after_job() {
        let dir = tempdir().unwrap();
        let logger = JobLogger::new("3f2a-job", dir.path(), LogConfig::default(), None).unwrap();
        assert_eq!(logger.log_path(), dir.path().join("3f2a-job.log"));
        assert!(logger.log_path().exists());
    }

    #[test]
    fn lines_carry_the_current_step() {
        let dir = tempdir().unwrap();
        let logger = JobLogger::new("job", dir.path(), LogConfig::default(), None).unwrap();

        logger.info("before any step");
        logger.phase("Probe");
        logger.info("primary input: 3.000s");

        let content = read_log(&logger);
        assert!(content.contains("] before any step"));
        assert!(content.contains("=== Probe ==="));
        assert!(!content.contains("[Probe] === Probe"));
        assert!(content.contains("[Probe] primary input: 3.000s"));
    }

    #[test]
    fn level_threshold_filters() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            level: LogLevel::Warn,
            ..LogConfig::default()
        };
        let logger = JobLogger::new("quiet", dir.path(), config, None).unwrap();

        logger.info("hidden");
        logger.warn("shown");

        let content = read_log(&logger);
        assert!(!content.contains("hidden"));
        assert!(content.contains("[WARNING] shown"));
    }

    #[test]
    fn sink_receives_formatted_lines() {
        let dir = tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let sink: LogSink = Box::new(move |line| captured.lock().push(line.to_string()));

        let logger = JobLogger::new("job", dir.path(), LogConfig::default(), Some(sink)).unwrap();
        logger.phase("Mix");
        logger.success("done");

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].contains("[Mix] [SUCCESS] done"));
    }

    #[test]
    fn compact_progress_logs_once_per_bucket() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            compact: true,
            progress_step: 25,
            ..LogConfig::default()
        };
        let logger = JobLogger::new("job", dir.path(), config, None).unwrap();

        assert!(logger.progress(0));
        assert!(!logger.progress(10));
        assert!(logger.progress(25));
        assert!(!logger.progress(40));
        assert!(logger.progress(75));
        assert!(logger.progress(100));
        assert!(!logger.progress(100));
    }

    #[test]
    fn tail_keeps_end_of_latest_invocation() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            error_tail: 3,
            ..LogConfig::default()
        };
        let logger = JobLogger::new("job", dir.path(), config, None).unwrap();

        logger.engine_output("ffprobe", "old line\n");
        let stderr: String = (0..6).map(|i| format!("line {}\n\n", i)).collect();
        logger.engine_output("ffmpeg", &stderr);

        assert_eq!(logger.tail(), vec!["line 3", "line 4", "line 5"]);
    }

    #[test]
    fn compact_mode_only_writes_stderr_on_dump() {
        let dir = tempdir().unwrap();
        let logger = JobLogger::new("job", dir.path(), LogConfig::default(), None).unwrap();

        logger.engine_output("ffmpeg", "Invalid data found when processing input\n");
        assert!(!read_log(&logger).contains("Invalid data"));

        logger.dump_tail("ffmpeg");
        let content = read_log(&logger);
        assert!(content.contains("[ffmpeg stderr, last 1 lines]"));
        assert!(content.contains("  Invalid data found"));
    }

    #[test]
    fn verbose_mode_writes_stderr_immediately() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            compact: false,
            ..LogConfig::default()
        };
        let logger = JobLogger::new("job", dir.path(), config, None).unwrap();

        logger.engine_output("ffmpeg", "size=  128kB time=00:00:03.00\n");
        assert!(read_log(&logger).contains("[ffmpeg] size=  128kB"));
    }

    #[test]
    fn closed_logger_still_feeds_sink() {
        let dir = tempdir().unwrap();
        let count = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&count);
        let sink: LogSink = Box::new(move |_| *counter.lock() += 1);

        let logger = JobLogger::new("job", dir.path(), LogConfig::default(), Some(sink)).unwrap();
        logger.close();
        logger.info("after close");

        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn sanitizes_filename() {
        assert_eq!(sanitize_filename("normal-name"), "normal-name");
        assert_eq!(sanitize_filename("has/slash"), "has_slash");
        assert_eq!(sanitize_filename("a<b>c"), "a_b_c");
    }
}
