//! Logging for Mixdown.
//!
//! Two layers:
//! - [`init_tracing`] installs the process-wide `tracing` subscriber.
//! - [`JobLogger`] writes one log file per job. Lines are tagged with the
//!   running step and copied to an optional sink. In compact mode progress
//!   is throttled and engine stderr is held back until a failure.
//! - [`prune_job_logs`] bounds how many of those files are kept.
//!
//! # Example
//!
//! ```no_run
//! use mixdown_core::logging::{JobLogger, LogConfig};
//!
//! let logger = JobLogger::new("job-1234", "/path/to/logs", LogConfig::default(), None).unwrap();
//!
//! logger.phase("Probe");
//! logger.command("ffprobe -v error -show_entries format=duration ...");
//! logger.progress(50);
//! logger.success("Job completed");
//! ```

mod job_logger;
mod types;

pub use job_logger::JobLogger;
pub use types::{LogConfig, LogLevel, LogSink, MessagePrefix};

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise Mixdown's own targets log at
/// `default_level` and everything else at `warn`. Later calls are ignored.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(default_level)));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .with(filter)
        .try_init();
}

fn default_directives(level: LogLevel) -> String {
    format!("warn,mixdown={}", level.as_str())
}

/// Delete all but the `keep` most recently modified `.log` files in
/// `log_dir`. `keep == 0` disables pruning. Returns how many were deleted.
pub fn prune_job_logs(log_dir: &Path, keep: usize) -> io::Result<usize> {
    if keep == 0 {
        return Ok(0);
    }

    let mut logs: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "log") {
            let modified = entry.metadata()?.modified()?;
            logs.push((modified, path));
        }
    }
    if logs.len() <= keep {
        return Ok(0);
    }

    // Newest first
    logs.sort_by(|a, b| b.cmp(a));
    let mut removed = 0;
    for (_, path) in logs.drain(keep..) {
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}
