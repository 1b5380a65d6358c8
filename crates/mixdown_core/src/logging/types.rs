//! Levels, per-job log configuration and line prefixes.

use serde::{Deserialize, Serialize};

use crate::config::LoggingSettings;

/// Severity of a job log line, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lowercase name, as accepted by `EnvFilter` directives.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.trim().to_ascii_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            other => return Err(format!("unknown log level '{}'", other)),
        };
        Ok(level)
    }
}

/// What a [`JobLogger`](super::JobLogger) writes and how.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Lines below this level are dropped.
    pub level: LogLevel,
    /// Hold engine stderr back for the failure tail and throttle progress.
    pub compact: bool,
    /// Progress is logged each time it crosses a multiple of this.
    pub progress_step: u32,
    /// Engine stderr lines kept for the failure tail.
    pub error_tail: usize,
    pub show_timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::from(&LoggingSettings::default())
    }
}

impl From<&LoggingSettings> for LogConfig {
    fn from(settings: &LoggingSettings) -> Self {
        Self {
            level: settings.level,
            compact: settings.compact,
            progress_step: settings.progress_step.max(1),
            error_tail: settings.error_tail as usize,
            show_timestamps: true,
        }
    }
}

/// Callback receiving every formatted log line of a job.
///
/// Lets the collaborator driving a job stream its log (e.g. to a client).
pub type LogSink = Box<dyn Fn(&str) + Send + Sync>;

/// Marker put in front of a job log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagePrefix {
    /// `$ ffmpeg ...`
    Command,
    /// `=== Mix ===`
    Phase,
    /// `--- inputs ---`
    Section,
    Success,
    Warning,
    Error,
}

impl MessagePrefix {
    pub fn format(&self, message: &str) -> String {
        match self {
            MessagePrefix::Command => format!("$ {}", message),
            MessagePrefix::Phase => format!("=== {} ===", message),
            MessagePrefix::Section => format!("--- {} ---", message),
            MessagePrefix::Success => format!("[SUCCESS] {}", message),
            MessagePrefix::Warning => format!("[WARNING] {}", message),
            MessagePrefix::Error => format!("[ERROR] {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parses_and_orders() {
        assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!(LogLevel::Trace.to_string(), "trace");
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn default_config_matches_default_settings() {
        let config = LogConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert!(config.compact);
        assert_eq!(config.error_tail, 20);
    }

    #[test]
    fn config_from_settings_guards_zero_step() {
        let mut settings = LoggingSettings::default();
        settings.progress_step = 0;
        settings.compact = false;
        let config = LogConfig::from(&settings);
        assert_eq!(config.progress_step, 1);
        assert!(!config.compact);
    }

    #[test]
    fn prefixes_format() {
        assert_eq!(MessagePrefix::Phase.format("Probe"), "=== Probe ===");
        assert_eq!(MessagePrefix::Command.format("ffmpeg -i a"), "$ ffmpeg -i a");
    }
}
