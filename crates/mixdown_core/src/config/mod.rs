//! The `mixdown.toml` settings file.
//!
//! [`Settings`] holds one table per [`ConfigSection`]; [`ConfigManager`]
//! creates the file with defaults, fills in keys added since it was
//! written and rewrites single sections without touching the others.
//!
//! ```no_run
//! use mixdown_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new("mixdown.toml");
//! config.load_or_create()?;
//! config.ensure_dirs_exist()?;
//!
//! config.settings_mut().mix.output_bitrate_kbps = 192;
//! config.update_section(ConfigSection::Mix)?;
//! # Ok::<(), mixdown_core::config::ConfigError>(())
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    CleanupSettings, ConfigSection, EngineSettings, LoggingSettings, MixSettings, PathSettings,
    Settings,
};
