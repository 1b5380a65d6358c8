//! Reading, writing and repairing the settings file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml_edit::{DocumentMut, Item};

use super::settings::{ConfigSection, Settings};
use crate::models::ErrorKind;

/// Errors from loading or writing settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not valid settings TOML: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot encode settings: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("cannot edit {}: {source}", .path.display())]
    Edit {
        path: PathBuf,
        #[source]
        source: toml_edit::TomlError,
    },

    #[error("settings file {} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::Io { .. } | ConfigError::Encode(_) => ErrorKind::EncodeError,
            ConfigError::Parse { .. }
            | ConfigError::Edit { .. }
            | ConfigError::NotFound(_)
            | ConfigError::Invalid(_) => ErrorKind::InvalidInput,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Owns the settings file and the [`Settings`] loaded from it.
///
/// Whole-file saves regenerate the section comments; [`update_section`]
/// replaces one table and leaves the rest of the document as the user
/// wrote it. Every write goes through a sibling temp file and a rename.
///
/// [`update_section`]: ConfigManager::update_section
pub struct ConfigManager {
    path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Nothing is read until [`load`](Self::load) or
    /// [`load_or_create`](Self::load_or_create).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settings: Settings::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// In-memory only until [`save`](Self::save) or
    /// [`update_section`](Self::update_section).
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Load an existing file. Missing keys take their defaults.
    pub fn load(&mut self) -> ConfigResult<()> {
        let content = self
            .read_file()?
            .ok_or_else(|| ConfigError::NotFound(self.path.clone()))?;
        self.settings = self.parse(&content)?;
        Ok(())
    }

    /// Load the file, or write one with defaults when there is none.
    ///
    /// A file with missing keys or unknown sections is rewritten in full.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        match self.read_file()? {
            Some(content) => {
                self.settings = self.parse(&content)?;
                if self.needs_rewrite(&content)? {
                    tracing::info!("Completing settings file {}", self.path.display());
                    self.save()?;
                }
            }
            None => {
                self.settings = Settings::default();
                tracing::info!("Writing default settings to {}", self.path.display());
                self.save()?;
            }
        }
        Ok(())
    }

    /// Create the uploads, outputs, work and logs directories.
    pub fn ensure_dirs_exist(&self) -> ConfigResult<()> {
        let paths = &self.settings.paths;
        for dir in [
            paths.uploads_dir(),
            paths.outputs_dir(),
            paths.work_dir(),
            paths.logs_dir(),
        ] {
            fs::create_dir_all(&dir).map_err(|source| ConfigError::Io { path: dir, source })?;
        }
        Ok(())
    }

    /// Write every section, with its comment, replacing the file.
    pub fn save(&self) -> ConfigResult<()> {
        self.settings.validate().map_err(ConfigError::Invalid)?;
        let content = self.render()?;
        self.write_atomically(&content)
    }

    /// Replace one section of the file on disk with the in-memory values.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        self.settings.validate().map_err(ConfigError::Invalid)?;

        let mut doc = match self.read_file()? {
            Some(content) => self.edit_doc(&content)?,
            None => DocumentMut::new(),
        };
        let table = self.edit_doc(&self.section_toml(section)?)?;
        doc.insert(section.table_name(), Item::Table(table.as_table().clone()));

        self.write_atomically(&doc.to_string())
    }

    fn read_file(&self) -> ConfigResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn parse(&self, content: &str) -> ConfigResult<Settings> {
        let settings: Settings = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })?;
        settings.validate().map_err(ConfigError::Invalid)?;
        Ok(settings)
    }

    fn edit_doc(&self, content: &str) -> ConfigResult<DocumentMut> {
        content.parse().map_err(|source| ConfigError::Edit {
            path: self.path.clone(),
            source,
        })
    }

    /// True when the file lacks a key the current settings would write,
    /// or carries a top-level entry that is not a known section.
    fn needs_rewrite(&self, content: &str) -> ConfigResult<bool> {
        let on_disk = self.edit_doc(content)?;

        let unknown: Vec<&str> = on_disk
            .iter()
            .map(|(key, _)| key)
            .filter(|key| ConfigSection::from_table_name(key).is_none())
            .collect();
        if !unknown.is_empty() {
            tracing::warn!(
                "Dropping unknown entries from {}: {}",
                self.path.display(),
                unknown.join(", ")
            );
            return Ok(true);
        }

        for section in ConfigSection::ALL {
            let expected = self.edit_doc(&self.section_toml(section)?)?;
            let Some(present) = on_disk
                .get(section.table_name())
                .and_then(Item::as_table)
            else {
                return Ok(true);
            };
            if expected.iter().any(|(key, _)| !present.contains_key(key)) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// One section's keys, without the table header.
    fn section_toml(&self, section: ConfigSection) -> ConfigResult<String> {
        let s = &self.settings;
        let body = match section {
            ConfigSection::Paths => toml::to_string_pretty(&s.paths)?,
            ConfigSection::Engine => toml::to_string_pretty(&s.engine)?,
            ConfigSection::Mix => toml::to_string_pretty(&s.mix)?,
            ConfigSection::Cleanup => toml::to_string_pretty(&s.cleanup)?,
            ConfigSection::Logging => toml::to_string_pretty(&s.logging)?,
        };
        Ok(body)
    }

    fn render(&self) -> ConfigResult<String> {
        let mut out = String::from("# Mixdown settings\n");
        out.push_str("# Regenerated on save; single-section updates keep edits elsewhere.\n");
        for section in ConfigSection::ALL {
            out.push('\n');
            out.push_str(section.comment());
            out.push('\n');
            out.push_str(&format!("[{}]\n", section.table_name()));
            out.push_str(&self.section_toml(section)?);
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }
        Ok(out)
    }

    /// Write beside the target, fsync, then rename over it.
    fn write_atomically(&self, content: &str) -> ConfigResult<()> {
        let io_err = |source: io::Error| ConfigError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let staging = self.path.with_extension("toml.tmp");
        let mut file = fs::File::create(&staging).map_err(io_err)?;
        file.write_all(content.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        fs::rename(&staging, &self.path).map_err(io_err)
    }
}
