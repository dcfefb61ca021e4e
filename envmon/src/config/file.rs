//! Locating, reading and writing the service configuration file.
//!
//! A [`ConfigLocation`] names one `config.ini`. Reading a location that has
//! no file yields the defaults, so a fresh install runs without setup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use super::defaults::{CONFIG_DIR_NAME, CONFIG_FILE_NAME};
use super::parser::parse_ini;
use super::settings::ConfigFile;
use super::writer::to_config_string;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// What [`ConfigLocation::init`] did to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// No file existed; the defaults were written.
    Created,
    /// An existing file was overwritten with the defaults.
    Replaced,
    /// An existing file was left untouched.
    Kept,
}

/// Path of one configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    path: PathBuf,
}

impl Default for ConfigLocation {
    fn default() -> Self {
        Self::user()
    }
}

impl ConfigLocation {
    /// `~/.envmon/config.ini`, relative to the working directory when there
    /// is no home directory.
    pub fn user() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::at(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Overlays the file on the defaults. A missing file yields the defaults.
    pub fn read(&self) -> Result<ConfigFile, ConfigFileError> {
        if !self.exists() {
            return Ok(ConfigFile::default());
        }
        let ini = Ini::load_from_file(&self.path).map_err(|source| ConfigFileError::Read {
            path: self.path.clone(),
            source,
        })?;
        parse_ini(&ini)
    }

    /// Writes `config` as commented INI, creating missing directories.
    pub fn write(&self, config: &ConfigFile) -> Result<(), ConfigFileError> {
        let write_error = |source| ConfigFileError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        fs::write(&self.path, to_config_string(config)).map_err(write_error)
    }

    /// Writes the default configuration. An existing file is only replaced
    /// when `overwrite` is set.
    pub fn init(&self, overwrite: bool) -> Result<InitOutcome, ConfigFileError> {
        let outcome = match (self.exists(), overwrite) {
            (true, false) => return Ok(InitOutcome::Kept),
            (true, true) => InitOutcome::Replaced,
            (false, _) => InitOutcome::Created,
        };
        self.write(&ConfigFile::default())?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_reads_as_defaults() {
        let temp = TempDir::new().unwrap();
        let location = ConfigLocation::at(temp.path().join("absent.ini"));

        assert!(!location.exists());
        assert_eq!(location.read().unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_write_creates_directories_and_reads_back() {
        let temp = TempDir::new().unwrap();
        let location = ConfigLocation::at(temp.path().join("nested").join("config.ini"));

        let mut config = ConfigFile::default();
        config.service.threads = 6;
        location.write(&config).unwrap();

        assert!(location.exists());
        assert_eq!(location.read().unwrap().service.threads, 6);
    }

    #[test]
    fn test_init_keeps_existing_file_unless_overwriting() {
        let temp = TempDir::new().unwrap();
        let location = ConfigLocation::at(temp.path().join("config.ini"));

        assert_eq!(location.init(false).unwrap(), InitOutcome::Created);

        fs::write(location.path(), "[service]\nthreads = 9\n").unwrap();
        assert_eq!(location.init(false).unwrap(), InitOutcome::Kept);
        assert_eq!(location.read().unwrap().service.threads, 9);

        assert_eq!(location.init(true).unwrap(), InitOutcome::Replaced);
        assert_eq!(location.read().unwrap(), ConfigFile::default());
    }

    #[test]
    fn test_invalid_value_names_section_and_key() {
        let temp = TempDir::new().unwrap();
        let location = ConfigLocation::at(temp.path().join("config.ini"));
        fs::write(location.path(), "[watchdog]\ninterval_secs = -1\n").unwrap();

        let err = location.read().unwrap_err();
        assert!(err.to_string().contains("watchdog.interval_secs"));
    }

    #[test]
    fn test_write_error_names_path() {
        let temp = TempDir::new().unwrap();
        // A directory where the file should be.
        let location = ConfigLocation::at(temp.path());

        let err = location.write(&ConfigFile::default()).unwrap_err();
        assert!(matches!(err, ConfigFileError::Write { .. }));
        assert!(err.to_string().contains(&temp.path().display().to_string()));
    }

    #[test]
    fn test_user_location_is_under_home() {
        assert!(ConfigLocation::user()
            .path()
            .ends_with(".envmon/config.ini"));
    }
}
