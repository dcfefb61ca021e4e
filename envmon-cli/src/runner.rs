//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization and catalog loading
//! to reduce duplication across command handlers.

use crate::error::CliError;
use envmon::config::{load_catalog, Catalog, ConfigFile, ConfigLocation};
use envmon::logging::{init_from_settings, LoggingGuard};
use std::path::{Path, PathBuf};
use tracing::info;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Create a new CLI runner, loading config and initializing logging.
    ///
    /// `config_path` overrides the default `~/.envmon/config.ini`.
    pub fn new(config_path: Option<&Path>) -> Result<Self, CliError> {
        let config = load_config(config_path)?;

        let logging_guard = init_from_settings(&config.logging)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn log_path(&self) -> &Path {
        self.logging_guard.path()
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("envmon v{}", envmon::VERSION);
        info!("envmon CLI: {} command", command);
    }

    /// Load the catalog named on the command line, or the configured one.
    pub fn load_catalog(&self, cli_catalog: Option<PathBuf>) -> Result<(PathBuf, Catalog), CliError> {
        let path = cli_catalog
            .or_else(|| self.config.service.catalog.clone())
            .ok_or_else(|| {
                CliError::Config(
                    "No process catalog configured. \
                     Set service.catalog in config.ini or use --catalog"
                        .to_string(),
                )
            })?;
        let catalog = read_catalog(&path)?;
        info!(
            path = %path.display(),
            projects = catalog.projects.len(),
            processes = catalog.entries.len(),
            "Catalog loaded"
        );
        Ok((path, catalog))
    }
}

/// Load the configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let location = match path {
        Some(path) => {
            let location = ConfigLocation::at(path);
            if !location.exists() {
                return Err(CliError::Config(format!(
                    "Configuration file does not exist: {}",
                    path.display()
                )));
            }
            location
        }
        None => ConfigLocation::user(),
    };
    Ok(location.read()?)
}

/// Load a catalog, attaching the path to any error.
pub fn read_catalog(path: &Path) -> Result<Catalog, CliError> {
    load_catalog(path).map_err(|error| CliError::Catalog {
        path: path.to_path_buf(),
        error,
    })
}
