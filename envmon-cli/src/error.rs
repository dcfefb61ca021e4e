//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use envmon::config::{CatalogError, ConfigFileError};
use envmon::scheduler::ServiceError;
use std::fmt;
use std::path::PathBuf;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Configuration file could not be read or written
    ConfigFile(ConfigFileError),
    /// Process catalog could not be loaded
    Catalog { path: PathBuf, error: CatalogError },
    /// Catalog loaded but some processes can never run
    InvalidProcesses { count: usize },
    /// Scheduling service failed
    Service(ServiceError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Catalog { .. } => {
                eprintln!();
                eprintln!("Catalog sections look like:");
                eprintln!("  [project.1]");
                eprintln!("  name = rivers");
                eprintln!();
                eprintln!("  [process.10]");
                eprintln!("  project = 1");
                eprintln!("  frequency = 15");
                eprintln!("  frequency_unit = minute");
                eprintln!("  command = ./collect.sh");
            }
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Run 'envmon config init' to create a default configuration.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Catalog { path, error } => {
                write!(f, "Invalid catalog '{}': {}", path.display(), error)
            }
            CliError::InvalidProcesses { count } => {
                write!(f, "{} process(es) have an unusable schedule", count)
            }
            CliError::Service(e) => write!(f, "Service error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Catalog { error, .. } => Some(error),
            CliError::Service(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<ServiceError> for CliError {
    fn from(e: ServiceError) -> Self {
        CliError::Service(e)
    }
}
