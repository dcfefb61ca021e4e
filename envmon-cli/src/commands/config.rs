//! Configuration management CLI commands.
//!
//! Provides `config path`, `config show` and `config init` for viewing and
//! creating the configuration file from the command line.

use std::path::PathBuf;

use clap::Subcommand;
use envmon::config::{ConfigFile, ConfigLocation, InitOutcome};

use crate::error::CliError;
use crate::runner::load_config;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration (file values over defaults)
    Show {
        /// Configuration file (default: ~/.envmon/config.ini)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create the configuration file with default values
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(),
        ConfigCommands::Show { config } => run_show(config),
        ConfigCommands::Init { force } => run_init(force),
    }
}

/// Show the configuration file path.
fn run_path() -> Result<(), CliError> {
    println!("{}", ConfigLocation::user().path().display());
    Ok(())
}

/// Show the effective configuration.
fn run_show(path: Option<PathBuf>) -> Result<(), CliError> {
    let config = load_config(path.as_deref())?;

    println!("Configuration Settings");
    println!("======================");
    println!();
    for (section, entries) in settings(&config) {
        println!("[{}]", section);
        for (key, value) in entries {
            if value.is_empty() {
                println!("  {} = (not set)", key);
            } else {
                println!("  {} = {}", key, value);
            }
        }
        println!();
    }
    Ok(())
}

/// Create the configuration file.
fn run_init(force: bool) -> Result<(), CliError> {
    let location = ConfigLocation::user();
    let path = location.path().display();
    match location.init(force)? {
        InitOutcome::Created => println!("Wrote default configuration: {}", path),
        InitOutcome::Replaced => println!("Replaced configuration with defaults: {}", path),
        InitOutcome::Kept => {
            println!("Configuration already exists: {}", path);
            println!("Use --force to overwrite it with defaults.");
        }
    }
    Ok(())
}

type Section = (&'static str, Vec<(&'static str, String)>);

/// Flattens the configuration into printable sections.
fn settings(config: &ConfigFile) -> Vec<Section> {
    let service = &config.service;
    let watchdog = &config.watchdog;
    let logging = &config.logging;
    vec![
        (
            "service",
            vec![
                ("instance_id", service.instance_id.to_string()),
                ("threads", service.threads.to_string()),
                ("max_threads", service.max_threads.to_string()),
                ("logger_retry_ms", service.logger_retry_ms.to_string()),
                (
                    "catalog",
                    service
                        .catalog
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default(),
                ),
            ],
        ),
        (
            "watchdog",
            vec![
                (
                    "stall_threshold_secs",
                    watchdog.stall_threshold_secs.to_string(),
                ),
                ("interval_secs", watchdog.interval_secs.to_string()),
            ],
        ),
        (
            "logging",
            vec![
                ("directory", logging.directory.display().to_string()),
                ("file", logging.file.clone()),
            ],
        ),
    ]
}
