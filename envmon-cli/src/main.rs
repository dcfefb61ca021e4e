//! envmon CLI - Command-line host for the envmon scheduling service
//!
//! This binary loads a process catalog, schedules its processes and runs
//! their commands until interrupted.

mod command_runner;
mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::config::ConfigCommands;

#[derive(Parser)]
#[command(name = "envmon")]
#[command(version = envmon::VERSION)]
#[command(about = "Schedule and run environmental monitoring processes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduling service until Ctrl+C
    Run {
        /// Configuration file (default: ~/.envmon/config.ini)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Process catalog (overrides service.catalog from the config)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Worker threads (0 = one per hardware thread)
        #[arg(long)]
        threads: Option<usize>,
    },

    /// Validate a process catalog and show when each process fires next
    Check {
        /// Process catalog to validate
        catalog: PathBuf,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            catalog,
            threads,
        } => commands::run::run(commands::run::RunArgs {
            config,
            catalog,
            threads,
        }),
        Commands::Check { catalog } => commands::check::run(&catalog),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
