//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`check`] - Catalog validation and next fire times
//! - [`config`] - Configuration management (path, show, init)
//! - [`run`] - Main command (schedule and run the catalog)

pub mod check;
pub mod config;
pub mod run;
