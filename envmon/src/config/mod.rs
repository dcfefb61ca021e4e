//! Configuration for envmon services.
//!
//! Two files are involved:
//!
//! - `~/.envmon/config.ini`: service, watchdog and logging settings
//!   ([`ConfigFile`])
//! - the process catalog: projects and processes a host schedules
//!   ([`load_catalog`])
//!
//! # Example
//!
//! ```no_run
//! use envmon::config::{load_catalog, ConfigLocation};
//!
//! let config = ConfigLocation::user().read()?;
//! if let Some(path) = &config.service.catalog {
//!     let catalog = load_catalog(path)?;
//!     println!("{} processes", catalog.entries.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod catalog;
mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use catalog::{load_catalog, parse_catalog_str, Catalog, CatalogEntry, CatalogError};
pub use defaults::*;
pub use file::{ConfigFileError, ConfigLocation, InitOutcome};
pub use settings::{ConfigFile, LoggingSettings, ServiceSettings, WatchdogSettings};
