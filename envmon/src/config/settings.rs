//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

/// Complete service configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    /// Scheduling core settings
    pub service: ServiceSettings,
    /// Stall watchdog settings
    pub watchdog: WatchdogSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// `[service]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Physical instance id; only processes owned by it are run
    pub instance_id: u32,
    /// Worker threads at startup (0 = hardware concurrency)
    pub threads: usize,
    /// Upper bound on worker threads (0 = no cap)
    pub max_threads: usize,
    /// Pause between logger validity checks while it is unavailable
    pub logger_retry_ms: u64,
    /// Process catalog to load at startup
    pub catalog: Option<PathBuf>,
}

/// `[watchdog]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogSettings {
    /// Seconds without progress, with work pending, before warning
    pub stall_threshold_secs: u64,
    /// Seconds between checks (0 = disabled)
    pub interval_secs: u64,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Directory for log files
    pub directory: PathBuf,
    /// Log file name
    pub file: String,
}
