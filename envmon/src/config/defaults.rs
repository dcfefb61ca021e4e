//! Default values and constants for all configuration settings.

use std::path::PathBuf;

use super::settings::*;

/// Directory under the home directory holding `config.ini`.
pub const CONFIG_DIR_NAME: &str = ".envmon";

pub const CONFIG_FILE_NAME: &str = "config.ini";

pub const DEFAULT_INSTANCE_ID: u32 = 1;

/// 0 = one worker per hardware thread.
pub const DEFAULT_THREADS: usize = 0;

/// 0 = no cap.
pub const DEFAULT_MAX_THREADS: usize = 0;

pub const DEFAULT_LOGGER_RETRY_MS: u64 = 500;

pub const DEFAULT_STALL_THRESHOLD_SECS: u64 = 300;

pub const DEFAULT_WATCHDOG_INTERVAL_SECS: u64 = 30;

pub const DEFAULT_LOG_DIR: &str = "logs";

pub const DEFAULT_LOG_FILE: &str = "envmon.log";

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            service: ServiceSettings {
                instance_id: DEFAULT_INSTANCE_ID,
                threads: DEFAULT_THREADS,
                max_threads: DEFAULT_MAX_THREADS,
                logger_retry_ms: DEFAULT_LOGGER_RETRY_MS,
                catalog: None,
            },
            watchdog: WatchdogSettings {
                stall_threshold_secs: DEFAULT_STALL_THRESHOLD_SECS,
                interval_secs: DEFAULT_WATCHDOG_INTERVAL_SECS,
            },
            logging: LoggingSettings {
                directory: PathBuf::from(DEFAULT_LOG_DIR),
                file: DEFAULT_LOG_FILE.to_string(),
            },
        }
    }
}
