//! Service configuration.
//!
//! [`ServiceConfig`] is constructed by the host and injected into the
//! [`Service`](super::Service). There is no global service manager.

use crate::config::{
    ConfigFile, DEFAULT_INSTANCE_ID, DEFAULT_LOGGER_RETRY_MS, DEFAULT_STALL_THRESHOLD_SECS,
    DEFAULT_WATCHDOG_INTERVAL_SECS,
};
use crate::model::ServiceInstanceId;
use std::thread;
use std::time::Duration;

// =============================================================================
// Service Configuration
// =============================================================================

/// Configuration for the scheduling core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Physical instance id. Processes owned by other instances are ignored.
    pub instance_id: ServiceInstanceId,

    /// Upper bound on worker threads. `None` means no cap.
    pub max_threads: Option<usize>,

    /// How long workers sleep before re-checking an invalid logger.
    pub logger_retry_interval: Duration,

    /// Time without progress, with work pending, before a stall is reported.
    pub stall_threshold: Duration,

    /// Watchdog check interval. `None` disables the watchdog.
    pub watchdog_interval: Option<Duration>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            instance_id: ServiceInstanceId::new(DEFAULT_INSTANCE_ID),
            max_threads: None,
            logger_retry_interval: Duration::from_millis(DEFAULT_LOGGER_RETRY_MS),
            stall_threshold: Duration::from_secs(DEFAULT_STALL_THRESHOLD_SECS),
            watchdog_interval: Some(Duration::from_secs(DEFAULT_WATCHDOG_INTERVAL_SECS)),
        }
    }
}

impl ServiceConfig {
    pub fn for_instance(instance_id: ServiceInstanceId) -> Self {
        Self {
            instance_id,
            ..Self::default()
        }
    }

    /// Resolves a requested worker count.
    ///
    /// `0` means hardware concurrency (at least 1). The result is clamped to
    /// `max_threads` when a cap is configured.
    pub fn effective_threads(&self, requested: usize) -> usize {
        let threads = if requested == 0 {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            requested
        };
        match self.max_threads {
            Some(max) if max > 0 => threads.min(max),
            _ => threads,
        }
    }
}

impl From<&ConfigFile> for ServiceConfig {
    fn from(file: &ConfigFile) -> Self {
        let service = &file.service;
        let watchdog = &file.watchdog;
        Self {
            instance_id: ServiceInstanceId::new(service.instance_id),
            max_threads: (service.max_threads > 0).then_some(service.max_threads),
            logger_retry_interval: Duration::from_millis(service.logger_retry_ms),
            stall_threshold: Duration::from_secs(watchdog.stall_threshold_secs),
            watchdog_interval: (watchdog.interval_secs > 0)
                .then(|| Duration::from_secs(watchdog.interval_secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_threads_uses_hardware_concurrency() {
        let config = ServiceConfig::default();
        assert!(config.effective_threads(0) >= 1);
        assert_eq!(config.effective_threads(3), 3);
    }

    #[test]
    fn test_thread_cap_applies() {
        let config = ServiceConfig {
            max_threads: Some(2),
            ..ServiceConfig::default()
        };
        assert_eq!(config.effective_threads(8), 2);
        assert_eq!(config.effective_threads(1), 1);
        assert!(config.effective_threads(0) <= 2);
    }

    #[test]
    fn test_from_config_file() {
        let mut file = ConfigFile::default();
        file.service.instance_id = 4;
        file.service.max_threads = 6;
        file.service.logger_retry_ms = 50;
        file.watchdog.interval_secs = 0;

        let config = ServiceConfig::from(&file);
        assert_eq!(config.instance_id, ServiceInstanceId::new(4));
        assert_eq!(config.max_threads, Some(6));
        assert_eq!(config.logger_retry_interval, Duration::from_millis(50));
        assert_eq!(config.watchdog_interval, None);
    }

    #[test]
    fn test_defaults_match_config_file_defaults() {
        assert_eq!(ServiceConfig::from(&ConfigFile::default()), ServiceConfig::default());
    }
}
