//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let catalog = config
        .service
        .catalog
        .as_deref()
        .map(path_to_string)
        .unwrap_or_default();

    format!(
        r#"[service]
; Service instance id. Only processes assigned to this instance are run.
instance_id = {}
; Worker threads at startup (0 = one per hardware thread)
threads = {}
; Upper bound on worker threads (0 = no cap)
max_threads = {}
; Milliseconds workers wait before re-checking an unavailable process logger
logger_retry_ms = {}
; Process catalog loaded by `envmon run` (see `envmon check`)
catalog = {}

[watchdog]
; Seconds without progress, with executions pending, before a stall warning
stall_threshold_secs = {}
; Seconds between health checks (0 = disabled)
interval_secs = {}

[logging]
; Log directory (relative paths resolve against the working directory)
directory = {}
; Log file name, truncated at every start
file = {}
"#,
        config.service.instance_id,
        config.service.threads,
        config.service.max_threads,
        config.service.logger_retry_ms,
        catalog,
        config.watchdog.stall_threshold_secs,
        config.watchdog.interval_secs,
        path_to_string(&config.logging.directory),
        config.logging.file,
    )
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
