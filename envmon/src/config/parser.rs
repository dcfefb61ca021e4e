//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [service] section
    if let Some(section) = ini.section(Some("service")) {
        if let Some(v) = section.get("instance_id") {
            config.service.instance_id = parse_number("service", "instance_id", v)?;
            if config.service.instance_id == 0 {
                return Err(invalid("service", "instance_id", v, "must be at least 1"));
            }
        }
        if let Some(v) = section.get("threads") {
            config.service.threads = parse_number("service", "threads", v)?;
        }
        if let Some(v) = section.get("max_threads") {
            config.service.max_threads = parse_number("service", "max_threads", v)?;
        }
        if let Some(v) = section.get("logger_retry_ms") {
            config.service.logger_retry_ms = parse_number("service", "logger_retry_ms", v)?;
            if config.service.logger_retry_ms == 0 {
                return Err(invalid("service", "logger_retry_ms", v, "must be positive"));
            }
        }
        if let Some(v) = section.get("catalog") {
            let v = v.trim();
            if !v.is_empty() {
                config.service.catalog = Some(expand_tilde(v));
            }
        }
    }

    // [watchdog] section
    if let Some(section) = ini.section(Some("watchdog")) {
        if let Some(v) = section.get("stall_threshold_secs") {
            config.watchdog.stall_threshold_secs =
                parse_number("watchdog", "stall_threshold_secs", v)?;
        }
        if let Some(v) = section.get("interval_secs") {
            config.watchdog.interval_secs = parse_number("watchdog", "interval_secs", v)?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

fn parse_number<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "expected a non-negative integer"))
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a boolean config value.
pub(super) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
