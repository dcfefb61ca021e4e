//! Process catalog files.
//!
//! A catalog declares the projects and processes a host service schedules.
//! Each project and process is one INI section keyed by its numeric id:
//!
//! ```ini
//! [project.1]
//! name = rivers
//!
//! [process.10]
//! name = gauge-collector
//! project = 1
//! instance = 1
//! frequency = 15
//! frequency_unit = minute
//! command = /opt/envmon/bin/collect-gauges
//!
//! [process.11]
//! project = 1
//! schedule_time = 06:30
//! schedule_unit = week
//! schedule = 1
//!
//! [process.12]
//! project = 1
//! frequency = 1
//! frequency_unit = day
//! reprocess_start = 2024-01-01
//! reprocess_end = 2024-01-31
//! ```
//!
//! Schedules are checked for syntax only. Cadence rules (exactly one of
//! `frequency` or `schedule_time`) are enforced when the process is scheduled
//! so that one bad process does not prevent the others from loading.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use ini::{Ini, Properties};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use super::defaults::DEFAULT_INSTANCE_ID;
use super::parser::parse_bool;
use crate::model::{
    parse_time_of_day, Process, ProcessId, Project, ProjectId, ReprocessingWindow, Schedule,
    ServiceInstanceId, TimeUnit,
};

/// Catalog loading errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Failed to read catalog file
    #[error("Failed to read catalog: {0}")]
    ReadError(#[from] ini::Error),

    /// Section name is neither `project.<id>` nor `process.<id>`
    #[error("Invalid catalog section [{0}]: expected project.<id> or process.<id>")]
    InvalidSection(String),

    /// Invalid value for a known key
    #[error("Invalid catalog value: [{section}] {key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Required key is missing
    #[error("Missing key '{key}' in catalog section [{section}]")]
    MissingKey { section: String, key: String },

    /// A process points at a project that is not declared
    #[error("Process {process} references undeclared project {project}")]
    UnknownProject {
        process: ProcessId,
        project: ProjectId,
    },
}

/// One process declaration with its host-specific command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub process: Process,
    /// Program the host runs for each execution, if any.
    pub command: Option<String>,
}

/// Parsed catalog, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub projects: Vec<Project>,
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.entries.iter().map(|entry| &entry.process)
    }

    pub fn entry(&self, id: ProcessId) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| entry.process.id == id)
    }
}

/// Loads and validates a catalog file.
pub fn load_catalog(path: &Path) -> Result<Catalog, CatalogError> {
    let ini = Ini::load_from_file(path)?;
    parse_catalog(&ini)
}

/// Parses a catalog from INI text.
pub fn parse_catalog_str(content: &str) -> Result<Catalog, CatalogError> {
    let ini = Ini::load_from_str(content).map_err(|e| CatalogError::ReadError(ini::Error::Parse(e)))?;
    parse_catalog(&ini)
}

fn parse_catalog(ini: &Ini) -> Result<Catalog, CatalogError> {
    let mut catalog = Catalog::default();

    for (name, properties) in ini.iter() {
        let Some(name) = name else {
            continue;
        };
        match name.split_once('.') {
            Some(("project", id)) => {
                let id = parse_value(name, "id", id)?;
                catalog.projects.push(parse_project(name, ProjectId::new(id), properties)?);
            }
            Some(("process", id)) => {
                let id = parse_value(name, "id", id)?;
                catalog.entries.push(parse_process(name, ProcessId::new(id), properties)?);
            }
            _ => return Err(CatalogError::InvalidSection(name.to_string())),
        }
    }

    let declared: HashSet<ProjectId> = catalog.projects.iter().map(|p| p.id).collect();
    if let Some(orphan) = catalog
        .entries
        .iter()
        .find(|entry| !declared.contains(&entry.process.project_id))
    {
        return Err(CatalogError::UnknownProject {
            process: orphan.process.id,
            project: orphan.process.project_id,
        });
    }

    catalog.projects.sort_by_key(|p| p.id);
    catalog.entries.sort_by_key(|e| e.process.id);
    Ok(catalog)
}

fn parse_project(section: &str, id: ProjectId, props: &Properties) -> Result<Project, CatalogError> {
    let mut project = Project::new(id, props.get("name").unwrap_or(section).trim());
    if let Some(v) = props.get("active") {
        project.active = parse_flag(section, "active", v)?;
    }
    Ok(project)
}

fn parse_process(
    section: &str,
    id: ProcessId,
    props: &Properties,
) -> Result<CatalogEntry, CatalogError> {
    let project = props.get("project").ok_or_else(|| CatalogError::MissingKey {
        section: section.to_string(),
        key: "project".to_string(),
    })?;
    let project = ProjectId::new(parse_value(section, "project", project)?);

    let instance = match props.get("instance") {
        Some(v) => parse_value(section, "instance", v)?,
        None => DEFAULT_INSTANCE_ID,
    };

    let mut process = Process::new(
        id,
        project,
        ServiceInstanceId::new(instance),
        parse_schedule(section, props)?,
    );
    if let Some(name) = props.get("name") {
        process.name = name.trim().to_string();
    }
    if let Some(v) = props.get("active") {
        process.active = parse_flag(section, "active", v)?;
    }

    let command = props
        .get("command")
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    Ok(CatalogEntry { process, command })
}

fn parse_schedule(section: &str, props: &Properties) -> Result<Schedule, CatalogError> {
    let mut schedule = Schedule::default();

    if let Some(v) = props.get("frequency") {
        schedule.frequency = parse_value(section, "frequency", v)?;
        schedule.frequency_unit = TimeUnit::Minute;
    }
    if let Some(v) = props.get("frequency_unit") {
        schedule.frequency_unit = parse_value(section, "frequency_unit", v)?;
    }
    if let Some(v) = props.get("schedule") {
        schedule.schedule = parse_value(section, "schedule", v)?;
    }
    if let Some(v) = props.get("schedule_time") {
        let time = parse_time_of_day(v)
            .map_err(|e| invalid(section, "schedule_time", v, &e.to_string()))?;
        schedule.schedule_time = Some(time);
    }
    if let Some(v) = props.get("schedule_unit") {
        schedule.schedule_unit = parse_value(section, "schedule_unit", v)?;
    }

    match (props.get("reprocess_start"), props.get("reprocess_end")) {
        (None, None) => {}
        (Some(start), Some(end)) => {
            schedule.reprocessing = Some(ReprocessingWindow {
                start: parse_timestamp(section, "reprocess_start", start)?,
                end: parse_timestamp(section, "reprocess_end", end)?,
            });
        }
        (Some(_), None) => {
            return Err(CatalogError::MissingKey {
                section: section.to_string(),
                key: "reprocess_end".to_string(),
            })
        }
        (None, Some(_)) => {
            return Err(CatalogError::MissingKey {
                section: section.to_string(),
                key: "reprocess_start".to_string(),
            })
        }
    }

    Ok(schedule)
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or `YYYY-MM-DD` (midnight UTC).
fn parse_timestamp(section: &str, key: &str, value: &str) -> Result<DateTime<Utc>, CatalogError> {
    let v = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(v) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(v, "%Y-%m-%d %H:%M:%S") {
        return Ok(ts.and_utc());
    }
    NaiveDate::parse_from_str(v, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
        .ok_or_else(|| {
            invalid(
                section,
                key,
                value,
                "expected RFC 3339, 'YYYY-MM-DD HH:MM:SS' or 'YYYY-MM-DD'",
            )
        })
}

fn parse_value<T>(section: &str, key: &str, value: &str) -> Result<T, CatalogError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(section, key, value, &e.to_string()))
}

fn parse_flag(section: &str, key: &str, value: &str) -> Result<bool, CatalogError> {
    parse_bool(value).ok_or_else(|| invalid(section, key, value, "expected true or false"))
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> CatalogError {
    CatalogError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
