//! Check command - validate a catalog and preview its schedule.

use std::path::Path;

use chrono::{DateTime, Utc};
use envmon::model::{Cadence, Process};
use envmon::scheduler::next_fire;

use crate::error::CliError;
use crate::runner::read_catalog;

/// Run the check command.
pub fn run(catalog_path: &Path) -> Result<(), CliError> {
    let catalog = read_catalog(catalog_path)?;
    let now = Utc::now();

    println!("Catalog: {}", catalog_path.display());
    println!(
        "{} project(s), {} process(es)",
        catalog.projects.len(),
        catalog.entries.len()
    );
    println!();

    let mut invalid = 0;
    for entry in &catalog.entries {
        let process = &entry.process;
        let line = match describe(process, now) {
            Ok(line) => line,
            Err(reason) => {
                invalid += 1;
                format!("INVALID: {}", reason)
            }
        };
        let state = if process.active { "" } else { " (inactive)" };
        println!("  {:>6}  {:<28} {}{}", process.id, process.name, line, state);
        if let Some(command) = &entry.command {
            println!("          command: {}", command);
        }
    }

    if invalid > 0 {
        return Err(CliError::InvalidProcesses { count: invalid });
    }
    println!();
    println!("Catalog OK");
    Ok(())
}

/// One-line summary of when a process runs.
fn describe(process: &Process, now: DateTime<Utc>) -> Result<String, String> {
    let schedule = &process.schedule;

    if schedule.is_reprocessing() {
        let dates = schedule.reprocessing_dates().map_err(|e| e.to_string())?;
        return Ok(match (dates.first(), dates.last()) {
            (Some(first), Some(last)) => format!(
                "reprocess {} execution(s) from {} to {}",
                dates.len(),
                first.format("%Y-%m-%d %H:%M"),
                last.format("%Y-%m-%d %H:%M")
            ),
            _ => "reprocess nothing".to_string(),
        });
    }

    let cadence = schedule.cadence().map_err(|e| e.to_string())?;
    let fire = next_fire(schedule, None, now).map_err(|e| e.to_string())?;
    Ok(format!(
        "{}, next {}",
        describe_cadence(&cadence),
        fire.format("%Y-%m-%d %H:%M:%S UTC")
    ))
}

fn describe_cadence(cadence: &Cadence) -> String {
    match cadence {
        Cadence::Every(interval) => {
            let seconds = interval.num_seconds();
            match seconds {
                s if s % 86_400 == 0 => format!("every {}d", s / 86_400),
                s if s % 3_600 == 0 => format!("every {}h", s / 3_600),
                s if s % 60 == 0 => format!("every {}m", s / 60),
                s => format!("every {}s", s),
            }
        }
        Cadence::At {
            time,
            weekday: None,
        } => format!("daily at {}", time.format("%H:%M")),
        Cadence::At {
            time,
            weekday: Some(day),
        } => format!("weekly on {} at {}", day, time.format("%H:%M")),
    }
}
