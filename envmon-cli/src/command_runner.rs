//! Work function that runs each process's catalog command.

use chrono::SecondsFormat;
use envmon::config::Catalog;
use envmon::model::{ExecutionPackage, ProcessId};
use envmon::scheduler::{ExecutionError, ExecutionReport, ProcessRunner};
use std::collections::HashMap;
use std::process::{Command, Output};
use std::time::Instant;
use tracing::{debug, info};

/// Environment variable holding the process id.
pub const PROCESS_ID_VAR: &str = "ENVMON_PROCESS_ID";

/// Environment variable holding the RFC 3339 execution date.
pub const EXECUTION_DATE_VAR: &str = "ENVMON_EXECUTION_DATE";

/// Longest stderr excerpt carried into an error message.
const STDERR_EXCERPT: usize = 512;

/// Runs the shell command configured for a process.
///
/// A process without a command completes with no data.
#[derive(Debug, Default)]
pub struct CommandRunner {
    commands: HashMap<ProcessId, String>,
}

impl CommandRunner {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let commands = catalog
            .entries
            .iter()
            .filter_map(|entry| {
                entry
                    .command
                    .as_ref()
                    .map(|command| (entry.process.id, command.clone()))
            })
            .collect();
        Self { commands }
    }

    /// Number of processes with a configured command.
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }
}

impl ProcessRunner for CommandRunner {
    fn name(&self) -> &str {
        "command"
    }

    fn execute(&self, package: &ExecutionPackage) -> Result<ExecutionReport, ExecutionError> {
        let Some(command) = self.commands.get(&package.process_id) else {
            return Err(ExecutionError::no_data(format!(
                "process {} has no command",
                package.process_id
            )));
        };

        let execution_date = package
            .execution_date
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        debug!(
            process_id = %package.process_id,
            execution_date = %execution_date,
            command = %command,
            "Running command"
        );

        let started = Instant::now();
        let output = shell(command)
            .env(PROCESS_ID_VAR, package.process_id.to_string())
            .env(EXECUTION_DATE_VAR, &execution_date)
            .output()
            .map_err(|e| ExecutionError::failed(format!("failed to run '{}': {}", command, e)))?;

        info!(
            process_id = %package.process_id,
            status = %output.status,
            elapsed_ms = started.elapsed().as_millis(),
            "Command finished"
        );

        if output.status.success() {
            Ok(ExecutionReport::with_data(package.execution_date)
                .insert("exit_code", output.status.code().unwrap_or(0))
                .insert("stdout_bytes", output.stdout.len()))
        } else {
            Err(ExecutionError::failed(failure_message(command, &output)))
        }
    }
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

fn failure_message(command: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    let excerpt: String = stderr.chars().take(STDERR_EXCERPT).collect();
    if excerpt.is_empty() {
        format!("'{}' exited with {}", command, output.status)
    } else {
        format!("'{}' exited with {}: {}", command, output.status, excerpt)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use envmon::config::parse_catalog_str;
    use envmon::model::RegisterId;

    fn runner(catalog: &str) -> CommandRunner {
        CommandRunner::from_catalog(&parse_catalog_str(catalog).unwrap())
    }

    fn package(id: u32) -> ExecutionPackage {
        ExecutionPackage::new(
            ProcessId::new(id),
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            RegisterId::new(1),
        )
    }

    const CATALOG: &str = "\
[project.1]
name = rivers

[process.1]
project = 1
frequency = 1
frequency_unit = hour
command = test $ENVMON_PROCESS_ID = 1 && test $ENVMON_EXECUTION_DATE = 2024-06-01T12:00:00Z

[process.2]
project = 1
frequency = 1
frequency_unit = hour
command = echo sensor offline >&2 && false

[process.3]
project = 1
frequency = 1
frequency_unit = hour
";

    #[test]
    fn test_command_sees_execution_environment() {
        let runner = runner(CATALOG);
        assert_eq!(runner.command_count(), 2);

        let report = runner.execute(&package(1)).unwrap();
        assert_eq!(report.payload["exit_code"], 0);
        assert_eq!(report.data_timestamp, Some(package(1).execution_date));
    }

    #[test]
    fn test_failing_command_reports_stderr() {
        let err = runner(CATALOG).execute(&package(2)).unwrap_err();
        match err {
            ExecutionError::Failed(message) => assert!(message.contains("sensor offline")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_process_without_command_has_no_data() {
        let err = runner(CATALOG).execute(&package(3)).unwrap_err();
        assert!(matches!(err, ExecutionError::NoData(_)));
    }
}
