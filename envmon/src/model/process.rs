//! Processes, projects and execution packages.

use super::ids::{ProcessId, ProjectId, RegisterId, ServiceInstanceId};
use super::schedule::Schedule;
use chrono::{DateTime, Utc};

/// Project grouping a set of processes. Inactive projects never run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub active: bool,
}

impl Project {
    /// Creates an active project.
    pub fn new(id: ProjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            active: true,
        }
    }
}

/// A schedulable unit of work (collector, analysis, interpolator, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    pub id: ProcessId,
    pub project_id: ProjectId,
    pub name: String,
    pub active: bool,
    /// Service instance that owns this process.
    pub service_instance_id: ServiceInstanceId,
    pub schedule: Schedule,
}

impl Process {
    /// Creates an active process owned by `service_instance_id`.
    pub fn new(
        id: ProcessId,
        project_id: ProjectId,
        service_instance_id: ServiceInstanceId,
        schedule: Schedule,
    ) -> Self {
        Self {
            id,
            project_id,
            name: format!("process-{}", id),
            active: true,
            service_instance_id,
            schedule,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// One concrete request to run a process at a logical timestamp.
///
/// Created when an execution is requested and consumed once by the worker
/// that runs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPackage {
    pub process_id: ProcessId,
    pub execution_date: DateTime<Utc>,
    pub register_id: RegisterId,
}

impl ExecutionPackage {
    pub fn new(
        process_id: ProcessId,
        execution_date: DateTime<Utc>,
        register_id: RegisterId,
    ) -> Self {
        Self {
            process_id,
            execution_date,
            register_id,
        }
    }
}
