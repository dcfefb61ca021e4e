//! In-memory process catalog.

use crate::model::{Process, ProcessId, Project, ProjectId};
use crate::scheduler::DataManager;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
struct Catalog {
    processes: HashMap<ProcessId, Process>,
    projects: HashMap<ProjectId, Project>,
}

/// Processes and projects held in memory, replaceable at runtime.
#[derive(Debug, Default)]
pub struct MemoryDataManager {
    catalog: RwLock<Catalog>,
}

impl MemoryDataManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from projects and processes.
    pub fn with_catalog(
        projects: impl IntoIterator<Item = Project>,
        processes: impl IntoIterator<Item = Process>,
    ) -> Self {
        let manager = Self::new();
        for project in projects {
            manager.insert_project(project);
        }
        for process in processes {
            manager.insert_process(process);
        }
        manager
    }

    /// Inserts or replaces a project.
    pub fn insert_project(&self, project: Project) {
        self.catalog
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .projects
            .insert(project.id, project);
    }

    /// Inserts or replaces a process.
    pub fn insert_process(&self, process: Process) {
        self.catalog
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .processes
            .insert(process.id, process);
    }

    pub fn remove_process(&self, id: ProcessId) -> Option<Process> {
        self.catalog
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .processes
            .remove(&id)
    }

    /// All processes ordered by id.
    pub fn processes(&self) -> Vec<Process> {
        let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        let mut processes: Vec<Process> = catalog.processes.values().cloned().collect();
        processes.sort_by_key(|p| p.id);
        processes
    }
}

impl DataManager for MemoryDataManager {
    fn find_process(&self, id: ProcessId) -> Option<Process> {
        self.catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .processes
            .get(&id)
            .cloned()
    }

    fn find_project(&self, id: ProjectId) -> Option<Project> {
        self.catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .projects
            .get(&id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Schedule, ServiceInstanceId, TimeUnit};

    fn process(id: u32) -> Process {
        Process::new(
            ProcessId::new(id),
            ProjectId::new(1),
            ServiceInstanceId::new(1),
            Schedule::every(1, TimeUnit::Hour),
        )
    }

    #[test]
    fn test_lookup_and_replace() {
        let manager = MemoryDataManager::with_catalog(
            [Project::new(ProjectId::new(1), "rivers")],
            [process(2), process(1)],
        );

        assert_eq!(manager.find_project(ProjectId::new(1)).unwrap().name, "rivers");
        assert!(manager.find_process(ProcessId::new(2)).is_some());
        assert!(manager.find_process(ProcessId::new(9)).is_none());

        manager.insert_process(process(2).with_name("renamed"));
        assert_eq!(manager.find_process(ProcessId::new(2)).unwrap().name, "renamed");
    }

    #[test]
    fn test_processes_are_sorted() {
        let manager = MemoryDataManager::with_catalog([], [process(3), process(1), process(2)]);
        let ids: Vec<u32> = manager.processes().iter().map(|p| p.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        manager.remove_process(ProcessId::new(2));
        assert_eq!(manager.processes().len(), 2);
    }
}
