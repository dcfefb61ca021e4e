//! Admission and wait queues.
//!
//! [`ExecutionQueues`] enforces at most one admitted execution per process:
//!
//! - `pending`: FIFO of packages ready to be turned into tasks;
//! - `in_flight`: processes with an admitted, not yet completed package;
//! - `waiting`: per-process FIFO of packages that arrived while the process
//!   was in flight.
//!
//! A process id is in `in_flight` iff it has an admitted package whose
//! completion has not been reported through [`ExecutionQueues::release`].
//! All mutation happens under the service's queue mutex.

use crate::model::{ExecutionPackage, ProcessId};
use std::collections::{HashMap, HashSet, VecDeque};

/// Result of offering a package to the queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Appended to the admission queue; the process is now in flight.
    Admitted,
    /// Parked in the process's wait queue behind the in-flight execution.
    Deferred,
}

/// Admission queue, in-flight set and wait queues.
#[derive(Debug, Default)]
pub struct ExecutionQueues {
    pending: VecDeque<ExecutionPackage>,
    in_flight: HashSet<ProcessId>,
    waiting: HashMap<ProcessId, VecDeque<ExecutionPackage>>,
}

impl ExecutionQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits `package` unless its process is already in flight, in which
    /// case it is appended to that process's wait queue.
    pub fn admit(&mut self, package: ExecutionPackage) -> Admission {
        let process_id = package.process_id;
        if self.in_flight.insert(process_id) {
            self.pending.push_back(package);
            Admission::Admitted
        } else {
            self.defer(package);
            Admission::Deferred
        }
    }

    /// Appends `package` to its process's wait queue unconditionally.
    pub fn defer(&mut self, package: ExecutionPackage) {
        self.waiting
            .entry(package.process_id)
            .or_default()
            .push_back(package);
    }

    /// Takes the oldest admitted package.
    pub fn pop_pending(&mut self) -> Option<ExecutionPackage> {
        self.pending.pop_front()
    }

    /// Reports completion of `process_id`'s in-flight execution.
    ///
    /// If the process has waiting packages, the oldest one is admitted and
    /// the process stays in flight. Returns the admitted package in that
    /// case.
    pub fn release(&mut self, process_id: ProcessId) -> Option<&ExecutionPackage> {
        self.in_flight.remove(&process_id);

        let next = match self.waiting.get_mut(&process_id) {
            Some(queue) => {
                let next = queue.pop_front();
                if queue.is_empty() {
                    self.waiting.remove(&process_id);
                }
                next
            }
            None => None,
        };

        let next = next?;
        self.in_flight.insert(process_id);
        self.pending.push_back(next);
        self.pending.back()
    }

    /// Drops every queued package of `process_id`.
    ///
    /// An execution already handed to a worker keeps its in-flight mark
    /// until it completes. Returns the dropped packages, oldest first.
    pub fn remove_process(&mut self, process_id: ProcessId) -> Vec<ExecutionPackage> {
        let mut dropped = Vec::new();
        self.pending.retain(|p| {
            if p.process_id == process_id {
                dropped.push(p.clone());
                false
            } else {
                true
            }
        });
        if !dropped.is_empty() {
            self.in_flight.remove(&process_id);
        }

        if let Some(waiting) = self.waiting.remove(&process_id) {
            dropped.extend(waiting);
        }
        dropped
    }

    pub fn is_in_flight(&self, process_id: ProcessId) -> bool {
        self.in_flight.contains(&process_id)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Total packages across all wait queues.
    pub fn waiting_len(&self) -> usize {
        self.waiting.values().map(VecDeque::len).sum()
    }

    /// Packages waiting behind `process_id`'s in-flight execution.
    pub fn waiting_for(&self, process_id: ProcessId) -> usize {
        self.waiting.get(&process_id).map_or(0, VecDeque::len)
    }
}
