//! Thread-safe in-memory process logger.

use crate::model::{ProcessId, RegisterId};
use crate::scheduler::{ExecutionStatus, LoggerError, MessageKind, ProcessLogger};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Everything recorded about one execution attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRecord {
    pub register_id: RegisterId,
    pub process_id: ProcessId,
    pub started_at: DateTime<Utc>,
    pub status: ExecutionStatus,
    /// Every status reported, in order.
    pub history: Vec<ExecutionStatus>,
    pub data_timestamp: Option<DateTime<Utc>>,
    /// Set when the record reaches `Done`.
    pub completed_at: Option<DateTime<Utc>>,
    pub messages: Vec<(MessageKind, String)>,
}

#[derive(Debug, Default)]
struct LogState {
    next_register: u64,
    records: BTreeMap<RegisterId, ExecutionRecord>,
    /// Completions recorded outside of any execution (history import).
    seeded: BTreeMap<ProcessId, DateTime<Utc>>,
}

/// Keeps execution records in memory.
///
/// The validity flag only drives [`ProcessLogger::is_valid`]; records are
/// still written while it is false so backpressure can be simulated without
/// losing admissions.
#[derive(Debug)]
pub struct MemoryProcessLogger {
    state: Mutex<LogState>,
    valid: AtomicBool,
}

impl Default for MemoryProcessLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProcessLogger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LogState::default()),
            valid: AtomicBool::new(true),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::SeqCst);
    }

    /// Records a past completion of `process_id`, e.g. imported history.
    pub fn seed_completion(&self, process_id: ProcessId, completed_at: DateTime<Utc>) {
        self.lock().seeded.insert(process_id, completed_at);
    }

    pub fn record(&self, register_id: RegisterId) -> Option<ExecutionRecord> {
        self.lock().records.get(&register_id).cloned()
    }

    /// All records, ordered by register id.
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.lock().records.values().cloned().collect()
    }

    pub fn records_for(&self, process_id: ProcessId) -> Vec<ExecutionRecord> {
        self.lock()
            .records
            .values()
            .filter(|r| r.process_id == process_id)
            .cloned()
            .collect()
    }
}

impl ProcessLogger for MemoryProcessLogger {
    fn start(&self, process_id: ProcessId) -> Result<RegisterId, LoggerError> {
        let mut state = self.lock();
        state.next_register += 1;
        let register_id = RegisterId::new(state.next_register);
        state.records.insert(
            register_id,
            ExecutionRecord {
                register_id,
                process_id,
                started_at: Utc::now(),
                status: ExecutionStatus::Start,
                history: vec![ExecutionStatus::Start],
                data_timestamp: None,
                completed_at: None,
                messages: Vec::new(),
            },
        );
        Ok(register_id)
    }

    fn result(
        &self,
        status: ExecutionStatus,
        data_timestamp: Option<DateTime<Utc>>,
        register_id: RegisterId,
    ) -> Result<(), LoggerError> {
        let mut state = self.lock();
        let record = state
            .records
            .get_mut(&register_id)
            .ok_or(LoggerError::UnknownRegister(register_id))?;
        record.status = status;
        record.history.push(status);
        if data_timestamp.is_some() {
            record.data_timestamp = data_timestamp;
        }
        if status == ExecutionStatus::Done {
            record.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    fn log(
        &self,
        kind: MessageKind,
        message: &str,
        register_id: RegisterId,
    ) -> Result<(), LoggerError> {
        let mut state = self.lock();
        let record = state
            .records
            .get_mut(&register_id)
            .ok_or(LoggerError::UnknownRegister(register_id))?;
        record.messages.push((kind, message.to_string()));
        Ok(())
    }

    fn last_process_timestamp(
        &self,
        process_id: ProcessId,
    ) -> Result<Option<DateTime<Utc>>, LoggerError> {
        let state = self.lock();
        let recorded = state
            .records
            .values()
            .filter(|r| r.process_id == process_id)
            .filter_map(|r| r.completed_at)
            .max();
        Ok(recorded.max(state.seeded.get(&process_id).copied()))
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    #[test]
    fn test_start_issues_increasing_registers() {
        let logger = MemoryProcessLogger::new();
        let first = logger.start(ProcessId::new(1)).unwrap();
        let second = logger.start(ProcessId::new(1)).unwrap();
        assert!(second > first);
        assert_eq!(logger.records_for(ProcessId::new(1)).len(), 2);
    }

    #[test]
    fn test_result_updates_status_and_completion() {
        let logger = MemoryProcessLogger::new();
        let id = ProcessId::new(3);
        let register = logger.start(id).unwrap();
        assert_eq!(logger.last_process_timestamp(id).unwrap(), None);

        let data = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        logger
            .result(ExecutionStatus::Done, Some(data), register)
            .unwrap();

        let record = logger.record(register).unwrap();
        assert_eq!(record.status, ExecutionStatus::Done);
        assert_eq!(record.history, vec![ExecutionStatus::Start, ExecutionStatus::Done]);
        assert!(logger.last_process_timestamp(id).unwrap().is_some());
        assert_eq!(record.data_timestamp, Some(data));
    }

    #[test]
    fn test_errors_do_not_count_as_completion() {
        let logger = MemoryProcessLogger::new();
        let id = ProcessId::new(3);
        let register = logger.start(id).unwrap();
        logger.result(ExecutionStatus::Error, None, register).unwrap();
        assert_eq!(logger.last_process_timestamp(id).unwrap(), None);
    }

    #[test]
    fn test_unknown_register_is_rejected() {
        let logger = MemoryProcessLogger::new();
        let missing = RegisterId::new(99);
        assert_eq!(
            logger.result(ExecutionStatus::Done, None, missing),
            Err(LoggerError::UnknownRegister(missing))
        );
        assert!(logger.log(MessageKind::Info, "hi", missing).is_err());
    }

    #[test]
    fn test_messages_are_attached() {
        let logger = MemoryProcessLogger::new();
        let register = logger.start(ProcessId::new(1)).unwrap();
        logger
            .log(MessageKind::Warning, "no rows", register)
            .unwrap();
        assert_eq!(
            logger.record(register).unwrap().messages,
            vec![(MessageKind::Warning, "no rows".to_string())]
        );
    }

    #[test]
    fn test_seeded_completion_participates_in_last_timestamp() {
        let logger = MemoryProcessLogger::new();
        let id = ProcessId::new(4);
        let seeded = Utc::now() + TimeDelta::hours(1);
        logger.seed_completion(id, seeded);
        assert_eq!(logger.last_process_timestamp(id).unwrap(), Some(seeded));
    }

    #[test]
    fn test_validity_toggle() {
        let logger = MemoryProcessLogger::new();
        assert!(logger.is_valid());
        logger.set_valid(false);
        assert!(!logger.is_valid());
        assert!(logger.start(ProcessId::new(1)).is_ok());
    }
}
