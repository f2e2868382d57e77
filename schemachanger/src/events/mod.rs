// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Schema-change event log
//!
//! One event per committed stage and per change of run state. Events are
//! stored per run in sequence order and mirrored to the `log` facade.

use crate::element::ElementKey;
use crate::jobs::RunId;
use crate::scheduler::Phase;
use crate::storage::{StorageResult, StorageTree};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    StageCommitted {
        /// Position among all stages of the run
        stage: usize,
        phase: Phase,
        reverting: bool,
    },
    StageFailed {
        error: String,
        class: String,
    },
    RevertStarted {
        cause: String,
    },
    Succeeded,
    Reverted {
        cause: String,
    },
    Failed {
        error: String,
    },
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::StageCommitted {
                stage,
                phase,
                reverting,
            } => write!(
                f,
                "stage {} committed in {} phase{}",
                stage + 1,
                phase,
                if *reverting { " (revert)" } else { "" }
            ),
            EventKind::StageFailed { error, class } => write!(f, "stage failed ({}): {}", class, error),
            EventKind::RevertStarted { cause } => write!(f, "reverting: {}", cause),
            EventKind::Succeeded => write!(f, "succeeded"),
            EventKind::Reverted { cause } => write!(f, "change rolled back: {}", cause),
            EventKind::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub run_id: RunId,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    /// Elements touched by the stage, or every element of the run
    pub elements: Vec<ElementKey>,
}

pub trait EventLog: Send + Sync {
    fn record(&self, run_id: RunId, kind: EventKind, elements: Vec<ElementKey>) -> StorageResult<Event>;

    /// Events of `run_id` in sequence order
    fn events(&self, run_id: RunId) -> StorageResult<Vec<Event>>;
}

/// Event log kept in a storage tree, keyed by run id and sequence number
pub struct KvEventLog {
    tree: Box<dyn StorageTree>,
    append_lock: Mutex<()>,
}

impl KvEventLog {
    pub fn new(tree: Box<dyn StorageTree>) -> Self {
        Self {
            tree,
            append_lock: Mutex::new(()),
        }
    }

    fn key(run_id: RunId, sequence: u64) -> Vec<u8> {
        let mut key = run_id.as_bytes().to_vec();
        key.extend_from_slice(&sequence.to_be_bytes());
        key
    }

    fn next_sequence(&self, run_id: RunId) -> StorageResult<u64> {
        let mut next = 0;
        for item in self.tree.scan_prefix(run_id.as_bytes())? {
            let (key, _) = item?;
            let mut seq = [0u8; 8];
            if key.len() == 24 {
                seq.copy_from_slice(&key[16..]);
                next = next.max(u64::from_be_bytes(seq) + 1);
            }
        }
        Ok(next)
    }
}

impl EventLog for KvEventLog {
    fn record(&self, run_id: RunId, kind: EventKind, elements: Vec<ElementKey>) -> StorageResult<Event> {
        let _guard = self.append_lock.lock();
        let event = Event {
            run_id,
            sequence: self.next_sequence(run_id)?,
            timestamp: Utc::now(),
            kind,
            elements,
        };
        self.tree
            .insert(&Self::key(run_id, event.sequence), &serde_json::to_vec(&event)?)?;
        log::info!("schema change {}: {}", run_id, event.kind);
        Ok(event)
    }

    fn events(&self, run_id: RunId) -> StorageResult<Vec<Event>> {
        let mut events = Vec::new();
        for item in self.tree.scan_prefix(run_id.as_bytes())? {
            let (_, bytes) = item?;
            events.push(serde_json::from_slice(&bytes)?);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorageDriver, StorageDriver};

    #[test]
    fn test_events_are_sequenced_per_run() {
        let driver = MemoryStorageDriver::new();
        let log = KvEventLog::new(driver.open_tree("events").unwrap());
        let run = RunId::new();
        let other = RunId::new();
        let table = ElementKey::table(100);
        log.record(
            run,
            EventKind::StageCommitted {
                stage: 0,
                phase: Phase::Statement,
                reverting: false,
            },
            vec![table],
        )
        .unwrap();
        log.record(other, EventKind::Succeeded, vec![]).unwrap();
        let last = log.record(run, EventKind::Succeeded, vec![table]).unwrap();
        assert_eq!(last.sequence, 1);

        let events = log.events(run).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind.to_string(), "stage 1 committed in STATEMENT phase");
        assert_eq!(events[1].kind, EventKind::Succeeded);
        assert_eq!(log.events(other).unwrap().len(), 1);
    }
}
