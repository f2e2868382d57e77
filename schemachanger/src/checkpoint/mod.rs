// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Checkpoint store
//!
//! A checkpoint is the only state a run needs after a restart: the target
//! state with every node's current status, the executor state and the phase
//! the next stage is planned from. Dependency edges and stages are derived
//! again on load.
//!
//! Records are framed as
//!
//! ```text
//! magic (4) | version (2) | payload length (4) | bincode payload | crc32 (4)
//! ```
//!
//! with the checksum covering everything before it.
//!
//! The event of the last committed stage is saved in the same record, so a
//! stage and its event are never persisted apart.

pub mod error;

pub use error::{CheckpointError, CheckpointResult};

use crate::element::{ElementKey, TargetState};
use crate::events::EventKind;
use crate::executor::ExecutorState;
use crate::jobs::RunId;
use crate::scheduler::Phase;
use crate::storage::StorageTree;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const CHECKPOINT_MAGIC: u32 = 0x5343_4b50;
const CHECKPOINT_VERSION: u16 = 2;
const HEADER_LEN: usize = 10;

/// A committed stage whose event may not be in the event log yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedStage {
    /// Position among all stages of the run
    pub stage: usize,
    pub phase: Phase,
    pub reverting: bool,
    pub elements: Vec<ElementKey>,
}

impl CommittedStage {
    pub fn event(&self) -> EventKind {
        EventKind::StageCommitted {
            stage: self.stage,
            phase: self.phase,
            reverting: self.reverting,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: RunId,
    /// Canonical text of the statement
    pub description: String,
    pub state: TargetState,
    pub executor_state: ExecutorState,
    /// Phase the next stage is planned from
    pub phase: Phase,
    /// Stages committed so far, forward and revert together
    pub stages_completed: usize,
    /// Error that started the revert
    pub cause: Option<String>,
    pub unrecorded: Option<CommittedStage>,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(run_id: RunId, description: impl Into<String>, state: TargetState) -> Self {
        Self {
            run_id,
            description: description.into(),
            state,
            executor_state: ExecutorState::Initializing,
            phase: Phase::Statement,
            stages_completed: 0,
            cause: None,
            unrecorded: None,
            updated_at: Utc::now(),
        }
    }

    fn encode(&self) -> CheckpointResult<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let mut out = Vec::with_capacity(HEADER_LEN + payload.len() + 4);
        out.extend_from_slice(&CHECKPOINT_MAGIC.to_le_bytes());
        out.extend_from_slice(&CHECKPOINT_VERSION.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&payload);
        let checksum = crc32fast::hash(&out);
        out.extend_from_slice(&checksum.to_le_bytes());
        Ok(out)
    }

    fn decode(run: &str, bytes: &[u8]) -> CheckpointResult<Self> {
        let corrupt = |reason: &str| CheckpointError::Corrupt {
            run: run.to_string(),
            reason: reason.to_string(),
        };
        if bytes.len() < HEADER_LEN + 4 {
            return Err(corrupt("truncated record"));
        }
        let (body, tail) = bytes.split_at(bytes.len() - 4);
        let mut stored = [0u8; 4];
        stored.copy_from_slice(tail);
        if crc32fast::hash(body) != u32::from_le_bytes(stored) {
            return Err(corrupt("checksum mismatch"));
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&body[0..4]);
        if u32::from_le_bytes(magic) != CHECKPOINT_MAGIC {
            return Err(corrupt("bad magic"));
        }
        let version = u16::from_le_bytes([body[4], body[5]]);
        if version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion(version));
        }
        let mut len = [0u8; 4];
        len.copy_from_slice(&body[6..10]);
        let payload = &body[HEADER_LEN..];
        if payload.len() != u32::from_le_bytes(len) as usize {
            return Err(corrupt("length mismatch"));
        }
        Ok(bincode::deserialize(payload)?)
    }
}

/// Checkpoints keyed by run id
pub struct CheckpointStore {
    tree: Box<dyn StorageTree>,
}

impl CheckpointStore {
    pub fn new(tree: Box<dyn StorageTree>) -> Self {
        Self { tree }
    }

    /// Persist `checkpoint`, replacing the previous one of its run
    pub fn save(&self, checkpoint: &Checkpoint) -> CheckpointResult<()> {
        let mut record = checkpoint.clone();
        record.updated_at = Utc::now();
        self.tree.insert(checkpoint.run_id.as_bytes(), &record.encode()?)?;
        self.tree.flush()?;
        log::debug!(
            "checkpoint {}: {} at {} phase, {} stage(s) done",
            checkpoint.run_id,
            checkpoint.executor_state,
            checkpoint.phase,
            checkpoint.stages_completed
        );
        Ok(())
    }

    pub fn load(&self, run_id: RunId) -> CheckpointResult<Checkpoint> {
        self.get(run_id)?
            .ok_or_else(|| CheckpointError::NotFound(run_id.to_string()))
    }

    pub fn get(&self, run_id: RunId) -> CheckpointResult<Option<Checkpoint>> {
        match self.tree.get(run_id.as_bytes())? {
            Some(bytes) => Ok(Some(Checkpoint::decode(&run_id.to_string(), &bytes)?)),
            None => Ok(None),
        }
    }

    pub fn delete(&self, run_id: RunId) -> CheckpointResult<()> {
        self.tree.remove(run_id.as_bytes())?;
        Ok(())
    }

    pub fn list(&self) -> CheckpointResult<Vec<Checkpoint>> {
        let mut checkpoints = Vec::new();
        for item in self.tree.iter()? {
            let (key, bytes) = item?;
            let run = String::from_utf8_lossy(&key).into_owned();
            checkpoints.push(Checkpoint::decode(&run, &bytes)?);
        }
        Ok(checkpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element, Status, TableElement, Target};
    use crate::storage::{MemoryStorageDriver, StorageDriver};

    fn store() -> (MemoryStorageDriver, CheckpointStore) {
        let driver = MemoryStorageDriver::new();
        let store = CheckpointStore::new(driver.open_tree("checkpoints").unwrap());
        (driver, store)
    }

    fn checkpoint() -> Checkpoint {
        let mut state = TargetState::new();
        state.push(Target::add(Element::Table(TableElement {
            table_id: 100,
            name: "t".into(),
        })));
        Checkpoint::new(RunId::new(), "CREATE TABLE t (...)", state)
    }

    #[test]
    fn test_save_and_load() {
        let (_driver, store) = store();
        let mut cp = checkpoint();
        cp.state.nodes[0].current = Status::Public;
        cp.executor_state = ExecutorState::Succeeded;
        cp.stages_completed = 1;
        cp.unrecorded = Some(CommittedStage {
            stage: 0,
            phase: Phase::Statement,
            reverting: false,
            elements: cp.state.keys(),
        });
        store.save(&cp).unwrap();

        let loaded = store.load(cp.run_id).unwrap();
        assert_eq!(loaded.executor_state, ExecutorState::Succeeded);
        assert_eq!(loaded.state.nodes[0].current, Status::Public);
        assert_eq!(loaded.stages_completed, 1);
        assert_eq!(loaded.unrecorded, cp.unrecorded);
        assert_eq!(store.list().unwrap().len(), 1);

        store.delete(cp.run_id).unwrap();
        assert!(matches!(store.load(cp.run_id), Err(CheckpointError::NotFound(_))));
    }

    #[test]
    fn test_corruption_is_detected() {
        let (driver, store) = store();
        let cp = checkpoint();
        store.save(&cp).unwrap();

        let raw = driver.open_tree("checkpoints").unwrap();
        let mut bytes = raw.get(cp.run_id.as_bytes()).unwrap().unwrap();
        let middle = bytes.len() / 2;
        bytes[middle] ^= 0xFF;
        raw.insert(cp.run_id.as_bytes(), &bytes).unwrap();

        let err = store.load(cp.run_id).unwrap_err();
        assert!(matches!(err, CheckpointError::Corrupt { .. }), "{err}");
    }
}
