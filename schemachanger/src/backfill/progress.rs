// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Per-operator progress records
//!
//! Keyed by run id, element key and operator tag, so every operator of a run
//! resumes independently of stage checkpoints.

use super::error::OperatorResult;
use crate::element::ElementKey;
use crate::jobs::RunId;
use crate::storage::StorageTree;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillProgress {
    /// Primary key of the last row processed
    pub resume_key: Option<Vec<u8>>,
    pub rows_processed: u64,
    pub complete: bool,
}

/// Which operator a progress record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressTag {
    ColumnDefault = 1,
    IndexBuild = 2,
    NotNull = 3,
    Check = 4,
    ForeignKey = 5,
}

fn progress_key(run: RunId, element: &ElementKey, tag: ProgressTag) -> Vec<u8> {
    let mut key = run.as_bytes().to_vec();
    key.extend_from_slice(&element.to_bytes());
    key.push(tag as u8);
    key
}

pub struct ProgressStore {
    tree: Box<dyn StorageTree>,
}

impl ProgressStore {
    pub fn new(tree: Box<dyn StorageTree>) -> Self {
        Self { tree }
    }

    pub fn load(&self, run: RunId, element: &ElementKey, tag: ProgressTag) -> OperatorResult<BackfillProgress> {
        match self.tree.get(&progress_key(run, element, tag))? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Ok(BackfillProgress::default()),
        }
    }

    pub fn save(
        &self,
        run: RunId,
        element: &ElementKey,
        tag: ProgressTag,
        progress: &BackfillProgress,
    ) -> OperatorResult<()> {
        self.tree
            .insert(&progress_key(run, element, tag), &bincode::serialize(progress)?)?;
        Ok(())
    }

    /// Drop every record of `run`
    pub fn clear_run(&self, run: RunId) -> OperatorResult<()> {
        let mut keys = Vec::new();
        for item in self.tree.scan_prefix(run.as_bytes())? {
            let (key, _) = item?;
            keys.push(key);
        }
        for key in keys {
            self.tree.remove(&key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementKind;
    use crate::storage::{MemoryStorageDriver, StorageDriver};

    #[test]
    fn test_records_are_scoped_by_run_and_tag() {
        let driver = MemoryStorageDriver::new();
        let store = ProgressStore::new(driver.open_tree("backfill_progress").unwrap());
        let run = RunId::new();
        let other = RunId::new();
        let key = ElementKey::new(ElementKind::Column, 101, 5);
        let progress = BackfillProgress {
            resume_key: Some(vec![1, 2]),
            rows_processed: 2,
            complete: false,
        };
        store.save(run, &key, ProgressTag::ColumnDefault, &progress).unwrap();
        store.save(other, &key, ProgressTag::ColumnDefault, &progress).unwrap();

        assert_eq!(store.load(run, &key, ProgressTag::ColumnDefault).unwrap(), progress);
        assert_eq!(
            store.load(run, &key, ProgressTag::NotNull).unwrap(),
            BackfillProgress::default()
        );
        store.clear_run(run).unwrap();
        assert_eq!(
            store.load(run, &key, ProgressTag::ColumnDefault).unwrap(),
            BackfillProgress::default()
        );
        assert_eq!(store.load(other, &key, ProgressTag::ColumnDefault).unwrap(), progress);
    }
}
