// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Sled storage driver implementation

use super::traits::{KvIter, StorageDriver, StorageTree, WriteBatch};
use super::types::{StorageDriverError, StorageResult, StorageType};
use std::path::Path;

/// Sled driver implementation
pub struct SledDriver {
    db: sled::Db,
}

/// Sled tree wrapper that implements StorageTree trait
pub struct SledTree {
    tree: sled::Tree,
}

fn backend_err(e: sled::Error) -> StorageDriverError {
    StorageDriverError::BackendSpecific(e.to_string())
}

fn wrap_iter<'a>(iter: impl Iterator<Item = sled::Result<(sled::IVec, sled::IVec)>> + 'a) -> KvIter<'a> {
    Box::new(iter.map(|result| {
        result
            .map(|(k, v)| (k.to_vec(), v.to_vec()))
            .map_err(backend_err)
    }))
}

impl StorageTree for SledTree {
    fn insert(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.tree.insert(key, value).map_err(backend_err)?;
        Ok(())
    }

    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        self.tree
            .get(key)
            .map_err(backend_err)
            .map(|opt| opt.map(|v| v.to_vec()))
    }

    fn remove(&self, key: &[u8]) -> StorageResult<()> {
        self.tree.remove(key).map_err(backend_err)?;
        Ok(())
    }

    fn contains_key(&self, key: &[u8]) -> StorageResult<bool> {
        self.tree.contains_key(key).map_err(backend_err)
    }

    fn clear(&self) -> StorageResult<()> {
        self.tree.clear().map_err(backend_err)
    }

    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.tree.is_empty())
    }

    fn iter(&self) -> StorageResult<KvIter<'_>> {
        Ok(wrap_iter(self.tree.iter()))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> StorageResult<KvIter<'_>> {
        Ok(wrap_iter(self.tree.scan_prefix(prefix)))
    }

    fn range_from(&self, start: &[u8]) -> StorageResult<KvIter<'_>> {
        Ok(wrap_iter(self.tree.range(start.to_vec()..)))
    }

    fn apply_batch(&self, batch: &WriteBatch) -> StorageResult<()> {
        let mut sled_batch = sled::Batch::default();
        for key in &batch.removes {
            sled_batch.remove(key.as_slice());
        }
        for (key, value) in &batch.puts {
            sled_batch.insert(key.as_slice(), value.as_slice());
        }
        self.tree.apply_batch(sled_batch).map_err(backend_err)
    }

    fn flush(&self) -> StorageResult<()> {
        self.tree.flush().map_err(backend_err)?;
        Ok(())
    }
}

impl StorageDriver for SledDriver {
    type Tree = Box<dyn StorageTree>;

    fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let db = sled::open(path).map_err(backend_err)?;
        Ok(SledDriver { db })
    }

    fn open_tree(&self, name: &str) -> StorageResult<Self::Tree> {
        let tree = self.db.open_tree(name).map_err(backend_err)?;
        Ok(Box::new(SledTree { tree }) as Box<dyn StorageTree>)
    }

    fn list_trees(&self) -> StorageResult<Vec<String>> {
        let tree_names = self
            .db
            .tree_names()
            .into_iter()
            .map(|name| String::from_utf8_lossy(&name).to_string())
            .collect();
        Ok(tree_names)
    }

    fn drop_tree(&self, name: &str) -> StorageResult<()> {
        self.db.drop_tree(name.as_bytes()).map_err(backend_err)?;
        Ok(())
    }

    fn flush(&self) -> StorageResult<()> {
        self.db.flush().map_err(backend_err)?;
        Ok(())
    }

    fn storage_type(&self) -> StorageType {
        StorageType::Sled
    }

    fn shutdown(&mut self) -> StorageResult<()> {
        // Just flush to ensure data is persisted
        self.db.flush().map_err(backend_err)?;
        Ok(())
    }
}
