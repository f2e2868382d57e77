// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Versioned catalog store with optimistic transactions
//!
//! Every catalog value is stored with a version number. A [`CatalogTxn`]
//! remembers the version of every key it reads and buffers its writes;
//! [`CatalogStore::commit`] re-checks those versions under the commit lock and
//! applies all writes as one atomic batch. A changed version fails the commit
//! with [`CatalogError::Conflict`], which callers treat as retriable.

use super::descriptor::TableDescriptor;
use super::error::{CatalogError, CatalogResult};
use super::snapshot::CatalogSnapshot;
use crate::element::TableId;
use crate::storage::{StorageTree, WriteBatch};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const DESCRIPTOR_PREFIX: &[u8] = b"desc/";
const NEXT_TABLE_ID_KEY: &[u8] = b"meta/next_table_id";

/// First id handed out to user tables
pub const FIRST_TABLE_ID: TableId = 100;

/// On-disk envelope; a `None` payload is a tombstone that keeps the version
#[derive(Debug, Serialize, Deserialize)]
struct VersionedRecord {
    version: u64,
    payload: Option<Vec<u8>>,
}

fn descriptor_key(id: TableId) -> Vec<u8> {
    let mut key = DESCRIPTOR_PREFIX.to_vec();
    key.extend_from_slice(&id.to_be_bytes());
    key
}

fn display_key(key: &[u8]) -> String {
    if key.starts_with(DESCRIPTOR_PREFIX) && key.len() == DESCRIPTOR_PREFIX.len() + 4 {
        let mut id = [0u8; 4];
        id.copy_from_slice(&key[DESCRIPTOR_PREFIX.len()..]);
        format!("table#{}", TableId::from_be_bytes(id))
    } else {
        String::from_utf8_lossy(key).into_owned()
    }
}

fn decode_record(bytes: &[u8]) -> CatalogResult<VersionedRecord> {
    Ok(bincode::deserialize(bytes)?)
}

/// Catalog persisted in one storage tree
pub struct CatalogStore {
    tree: Box<dyn StorageTree>,
    commit_lock: Mutex<()>,
}

impl CatalogStore {
    pub fn new(tree: Box<dyn StorageTree>) -> Self {
        Self {
            tree,
            commit_lock: Mutex::new(()),
        }
    }

    pub fn begin(&self) -> CatalogTxn<'_> {
        CatalogTxn {
            store: self,
            reads: HashMap::new(),
            writes: BTreeMap::new(),
        }
    }

    fn read_record(&self, key: &[u8]) -> CatalogResult<Option<VersionedRecord>> {
        match self.tree.get(key)? {
            Some(bytes) => Ok(Some(decode_record(&bytes)?)),
            None => Ok(None),
        }
    }

    fn current_version(&self, key: &[u8]) -> CatalogResult<u64> {
        Ok(self.read_record(key)?.map(|r| r.version).unwrap_or(0))
    }

    /// Validate the transaction's reads and apply its writes atomically
    pub fn commit(&self, txn: CatalogTxn<'_>) -> CatalogResult<()> {
        let _guard = self.commit_lock.lock();
        for (key, version) in &txn.reads {
            if self.current_version(key)? != *version {
                log::debug!("catalog commit conflict on {}", display_key(key));
                return Err(CatalogError::Conflict {
                    key: display_key(key),
                });
            }
        }
        if txn.writes.is_empty() {
            return Ok(());
        }
        let mut batch = WriteBatch::new();
        for (key, payload) in txn.writes {
            let version = self.current_version(&key)? + 1;
            let record = VersionedRecord { version, payload };
            batch.put(key, bincode::serialize(&record)?);
        }
        self.tree.apply_batch(&batch)?;
        Ok(())
    }

    /// Point-in-time copy of every table descriptor
    pub fn snapshot(&self) -> CatalogResult<CatalogSnapshot> {
        let mut tables = BTreeMap::new();
        for item in self.tree.scan_prefix(DESCRIPTOR_PREFIX)? {
            let (_, bytes) = item?;
            if let Some(payload) = decode_record(&bytes)?.payload {
                let desc: TableDescriptor = bincode::deserialize(&payload)?;
                tables.insert(desc.id, desc);
            }
        }
        let next_table_id = match self.read_record(NEXT_TABLE_ID_KEY)?.and_then(|r| r.payload) {
            Some(payload) => bincode::deserialize(&payload)?,
            None => FIRST_TABLE_ID,
        };
        Ok(CatalogSnapshot::new(tables, next_table_id))
    }

    /// Read one descriptor outside any transaction
    pub fn table(&self, id: TableId) -> CatalogResult<Option<TableDescriptor>> {
        let mut txn = self.begin();
        txn.get_table(id)
    }

    pub fn flush(&self) -> CatalogResult<()> {
        self.tree.flush()?;
        Ok(())
    }
}

/// An optimistic catalog transaction
pub struct CatalogTxn<'a> {
    store: &'a CatalogStore,
    reads: HashMap<Vec<u8>, u64>,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a> CatalogTxn<'a> {
    fn read_raw(&mut self, key: &[u8]) -> CatalogResult<Option<Vec<u8>>> {
        if let Some(pending) = self.writes.get(key) {
            return Ok(pending.clone());
        }
        let record = self.store.read_record(key)?;
        let version = record.as_ref().map(|r| r.version).unwrap_or(0);
        self.reads.entry(key.to_vec()).or_insert(version);
        Ok(record.and_then(|r| r.payload))
    }

    fn read_value<T: DeserializeOwned>(&mut self, key: &[u8]) -> CatalogResult<Option<T>> {
        match self.read_raw(key)? {
            Some(payload) => Ok(Some(bincode::deserialize(&payload)?)),
            None => Ok(None),
        }
    }

    fn write_value<T: Serialize>(&mut self, key: Vec<u8>, value: &T) -> CatalogResult<()> {
        let payload = bincode::serialize(value)?;
        self.writes.insert(key, Some(payload));
        Ok(())
    }

    pub fn get_table(&mut self, id: TableId) -> CatalogResult<Option<TableDescriptor>> {
        self.read_value(&descriptor_key(id))
    }

    /// Like [`Self::get_table`] but a missing table is an error
    pub fn require_table(&mut self, id: TableId) -> CatalogResult<TableDescriptor> {
        self.get_table(id)?.ok_or(CatalogError::TableNotFound(id))
    }

    pub fn put_table(&mut self, desc: &TableDescriptor) -> CatalogResult<()> {
        self.write_value(descriptor_key(desc.id), desc)
    }

    pub fn delete_table(&mut self, id: TableId) -> CatalogResult<()> {
        // Read first so a concurrent change to the descriptor conflicts
        self.read_raw(&descriptor_key(id))?;
        self.writes.insert(descriptor_key(id), None);
        Ok(())
    }

    /// Make sure the table id allocator never hands out `id` again
    pub fn reserve_table_id(&mut self, id: TableId) -> CatalogResult<()> {
        let next: TableId = self
            .read_value(NEXT_TABLE_ID_KEY)?
            .unwrap_or(FIRST_TABLE_ID);
        if next <= id {
            self.write_value(NEXT_TABLE_ID_KEY.to_vec(), &(id + 1))?;
        }
        Ok(())
    }

    /// Whether this transaction has buffered any write
    pub fn has_writes(&self) -> bool {
        !self.writes.is_empty()
    }

    pub fn commit(self) -> CatalogResult<()> {
        let store = self.store;
        store.commit(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Status;
    use crate::storage::{MemoryStorageDriver, StorageDriver};

    fn store() -> CatalogStore {
        let driver = MemoryStorageDriver::new();
        CatalogStore::new(Box::new(driver.open_tree("catalog").unwrap()))
    }

    #[test]
    fn test_commit_and_snapshot() {
        let store = store();
        let mut txn = store.begin();
        txn.put_table(&TableDescriptor::new(100, "users", Status::Public, None))
            .unwrap();
        txn.reserve_table_id(100).unwrap();
        txn.commit().unwrap();

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.next_table_id(), 101);
        assert_eq!(snapshot.table_by_name("users").map(|t| t.id), Some(100));
    }

    #[test]
    fn test_conflicting_commit_is_detected() {
        let store = store();
        let mut setup = store.begin();
        setup
            .put_table(&TableDescriptor::new(100, "users", Status::Public, None))
            .unwrap();
        setup.commit().unwrap();

        let mut first = store.begin();
        let mut second = store.begin();
        let mut a = first.require_table(100).unwrap();
        let mut b = second.require_table(100).unwrap();
        a.name = "a".into();
        b.name = "b".into();
        first.put_table(&a).unwrap();
        second.put_table(&b).unwrap();
        first.commit().unwrap();
        let err = second.commit().unwrap_err();
        assert!(err.is_conflict(), "{err}");
        assert_eq!(store.table(100).unwrap().unwrap().name, "a");
    }

    #[test]
    fn test_delete_leaves_tombstone_version() {
        let store = store();
        let mut txn = store.begin();
        txn.put_table(&TableDescriptor::new(100, "users", Status::Public, None))
            .unwrap();
        txn.commit().unwrap();

        let mut reader = store.begin();
        assert!(reader.get_table(100).unwrap().is_some());

        let mut txn = store.begin();
        txn.delete_table(100).unwrap();
        txn.commit().unwrap();
        let mut txn = store.begin();
        txn.put_table(&TableDescriptor::new(100, "users", Status::Public, None))
            .unwrap();
        txn.commit().unwrap();

        // The reader saw version 1; the key is now at version 3
        reader.put_table(&TableDescriptor::new(100, "x", Status::Public, None)).unwrap();
        assert!(reader.commit().unwrap_err().is_conflict());
    }
}
