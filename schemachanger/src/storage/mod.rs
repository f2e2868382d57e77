// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Storage layer
//!
//! - [`persistent`]: key-value drivers (sled, memory) behind `StorageDriver`
//! - [`table_data`]: rows and secondary index entries of user tables

pub mod persistent;
pub mod table_data;

pub use persistent::memory::MemoryStorageDriver;
pub use persistent::{
    create_storage_driver, DynStorageDriver, KvIter, StorageDriver, StorageDriverError,
    StorageResult, StorageTree, StorageType, WriteBatch,
};
pub use table_data::{
    encode_key, key_values, row_resolver, DataError, DataResult, IndexEntry, Row, TableDataStore,
};
