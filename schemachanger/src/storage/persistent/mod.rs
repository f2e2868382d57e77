// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Persistent storage backends
//!
//! This module provides trait-based abstractions for persistent key-value storage,
//! allowing different storage backends to be used interchangeably.
//!
//! # Architecture
//!
//! ```text
//! CatalogStore / TableDataStore / CheckpointStore (typed records)
//!     ↓
//! StorageDriver (key-value abstraction)
//!     ↓
//! Concrete Implementations (Sled, Memory)
//! ```

pub mod factory;
pub mod traits;
pub mod types;

// Driver implementations
pub mod memory;
#[cfg(feature = "sled-backend")]
pub mod sled;

pub use factory::{create_storage_driver, DynStorageDriver};
pub use traits::{KvIter, StorageDriver, StorageTree, WriteBatch};
pub use types::{StorageDriverError, StorageResult, StorageType};
