// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Versioned catalog
//!
//! Table descriptors persisted through the storage driver, read and written by
//! optimistic transactions. The builder works on a [`CatalogSnapshot`]; stage
//! execution re-reads the live catalog through a [`CatalogTxn`].

pub mod descriptor;
pub mod error;
pub mod snapshot;
pub mod store;

pub use descriptor::{
    CheckDescriptor, ColumnDescriptor, ForeignKeyDescriptor, IndexDescriptor, TableDescriptor,
};
pub use error::{CatalogError, CatalogResult};
pub use snapshot::CatalogSnapshot;
pub use store::{CatalogStore, CatalogTxn, FIRST_TABLE_ID};
