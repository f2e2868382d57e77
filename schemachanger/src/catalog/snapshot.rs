// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Read-only point-in-time view of the catalog

use super::descriptor::{ForeignKeyDescriptor, TableDescriptor};
use crate::element::{IndexId, TableId};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    tables: BTreeMap<TableId, TableDescriptor>,
    next_table_id: TableId,
}

impl CatalogSnapshot {
    pub fn new(tables: BTreeMap<TableId, TableDescriptor>, next_table_id: TableId) -> Self {
        let floor = tables.keys().next_back().map(|id| id + 1).unwrap_or(0);
        Self {
            tables,
            next_table_id: next_table_id.max(floor),
        }
    }

    /// Build a snapshot straight from descriptors
    pub fn from_tables(tables: impl IntoIterator<Item = TableDescriptor>) -> Self {
        let tables: BTreeMap<_, _> = tables.into_iter().map(|t| (t.id, t)).collect();
        Self::new(tables, super::store::FIRST_TABLE_ID)
    }

    pub fn table(&self, id: TableId) -> Option<&TableDescriptor> {
        self.tables.get(&id)
    }

    pub fn table_by_name(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.values().find(|t| t.name == name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableDescriptor> {
        self.tables.values()
    }

    pub fn next_table_id(&self) -> TableId {
        self.next_table_id
    }

    /// Foreign keys on other tables that reference `table`
    pub fn foreign_keys_referencing_table(
        &self,
        table: TableId,
    ) -> Vec<(&TableDescriptor, &ForeignKeyDescriptor)> {
        self.tables
            .values()
            .filter(|t| t.id != table)
            .flat_map(|t| t.foreign_keys.iter().map(move |fk| (t, fk)))
            .filter(|(_, fk)| fk.referenced_table == table)
            .collect()
    }

    /// Foreign keys, on any table, backed by `index` of `table`
    pub fn foreign_keys_referencing_index(
        &self,
        table: TableId,
        index: IndexId,
    ) -> Vec<(&TableDescriptor, &ForeignKeyDescriptor)> {
        self.tables
            .values()
            .flat_map(|t| t.foreign_keys.iter().map(move |fk| (t, fk)))
            .filter(|(_, fk)| fk.referenced_table == table && fk.referenced_index == index)
            .collect()
    }
}
