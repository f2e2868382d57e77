// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Table descriptors
//!
//! A descriptor is the persisted definition of one table. Every sub-object
//! carries its lifecycle [`Status`] and, while a schema change is moving it,
//! the run that owns it.

use super::error::{CatalogError, CatalogResult};
use crate::element::{
    ColumnId, ConstraintId, Element, ElementKey, ElementKind, IndexId, Status, TableId,
};
use crate::eval::{ColumnType, Expr};
use crate::jobs::RunId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub id: ColumnId,
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub default: Option<Expr>,
    pub status: Status,
    pub owner: Option<RunId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub id: IndexId,
    pub name: String,
    pub key_columns: Vec<ColumnId>,
    pub unique: bool,
    pub status: Status,
    pub owner: Option<RunId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckDescriptor {
    pub id: ConstraintId,
    pub name: String,
    pub expr: Expr,
    pub columns: Vec<ColumnId>,
    pub status: Status,
    pub owner: Option<RunId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyDescriptor {
    pub id: ConstraintId,
    pub name: String,
    pub columns: Vec<ColumnId>,
    pub referenced_table: TableId,
    pub referenced_columns: Vec<ColumnId>,
    pub referenced_index: IndexId,
    pub status: Status,
    pub owner: Option<RunId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub id: TableId,
    pub name: String,
    pub status: Status,
    pub owner: Option<RunId>,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_index: Option<IndexDescriptor>,
    pub indexes: Vec<IndexDescriptor>,
    pub checks: Vec<CheckDescriptor>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
    pub next_column_id: ColumnId,
    pub next_index_id: IndexId,
    pub next_constraint_id: ConstraintId,
}

impl TableDescriptor {
    pub fn new(id: TableId, name: impl Into<String>, status: Status, owner: Option<RunId>) -> Self {
        Self {
            id,
            name: name.into(),
            status,
            owner,
            columns: Vec::new(),
            primary_index: None,
            indexes: Vec::new(),
            checks: Vec::new(),
            foreign_keys: Vec::new(),
            next_column_id: 1,
            next_index_id: 1,
            next_constraint_id: 1,
        }
    }

    pub fn column(&self, id: ColumnId) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Primary or secondary index by id
    pub fn index(&self, id: IndexId) -> Option<&IndexDescriptor> {
        self.primary_index
            .iter()
            .chain(self.indexes.iter())
            .find(|i| i.id == id)
    }

    pub fn index_by_name(&self, name: &str) -> Option<&IndexDescriptor> {
        self.primary_index
            .iter()
            .chain(self.indexes.iter())
            .find(|i| i.name == name)
    }

    pub fn check(&self, id: ConstraintId) -> Option<&CheckDescriptor> {
        self.checks.iter().find(|c| c.id == id)
    }

    pub fn foreign_key(&self, id: ConstraintId) -> Option<&ForeignKeyDescriptor> {
        self.foreign_keys.iter().find(|fk| fk.id == id)
    }

    /// Whether any constraint (check, foreign key, unique index) uses `name`
    pub fn has_constraint_named(&self, name: &str) -> bool {
        self.checks.iter().any(|c| c.name == name)
            || self.foreign_keys.iter().any(|fk| fk.name == name)
            || self.index_by_name(name).is_some()
    }

    pub fn primary_key_columns(&self) -> &[ColumnId] {
        self.primary_index
            .as_ref()
            .map(|pk| pk.key_columns.as_slice())
            .unwrap_or(&[])
    }

    /// Column names by id, for expression evaluation against stored rows
    pub fn column_names(&self) -> Vec<(ColumnId, String)> {
        self.columns.iter().map(|c| (c.id, c.name.clone())).collect()
    }

    /// Status and owner of the element identified by `key`, `None` when absent
    pub fn element_status(&self, key: &ElementKey) -> Option<(Status, Option<RunId>)> {
        if key.table_id != self.id {
            return None;
        }
        match key.kind {
            ElementKind::Table => Some((self.status, self.owner)),
            ElementKind::Column => self.column(key.sub_id).map(|c| (c.status, c.owner)),
            ElementKind::PrimaryIndex => self
                .primary_index
                .as_ref()
                .filter(|pk| pk.id == key.sub_id)
                .map(|pk| (pk.status, pk.owner)),
            ElementKind::SecondaryIndex => self
                .indexes
                .iter()
                .find(|i| i.id == key.sub_id)
                .map(|i| (i.status, i.owner)),
            ElementKind::CheckConstraint => self.check(key.sub_id).map(|c| (c.status, c.owner)),
            ElementKind::ForeignKey => self.foreign_key(key.sub_id).map(|fk| (fk.status, fk.owner)),
        }
    }

    /// Name of the element identified by `key`
    pub fn element_name(&self, key: &ElementKey) -> Option<&str> {
        if key.table_id != self.id {
            return None;
        }
        let name = match key.kind {
            ElementKind::Table => Some(&self.name),
            ElementKind::Column => self.column(key.sub_id).map(|c| &c.name),
            ElementKind::PrimaryIndex | ElementKind::SecondaryIndex => {
                self.index(key.sub_id).map(|i| &i.name)
            }
            ElementKind::CheckConstraint => self.check(key.sub_id).map(|c| &c.name),
            ElementKind::ForeignKey => self.foreign_key(key.sub_id).map(|fk| &fk.name),
        };
        name.map(String::as_str)
    }

    /// Insert a sub-object described by `element` at `status`
    pub fn add_element(&mut self, element: &Element, status: Status, owner: Option<RunId>) -> CatalogResult<()> {
        let key = element.key();
        if self.element_status(&key).is_some() {
            return Err(CatalogError::ElementAlreadyExists(key.to_string()));
        }
        match element {
            Element::Table(_) => {
                return Err(CatalogError::InvalidOperation(
                    "a table is not a sub-object of a table".to_string(),
                ))
            }
            Element::Column(c) => {
                self.columns.push(ColumnDescriptor {
                    id: c.column_id,
                    name: c.name.clone(),
                    column_type: c.column_type,
                    nullable: c.nullable,
                    default: c.default.clone(),
                    status,
                    owner,
                });
                self.next_column_id = self.next_column_id.max(c.column_id + 1);
            }
            Element::PrimaryIndex(i) | Element::SecondaryIndex(i) => {
                let index = IndexDescriptor {
                    id: i.index_id,
                    name: i.name.clone(),
                    key_columns: i.key_columns.clone(),
                    unique: i.unique,
                    status,
                    owner,
                };
                if element.kind() == ElementKind::PrimaryIndex {
                    self.primary_index = Some(index);
                } else {
                    self.indexes.push(index);
                }
                self.next_index_id = self.next_index_id.max(i.index_id + 1);
            }
            Element::CheckConstraint(c) => {
                self.checks.push(CheckDescriptor {
                    id: c.constraint_id,
                    name: c.name.clone(),
                    expr: c.expr.clone(),
                    columns: c.columns.clone(),
                    status,
                    owner,
                });
                self.next_constraint_id = self.next_constraint_id.max(c.constraint_id + 1);
            }
            Element::ForeignKey(fk) => {
                self.foreign_keys.push(ForeignKeyDescriptor {
                    id: fk.constraint_id,
                    name: fk.name.clone(),
                    columns: fk.columns.clone(),
                    referenced_table: fk.referenced_table,
                    referenced_columns: fk.referenced_columns.clone(),
                    referenced_index: fk.referenced_index,
                    status,
                    owner,
                });
                self.next_constraint_id = self.next_constraint_id.max(fk.constraint_id + 1);
            }
        }
        Ok(())
    }

    /// Move an existing element to `status`
    pub fn set_element_status(&mut self, key: &ElementKey, status: Status, owner: Option<RunId>) -> CatalogResult<()> {
        let slot: Option<(&mut Status, &mut Option<RunId>)> = match key.kind {
            ElementKind::Table => Some((&mut self.status, &mut self.owner)),
            ElementKind::Column => self
                .columns
                .iter_mut()
                .find(|c| c.id == key.sub_id)
                .map(|c| (&mut c.status, &mut c.owner)),
            ElementKind::PrimaryIndex => self
                .primary_index
                .as_mut()
                .filter(|pk| pk.id == key.sub_id)
                .map(|pk| (&mut pk.status, &mut pk.owner)),
            ElementKind::SecondaryIndex => self
                .indexes
                .iter_mut()
                .find(|i| i.id == key.sub_id)
                .map(|i| (&mut i.status, &mut i.owner)),
            ElementKind::CheckConstraint => self
                .checks
                .iter_mut()
                .find(|c| c.id == key.sub_id)
                .map(|c| (&mut c.status, &mut c.owner)),
            ElementKind::ForeignKey => self
                .foreign_keys
                .iter_mut()
                .find(|fk| fk.id == key.sub_id)
                .map(|fk| (&mut fk.status, &mut fk.owner)),
        };
        let (slot_status, slot_owner) =
            slot.ok_or_else(|| CatalogError::ElementNotFound(key.to_string()))?;
        *slot_status = status;
        *slot_owner = owner;
        Ok(())
    }

    /// Remove a sub-object entirely
    pub fn remove_element(&mut self, key: &ElementKey) -> CatalogResult<()> {
        let before = self.element_count();
        match key.kind {
            ElementKind::Table => {
                return Err(CatalogError::InvalidOperation(
                    "tables are removed through the catalog".to_string(),
                ))
            }
            ElementKind::Column => self.columns.retain(|c| c.id != key.sub_id),
            ElementKind::PrimaryIndex => {
                if self.primary_index.as_ref().map(|pk| pk.id) == Some(key.sub_id) {
                    self.primary_index = None;
                }
            }
            ElementKind::SecondaryIndex => self.indexes.retain(|i| i.id != key.sub_id),
            ElementKind::CheckConstraint => self.checks.retain(|c| c.id != key.sub_id),
            ElementKind::ForeignKey => self.foreign_keys.retain(|fk| fk.id != key.sub_id),
        }
        if self.element_count() == before {
            return Err(CatalogError::ElementNotFound(key.to_string()));
        }
        Ok(())
    }

    fn element_count(&self) -> usize {
        self.columns.len()
            + usize::from(self.primary_index.is_some())
            + self.indexes.len()
            + self.checks.len()
            + self.foreign_keys.len()
    }

    /// Keys of every sub-object owned by a schema change in progress
    pub fn busy_elements(&self) -> Vec<ElementKey> {
        let mut keys = Vec::new();
        let id = self.id;
        if self.owner.is_some() {
            keys.push(ElementKey::table(id));
        }
        keys.extend(
            self.columns
                .iter()
                .filter(|c| c.owner.is_some())
                .map(|c| ElementKey::new(ElementKind::Column, id, c.id)),
        );
        keys.extend(
            self.indexes
                .iter()
                .filter(|i| i.owner.is_some())
                .map(|i| ElementKey::new(ElementKind::SecondaryIndex, id, i.id)),
        );
        keys.extend(
            self.checks
                .iter()
                .filter(|c| c.owner.is_some())
                .map(|c| ElementKey::new(ElementKind::CheckConstraint, id, c.id)),
        );
        keys.extend(
            self.foreign_keys
                .iter()
                .filter(|fk| fk.owner.is_some())
                .map(|fk| ElementKey::new(ElementKind::ForeignKey, id, fk.id)),
        );
        keys
    }
}
