// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Element kinds, identities and payloads

use crate::eval::{ColumnType, Expr};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

pub type TableId = u32;
pub type ColumnId = u32;
pub type IndexId = u32;
pub type ConstraintId = u32;

/// Element kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementKind {
    Table,
    Column,
    PrimaryIndex,
    SecondaryIndex,
    CheckConstraint,
    ForeignKey,
}

impl ElementKind {
    pub const ALL: [ElementKind; 6] = [
        ElementKind::Table,
        ElementKind::Column,
        ElementKind::PrimaryIndex,
        ElementKind::SecondaryIndex,
        ElementKind::CheckConstraint,
        ElementKind::ForeignKey,
    ];

    /// Kinds whose removal destroys stored data
    pub fn is_data_bearing(self) -> bool {
        matches!(
            self,
            ElementKind::Table
                | ElementKind::Column
                | ElementKind::PrimaryIndex
                | ElementKind::SecondaryIndex
        )
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementKind::Table => "table",
            ElementKind::Column => "column",
            ElementKind::PrimaryIndex => "primary index",
            ElementKind::SecondaryIndex => "index",
            ElementKind::CheckConstraint => "check constraint",
            ElementKind::ForeignKey => "foreign key",
        };
        write!(f, "{}", name)
    }
}

/// Stable identity of an element
///
/// `sub_id` is the column, index or constraint id within the table, and 0 for
/// the table itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementKey {
    pub kind: ElementKind,
    pub table_id: TableId,
    pub sub_id: u32,
}

impl ElementKey {
    pub fn new(kind: ElementKind, table_id: TableId, sub_id: u32) -> Self {
        Self {
            kind,
            table_id,
            sub_id,
        }
    }

    pub fn table(table_id: TableId) -> Self {
        Self::new(ElementKind::Table, table_id, 0)
    }

    /// Fixed-width big-endian encoding used in storage keys
    pub fn to_bytes(&self) -> [u8; 9] {
        let mut out = [0u8; 9];
        out[0] = self.kind as u8;
        out[1..5].copy_from_slice(&self.table_id.to_be_bytes());
        out[5..9].copy_from_slice(&self.sub_id.to_be_bytes());
        out
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ElementKind::Table => write!(f, "table#{}", self.table_id),
            kind => write!(f, "{}#{}.{}", kind, self.table_id, self.sub_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableElement {
    pub table_id: TableId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnElement {
    pub table_id: TableId,
    pub column_id: ColumnId,
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexElement {
    pub table_id: TableId,
    pub index_id: IndexId,
    pub name: String,
    pub key_columns: Vec<ColumnId>,
    pub unique: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckElement {
    pub table_id: TableId,
    pub constraint_id: ConstraintId,
    pub name: String,
    pub expr: Expr,
    /// Columns the expression reads
    pub columns: Vec<ColumnId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyElement {
    pub table_id: TableId,
    pub constraint_id: ConstraintId,
    pub name: String,
    pub columns: Vec<ColumnId>,
    pub referenced_table: TableId,
    pub referenced_columns: Vec<ColumnId>,
    /// Unique index on the referenced table backing the reference
    pub referenced_index: IndexId,
}

/// One catalog sub-object targeted by a schema change
///
/// Elements compare and hash by [`ElementKey`] only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Element {
    Table(TableElement),
    Column(ColumnElement),
    PrimaryIndex(IndexElement),
    SecondaryIndex(IndexElement),
    CheckConstraint(CheckElement),
    ForeignKey(ForeignKeyElement),
}

impl Element {
    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Table(_) => ElementKind::Table,
            Element::Column(_) => ElementKind::Column,
            Element::PrimaryIndex(_) => ElementKind::PrimaryIndex,
            Element::SecondaryIndex(_) => ElementKind::SecondaryIndex,
            Element::CheckConstraint(_) => ElementKind::CheckConstraint,
            Element::ForeignKey(_) => ElementKind::ForeignKey,
        }
    }

    pub fn table_id(&self) -> TableId {
        match self {
            Element::Table(t) => t.table_id,
            Element::Column(c) => c.table_id,
            Element::PrimaryIndex(i) | Element::SecondaryIndex(i) => i.table_id,
            Element::CheckConstraint(c) => c.table_id,
            Element::ForeignKey(fk) => fk.table_id,
        }
    }

    pub fn key(&self) -> ElementKey {
        let sub_id = match self {
            Element::Table(_) => 0,
            Element::Column(c) => c.column_id,
            Element::PrimaryIndex(i) | Element::SecondaryIndex(i) => i.index_id,
            Element::CheckConstraint(c) => c.constraint_id,
            Element::ForeignKey(fk) => fk.constraint_id,
        };
        ElementKey::new(self.kind(), self.table_id(), sub_id)
    }

    pub fn name(&self) -> &str {
        match self {
            Element::Table(t) => &t.name,
            Element::Column(c) => &c.name,
            Element::PrimaryIndex(i) | Element::SecondaryIndex(i) => &i.name,
            Element::CheckConstraint(c) => &c.name,
            Element::ForeignKey(fk) => &fk.name,
        }
    }

    /// Columns of the owning table this element reads
    pub fn depends_on_columns(&self) -> &[ColumnId] {
        match self {
            Element::Table(_) | Element::Column(_) => &[],
            Element::PrimaryIndex(i) | Element::SecondaryIndex(i) => &i.key_columns,
            Element::CheckConstraint(c) => &c.columns,
            Element::ForeignKey(fk) => &fk.columns,
        }
    }

    /// Whether this element reads `column` of `table`, including columns
    /// referenced by a foreign key on another table
    pub fn uses_column(&self, table: TableId, column: ColumnId) -> bool {
        if self.table_id() == table && self.depends_on_columns().contains(&column) {
            return true;
        }
        match self {
            Element::ForeignKey(fk) => {
                fk.referenced_table == table && fk.referenced_columns.contains(&column)
            }
            _ => false,
        }
    }

    pub fn as_column(&self) -> Option<&ColumnElement> {
        match self {
            Element::Column(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_index(&self) -> Option<&IndexElement> {
        match self {
            Element::PrimaryIndex(i) | Element::SecondaryIndex(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_foreign_key(&self) -> Option<&ForeignKeyElement> {
        match self {
            Element::ForeignKey(fk) => Some(fk),
            _ => None,
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Element {}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.kind(), self.name(), self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(id: ColumnId, name: &str) -> Element {
        Element::Column(ColumnElement {
            table_id: 52,
            column_id: id,
            name: name.to_string(),
            column_type: ColumnType::Int8,
            nullable: true,
            default: None,
        })
    }

    #[test]
    fn test_equality_uses_key_only() {
        assert_eq!(column(2, "a"), column(2, "renamed"));
        assert_ne!(column(2, "a"), column(3, "a"));
        assert_eq!(column(2, "a").key().to_string(), "column#52.2");
    }

    #[test]
    fn test_foreign_key_uses_referenced_columns() {
        let fk = Element::ForeignKey(ForeignKeyElement {
            table_id: 53,
            constraint_id: 1,
            name: "orders_customer_fkey".into(),
            columns: vec![2],
            referenced_table: 52,
            referenced_columns: vec![1],
            referenced_index: 1,
        });
        assert!(fk.uses_column(53, 2));
        assert!(fk.uses_column(52, 1));
        assert!(!fk.uses_column(52, 2));
    }

    #[test]
    fn test_key_bytes_sort_like_keys() {
        let a = ElementKey::new(ElementKind::Column, 1, 300);
        let b = ElementKey::new(ElementKind::Column, 2, 1);
        assert!(a < b);
        assert!(a.to_bytes() < b.to_bytes());
    }
}
