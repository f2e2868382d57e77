// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Table rows and secondary index entries
//!
//! Each table's rows live in their own tree (`table_{id}`), keyed by an
//! order-preserving encoding of the primary key. Each secondary index lives in
//! `index_{table}_{index}`, keyed by the encoded index key followed by the
//! encoded primary key.
//!
//! Writes go through [`TableDataStore::insert_row`], which honours the status
//! of every column, index and constraint of the table: elements that are not
//! yet writable are ignored, writable ones are maintained and enforced.

use super::persistent::{DynStorageDriver, StorageDriverError, StorageTree};
use crate::catalog::{CatalogSnapshot, ColumnDescriptor, IndexDescriptor, TableDescriptor};
use crate::element::{ColumnId, IndexId, Status, TableId};
use crate::eval::{check_passes, evaluate, CapabilityProvider, Datum, EvalError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// A stored row: values by column id
pub type Row = BTreeMap<ColumnId, Datum>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("Table {0} is not accepting writes")]
    TableOffline(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Value {value} does not fit column {column} of type {expected}")]
    TypeMismatch {
        column: String,
        expected: String,
        value: String,
    },

    #[error("Null value in column {0} violates not-null constraint")]
    NotNullViolation(String),

    #[error("Duplicate primary key {0}")]
    DuplicateKey(String),

    #[error("Duplicate key value violates unique index {0}")]
    UniqueViolation(String),

    #[error("Row violates check constraint {0}")]
    CheckViolation(String),

    #[error("Row violates foreign key constraint {0}")]
    ForeignKeyViolation(String),

    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<StorageDriverError> for DataError {
    fn from(err: StorageDriverError) -> Self {
        DataError::Storage(err.to_string())
    }
}

impl From<bincode::Error> for DataError {
    fn from(err: bincode::Error) -> Self {
        DataError::Serialization(err.to_string())
    }
}

pub type DataResult<T> = Result<T, DataError>;

/// Stored value of a secondary index entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub key_values: Vec<Datum>,
    pub primary_key: Vec<u8>,
}

/// Order-preserving, self-delimiting encoding of a list of datums
pub fn encode_key(values: &[Datum]) -> Vec<u8> {
    let mut out = Vec::new();
    for value in values {
        match value {
            Datum::Null => out.push(0x00),
            Datum::Bool(b) => {
                out.push(0x01);
                out.push(u8::from(*b));
            }
            Datum::Int(i) => {
                out.push(0x02);
                out.extend_from_slice(&((*i as u64) ^ (1 << 63)).to_be_bytes());
            }
            Datum::String(s) => {
                out.push(0x03);
                for byte in s.as_bytes() {
                    if *byte == 0x00 {
                        out.extend_from_slice(&[0x00, 0xFF]);
                    } else {
                        out.push(*byte);
                    }
                }
                out.extend_from_slice(&[0x00, 0x01]);
            }
            Datum::Timestamp(ts) => {
                out.push(0x04);
                out.extend_from_slice(&((ts.timestamp_micros() as u64) ^ (1 << 63)).to_be_bytes());
            }
            Datum::Uuid(u) => {
                out.push(0x05);
                out.extend_from_slice(u.as_bytes());
            }
        }
    }
    out
}

fn table_tree_name(table: TableId) -> String {
    format!("table_{}", table)
}

fn index_tree_name(table: TableId, index: IndexId) -> String {
    format!("index_{}_{}", table, index)
}

/// Row and index storage for user tables
pub struct TableDataStore {
    driver: Arc<DynStorageDriver>,
}

impl TableDataStore {
    pub fn new(driver: Arc<DynStorageDriver>) -> Self {
        Self { driver }
    }

    fn table_tree(&self, table: TableId) -> DataResult<Box<dyn StorageTree>> {
        Ok(self.driver.open_tree(&table_tree_name(table))?)
    }

    fn index_tree(&self, table: TableId, index: IndexId) -> DataResult<Box<dyn StorageTree>> {
        Ok(self.driver.open_tree(&index_tree_name(table, index))?)
    }

    pub fn get_row(&self, table: TableId, key: &[u8]) -> DataResult<Option<Row>> {
        match self.table_tree(table)?.get(key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_row(&self, table: TableId, key: &[u8], row: &Row) -> DataResult<()> {
        self.table_tree(table)?.insert(key, &bincode::serialize(row)?)?;
        Ok(())
    }

    /// Up to `limit` rows with keys strictly greater than `after`
    pub fn scan_rows_after(
        &self,
        table: TableId,
        after: Option<&[u8]>,
        limit: usize,
    ) -> DataResult<Vec<(Vec<u8>, Row)>> {
        let tree = self.table_tree(table)?;
        let iter = match after {
            Some(start) => tree.range_from(start)?,
            None => tree.iter()?,
        };
        let mut rows = Vec::new();
        for item in iter {
            let (key, bytes) = item?;
            if after == Some(key.as_slice()) {
                continue;
            }
            rows.push((key, bincode::deserialize(&bytes)?));
            if rows.len() >= limit {
                break;
            }
        }
        Ok(rows)
    }

    pub fn scan_rows(&self, table: TableId) -> DataResult<Vec<(Vec<u8>, Row)>> {
        self.scan_rows_after(table, None, usize::MAX)
    }

    pub fn row_count(&self, table: TableId) -> DataResult<usize> {
        let mut count = 0;
        for item in self.table_tree(table)?.iter()? {
            item?;
            count += 1;
        }
        Ok(count)
    }

    pub fn put_index_entry(&self, table: TableId, index: IndexId, entry: &IndexEntry) -> DataResult<()> {
        let mut key = encode_key(&entry.key_values);
        key.extend_from_slice(&entry.primary_key);
        self.index_tree(table, index)?
            .insert(&key, &bincode::serialize(entry)?)?;
        Ok(())
    }

    /// Every entry of an index in key order
    pub fn scan_index(&self, table: TableId, index: IndexId) -> DataResult<Vec<IndexEntry>> {
        let mut entries = Vec::new();
        for item in self.index_tree(table, index)?.iter()? {
            let (_, bytes) = item?;
            entries.push(bincode::deserialize(&bytes)?);
        }
        Ok(entries)
    }

    /// Whether the index holds an entry with exactly these key values
    pub fn index_contains(&self, table: TableId, index: IndexId, key_values: &[Datum]) -> DataResult<bool> {
        let prefix = encode_key(key_values);
        let tree = self.index_tree(table, index)?;
        let mut iter = tree.scan_prefix(&prefix)?;
        match iter.next() {
            Some(item) => {
                item?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn drop_index_data(&self, table: TableId, index: IndexId) -> DataResult<()> {
        self.driver.drop_tree(&index_tree_name(table, index))?;
        Ok(())
    }

    /// Remove the rows and every index of `table`
    pub fn drop_table_data(&self, table: TableId) -> DataResult<()> {
        let index_prefix = format!("index_{}_", table);
        for name in self.driver.list_trees()? {
            if name.starts_with(&index_prefix) {
                self.driver.drop_tree(&name)?;
            }
        }
        self.driver.drop_tree(&table_tree_name(table))?;
        Ok(())
    }

    /// Insert one row, maintaining and enforcing every writable element
    ///
    /// Only public columns may be named in `values`. Columns at write-only or
    /// later receive their default when not named.
    pub fn insert_row(
        &self,
        table: &TableDescriptor,
        catalog: &CatalogSnapshot,
        values: &[(String, Datum)],
        provider: &CapabilityProvider,
    ) -> DataResult<Vec<u8>> {
        if table.status != Status::Public {
            return Err(DataError::TableOffline(table.name.clone()));
        }
        let mut given: HashMap<&str, &Datum> = HashMap::new();
        for (name, value) in values {
            let column = table
                .column_by_name(name)
                .filter(|c| c.status == Status::Public)
                .ok_or_else(|| DataError::UnknownColumn(name.clone()))?;
            check_column_type(column, value)?;
            given.insert(name.as_str(), value);
        }

        // Defaults cannot reference columns
        let no_columns = |_: &str| -> Option<Datum> { None };
        let mut row = Row::new();
        for column in table.columns.iter().filter(|c| c.status.is_writable()) {
            let value = match given.get(column.name.as_str()) {
                Some(value) => (*value).clone(),
                None => match &column.default {
                    Some(expr) => evaluate(expr, &no_columns, provider)?,
                    None => Datum::Null,
                },
            };
            if value.is_null() && !column.nullable && column.status == Status::Public {
                return Err(DataError::NotNullViolation(column.name.clone()));
            }
            row.insert(column.id, value);
        }

        let pk_values = key_values(&row, table.primary_key_columns());
        if pk_values.iter().any(Datum::is_null) {
            return Err(DataError::NotNullViolation(format!("{} primary key", table.name)));
        }
        let pk = encode_key(&pk_values);
        if self.get_row(table.id, &pk)?.is_some() {
            return Err(DataError::DuplicateKey(format_values(&pk_values)));
        }

        let resolver = row_resolver(table, &row);
        for check in table.checks.iter().filter(|c| c.status.is_writable()) {
            if !check_passes(&evaluate(&check.expr, &resolver, provider)?) {
                return Err(DataError::CheckViolation(check.name.clone()));
            }
        }

        for fk in table.foreign_keys.iter().filter(|fk| fk.status.is_writable()) {
            let child_values = key_values(&row, &fk.columns);
            if child_values.iter().any(Datum::is_null) {
                continue;
            }
            let exists = match catalog.table(fk.referenced_table) {
                Some(parent) if parent.id == table.id => {
                    self.row_with_values_exists(parent, &fk.referenced_columns, &child_values)?
                        || key_values(&row, &fk.referenced_columns) == child_values
                }
                Some(parent) => {
                    self.row_with_values_exists(parent, &fk.referenced_columns, &child_values)?
                }
                None => false,
            };
            if !exists {
                return Err(DataError::ForeignKeyViolation(fk.name.clone()));
            }
        }

        let writable_indexes: Vec<&IndexDescriptor> =
            table.indexes.iter().filter(|i| i.status.is_writable()).collect();
        for index in &writable_indexes {
            let values = key_values(&row, &index.key_columns);
            if index.unique
                && index.status >= Status::Validated
                && !values.iter().any(Datum::is_null)
                && self.index_contains(table.id, index.id, &values)?
            {
                return Err(DataError::UniqueViolation(index.name.clone()));
            }
        }

        self.put_row(table.id, &pk, &row)?;
        for index in writable_indexes {
            let entry = IndexEntry {
                key_values: key_values(&row, &index.key_columns),
                primary_key: pk.clone(),
            };
            self.put_index_entry(table.id, index.id, &entry)?;
        }
        Ok(pk)
    }

    /// Whether `parent` holds a row whose `columns` equal `values`
    pub fn row_with_values_exists(
        &self,
        parent: &TableDescriptor,
        columns: &[ColumnId],
        values: &[Datum],
    ) -> DataResult<bool> {
        if columns == parent.primary_key_columns() {
            return Ok(self.get_row(parent.id, &encode_key(values))?.is_some());
        }
        if let Some(index) = parent
            .indexes
            .iter()
            .find(|i| i.key_columns == columns && i.status.is_writable())
        {
            return self.index_contains(parent.id, index.id, values);
        }
        for (_, row) in self.scan_rows(parent.id)? {
            if key_values(&row, columns) == values {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Values of `columns` in `row`, missing columns read as NULL
pub fn key_values(row: &Row, columns: &[ColumnId]) -> Vec<Datum> {
    columns
        .iter()
        .map(|id| row.get(id).cloned().unwrap_or(Datum::Null))
        .collect()
}

/// Resolve column names of `table` against a stored row
pub fn row_resolver<'a>(table: &'a TableDescriptor, row: &'a Row) -> impl Fn(&str) -> Option<Datum> + 'a {
    move |name: &str| {
        table
            .column_by_name(name)
            .map(|c| row.get(&c.id).cloned().unwrap_or(Datum::Null))
    }
}

fn check_column_type(column: &ColumnDescriptor, value: &Datum) -> DataResult<()> {
    match value.column_type() {
        Some(ty) if ty != column.column_type => Err(DataError::TypeMismatch {
            column: column.name.clone(),
            expected: column.column_type.to_string(),
            value: value.to_string(),
        }),
        _ => Ok(()),
    }
}

fn format_values(values: &[Datum]) -> String {
    let parts: Vec<String> = values.iter().map(Datum::to_string).collect();
    format!("({})", parts.join(", "))
}
