// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Secondary index build

use super::error::{OperatorError, OperatorResult};
use super::progress::ProgressTag;
use super::OperatorContext;
use crate::element::{ElementKey, ElementKind, IndexId, TableId};
use crate::storage::{key_values, IndexEntry};

/// Write an index entry for every row
///
/// Entries are keyed by index key and primary key, so rewriting an entry the
/// write path already produced leaves the index unchanged.
pub fn build_index(ctx: &OperatorContext<'_>, table_id: TableId, index_id: IndexId) -> OperatorResult<()> {
    let key = ElementKey::new(ElementKind::SecondaryIndex, table_id, index_id);
    let table = ctx.table(table_id)?;
    let index = table
        .indexes
        .iter()
        .find(|i| i.id == index_id)
        .ok_or_else(|| OperatorError::ElementMissing(key.to_string()))?;

    let rows = ctx.scan_batched(table_id, &key, ProgressTag::IndexBuild, |primary_key, row| {
        let entry = IndexEntry {
            key_values: key_values(row, &index.key_columns),
            primary_key: primary_key.to_vec(),
        };
        ctx.data.put_index_entry(table_id, index_id, &entry)?;
        Ok(None)
    })?;
    log::info!("built index {} on {}: {} row(s)", index.name, table.name, rows);
    Ok(())
}
