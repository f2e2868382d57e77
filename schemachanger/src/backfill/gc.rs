// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Removal of data left behind by dropped elements
//!
//! GC runs after the catalog no longer mentions the element, so nothing reads
//! or writes the data anymore. Every operation is idempotent.

use super::error::OperatorResult;
use crate::scheduler::GcOp;
use crate::storage::TableDataStore;

pub fn collect(op: &GcOp, data: &TableDataStore) -> OperatorResult<()> {
    match op {
        GcOp::ColumnData {
            table_id,
            column_id,
        } => {
            let mut cleared = 0u64;
            for (key, mut row) in data.scan_rows(*table_id)? {
                if row.remove(column_id).is_some() {
                    data.put_row(*table_id, &key, &row)?;
                    cleared += 1;
                }
            }
            log::debug!("{}: {} row(s) rewritten", op, cleared);
        }
        GcOp::IndexData { table_id, index_id } => data.drop_index_data(*table_id, *index_id)?,
        GcOp::TableData { table_id } => data.drop_table_data(*table_id)?,
    }
    log::info!("{}", op);
    Ok(())
}
