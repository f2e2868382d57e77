// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Backfill, validation and data GC operators
//!
//! Operators scan table data in batches of `BackfillConfig::batch_size`
//! rows and persist their position after every batch, so an interrupted
//! operator continues where it stopped. Re-running a completed operator is a
//! no-op; re-running a partial one rewrites at most one batch, and every
//! write an operator makes is idempotent.

pub mod column;
pub mod error;
pub mod gc;
pub mod index;
pub mod progress;
pub mod validate;

pub use error::{OperatorError, OperatorResult};
pub use progress::{BackfillProgress, ProgressStore, ProgressTag};

use crate::catalog::{CatalogSnapshot, TableDescriptor};
use crate::element::{ElementKey, TableId};
use crate::eval::CapabilityProvider;
use crate::jobs::RunId;
use crate::scheduler::{BackfillOp, GcOp, Op, ValidationOp};
use crate::storage::{Row, TableDataStore};

/// Everything an operator reads or writes
pub struct OperatorContext<'a> {
    pub run_id: RunId,
    /// Catalog as of the start of the stage
    pub catalog: &'a CatalogSnapshot,
    pub data: &'a TableDataStore,
    pub progress: &'a ProgressStore,
    pub provider: &'a CapabilityProvider,
    pub batch_size: usize,
}

impl<'a> OperatorContext<'a> {
    pub fn table(&self, id: TableId) -> OperatorResult<&'a TableDescriptor> {
        let catalog: &'a CatalogSnapshot = self.catalog;
        catalog
            .table(id)
            .ok_or_else(|| OperatorError::ElementMissing(ElementKey::table(id).to_string()))
    }

    /// Visit every row of `table` in batches, resuming from saved progress
    ///
    /// `visit` returns the rewritten row, if any, which is stored before the
    /// batch's progress is saved.
    pub fn scan_batched<F>(
        &self,
        table: TableId,
        element: &ElementKey,
        tag: ProgressTag,
        mut visit: F,
    ) -> OperatorResult<u64>
    where
        F: FnMut(&[u8], &Row) -> OperatorResult<Option<Row>>,
    {
        let mut progress = self.progress.load(self.run_id, element, tag)?;
        if progress.complete {
            log::debug!("{:?} of {} already complete", tag, element);
            return Ok(progress.rows_processed);
        }
        let batch_size = self.batch_size.max(1);
        loop {
            let batch =
                self.data
                    .scan_rows_after(table, progress.resume_key.as_deref(), batch_size)?;
            let Some((last_key, _)) = batch.last() else {
                break;
            };
            let last_key = last_key.clone();
            for (key, row) in &batch {
                if let Some(rewritten) = visit(key, row)? {
                    self.data.put_row(table, key, &rewritten)?;
                }
            }
            progress.rows_processed += batch.len() as u64;
            progress.resume_key = Some(last_key);
            self.progress.save(self.run_id, element, tag, &progress)?;
            log::debug!(
                "{:?} of {}: {} row(s) processed",
                tag,
                element,
                progress.rows_processed
            );
            if batch.len() < batch_size {
                break;
            }
        }
        progress.complete = true;
        self.progress.save(self.run_id, element, tag, &progress)?;
        Ok(progress.rows_processed)
    }
}

/// Run one backfill or validation operation
pub fn run_long_running(op: &Op, ctx: &OperatorContext<'_>) -> OperatorResult<()> {
    match op {
        Op::Backfill(BackfillOp::ColumnDefault {
            table_id,
            column_id,
        }) => column::backfill_default(ctx, *table_id, *column_id),
        Op::Backfill(BackfillOp::IndexBuild { table_id, index_id }) => {
            index::build_index(ctx, *table_id, *index_id)
        }
        Op::Validation(ValidationOp::NotNull {
            table_id,
            column_id,
        }) => validate::not_null(ctx, *table_id, *column_id),
        Op::Validation(ValidationOp::UniqueIndex { table_id, index_id }) => {
            validate::unique_index(ctx, *table_id, *index_id)
        }
        Op::Validation(ValidationOp::Check {
            table_id,
            constraint_id,
        }) => validate::check(ctx, *table_id, *constraint_id),
        Op::Validation(ValidationOp::ForeignKey {
            table_id,
            constraint_id,
        }) => validate::foreign_key(ctx, *table_id, *constraint_id),
        Op::Mutation(_) | Op::Gc(_) => Ok(()),
    }
}

/// Run one data GC operation
pub fn run_gc(op: &GcOp, data: &TableDataStore) -> OperatorResult<()> {
    gc::collect(op, data)
}
