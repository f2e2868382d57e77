// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Column default backfill

use super::error::{OperatorError, OperatorResult};
use super::progress::ProgressTag;
use super::OperatorContext;
use crate::element::{ColumnId, ElementKey, ElementKind, TableId};
use crate::eval::{evaluate, Datum};

/// Write the column's default into every row that has no value for it
///
/// Rows written while the column was already writable keep their value.
pub fn backfill_default(ctx: &OperatorContext<'_>, table_id: TableId, column_id: ColumnId) -> OperatorResult<()> {
    let key = ElementKey::new(ElementKind::Column, table_id, column_id);
    let table = ctx.table(table_id)?;
    let column = table
        .column(column_id)
        .ok_or_else(|| OperatorError::ElementMissing(key.to_string()))?;
    let Some(default) = &column.default else {
        return Ok(());
    };

    let no_columns = |_: &str| -> Option<Datum> { None };
    let rows = ctx.scan_batched(table_id, &key, ProgressTag::ColumnDefault, |_, row| {
        if row.contains_key(&column_id) {
            return Ok(None);
        }
        let value = evaluate(default, &no_columns, ctx.provider)
            .map_err(|e| OperatorError::Validation(format!("default of {}: {}", column.name, e)))?;
        let mut row = row.clone();
        row.insert(column_id, value);
        Ok(Some(row))
    })?;
    log::info!("backfilled column {} of {}: {} row(s)", column.name, table.name, rows);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{column, items, Fixture};
    use super::*;
    use crate::catalog::CatalogSnapshot;
    use crate::element::Status;
    use crate::eval::{ColumnType, Expr};

    fn with_new_column() -> CatalogSnapshot {
        let mut table = items();
        let mut note = column(3, "note", ColumnType::String, Status::Backfilling);
        note.default = Some(Expr::literal(Datum::String("n/a".into())));
        table.columns.push(note);
        CatalogSnapshot::from_tables([table])
    }

    #[test]
    fn test_backfill_fills_missing_values_only() {
        let fixture = Fixture::new();
        let catalog = with_new_column();
        fixture.put_rows(
            100,
            &[
                &[(1, Datum::Int(1)), (2, Datum::Int(5))],
                &[(1, Datum::Int(2)), (2, Datum::Int(6)), (3, Datum::String("kept".into()))],
                &[(1, Datum::Int(3)), (2, Datum::Int(7))],
            ],
        );
        backfill_default(&fixture.ctx(&catalog, 2), 100, 3).unwrap();

        let values: Vec<Datum> = fixture
            .data
            .scan_rows(100)
            .unwrap()
            .into_iter()
            .map(|(_, row)| row[&3].clone())
            .collect();
        assert_eq!(
            values,
            vec![
                Datum::String("n/a".into()),
                Datum::String("kept".into()),
                Datum::String("n/a".into()),
            ]
        );
        let progress = fixture
            .progress
            .load(fixture.run_id, &ElementKey::new(ElementKind::Column, 100, 3), ProgressTag::ColumnDefault)
            .unwrap();
        assert!(progress.complete);
        assert_eq!(progress.rows_processed, 3);
    }

    #[test]
    fn test_backfill_resumes_after_saved_batch() {
        let fixture = Fixture::new();
        let catalog = with_new_column();
        fixture.put_rows(100, &[&[(1, Datum::Int(1))], &[(1, Datum::Int(2))]]);
        let key = ElementKey::new(ElementKind::Column, 100, 3);
        let first_key = fixture.data.scan_rows(100).unwrap()[0].0.clone();
        fixture
            .progress
            .save(
                fixture.run_id,
                &key,
                ProgressTag::ColumnDefault,
                &super::super::BackfillProgress {
                    resume_key: Some(first_key),
                    rows_processed: 1,
                    complete: false,
                },
            )
            .unwrap();

        backfill_default(&fixture.ctx(&catalog, 10), 100, 3).unwrap();
        let rows = fixture.data.scan_rows(100).unwrap();
        assert!(!rows[0].1.contains_key(&3), "first row was already processed");
        assert_eq!(rows[1].1[&3], Datum::String("n/a".into()));
    }
}
