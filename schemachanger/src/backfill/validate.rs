// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Validation of existing data against new constraints
//!
//! A violation is reported as [`OperatorError::Validation`]; the schema
//! change is then reverted rather than retried.

use super::error::{OperatorError, OperatorResult};
use super::progress::ProgressTag;
use super::OperatorContext;
use crate::element::{ColumnId, ConstraintId, ElementKey, ElementKind, IndexId, TableId};
use crate::eval::{check_passes, evaluate, Datum};
use crate::storage::{key_values, row_resolver};

pub fn not_null(ctx: &OperatorContext<'_>, table_id: TableId, column_id: ColumnId) -> OperatorResult<()> {
    let key = ElementKey::new(ElementKind::Column, table_id, column_id);
    let table = ctx.table(table_id)?;
    let column = table
        .column(column_id)
        .ok_or_else(|| OperatorError::ElementMissing(key.to_string()))?;
    ctx.scan_batched(table_id, &key, ProgressTag::NotNull, |_, row| {
        match row.get(&column_id) {
            Some(value) if !value.is_null() => Ok(None),
            _ => Err(OperatorError::Validation(format!(
                "column \"{}\" of table \"{}\" contains null values",
                column.name, table.name
            ))),
        }
    })?;
    Ok(())
}

/// Scan the index in key order and reject equal adjacent non-null keys
pub fn unique_index(ctx: &OperatorContext<'_>, table_id: TableId, index_id: IndexId) -> OperatorResult<()> {
    let key = ElementKey::new(ElementKind::SecondaryIndex, table_id, index_id);
    let table = ctx.table(table_id)?;
    let index = table
        .indexes
        .iter()
        .find(|i| i.id == index_id)
        .ok_or_else(|| OperatorError::ElementMissing(key.to_string()))?;
    let mut previous: Option<Vec<Datum>> = None;
    for entry in ctx.data.scan_index(table_id, index_id)? {
        let has_null = entry.key_values.iter().any(Datum::is_null);
        if !has_null && previous.as_ref() == Some(&entry.key_values) {
            return Err(OperatorError::Validation(format!(
                "duplicate key value violates unique index \"{}\"",
                index.name
            )));
        }
        previous = Some(entry.key_values);
    }
    log::debug!("index {} on {} is unique", index.name, table.name);
    Ok(())
}

pub fn check(ctx: &OperatorContext<'_>, table_id: TableId, constraint_id: ConstraintId) -> OperatorResult<()> {
    let key = ElementKey::new(ElementKind::CheckConstraint, table_id, constraint_id);
    let table = ctx.table(table_id)?;
    let check = table
        .check(constraint_id)
        .ok_or_else(|| OperatorError::ElementMissing(key.to_string()))?;
    ctx.scan_batched(table_id, &key, ProgressTag::Check, |_, row| {
        let resolver = row_resolver(table, row);
        let result = evaluate(&check.expr, &resolver, ctx.provider)
            .map_err(|e| OperatorError::Validation(format!("check \"{}\": {}", check.name, e)))?;
        if check_passes(&result) {
            Ok(None)
        } else {
            Err(OperatorError::Validation(format!(
                "check constraint \"{}\" is violated by an existing row of \"{}\"",
                check.name, table.name
            )))
        }
    })?;
    Ok(())
}

pub fn foreign_key(ctx: &OperatorContext<'_>, table_id: TableId, constraint_id: ConstraintId) -> OperatorResult<()> {
    let key = ElementKey::new(ElementKind::ForeignKey, table_id, constraint_id);
    let table = ctx.table(table_id)?;
    let fk = table
        .foreign_key(constraint_id)
        .ok_or_else(|| OperatorError::ElementMissing(key.to_string()))?;
    let parent = ctx.table(fk.referenced_table)?;
    ctx.scan_batched(table_id, &key, ProgressTag::ForeignKey, |_, row| {
        let values = key_values(row, &fk.columns);
        if values.iter().any(Datum::is_null)
            || ctx
                .data
                .row_with_values_exists(parent, &fk.referenced_columns, &values)?
        {
            return Ok(None);
        }
        Err(OperatorError::Validation(format!(
            "foreign key \"{}\" is violated by an existing row of \"{}\"",
            fk.name, table.name
        )))
    })?;
    Ok(())
}
