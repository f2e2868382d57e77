// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! DROP TABLE

use super::ast::{DropTable, Statement};
use super::error::{BuildError, BuildResult};
use super::{column_element, index_element, BuildContext, StatementBuilder};
use crate::element::{CheckElement, Element, ForeignKeyElement, TableElement, Target};

pub struct DropTableBuilder<'s> {
    statement: &'s DropTable,
}

impl<'s> DropTableBuilder<'s> {
    pub fn new(statement: &'s DropTable) -> Self {
        Self { statement }
    }
}

impl StatementBuilder for DropTableBuilder<'_> {
    fn describe(&self) -> String {
        Statement::DropTable(self.statement.clone()).to_string()
    }

    fn build_targets(&self, ctx: &mut BuildContext<'_>) -> BuildResult<()> {
        let stmt = self.statement;
        if ctx.snapshot.table_by_name(&stmt.name).is_none() && stmt.if_exists {
            return Ok(());
        }
        let table = ctx.resolve_table(&stmt.name)?;
        if let Some(key) = table.busy_elements().first() {
            return Err(BuildError::ObjectBusy(format!(
                "{} of table \"{}\"",
                key, table.name
            )));
        }

        let snapshot = ctx.snapshot;
        let referencing = snapshot.foreign_keys_referencing_table(table.id);
        if let Some((other, fk)) = referencing.first() {
            if !stmt.cascade {
                return Err(BuildError::DependedOnBy {
                    object: format!("table \"{}\"", table.name),
                    dependent: format!("foreign key \"{}\" on table \"{}\"", fk.name, other.name),
                });
            }
        }

        ctx.add_target(Target::drop(Element::Table(TableElement {
            table_id: table.id,
            name: table.name.clone(),
        })))?;
        for column in &table.columns {
            ctx.add_target(Target::drop(Element::Column(column_element(table.id, column))).direct())?;
        }
        if let Some(pk) = &table.primary_index {
            ctx.add_target(
                Target::drop(Element::PrimaryIndex(index_element(table.id, pk))).direct(),
            )?;
        }
        for index in &table.indexes {
            ctx.add_target(
                Target::drop(Element::SecondaryIndex(index_element(table.id, index))).direct(),
            )?;
        }
        for check in &table.checks {
            ctx.add_target(
                Target::drop(Element::CheckConstraint(CheckElement {
                    table_id: table.id,
                    constraint_id: check.id,
                    name: check.name.clone(),
                    expr: check.expr.clone(),
                    columns: check.columns.clone(),
                }))
                .direct(),
            )?;
        }
        for fk in &table.foreign_keys {
            ctx.add_target(
                Target::drop(Element::ForeignKey(ForeignKeyElement {
                    table_id: table.id,
                    constraint_id: fk.id,
                    name: fk.name.clone(),
                    columns: fk.columns.clone(),
                    referenced_table: fk.referenced_table,
                    referenced_columns: fk.referenced_columns.clone(),
                    referenced_index: fk.referenced_index,
                }))
                .direct(),
            )?;
        }
        for (other, fk) in referencing {
            ctx.drop_foreign_key(other, fk.id)?;
        }
        Ok(())
    }
}
