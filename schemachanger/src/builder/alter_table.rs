// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! ALTER TABLE
//!
//! Commands are applied to the build context in order, so later commands see
//! columns added and dropped by earlier ones.

use super::ast::{AlterTable, AlterTableCommand, ColumnDef, ConstraintDef, Statement};
use super::error::{BuildError, BuildResult};
use super::{column_element, default_constraint_name, BuildContext, StatementBuilder};
use crate::catalog::TableDescriptor;
use crate::element::{
    CheckElement, ColumnElement, ColumnId, Element, ElementKey, ElementKind, ForeignKeyElement,
    IndexElement, Status, Target,
};
use crate::eval::{ColumnType, Expr};

pub struct AlterTableBuilder<'s> {
    statement: &'s AlterTable,
}

impl<'s> AlterTableBuilder<'s> {
    pub fn new(statement: &'s AlterTable) -> Self {
        Self { statement }
    }
}

impl StatementBuilder for AlterTableBuilder<'_> {
    fn describe(&self) -> String {
        Statement::AlterTable(self.statement.clone()).to_string()
    }

    fn build_targets(&self, ctx: &mut BuildContext<'_>) -> BuildResult<()> {
        let table = ctx.resolve_table(&self.statement.table)?;
        for command in &self.statement.commands {
            match command {
                AlterTableCommand::AddColumn {
                    column,
                    if_not_exists,
                } => add_column(ctx, table, column, *if_not_exists)?,
                AlterTableCommand::DropColumn {
                    name,
                    if_exists,
                    cascade,
                } => drop_column(ctx, table, name, *if_exists, *cascade)?,
                AlterTableCommand::AddConstraint(constraint) => add_constraint(ctx, table, constraint)?,
                AlterTableCommand::DropConstraint {
                    name,
                    if_exists,
                    cascade,
                } => drop_constraint(ctx, table, name, *if_exists, *cascade)?,
            }
        }
        Ok(())
    }
}

fn add_column(
    ctx: &mut BuildContext<'_>,
    table: &TableDescriptor,
    def: &ColumnDef,
    if_not_exists: bool,
) -> BuildResult<()> {
    ctx.validate_name(&def.name)?;
    if let Some(existing) = table.column_by_name(&def.name) {
        let key = ElementKey::new(ElementKind::Column, table.id, existing.id);
        if ctx.is_dropping(&key) {
            return Err(BuildError::UnsupportedCombination(format!(
                "column \"{}\" is dropped and re-added",
                def.name
            )));
        }
        if if_not_exists && existing.status == Status::Public {
            return Ok(());
        }
        if existing.owner.is_some() {
            return Err(BuildError::ObjectBusy(format!("column \"{}\"", def.name)));
        }
        return Err(BuildError::ColumnAlreadyExists {
            table: table.name.clone(),
            column: def.name.clone(),
        });
    }
    let already_added = ctx
        .added_elements(table.id)
        .filter_map(Element::as_column)
        .any(|c| c.name == def.name);
    if already_added {
        return Err(BuildError::ColumnAlreadyExists {
            table: table.name.clone(),
            column: def.name.clone(),
        });
    }
    if let Some(default) = &def.default {
        ctx.check_default(&def.name, def.column_type, default)?;
    }
    let column_id = ctx.allocate_column_id(table);
    ctx.add_target(Target::add(Element::Column(ColumnElement {
        table_id: table.id,
        column_id,
        name: def.name.clone(),
        column_type: def.column_type,
        nullable: def.nullable,
        default: def.default.clone(),
    })))
}

fn drop_column(
    ctx: &mut BuildContext<'_>,
    table: &TableDescriptor,
    name: &str,
    if_exists: bool,
    cascade: bool,
) -> BuildResult<()> {
    let column = match table.column_by_name(name) {
        Some(column) => column,
        None => {
            let being_added = ctx
                .added_elements(table.id)
                .filter_map(Element::as_column)
                .any(|c| c.name == name);
            if being_added {
                return Err(BuildError::UnsupportedCombination(format!(
                    "column \"{}\" is added and dropped",
                    name
                )));
            }
            if if_exists {
                return Ok(());
            }
            return Err(BuildError::ColumnNotFound {
                table: table.name.clone(),
                column: name.to_string(),
            });
        }
    };
    let key = ElementKey::new(ElementKind::Column, table.id, column.id);
    if ctx.is_dropping(&key) {
        return Ok(());
    }
    ctx.check_not_busy(table, &key, &format!("column \"{}\"", name))?;
    if table.primary_key_columns().contains(&column.id) {
        return Err(BuildError::CannotDropPrimaryKeyColumn(name.to_string()));
    }
    let users: Vec<String> = ctx
        .added_elements(table.id)
        .filter(|e| e.uses_column(table.id, column.id))
        .map(|e| e.to_string())
        .collect();
    if let Some(user) = users.first() {
        return Err(BuildError::UnsupportedCombination(format!(
            "{} uses column \"{}\" which is being dropped",
            user, name
        )));
    }

    for index in &table.indexes {
        if !index.key_columns.contains(&column.id) {
            continue;
        }
        if !cascade {
            return Err(BuildError::DependedOnBy {
                object: format!("column \"{}\"", name),
                dependent: format!("index \"{}\"", index.name),
            });
        }
        ctx.drop_index(table, index, true)?;
    }

    for check in &table.checks {
        if check.columns.contains(&column.id) {
            let check_key = ElementKey::new(ElementKind::CheckConstraint, table.id, check.id);
            ctx.check_not_busy(table, &check_key, &format!("constraint \"{}\"", check.name))?;
            ctx.add_target(Target::drop(Element::CheckConstraint(CheckElement {
                table_id: table.id,
                constraint_id: check.id,
                name: check.name.clone(),
                expr: check.expr.clone(),
                columns: check.columns.clone(),
            })))?;
        }
    }

    let snapshot = ctx.snapshot;
    let mut dependents = Vec::new();
    for t in snapshot.tables() {
        for fk in &t.foreign_keys {
            let uses = (t.id == table.id && fk.columns.contains(&column.id))
                || (fk.referenced_table == table.id && fk.referenced_columns.contains(&column.id));
            if uses {
                dependents.push((t, fk));
            }
        }
    }
    for (fk_table, fk) in dependents {
        if !cascade {
            return Err(BuildError::DependedOnBy {
                object: format!("column \"{}\"", name),
                dependent: format!("foreign key \"{}\" on table \"{}\"", fk.name, fk_table.name),
            });
        }
        ctx.drop_foreign_key(fk_table, fk.id)?;
    }

    ctx.add_target(Target::drop(Element::Column(column_element(table.id, column))))
}

fn add_constraint(
    ctx: &mut BuildContext<'_>,
    table: &TableDescriptor,
    constraint: &ConstraintDef,
) -> BuildResult<()> {
    match constraint {
        ConstraintDef::Check { name, expr } => add_check(ctx, table, name.as_deref(), expr),
        ConstraintDef::Unique { name, columns } => {
            let name = match name {
                Some(name) => name.clone(),
                None => default_constraint_name(&table.name, columns, "key"),
            };
            ctx.validate_name(&name)?;
            ctx.check_constraint_name_free(table, &name)?;
            let key_columns = ctx.resolve_columns(table, columns)?;
            let index_id = ctx.allocate_index_id(table);
            ctx.add_target(Target::add(Element::SecondaryIndex(IndexElement {
                table_id: table.id,
                index_id,
                name,
                key_columns,
                unique: true,
            })))
        }
        ConstraintDef::ForeignKey {
            name,
            columns,
            referenced_table,
            referenced_columns,
        } => add_foreign_key(
            ctx,
            table,
            name.as_deref(),
            columns,
            referenced_table,
            referenced_columns,
        ),
    }
}

fn add_check(
    ctx: &mut BuildContext<'_>,
    table: &TableDescriptor,
    name: Option<&str>,
    expr: &Expr,
) -> BuildResult<()> {
    let columns: Vec<String> = expr.referenced_columns().into_iter().collect();
    let name = match name {
        Some(name) => name.to_string(),
        None => default_constraint_name(&table.name, &columns, "check"),
    };
    ctx.validate_name(&name)?;
    ctx.check_constraint_name_free(table, &name)?;
    // Surfaces "being dropped" before type checking hides it as unknown
    ctx.resolve_columns(table, &columns)?;
    let column_ids = {
        let lookup = |column: &str| ctx.visible_column(table, column);
        ctx.check_condition(expr, lookup)?
    };
    let constraint_id = ctx.allocate_constraint_id(table);
    ctx.add_target(Target::add(Element::CheckConstraint(CheckElement {
        table_id: table.id,
        constraint_id,
        name,
        expr: expr.clone(),
        columns: column_ids,
    })))
}

fn add_foreign_key(
    ctx: &mut BuildContext<'_>,
    table: &TableDescriptor,
    name: Option<&str>,
    columns: &[String],
    referenced_table: &str,
    referenced_columns: &[String],
) -> BuildResult<()> {
    let name = match name {
        Some(name) => name.to_string(),
        None => default_constraint_name(&table.name, columns, "fkey"),
    };
    ctx.validate_name(&name)?;
    ctx.check_constraint_name_free(table, &name)?;
    let invalid = |reason: String| BuildError::InvalidForeignKey {
        name: name.clone(),
        reason,
    };
    if columns.is_empty() || columns.len() != referenced_columns.len() {
        return Err(invalid(format!(
            "{} referencing column(s) for {} referenced column(s)",
            columns.len(),
            referenced_columns.len()
        )));
    }
    let parent = if referenced_table == table.name {
        table
    } else {
        ctx.resolve_table(referenced_table)?
    };
    let child_ids = ctx.resolve_columns(table, columns)?;
    let parent_ids = ctx.resolve_columns(parent, referenced_columns)?;
    for (child, parent_column) in child_ids.iter().zip(&parent_ids) {
        let child_type = column_type(ctx, table, *child);
        let parent_type = column_type(ctx, parent, *parent_column);
        if child_type != parent_type {
            return Err(invalid(format!(
                "column types differ ({:?} vs {:?})",
                child_type, parent_type
            )));
        }
    }

    let existing = parent
        .primary_index
        .iter()
        .chain(parent.indexes.iter())
        .filter(|i| i.unique && i.status == Status::Public)
        .filter(|i| !ctx.is_dropping(&ElementKey::new(ElementKind::SecondaryIndex, parent.id, i.id)))
        .find(|i| i.key_columns == parent_ids)
        .map(|i| i.id);
    let pending = ctx
        .added_elements(parent.id)
        .filter_map(|e| match e {
            Element::SecondaryIndex(i) if i.unique && i.key_columns == parent_ids => Some(i.index_id),
            _ => None,
        })
        .next();
    let referenced_index = existing
        .or(pending)
        .ok_or_else(|| invalid(format!("no unique index on {}({})", parent.name, referenced_columns.join(", "))))?;

    let constraint_id = ctx.allocate_constraint_id(table);
    ctx.add_target(Target::add(Element::ForeignKey(ForeignKeyElement {
        table_id: table.id,
        constraint_id,
        name,
        columns: child_ids,
        referenced_table: parent.id,
        referenced_columns: parent_ids,
        referenced_index,
    })))
}

fn column_type(ctx: &BuildContext<'_>, table: &TableDescriptor, id: ColumnId) -> Option<ColumnType> {
    table.column(id).map(|c| c.column_type).or_else(|| {
        ctx.added_elements(table.id)
            .filter_map(Element::as_column)
            .find(|c| c.column_id == id)
            .map(|c| c.column_type)
    })
}

fn drop_constraint(
    ctx: &mut BuildContext<'_>,
    table: &TableDescriptor,
    name: &str,
    if_exists: bool,
    cascade: bool,
) -> BuildResult<()> {
    if let Some(check) = table.checks.iter().find(|c| c.name == name) {
        let key = ElementKey::new(ElementKind::CheckConstraint, table.id, check.id);
        ctx.check_not_busy(table, &key, &format!("constraint \"{}\"", name))?;
        return ctx.add_target(Target::drop(Element::CheckConstraint(CheckElement {
            table_id: table.id,
            constraint_id: check.id,
            name: check.name.clone(),
            expr: check.expr.clone(),
            columns: check.columns.clone(),
        })));
    }
    if let Some(fk) = table.foreign_keys.iter().find(|fk| fk.name == name) {
        return ctx.drop_foreign_key(table, fk.id);
    }
    if table.primary_index.as_ref().map(|pk| pk.name.as_str()) == Some(name) {
        return Err(BuildError::CannotDropPrimaryIndex(name.to_string()));
    }
    if let Some(index) = table.indexes.iter().find(|i| i.name == name && i.unique) {
        return ctx.drop_index(table, index, cascade);
    }
    if if_exists {
        return Ok(());
    }
    Err(BuildError::ConstraintNotFound {
        table: table.name.clone(),
        constraint: name.to_string(),
    })
}
