// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Target-graph builder
//!
//! Turns a resolved statement plus a catalog snapshot into the set of targets
//! a schema change must reach. Building is a pure function of
//! `(statement, snapshot, settings)`: nothing is read from ambient state and
//! nothing is written. Every statement kind has its own module implementing
//! [`StatementBuilder`].

pub mod alter_table;
pub mod ast;
pub mod create_index;
pub mod create_table;
pub mod drop_index;
pub mod drop_table;
pub mod error;

pub use ast::{
    AlterTable, AlterTableCommand, CheckDef, ColumnDef, ConstraintDef, CreateIndex, CreateTable,
    DropIndex, DropTable, Statement,
};
pub use error::{BuildError, BuildResult};

use crate::catalog::{CatalogSnapshot, ColumnDescriptor, IndexDescriptor, TableDescriptor};
use crate::config::ClusterSettings;
use crate::element::{
    ColumnId, ConstraintId, Direction, Element, ElementKey, ElementKind, ForeignKeyElement,
    IndexElement, IndexId, Status, Target, TargetState, TableId,
};
use crate::eval::{CapabilityProvider, ColumnType, Expr};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static IDENTIFIER: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$"));

/// Per-statement target construction
pub trait StatementBuilder {
    /// Human-readable description of the requested change
    fn describe(&self) -> String;

    /// Add the statement's targets to `ctx`
    fn build_targets(&self, ctx: &mut BuildContext<'_>) -> BuildResult<()>;
}

/// Build the target state for `statement`
pub fn build(
    statement: &Statement,
    snapshot: &CatalogSnapshot,
    settings: &ClusterSettings,
) -> BuildResult<TargetState> {
    let builder: Box<dyn StatementBuilder + '_> = match statement {
        Statement::CreateTable(stmt) => Box::new(create_table::CreateTableBuilder::new(stmt)),
        Statement::DropTable(stmt) => Box::new(drop_table::DropTableBuilder::new(stmt)),
        Statement::AlterTable(stmt) => Box::new(alter_table::AlterTableBuilder::new(stmt)),
        Statement::CreateIndex(stmt) => Box::new(create_index::CreateIndexBuilder::new(stmt)),
        Statement::DropIndex(stmt) => Box::new(drop_index::DropIndexBuilder::new(stmt)),
    };
    let mut ctx = BuildContext::new(snapshot, settings);
    builder.build_targets(&mut ctx)?;
    log::debug!(
        "built {} target(s) for {}",
        ctx.state.len(),
        builder.describe()
    );
    Ok(ctx.into_state())
}

#[derive(Debug, Default, Clone, Copy)]
struct IdCounters {
    column: ColumnId,
    index: IndexId,
    constraint: ConstraintId,
}

/// Working state while building one statement
pub struct BuildContext<'a> {
    pub snapshot: &'a CatalogSnapshot,
    pub settings: &'a ClusterSettings,
    pub provider: CapabilityProvider,
    state: TargetState,
    counters: HashMap<TableId, IdCounters>,
}

impl<'a> BuildContext<'a> {
    pub fn new(snapshot: &'a CatalogSnapshot, settings: &'a ClusterSettings) -> Self {
        Self {
            snapshot,
            settings,
            provider: CapabilityProvider::restricted(settings.clone()),
            state: TargetState::new(),
            counters: HashMap::new(),
        }
    }

    pub fn state(&self) -> &TargetState {
        &self.state
    }

    pub fn into_state(self) -> TargetState {
        self.state
    }

    /// Reject names that are not plain identifiers or are too long
    pub fn validate_name(&self, name: &str) -> BuildResult<()> {
        let pattern = IDENTIFIER.as_ref().map_err(|e| BuildError::InvalidName {
            name: name.to_string(),
            reason: format!("identifier pattern is unusable: {}", e),
        })?;
        if !pattern.is_match(name) {
            return Err(BuildError::InvalidName {
                name: name.to_string(),
                reason: "must start with a letter or underscore and contain only letters, digits, '_' or '$'"
                    .to_string(),
            });
        }
        if name.len() > self.settings.max_identifier_length {
            return Err(BuildError::InvalidName {
                name: name.to_string(),
                reason: format!(
                    "longer than {} characters",
                    self.settings.max_identifier_length
                ),
            });
        }
        Ok(())
    }

    /// Resolve a table that the statement will modify
    pub fn resolve_table(&self, name: &str) -> BuildResult<&'a TableDescriptor> {
        let snapshot: &'a CatalogSnapshot = self.snapshot;
        let table = snapshot
            .table_by_name(name)
            .ok_or_else(|| BuildError::TableNotFound(name.to_string()))?;
        if table.status != Status::Public || table.owner.is_some() {
            return Err(BuildError::ObjectBusy(format!("table \"{}\"", name)));
        }
        Ok(table)
    }

    fn counters(&mut self, table: &TableDescriptor) -> &mut IdCounters {
        self.counters.entry(table.id).or_insert(IdCounters {
            column: table.next_column_id,
            index: table.next_index_id,
            constraint: table.next_constraint_id,
        })
    }

    pub fn allocate_column_id(&mut self, table: &TableDescriptor) -> ColumnId {
        let counters = self.counters(table);
        counters.column += 1;
        counters.column - 1
    }

    pub fn allocate_index_id(&mut self, table: &TableDescriptor) -> IndexId {
        let counters = self.counters(table);
        counters.index += 1;
        counters.index - 1
    }

    pub fn allocate_constraint_id(&mut self, table: &TableDescriptor) -> ConstraintId {
        let counters = self.counters(table);
        counters.constraint += 1;
        counters.constraint - 1
    }

    /// Record a target; the same element may not be both added and dropped
    pub fn add_target(&mut self, target: Target) -> BuildResult<()> {
        let key = target.element.key();
        if let Some(idx) = self.state.find(&key) {
            let existing = &self.state.nodes[idx];
            if existing.direction() == target.direction {
                return Ok(());
            }
            return Err(BuildError::UnsupportedCombination(format!(
                "{} is both added and dropped",
                target.element
            )));
        }
        self.state.push(target);
        Ok(())
    }

    /// Direction already requested for `key` by this statement
    pub fn pending_direction(&self, key: &ElementKey) -> Option<Direction> {
        self.state
            .find(key)
            .map(|idx| self.state.nodes[idx].direction())
    }

    pub fn is_dropping(&self, key: &ElementKey) -> bool {
        self.pending_direction(key) == Some(Direction::Drop)
    }

    /// Elements this statement adds to `table`
    pub fn added_elements(&self, table: TableId) -> impl Iterator<Item = &Element> {
        self.state
            .nodes
            .iter()
            .filter(move |n| n.direction() == Direction::Add && n.element().table_id() == table)
            .map(|n| n.element())
    }

    /// Fail if another schema change owns the element
    pub fn check_not_busy(&self, table: &TableDescriptor, key: &ElementKey, label: &str) -> BuildResult<()> {
        match table.element_status(key) {
            Some((status, owner)) if owner.is_some() || status != Status::Public => {
                Err(BuildError::ObjectBusy(label.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Column visible to expressions of `table` within this statement
    pub fn visible_column(&self, table: &TableDescriptor, name: &str) -> Option<(ColumnId, ColumnType)> {
        if let Some(column) = table.column_by_name(name) {
            let key = ElementKey::new(ElementKind::Column, table.id, column.id);
            if column.status == Status::Public && !self.is_dropping(&key) {
                return Some((column.id, column.column_type));
            }
            return None;
        }
        self.added_elements(table.id)
            .filter_map(Element::as_column)
            .find(|c| c.name == name)
            .map(|c| (c.column_id, c.column_type))
    }

    /// Resolve a list of column names of `table`
    pub fn resolve_columns(&self, table: &TableDescriptor, names: &[String]) -> BuildResult<Vec<ColumnId>> {
        names
            .iter()
            .map(|name| {
                if let Some(column) = table.column_by_name(name) {
                    let key = ElementKey::new(ElementKind::Column, table.id, column.id);
                    if self.is_dropping(&key) {
                        return Err(BuildError::UnsupportedCombination(format!(
                            "column \"{}\" is used while being dropped",
                            name
                        )));
                    }
                }
                self.visible_column(table, name)
                    .map(|(id, _)| id)
                    .ok_or_else(|| BuildError::ColumnNotFound {
                        table: table.name.clone(),
                        column: name.clone(),
                    })
            })
            .collect()
    }

    /// Whether `name` is free for a new index or constraint on `table`
    pub fn check_constraint_name_free(&self, table: &TableDescriptor, name: &str) -> BuildResult<()> {
        let taken = table.has_constraint_named(name)
            || self.added_elements(table.id).any(|e| {
                !matches!(e, Element::Column(_) | Element::Table(_)) && e.name() == name
            });
        if taken {
            return Err(BuildError::ConstraintAlreadyExists {
                table: table.name.clone(),
                constraint: name.to_string(),
            });
        }
        Ok(())
    }

    /// Type-check a column default; defaults may not read columns
    pub fn check_default(&self, column: &str, column_type: ColumnType, default: &Expr) -> BuildResult<()> {
        let no_columns = |_: &str| -> Option<ColumnType> { None };
        let ty = default
            .type_check(&no_columns, &self.provider)
            .map_err(|source| BuildError::InvalidExpression {
                expr: default.to_string(),
                source,
            })?;
        match ty {
            Some(ty) if ty != column_type => Err(BuildError::InvalidExpression {
                expr: default.to_string(),
                source: crate::eval::EvalError::TypeMismatch(format!(
                    "default for {} must be {}, found {}",
                    column, column_type, ty
                )),
            }),
            _ => Ok(()),
        }
    }

    /// Type-check a check constraint and return the ids of the columns it reads
    pub fn check_condition<F>(&self, expr: &Expr, columns: F) -> BuildResult<Vec<ColumnId>>
    where
        F: Fn(&str) -> Option<(ColumnId, ColumnType)>,
    {
        let types = |name: &str| columns(name).map(|(_, ty)| ty);
        let ty = expr
            .type_check(&types, &self.provider)
            .map_err(|source| BuildError::InvalidExpression {
                expr: expr.to_string(),
                source,
            })?;
        if let Some(ty) = ty {
            if ty != ColumnType::Bool {
                return Err(BuildError::InvalidExpression {
                    expr: expr.to_string(),
                    source: crate::eval::EvalError::TypeMismatch(format!(
                        "check constraint must be BOOL, found {}",
                        ty
                    )),
                });
            }
        }
        Ok(expr
            .referenced_columns()
            .iter()
            .filter_map(|name| columns(name).map(|(id, _)| id))
            .collect())
    }

    /// Drop a secondary index, cascading to foreign keys it backs
    pub fn drop_index(&mut self, table: &TableDescriptor, index: &IndexDescriptor, cascade: bool) -> BuildResult<()> {
        let key = ElementKey::new(ElementKind::SecondaryIndex, table.id, index.id);
        if self.is_dropping(&key) {
            return Ok(());
        }
        self.check_not_busy(table, &key, &format!("index \"{}\"", index.name))?;
        let snapshot = self.snapshot;
        for (fk_table, fk) in snapshot.foreign_keys_referencing_index(table.id, index.id) {
            if !cascade {
                return Err(BuildError::DependedOnBy {
                    object: format!("index \"{}\"", index.name),
                    dependent: format!("foreign key \"{}\" on table \"{}\"", fk.name, fk_table.name),
                });
            }
            self.drop_foreign_key(fk_table, fk.id)?;
        }
        self.add_target(Target::drop(Element::SecondaryIndex(index_element(table.id, index))))
    }

    /// Drop a foreign key of `table`
    pub fn drop_foreign_key(&mut self, table: &TableDescriptor, id: ConstraintId) -> BuildResult<()> {
        let fk = table
            .foreign_key(id)
            .ok_or_else(|| BuildError::ConstraintNotFound {
                table: table.name.clone(),
                constraint: id.to_string(),
            })?;
        let key = ElementKey::new(ElementKind::ForeignKey, table.id, id);
        self.check_not_busy(table, &key, &format!("constraint \"{}\"", fk.name))?;
        self.add_target(Target::drop(Element::ForeignKey(ForeignKeyElement {
            table_id: table.id,
            constraint_id: fk.id,
            name: fk.name.clone(),
            columns: fk.columns.clone(),
            referenced_table: fk.referenced_table,
            referenced_columns: fk.referenced_columns.clone(),
            referenced_index: fk.referenced_index,
        })))
    }
}

/// Element payload of an existing index
pub fn index_element(table: TableId, index: &IndexDescriptor) -> IndexElement {
    IndexElement {
        table_id: table,
        index_id: index.id,
        name: index.name.clone(),
        key_columns: index.key_columns.clone(),
        unique: index.unique,
    }
}

/// Element payload of an existing column
pub fn column_element(table: TableId, column: &ColumnDescriptor) -> crate::element::ColumnElement {
    crate::element::ColumnElement {
        table_id: table,
        column_id: column.id,
        name: column.name.clone(),
        column_type: column.column_type,
        nullable: column.nullable,
        default: column.default.clone(),
    }
}

/// Default constraint name: `{table}_{columns}_{suffix}`
pub fn default_constraint_name(table: &str, columns: &[String], suffix: &str) -> String {
    format!("{}_{}_{}", table, columns.join("_"), suffix)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::catalog::{
        CatalogSnapshot, ColumnDescriptor, ForeignKeyDescriptor, IndexDescriptor, TableDescriptor,
    };
    use crate::element::Status;
    use crate::eval::ColumnType;

    pub fn column(id: u32, name: &str, column_type: ColumnType) -> ColumnDescriptor {
        ColumnDescriptor {
            id,
            name: name.to_string(),
            column_type,
            nullable: true,
            default: None,
            status: Status::Public,
            owner: None,
        }
    }

    pub fn index(id: u32, name: &str, key_columns: Vec<u32>, unique: bool) -> IndexDescriptor {
        IndexDescriptor {
            id,
            name: name.to_string(),
            key_columns,
            unique,
            status: Status::Public,
            owner: None,
        }
    }

    /// customers(id, email, name) with a unique index on email, and
    /// orders(id, customer_id, total) referencing customers(id) and
    /// customers(email)
    pub fn shop() -> CatalogSnapshot {
        let mut customers = TableDescriptor::new(100, "customers", Status::Public, None);
        customers.columns = vec![
            column(1, "id", ColumnType::Int8),
            column(2, "email", ColumnType::String),
            column(3, "name", ColumnType::String),
        ];
        customers.primary_index = Some(index(1, "customers_pkey", vec![1], true));
        customers.indexes = vec![index(2, "customers_email_key", vec![2], true)];
        customers.next_column_id = 4;
        customers.next_index_id = 3;

        let mut orders = TableDescriptor::new(101, "orders", Status::Public, None);
        orders.columns = vec![
            column(1, "id", ColumnType::Int8),
            column(2, "customer_id", ColumnType::Int8),
            column(3, "total", ColumnType::Int8),
            column(4, "customer_email", ColumnType::String),
        ];
        orders.primary_index = Some(index(1, "orders_pkey", vec![1], true));
        orders.indexes = vec![index(2, "orders_customer_idx", vec![2], false)];
        orders.foreign_keys = vec![
            ForeignKeyDescriptor {
                id: 1,
                name: "orders_customer_id_fkey".into(),
                columns: vec![2],
                referenced_table: 100,
                referenced_columns: vec![1],
                referenced_index: 1,
                status: Status::Public,
                owner: None,
            },
            ForeignKeyDescriptor {
                id: 2,
                name: "orders_customer_email_fkey".into(),
                columns: vec![4],
                referenced_table: 100,
                referenced_columns: vec![2],
                referenced_index: 2,
                status: Status::Public,
                owner: None,
            },
        ];
        orders.next_column_id = 5;
        orders.next_index_id = 3;
        orders.next_constraint_id = 3;
        CatalogSnapshot::from_tables([customers, orders])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_pattern_compiles() {
        assert!(IDENTIFIER.is_ok(), "{:?}", IDENTIFIER.as_ref().err());
    }

    #[test]
    fn test_validate_name() {
        let snapshot = CatalogSnapshot::default();
        let settings = ClusterSettings::default();
        let ctx = BuildContext::new(&snapshot, &settings);
        assert!(ctx.validate_name("orders_2024").is_ok());
        assert!(ctx.validate_name("_tmp$").is_ok());
        assert!(matches!(
            ctx.validate_name("1st"),
            Err(BuildError::InvalidName { .. })
        ));
        assert!(matches!(
            ctx.validate_name(&"x".repeat(64)),
            Err(BuildError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_add_and_drop_same_element_rejected() {
        let snapshot = test_support::shop();
        let settings = ClusterSettings::default();
        let mut ctx = BuildContext::new(&snapshot, &settings);
        let table = ctx.resolve_table("orders").unwrap();
        let index = table.index_by_name("orders_customer_idx").unwrap();
        let element = Element::SecondaryIndex(index_element(table.id, index));
        ctx.add_target(Target::drop(element.clone())).unwrap();
        ctx.add_target(Target::drop(element.clone())).unwrap();
        assert_eq!(ctx.state().len(), 1);
        assert!(matches!(
            ctx.add_target(Target::add(element)),
            Err(BuildError::UnsupportedCombination(_))
        ));
    }
}
