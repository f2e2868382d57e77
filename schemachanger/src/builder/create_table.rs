// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CREATE TABLE
//!
//! The table and all of its children are added together; children take the
//! direct path so the whole table becomes public in one stage.

use super::ast::{CreateTable, Statement};
use super::error::{BuildError, BuildResult};
use super::{BuildContext, StatementBuilder};
use crate::element::{
    CheckElement, ColumnElement, ColumnId, Element, IndexElement, TableElement, Target,
};
use crate::eval::ColumnType;
use std::collections::HashMap;

pub struct CreateTableBuilder<'s> {
    statement: &'s CreateTable,
}

impl<'s> CreateTableBuilder<'s> {
    pub fn new(statement: &'s CreateTable) -> Self {
        Self { statement }
    }
}

impl StatementBuilder for CreateTableBuilder<'_> {
    fn describe(&self) -> String {
        Statement::CreateTable(self.statement.clone()).to_string()
    }

    fn build_targets(&self, ctx: &mut BuildContext<'_>) -> BuildResult<()> {
        let stmt = self.statement;
        ctx.validate_name(&stmt.name)?;
        if ctx.snapshot.table_by_name(&stmt.name).is_some() {
            if stmt.if_not_exists {
                log::info!("table {} already exists, skipping", stmt.name);
                return Ok(());
            }
            return Err(BuildError::TableAlreadyExists(stmt.name.clone()));
        }
        if stmt.primary_key.is_empty() {
            return Err(BuildError::MissingPrimaryKey(stmt.name.clone()));
        }

        let table_id = ctx.snapshot.next_table_id();
        let mut columns: HashMap<&str, (ColumnId, ColumnType)> = HashMap::new();
        let mut column_elements = Vec::with_capacity(stmt.columns.len());
        for (i, def) in stmt.columns.iter().enumerate() {
            ctx.validate_name(&def.name)?;
            let column_id = i as ColumnId + 1;
            if columns
                .insert(def.name.as_str(), (column_id, def.column_type))
                .is_some()
            {
                return Err(BuildError::ColumnAlreadyExists {
                    table: stmt.name.clone(),
                    column: def.name.clone(),
                });
            }
            if let Some(default) = &def.default {
                ctx.check_default(&def.name, def.column_type, default)?;
            }
            let in_primary_key = stmt.primary_key.contains(&def.name);
            column_elements.push(ColumnElement {
                table_id,
                column_id,
                name: def.name.clone(),
                column_type: def.column_type,
                nullable: def.nullable && !in_primary_key,
                default: def.default.clone(),
            });
        }

        let mut key_columns = Vec::with_capacity(stmt.primary_key.len());
        for name in &stmt.primary_key {
            let (id, _) = columns
                .get(name.as_str())
                .copied()
                .ok_or_else(|| BuildError::ColumnNotFound {
                    table: stmt.name.clone(),
                    column: name.clone(),
                })?;
            key_columns.push(id);
        }

        ctx.add_target(Target::add(Element::Table(TableElement {
            table_id,
            name: stmt.name.clone(),
        })))?;
        for column in column_elements {
            ctx.add_target(Target::add(Element::Column(column)).direct())?;
        }
        ctx.add_target(
            Target::add(Element::PrimaryIndex(IndexElement {
                table_id,
                index_id: 1,
                name: format!("{}_pkey", stmt.name),
                key_columns,
                unique: true,
            }))
            .direct(),
        )?;

        let mut names: Vec<String> = vec![format!("{}_pkey", stmt.name)];
        for (i, check) in stmt.checks.iter().enumerate() {
            let name = match &check.name {
                Some(name) => {
                    ctx.validate_name(name)?;
                    name.clone()
                }
                None => format!("{}_check{}", stmt.name, i + 1),
            };
            if names.contains(&name) {
                return Err(BuildError::ConstraintAlreadyExists {
                    table: stmt.name.clone(),
                    constraint: name,
                });
            }
            let lookup = |column: &str| columns.get(column).copied();
            let column_ids = ctx.check_condition(&check.expr, lookup)?;
            ctx.add_target(
                Target::add(Element::CheckConstraint(CheckElement {
                    table_id,
                    constraint_id: i as u32 + 1,
                    name: name.clone(),
                    expr: check.expr.clone(),
                    columns: column_ids,
                }))
                .direct(),
            )?;
            names.push(name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::ast::{CheckDef, ColumnDef};
    use super::super::{build, test_support};
    use super::*;
    use crate::config::ClusterSettings;
    use crate::element::{ElementKind, Status};
    use crate::eval::{BinaryOp, Datum, Expr};

    fn create(name: &str) -> CreateTable {
        CreateTable {
            name: name.into(),
            if_not_exists: false,
            columns: vec![
                ColumnDef::new("id", ColumnType::Int8),
                ColumnDef::new("qty", ColumnType::Int8).with_default(Expr::literal(Datum::Int(0))),
            ],
            primary_key: vec!["id".into()],
            checks: vec![CheckDef {
                name: None,
                expr: Expr::binary(BinaryOp::GtEq, Expr::column("qty"), Expr::literal(Datum::Int(0))),
            }],
        }
    }

    #[test]
    fn test_create_table_targets() {
        let snapshot = test_support::shop();
        let state = build(
            &Statement::CreateTable(create("items")),
            &snapshot,
            &ClusterSettings::default(),
        )
        .unwrap();
        let kinds: Vec<ElementKind> = state.nodes.iter().map(|n| n.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ElementKind::Table,
                ElementKind::Column,
                ElementKind::Column,
                ElementKind::PrimaryIndex,
                ElementKind::CheckConstraint,
            ]
        );
        assert!(state.nodes.iter().all(|n| n.current == Status::Absent));
        assert_eq!(state.nodes[0].key().table_id, 102);
        assert!(state.nodes[1..].iter().all(|n| n.target.direct));
        let id = state.nodes[1].element().as_column().unwrap();
        assert!(!id.nullable, "primary key columns are NOT NULL");
    }

    #[test]
    fn test_existing_table_rejected_unless_if_not_exists() {
        let snapshot = test_support::shop();
        let settings = ClusterSettings::default();
        let mut stmt = create("orders");
        assert_eq!(
            build(&Statement::CreateTable(stmt.clone()), &snapshot, &settings).unwrap_err(),
            BuildError::TableAlreadyExists("orders".into())
        );
        stmt.if_not_exists = true;
        assert!(build(&Statement::CreateTable(stmt), &snapshot, &settings)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_default_needing_sequence_rejected() {
        let snapshot = test_support::shop();
        let mut stmt = create("items");
        stmt.columns[1].default = Some(Expr::function(
            "nextval",
            vec![Expr::literal(Datum::String("items_seq".into()))],
        ));
        let err = build(&Statement::CreateTable(stmt), &snapshot, &ClusterSettings::default())
            .unwrap_err();
        assert!(
            err.to_string().contains("sequence operations is not available"),
            "{err}"
        );
    }
}
