// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CREATE [UNIQUE] INDEX

use super::ast::{CreateIndex, Statement};
use super::error::{BuildError, BuildResult};
use super::{BuildContext, StatementBuilder};
use crate::element::{Element, IndexElement, Target};

pub struct CreateIndexBuilder<'s> {
    statement: &'s CreateIndex,
}

impl<'s> CreateIndexBuilder<'s> {
    pub fn new(statement: &'s CreateIndex) -> Self {
        Self { statement }
    }
}

impl StatementBuilder for CreateIndexBuilder<'_> {
    fn describe(&self) -> String {
        Statement::CreateIndex(self.statement.clone()).to_string()
    }

    fn build_targets(&self, ctx: &mut BuildContext<'_>) -> BuildResult<()> {
        let stmt = self.statement;
        ctx.validate_name(&stmt.name)?;
        let table = ctx.resolve_table(&stmt.table)?;
        if table.index_by_name(&stmt.name).is_some() {
            if stmt.if_not_exists {
                log::info!("index {} already exists, skipping", stmt.name);
                return Ok(());
            }
            return Err(BuildError::IndexAlreadyExists {
                table: table.name.clone(),
                index: stmt.name.clone(),
            });
        }
        if table.has_constraint_named(&stmt.name) {
            return Err(BuildError::ConstraintAlreadyExists {
                table: table.name.clone(),
                constraint: stmt.name.clone(),
            });
        }
        if stmt.columns.is_empty() {
            return Err(BuildError::UnsupportedCombination(format!(
                "index \"{}\" has no key columns",
                stmt.name
            )));
        }
        let key_columns = ctx.resolve_columns(table, &stmt.columns)?;
        let index_id = ctx.allocate_index_id(table);
        ctx.add_target(Target::add(Element::SecondaryIndex(IndexElement {
            table_id: table.id,
            index_id,
            name: stmt.name.clone(),
            key_columns,
            unique: stmt.unique,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::super::{build, test_support};
    use super::*;
    use crate::config::ClusterSettings;
    use crate::element::{ElementKey, ElementKind, Status};

    fn create_index(name: &str, columns: &[&str], unique: bool) -> Statement {
        Statement::CreateIndex(CreateIndex {
            name: name.into(),
            table: "orders".into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique,
            if_not_exists: false,
        })
    }

    #[test]
    fn test_create_unique_index() {
        let snapshot = test_support::shop();
        let state = build(
            &create_index("orders_total_key", &["total", "id"], true),
            &snapshot,
            &ClusterSettings::default(),
        )
        .unwrap();
        assert_eq!(state.len(), 1);
        let node = &state.nodes[0];
        assert_eq!(node.key(), ElementKey::new(ElementKind::SecondaryIndex, 101, 3));
        assert!(node.path().contains(&Status::Validated));
        assert_eq!(node.element().as_index().unwrap().key_columns, vec![3, 1]);
    }

    #[test]
    fn test_non_unique_index() {
        let snapshot = test_support::shop();
        let state = build(
            &create_index("orders_total_idx", &["total"], false),
            &snapshot,
            &ClusterSettings::default(),
        )
        .unwrap();
        assert_eq!(state.nodes[0].kind(), ElementKind::SecondaryIndex);
        assert!(!state.nodes[0].element().as_index().unwrap().unique);
    }

    #[test]
    fn test_existing_index_and_unknown_column() {
        let snapshot = test_support::shop();
        let settings = ClusterSettings::default();
        assert!(matches!(
            build(&create_index("orders_customer_idx", &["total"], false), &snapshot, &settings),
            Err(BuildError::IndexAlreadyExists { .. })
        ));
        assert!(matches!(
            build(&create_index("orders_x_idx", &["x"], false), &snapshot, &settings),
            Err(BuildError::ColumnNotFound { .. })
        ));
    }
}
