// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! DROP INDEX

use super::ast::{DropIndex, Statement};
use super::error::{BuildError, BuildResult};
use super::{BuildContext, StatementBuilder};

pub struct DropIndexBuilder<'s> {
    statement: &'s DropIndex,
}

impl<'s> DropIndexBuilder<'s> {
    pub fn new(statement: &'s DropIndex) -> Self {
        Self { statement }
    }
}

impl StatementBuilder for DropIndexBuilder<'_> {
    fn describe(&self) -> String {
        Statement::DropIndex(self.statement.clone()).to_string()
    }

    fn build_targets(&self, ctx: &mut BuildContext<'_>) -> BuildResult<()> {
        let stmt = self.statement;
        let table = ctx.resolve_table(&stmt.table)?;
        if table.primary_index.as_ref().map(|pk| pk.name.as_str()) == Some(stmt.name.as_str()) {
            return Err(BuildError::CannotDropPrimaryIndex(stmt.name.clone()));
        }
        match table.indexes.iter().find(|i| i.name == stmt.name) {
            Some(index) => ctx.drop_index(table, index, stmt.cascade),
            None if stmt.if_exists => Ok(()),
            None => Err(BuildError::IndexNotFound {
                table: table.name.clone(),
                index: stmt.name.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{build, test_support};
    use super::*;
    use crate::config::ClusterSettings;
    use crate::element::{Direction, ElementKind};

    fn drop_index(table: &str, name: &str, cascade: bool) -> Statement {
        Statement::DropIndex(DropIndex {
            table: table.into(),
            name: name.into(),
            if_exists: false,
            cascade,
        })
    }

    #[test]
    fn test_index_backing_foreign_key_needs_cascade() {
        let snapshot = test_support::shop();
        let settings = ClusterSettings::default();
        let err = build(&drop_index("customers", "customers_email_key", false), &snapshot, &settings)
            .unwrap_err();
        assert_eq!(
            err,
            BuildError::DependedOnBy {
                object: "index \"customers_email_key\"".into(),
                dependent: "foreign key \"orders_customer_email_fkey\" on table \"orders\"".into(),
            }
        );

        let state = build(&drop_index("customers", "customers_email_key", true), &snapshot, &settings)
            .unwrap();
        let kinds: Vec<ElementKind> = state.nodes.iter().map(|n| n.kind()).collect();
        assert_eq!(kinds, vec![ElementKind::ForeignKey, ElementKind::SecondaryIndex]);
        assert!(state.nodes.iter().all(|n| n.direction() == Direction::Drop));
    }

    #[test]
    fn test_plain_index_drop() {
        let snapshot = test_support::shop();
        let state = build(
            &drop_index("orders", "orders_customer_idx", false),
            &snapshot,
            &ClusterSettings::default(),
        )
        .unwrap();
        assert_eq!(state.len(), 1);
        assert!(!state.nodes[0].target.direct);
    }

    #[test]
    fn test_primary_and_missing_index() {
        let snapshot = test_support::shop();
        let settings = ClusterSettings::default();
        assert_eq!(
            build(&drop_index("orders", "orders_pkey", true), &snapshot, &settings).unwrap_err(),
            BuildError::CannotDropPrimaryIndex("orders_pkey".into())
        );
        assert!(matches!(
            build(&drop_index("orders", "nope", false), &snapshot, &settings),
            Err(BuildError::IndexNotFound { .. })
        ));
    }
}
