// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! The standard dependency rules
//!
//! Every rule reads as "the first node constrains the second". A rule that
//! does not apply to a pair returns no edges. Edges naming a status that is
//! not on one of the nodes' paths are dropped when the graph is built, so
//! rules do not need to special-case children of created or dropped tables.

use super::registry::RuleRegistry;
use super::RuleEdge;
use crate::element::{Direction, Element, ElementKind, Node, Status};

use ElementKind::{CheckConstraint, Column, ForeignKey, PrimaryIndex, SecondaryIndex, Table};

fn both(a: &Node, b: &Node, direction: Direction) -> bool {
    a.direction() == direction && b.direction() == direction
}

fn same_table(a: &Node, b: &Node) -> bool {
    a.element().table_id() == b.element().table_id()
}

/// Whether `user` reads the column `column`
fn reads_column(user: &Node, column: &Node) -> bool {
    match column.element() {
        Element::Column(c) => user.element().uses_column(c.table_id, c.column_id),
        _ => false,
    }
}

/// Whether `fk` is backed by the index `index`
fn backed_by(fk: &Node, index: &Node) -> bool {
    match (fk.element(), index.element()) {
        (Element::ForeignKey(fk), Element::PrimaryIndex(i) | Element::SecondaryIndex(i)) => {
            fk.referenced_table == i.table_id && fk.referenced_index == i.index_id
        }
        _ => false,
    }
}

/// Whether `fk` lives on another table and references `table`
fn references_other_table(fk: &Node, table: &Node) -> bool {
    match fk.element() {
        Element::ForeignKey(f) => {
            f.referenced_table == table.element().table_id() && f.table_id != f.referenced_table
        }
        _ => false,
    }
}

/// A created table is public no later than its children; a dropped table
/// goes offline before its children disappear
fn table_before_children(table: &Node, child: &Node) -> Vec<RuleEdge> {
    if !same_table(table, child) {
        return Vec::new();
    }
    if both(table, child, Direction::Add) {
        vec![RuleEdge::same_stage_or_before(Status::Public, Status::Public)]
    } else if both(table, child, Direction::Drop) {
        vec![RuleEdge::precedes(Status::DeleteOnly, Status::Absent)]
    } else {
        Vec::new()
    }
}

/// Children of a dropped table are gone no later than the table itself
fn children_before_table_removal(child: &Node, table: &Node) -> Vec<RuleEdge> {
    if same_table(table, child) && both(child, table, Direction::Drop) {
        vec![RuleEdge::same_stage_or_before(Status::Absent, Status::Absent)]
    } else {
        Vec::new()
    }
}

/// A foreign key on another table is removed before the table it references
/// goes offline
fn referencing_key_before_table(fk: &Node, table: &Node) -> Vec<RuleEdge> {
    if references_other_table(fk, table) && both(fk, table, Direction::Drop) {
        vec![RuleEdge::same_stage_or_before(Status::Absent, Status::DeleteOnly)]
    } else {
        Vec::new()
    }
}

/// A restored table is public before a foreign key referencing it is
fn table_before_referencing_key(table: &Node, fk: &Node) -> Vec<RuleEdge> {
    if references_other_table(fk, table) && both(table, fk, Direction::Add) {
        vec![RuleEdge::same_stage_or_before(Status::Public, Status::Public)]
    } else {
        Vec::new()
    }
}

/// New indexes track a new column's visibility and build only from
/// backfilled values
fn column_before_index(column: &Node, index: &Node) -> Vec<RuleEdge> {
    if !reads_column(index, column) || !both(column, index, Direction::Add) {
        return Vec::new();
    }
    vec![
        RuleEdge::same_stage_or_before(Status::DeleteOnly, Status::DeleteOnly),
        RuleEdge::same_stage_or_before(Status::WriteOnly, Status::WriteOnly),
        RuleEdge::precedes(Status::Backfilled, Status::Backfilling),
        RuleEdge::same_stage_or_before(Status::Public, Status::Public),
    ]
}

/// An index stops being read and written before the column it covers
fn index_before_column_removal(index: &Node, column: &Node) -> Vec<RuleEdge> {
    if !reads_column(index, column) || !both(index, column, Direction::Drop) {
        return Vec::new();
    }
    vec![
        RuleEdge::same_stage_or_before(Status::WriteOnly, Status::WriteOnly),
        RuleEdge::same_stage_or_before(Status::Absent, Status::Absent),
    ]
}

/// Constraints over a new column are enforced once it is written and
/// validated only after it is backfilled
fn column_before_constraint(column: &Node, constraint: &Node) -> Vec<RuleEdge> {
    if !reads_column(constraint, column) || !both(column, constraint, Direction::Add) {
        return Vec::new();
    }
    vec![
        RuleEdge::same_stage_or_before(Status::WriteOnly, Status::WriteOnly),
        RuleEdge::precedes(Status::Backfilled, Status::Validated),
        RuleEdge::same_stage_or_before(Status::Public, Status::Public),
    ]
}

/// Constraints over a dropped column stop being enforced before the column
/// stops being written
fn constraint_before_column_removal(constraint: &Node, column: &Node) -> Vec<RuleEdge> {
    if !reads_column(constraint, column) || !both(constraint, column, Direction::Drop) {
        return Vec::new();
    }
    vec![
        RuleEdge::same_stage_or_before(Status::WriteOnly, Status::WriteOnly),
        RuleEdge::same_stage_or_before(Status::Absent, Status::DeleteOnly),
    ]
}

/// A foreign key is validated against a unique index that is already
/// validated
fn index_before_foreign_key(index: &Node, fk: &Node) -> Vec<RuleEdge> {
    if !backed_by(fk, index) || !both(index, fk, Direction::Add) {
        return Vec::new();
    }
    vec![
        RuleEdge::precedes(Status::Validated, Status::Validated),
        RuleEdge::same_stage_or_before(Status::Public, Status::Public),
    ]
}

/// A foreign key is gone before its backing index stops being maintained
fn foreign_key_before_index_removal(fk: &Node, index: &Node) -> Vec<RuleEdge> {
    if backed_by(fk, index) && both(fk, index, Direction::Drop) {
        vec![RuleEdge::same_stage_or_before(Status::Absent, Status::WriteOnly)]
    } else {
        Vec::new()
    }
}

/// Everything added is public before any stored data is destroyed, so a
/// failure up to that point can always be reverted
fn additions_before_data_removal(added: &Node, dropped: &Node) -> Vec<RuleEdge> {
    if added.direction() == Direction::Add
        && dropped.direction() == Direction::Drop
        && dropped.kind().is_data_bearing()
    {
        vec![RuleEdge::precedes(Status::Public, Status::Absent)]
    } else {
        Vec::new()
    }
}

/// Build the standard registry
pub fn standard() -> RuleRegistry {
    let mut registry = RuleRegistry::new();

    for child in [Column, PrimaryIndex, SecondaryIndex, CheckConstraint, ForeignKey] {
        registry.register(Table, child, "table before children", table_before_children);
        registry.register(child, Table, "children before table removal", children_before_table_removal);
    }
    registry.register(ForeignKey, Table, "referencing key before table", referencing_key_before_table);
    registry.register(Table, ForeignKey, "table before referencing key", table_before_referencing_key);

    for index in [PrimaryIndex, SecondaryIndex] {
        registry.register(Column, index, "column before index", column_before_index);
        registry.register(index, Column, "index before column removal", index_before_column_removal);
        registry.register(index, ForeignKey, "index before foreign key", index_before_foreign_key);
        registry.register(ForeignKey, index, "foreign key before index removal", foreign_key_before_index_removal);
    }

    for constraint in [CheckConstraint, ForeignKey] {
        registry.register(Column, constraint, "column before constraint", column_before_constraint);
        registry.register(
            constraint,
            Column,
            "constraint before column removal",
            constraint_before_column_removal,
        );
    }

    for added in ElementKind::ALL {
        for dropped in ElementKind::ALL.into_iter().filter(|k| k.is_data_bearing()) {
            registry.register(added, dropped, "additions before data removal", additions_before_data_removal);
        }
    }

    for from in [PrimaryIndex, SecondaryIndex, CheckConstraint, ForeignKey] {
        registry.unconstrained(from, CheckConstraint);
    }
    registry.unconstrained(CheckConstraint, ForeignKey);
    registry.unconstrained(ForeignKey, ForeignKey);

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{self, test_support, AlterTable, AlterTableCommand, ColumnDef, Statement};
    use crate::config::ClusterSettings;
    use crate::element::TargetState;
    use crate::eval::{ColumnType, Datum, Expr};
    use crate::rules::{EdgeKind, STANDARD_RULES};

    fn build(stmt: Statement) -> TargetState {
        builder::build(&stmt, &test_support::shop(), &ClusterSettings::default()).unwrap()
    }

    #[test]
    fn test_add_column_with_unique_constraint() {
        let state = build(Statement::AlterTable(AlterTable {
            table: "orders".into(),
            commands: vec![
                AlterTableCommand::AddColumn {
                    column: ColumnDef::new("code", ColumnType::String)
                        .with_default(Expr::literal(Datum::String("x".into()))),
                    if_not_exists: false,
                },
                AlterTableCommand::AddConstraint(builder::ConstraintDef::Unique {
                    name: None,
                    columns: vec!["code".into()],
                }),
            ],
        }));
        let graph = STANDARD_RULES.evaluate(&state).unwrap();
        let edges: Vec<_> = graph.edges().collect();
        assert_eq!(edges.len(), 4);
        assert!(edges.iter().all(|e| e.from == 0 && e.to == 1));
        assert!(edges.iter().any(|e| e.kind == EdgeKind::Precedes
            && e.from_status == Status::Backfilled
            && e.to_status == Status::Backfilling));
    }

    #[test]
    fn test_drop_table_cascade_is_acyclic() {
        let state = build(Statement::DropTable(builder::DropTable {
            name: "customers".into(),
            if_exists: false,
            cascade: true,
        }));
        let graph = STANDARD_RULES.evaluate(&state).unwrap();
        let table = state.find(&crate::element::ElementKey::table(100)).unwrap();
        let foreign: Vec<_> = graph
            .edges()
            .filter(|e| e.to == table && e.rule == "referencing key before table")
            .collect();
        assert_eq!(foreign.len(), 2);
    }

    #[test]
    fn test_additions_before_drops() {
        let state = build(Statement::AlterTable(AlterTable {
            table: "orders".into(),
            commands: vec![
                AlterTableCommand::DropColumn {
                    name: "total".into(),
                    if_exists: false,
                    cascade: false,
                },
                AlterTableCommand::AddColumn {
                    column: ColumnDef::new("amount", ColumnType::Int8),
                    if_not_exists: false,
                },
            ],
        }));
        let graph = STANDARD_RULES.evaluate(&state).unwrap();
        let edges: Vec<_> = graph.edges().collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].rule, "additions before data removal");
        assert_eq!((edges[0].from, edges[0].to), (1, 0));
    }

    #[test]
    fn test_revert_graph_is_acyclic() {
        let mut state = build(Statement::DropIndex(builder::DropIndex {
            table: "customers".into(),
            name: "customers_email_key".into(),
            if_exists: false,
            cascade: true,
        }));
        state.flip_for_revert();
        let graph = STANDARD_RULES.evaluate(&state).unwrap();
        assert!(graph
            .edges()
            .any(|e| e.rule == "index before foreign key" && e.kind == EdgeKind::Precedes));
    }
}
