// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Operations attached to status transitions
//!
//! Metadata mutations run inside the stage transaction. Backfill and
//! validation run before it, while the element still sits at its old status.
//! Data GC runs after the transaction has made the element absent.

use crate::element::{
    ColumnId, ConstraintId, Direction, Element, ElementKey, ElementKind, IndexId, Node, Status,
    TableId,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MutationOp {
    /// Insert the element into the catalog at `status`
    AddElement { element: Element, status: Status },
    SetStatus { key: ElementKey, status: Status },
    RemoveElement { key: ElementKey },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackfillOp {
    /// Write the column default into every row that lacks a value
    ColumnDefault { table_id: TableId, column_id: ColumnId },
    /// Write an entry for every row into the index
    IndexBuild { table_id: TableId, index_id: IndexId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOp {
    NotNull { table_id: TableId, column_id: ColumnId },
    UniqueIndex { table_id: TableId, index_id: IndexId },
    Check { table_id: TableId, constraint_id: ConstraintId },
    ForeignKey { table_id: TableId, constraint_id: ConstraintId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GcOp {
    ColumnData { table_id: TableId, column_id: ColumnId },
    IndexData { table_id: TableId, index_id: IndexId },
    TableData { table_id: TableId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    Mutation(MutationOp),
    Backfill(BackfillOp),
    Validation(ValidationOp),
    Gc(GcOp),
}

impl Op {
    /// Backfill and validation run outside the stage transaction
    pub fn is_long_running(&self) -> bool {
        matches!(self, Op::Backfill(_) | Op::Validation(_))
    }
}

/// Operations needed to move `node` from `from` to `to`
pub fn ops_for(node: &Node, from: Status, to: Status) -> Vec<Op> {
    let key = node.key();
    let mut ops = Vec::new();
    let mutation = if from == Status::Absent {
        MutationOp::AddElement {
            element: node.element().clone(),
            status: to,
        }
    } else if to == Status::Absent {
        MutationOp::RemoveElement { key }
    } else {
        MutationOp::SetStatus { key, status: to }
    };
    ops.push(Op::Mutation(mutation));

    let table_id = key.table_id;
    match (node.element(), node.direction(), to) {
        (Element::Column(c), Direction::Add, Status::Backfilled) => {
            if c.default.is_some() {
                ops.push(Op::Backfill(BackfillOp::ColumnDefault {
                    table_id,
                    column_id: c.column_id,
                }));
            }
            if !c.nullable {
                ops.push(Op::Validation(ValidationOp::NotNull {
                    table_id,
                    column_id: c.column_id,
                }));
            }
        }
        (Element::SecondaryIndex(i), Direction::Add, Status::Backfilled) => {
            ops.push(Op::Backfill(BackfillOp::IndexBuild {
                table_id,
                index_id: i.index_id,
            }));
        }
        (Element::SecondaryIndex(i), Direction::Add, Status::Validated) if i.unique => {
            ops.push(Op::Validation(ValidationOp::UniqueIndex {
                table_id,
                index_id: i.index_id,
            }));
        }
        (Element::CheckConstraint(c), Direction::Add, Status::Validated) => {
            ops.push(Op::Validation(ValidationOp::Check {
                table_id,
                constraint_id: c.constraint_id,
            }));
        }
        (Element::ForeignKey(fk), Direction::Add, Status::Validated) => {
            ops.push(Op::Validation(ValidationOp::ForeignKey {
                table_id,
                constraint_id: fk.constraint_id,
            }));
        }
        (element, Direction::Drop, Status::Absent) => {
            // Children of a dropped table go with the table's data
            let gc = match element.kind() {
                ElementKind::Table => Some(GcOp::TableData { table_id }),
                _ if node.target.direct => None,
                ElementKind::Column => Some(GcOp::ColumnData {
                    table_id,
                    column_id: key.sub_id,
                }),
                ElementKind::SecondaryIndex => Some(GcOp::IndexData {
                    table_id,
                    index_id: key.sub_id,
                }),
                _ => None,
            };
            ops.extend(gc.map(Op::Gc));
        }
        _ => {}
    }
    ops
}

impl fmt::Display for MutationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationOp::AddElement { element, status } => {
                write!(f, "add {} as {}", element.key(), status)
            }
            MutationOp::SetStatus { key, status } => write!(f, "set {} to {}", key, status),
            MutationOp::RemoveElement { key } => write!(f, "remove {}", key),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Mutation(m) => write!(f, "{}", m),
            Op::Backfill(BackfillOp::ColumnDefault { table_id, column_id }) => {
                write!(f, "backfill default of column#{}.{}", table_id, column_id)
            }
            Op::Backfill(BackfillOp::IndexBuild { table_id, index_id }) => {
                write!(f, "build index#{}.{}", table_id, index_id)
            }
            Op::Validation(ValidationOp::NotNull { table_id, column_id }) => {
                write!(f, "validate NOT NULL on column#{}.{}", table_id, column_id)
            }
            Op::Validation(ValidationOp::UniqueIndex { table_id, index_id }) => {
                write!(f, "validate uniqueness of index#{}.{}", table_id, index_id)
            }
            Op::Validation(ValidationOp::Check {
                table_id,
                constraint_id,
            }) => write!(f, "validate check#{}.{}", table_id, constraint_id),
            Op::Validation(ValidationOp::ForeignKey {
                table_id,
                constraint_id,
            }) => write!(f, "validate foreign key#{}.{}", table_id, constraint_id),
            Op::Gc(gc) => write!(f, "{}", gc),
        }
    }
}

impl fmt::Display for GcOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GcOp::ColumnData { table_id, column_id } => {
                write!(f, "delete data of column#{}.{}", table_id, column_id)
            }
            GcOp::IndexData { table_id, index_id } => {
                write!(f, "delete entries of index#{}.{}", table_id, index_id)
            }
            GcOp::TableData { table_id } => write!(f, "delete rows of table#{}", table_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ColumnElement, IndexElement, Target};
    use crate::eval::{ColumnType, Datum, Expr};

    fn column(nullable: bool) -> Element {
        Element::Column(ColumnElement {
            table_id: 101,
            column_id: 5,
            name: "qty".into(),
            column_type: ColumnType::Int8,
            nullable,
            default: Some(Expr::literal(Datum::Int(1))),
        })
    }

    #[test]
    fn test_column_backfill_ops() {
        let node = Node::new(Target::add(column(false)));
        let ops = ops_for(&node, Status::Backfilling, Status::Backfilled);
        assert_eq!(ops.len(), 3);
        assert!(matches!(ops[0], Op::Mutation(MutationOp::SetStatus { .. })));
        assert!(matches!(ops[1], Op::Backfill(BackfillOp::ColumnDefault { column_id: 5, .. })));
        assert!(matches!(ops[2], Op::Validation(ValidationOp::NotNull { .. })));

        let first = ops_for(&node, Status::Absent, Status::DeleteOnly);
        assert!(matches!(first.as_slice(), [Op::Mutation(MutationOp::AddElement { .. })]));
    }

    #[test]
    fn test_gc_only_for_non_direct_children() {
        let index = Element::SecondaryIndex(IndexElement {
            table_id: 101,
            index_id: 2,
            name: "i".into(),
            key_columns: vec![2],
            unique: false,
        });
        let dropped = Node::new(Target::drop(index.clone()));
        let ops = ops_for(&dropped, Status::DeleteOnly, Status::Absent);
        assert!(matches!(ops[1], Op::Gc(GcOp::IndexData { index_id: 2, .. })));

        let direct = Node::new(Target::drop(index).direct());
        assert_eq!(ops_for(&direct, Status::Public, Status::Absent).len(), 1);
    }

    #[test]
    fn test_gc_display() {
        let gc = GcOp::IndexData {
            table_id: 101,
            index_id: 2,
        };
        assert_eq!(gc.to_string(), "delete entries of index#101.2");
        assert_eq!(Op::Gc(gc).to_string(), "delete entries of index#101.2");
        assert_eq!(GcOp::TableData { table_id: 7 }.to_string(), "delete rows of table#7");
    }

    #[test]
    fn test_reverted_column_gets_gc() {
        let mut node = Node::new(Target::add(column(true)));
        node.current = Status::Backfilled;
        node.flip();
        let ops = ops_for(&node, Status::DeleteOnly, Status::Absent);
        assert_eq!(ops[1].to_string(), "delete data of column#101.5");
    }
}
