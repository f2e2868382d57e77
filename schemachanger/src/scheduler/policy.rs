// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Phase policy
//!
//! The earliest phase in which a transition may run. Transitions that make
//! an element visible to the statement's own transaction (a new table, the
//! first step of a new column or index, the first step of a drop) run in the
//! statement phase. Transitions that start enforcing writes run at pre-commit.
//! Anything that scans or destroys data runs after commit.

use crate::element::{Direction, ElementKind, Status};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    Statement,
    PreCommit,
    PostCommit,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Statement, Phase::PreCommit, Phase::PostCommit];

    /// Phase the following stage is planned from; post-commit repeats
    pub fn next(self) -> Phase {
        match self {
            Phase::Statement => Phase::PreCommit,
            Phase::PreCommit | Phase::PostCommit => Phase::PostCommit,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Statement => write!(f, "STATEMENT"),
            Phase::PreCommit => write!(f, "PRE_COMMIT"),
            Phase::PostCommit => write!(f, "POST_COMMIT"),
        }
    }
}

/// Earliest phase for moving an element of `kind` to `to`
pub fn earliest_phase(kind: ElementKind, direction: Direction, to: Status, direct: bool) -> Phase {
    use ElementKind::*;
    use Status::*;
    match direction {
        Direction::Add => match (kind, to) {
            (_, Public) if direct => Phase::Statement,
            (Table, Public) => Phase::Statement,
            (Column | SecondaryIndex, DeleteOnly) => Phase::Statement,
            (Column | SecondaryIndex | CheckConstraint | ForeignKey, WriteOnly) => Phase::PreCommit,
            _ => Phase::PostCommit,
        },
        Direction::Drop => match (kind, to) {
            (Table, DeleteOnly) => Phase::Statement,
            (Column | SecondaryIndex | CheckConstraint | ForeignKey, WriteOnly) => Phase::Statement,
            _ => Phase::PostCommit,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_column_phases() {
        let phase = |to| earliest_phase(ElementKind::Column, Direction::Add, to, false);
        assert_eq!(phase(Status::DeleteOnly), Phase::Statement);
        assert_eq!(phase(Status::WriteOnly), Phase::PreCommit);
        assert_eq!(phase(Status::Backfilling), Phase::PostCommit);
        assert_eq!(phase(Status::Public), Phase::PostCommit);
    }

    #[test]
    fn test_direct_children() {
        assert_eq!(
            earliest_phase(ElementKind::Column, Direction::Add, Status::Public, true),
            Phase::Statement
        );
        assert_eq!(
            earliest_phase(ElementKind::Column, Direction::Drop, Status::Absent, true),
            Phase::PostCommit
        );
    }

    #[test]
    fn test_drop_phases() {
        assert_eq!(
            earliest_phase(ElementKind::Table, Direction::Drop, Status::DeleteOnly, false),
            Phase::Statement
        );
        assert_eq!(
            earliest_phase(ElementKind::ForeignKey, Direction::Drop, Status::Absent, false),
            Phase::PostCommit
        );
        assert!(Phase::Statement < Phase::PreCommit && Phase::PreCommit < Phase::PostCommit);
    }
}
