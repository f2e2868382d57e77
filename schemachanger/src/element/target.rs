// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Targets, nodes and the target state of one schema change

use super::status::{Direction, Status};
use super::types::{Element, ElementKey, ElementKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered statuses an element of `kind` visits when moving in `direction`
///
/// `direct` is set for children of a table that is created or dropped by the
/// same change; they become visible or disappear together with the table.
pub fn status_path(kind: ElementKind, direction: Direction, direct: bool) -> &'static [Status] {
    use Status::*;
    if direct {
        return match direction {
            Direction::Add => &[Absent, Public],
            Direction::Drop => &[Public, Absent],
        };
    }
    match (kind, direction) {
        (ElementKind::Table, Direction::Add) => &[Absent, Public],
        (ElementKind::Table, Direction::Drop) => &[Public, DeleteOnly, Absent],
        (ElementKind::Column, Direction::Add) => {
            &[Absent, DeleteOnly, WriteOnly, Backfilling, Backfilled, Public]
        }
        (ElementKind::SecondaryIndex, Direction::Add) => &[
            Absent,
            DeleteOnly,
            WriteOnly,
            Backfilling,
            Backfilled,
            Validated,
            Public,
        ],
        (ElementKind::Column | ElementKind::SecondaryIndex, Direction::Drop) => {
            &[Public, WriteOnly, DeleteOnly, Absent]
        }
        (ElementKind::CheckConstraint | ElementKind::ForeignKey, Direction::Add) => {
            &[Absent, WriteOnly, Validated, Public]
        }
        (ElementKind::CheckConstraint | ElementKind::ForeignKey, Direction::Drop) => {
            &[Public, WriteOnly, Absent]
        }
        (ElementKind::PrimaryIndex, Direction::Add) => &[Absent, Public],
        (ElementKind::PrimaryIndex, Direction::Drop) => &[Public, Absent],
    }
}

/// An element paired with a direction of change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub element: Element,
    pub direction: Direction,
    /// Skip intermediate statuses (child of a created or dropped table)
    pub direct: bool,
}

impl Target {
    pub fn add(element: Element) -> Self {
        Self {
            element,
            direction: Direction::Add,
            direct: false,
        }
    }

    pub fn drop(element: Element) -> Self {
        Self {
            element,
            direction: Direction::Drop,
            direct: false,
        }
    }

    pub fn direct(mut self) -> Self {
        self.direct = true;
        self
    }
}

/// A target together with its status before the change and its current status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub target: Target,
    pub initial: Status,
    pub current: Status,
}

impl Node {
    pub fn new(target: Target) -> Self {
        let initial = target.direction.flip().terminal();
        Self {
            target,
            initial,
            current: initial,
        }
    }

    pub fn key(&self) -> ElementKey {
        self.target.element.key()
    }

    pub fn kind(&self) -> ElementKind {
        self.target.element.kind()
    }

    pub fn element(&self) -> &Element {
        &self.target.element
    }

    pub fn direction(&self) -> Direction {
        self.target.direction
    }

    pub fn path(&self) -> &'static [Status] {
        status_path(self.kind(), self.direction(), self.target.direct)
    }

    pub fn goal(&self) -> Status {
        self.direction().terminal()
    }

    pub fn is_terminal(&self) -> bool {
        self.current == self.goal()
    }

    /// Whether `status` is one the node visits in its current direction
    pub fn visits(&self, status: Status) -> bool {
        self.path().contains(&status)
    }

    /// Whether the node is at or beyond `status` in its current direction
    pub fn reached(&self, status: Status) -> bool {
        self.direction().reached(self.current, status)
    }

    /// Next status along the path, or `None` when terminal
    ///
    /// The current status need not lie on the path: a node whose direction
    /// was flipped continues from wherever it stopped.
    pub fn next_status(&self) -> Option<Status> {
        let direction = self.direction();
        self.path()
            .iter()
            .copied()
            .find(|s| direction.beyond(self.current, *s))
    }

    /// Whether the stored data of this element has already been removed
    pub fn data_destroyed(&self) -> bool {
        self.kind().is_data_bearing()
            && self.initial == Status::Public
            && self.current == Status::Absent
    }

    /// Reverse the direction so the node heads back to its initial status
    pub fn flip(&mut self) {
        self.target.direction = self.target.direction.flip();
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{} -> {}]",
            self.direction(),
            self.target.element,
            self.current,
            self.goal()
        )
    }
}

/// The set of nodes changed by one schema-change operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetState {
    pub nodes: Vec<Node>,
}

impl TargetState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, target: Target) -> usize {
        self.nodes.push(Node::new(target));
        self.nodes.len() - 1
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn find(&self, key: &ElementKey) -> Option<usize> {
        self.nodes.iter().position(|n| n.key() == *key)
    }

    pub fn contains(&self, key: &ElementKey) -> bool {
        self.find(key).is_some()
    }

    pub fn all_terminal(&self) -> bool {
        self.nodes.iter().all(Node::is_terminal)
    }

    pub fn keys(&self) -> Vec<ElementKey> {
        self.nodes.iter().map(Node::key).collect()
    }

    /// Current status of every node, in node order
    pub fn statuses(&self) -> Vec<(ElementKey, Status)> {
        self.nodes.iter().map(|n| (n.key(), n.current)).collect()
    }

    /// Flip every node so the state drives back to its initial statuses
    pub fn flip_for_revert(&mut self) {
        for node in &mut self.nodes {
            node.flip();
        }
    }

    /// Whether reverting can still restore the initial statuses
    pub fn is_revertible(&self) -> bool {
        !self.nodes.iter().any(Node::data_destroyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::types::ColumnElement;
    use crate::eval::ColumnType;

    fn column_node(direction: Direction) -> Node {
        let element = Element::Column(ColumnElement {
            table_id: 1,
            column_id: 2,
            name: "c".into(),
            column_type: ColumnType::Int8,
            nullable: true,
            default: None,
        });
        Node::new(Target {
            element,
            direction,
            direct: false,
        })
    }

    #[test]
    fn test_add_column_walks_full_path() {
        let mut node = column_node(Direction::Add);
        let mut visited = vec![node.current];
        while let Some(next) = node.next_status() {
            node.current = next;
            visited.push(next);
        }
        assert_eq!(visited, status_path(ElementKind::Column, Direction::Add, false));
        assert!(node.is_terminal());
    }

    #[test]
    fn test_flip_resumes_from_off_path_status() {
        let mut node = column_node(Direction::Add);
        node.current = Status::Backfilled;
        node.flip();
        assert_eq!(node.next_status(), Some(Status::WriteOnly));
        assert_eq!(node.goal(), node.initial);
    }

    #[test]
    fn test_data_destroyed_only_for_dropped_data() {
        let mut node = column_node(Direction::Drop);
        assert_eq!(node.initial, Status::Public);
        node.current = Status::DeleteOnly;
        assert!(!node.data_destroyed());
        node.current = Status::Absent;
        assert!(node.data_destroyed());
    }
}
