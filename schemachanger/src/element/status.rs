// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Element lifecycle statuses and directions
//!
//! Statuses are totally ordered by rank. An element being added moves up the
//! ranks until it reaches `Public`; an element being dropped moves down until
//! it reaches `Absent`. Each element kind only visits a subset of the ranks,
//! see [`super::target::status_path`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    /// Not present in the catalog
    Absent,
    /// Present; deletes maintain it, reads and inserts ignore it
    DeleteOnly,
    /// Present; all writes maintain it, reads ignore it
    WriteOnly,
    /// Existing data is being filled in
    Backfilling,
    /// Existing data has been filled in
    Backfilled,
    /// Existing data has been checked against the element's constraint
    Validated,
    /// Fully visible
    Public,
}

impl Status {
    pub const ALL: [Status; 7] = [
        Status::Absent,
        Status::DeleteOnly,
        Status::WriteOnly,
        Status::Backfilling,
        Status::Backfilled,
        Status::Validated,
        Status::Public,
    ];

    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Whether writes to the owning table must maintain this element
    pub fn is_writable(self) -> bool {
        self >= Status::WriteOnly
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Absent => "ABSENT",
            Status::DeleteOnly => "DELETE_ONLY",
            Status::WriteOnly => "WRITE_ONLY",
            Status::Backfilling => "BACKFILLING",
            Status::Backfilled => "BACKFILLED",
            Status::Validated => "VALIDATED",
            Status::Public => "PUBLIC",
        };
        write!(f, "{}", name)
    }
}

/// Direction of change for a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Add,
    Drop,
}

impl Direction {
    /// Terminal status in this direction
    pub fn terminal(self) -> Status {
        match self {
            Direction::Add => Status::Public,
            Direction::Drop => Status::Absent,
        }
    }

    pub fn flip(self) -> Self {
        match self {
            Direction::Add => Direction::Drop,
            Direction::Drop => Direction::Add,
        }
    }

    /// Whether `current` is at or beyond `status` when moving in this direction
    pub fn reached(self, current: Status, status: Status) -> bool {
        match self {
            Direction::Add => current >= status,
            Direction::Drop => current <= status,
        }
    }

    /// Whether `status` lies strictly beyond `current` in this direction
    pub fn beyond(self, current: Status, status: Status) -> bool {
        match self {
            Direction::Add => status > current,
            Direction::Drop => status < current,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Add => write!(f, "ADD"),
            Direction::Drop => write!(f, "DROP"),
        }
    }
}
