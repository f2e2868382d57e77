// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Element model
//!
//! A schema change is described as a set of *elements* (tables, columns,
//! indexes, constraints), each paired with a direction and a current status.

pub mod status;
pub mod target;
pub mod types;

pub use status::{Direction, Status};
pub use target::{status_path, Node, Target, TargetState};
pub use types::{
    CheckElement, ColumnElement, ColumnId, ConstraintId, Element, ElementKey, ElementKind,
    ForeignKeyElement, IndexElement, IndexId, TableElement, TableId,
};
