// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Rule engine errors
//!
//! Both variants indicate a defect in the rule set rather than a bad
//! statement, and are classified as internal errors.

use crate::element::ElementKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("No dependency rule registered for ({from}, {to})")]
    MissingRule { from: ElementKind, to: ElementKind },

    #[error("Dependency cycle between {first} and {second} ({size} vertices)")]
    Cycle {
        first: String,
        second: String,
        size: usize,
    },
}

pub type RuleResult<T> = Result<T, RuleError>;
