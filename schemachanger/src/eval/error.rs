// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for expression checking and evaluation

use super::capabilities::Capability;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("{capability} is not available in {context}")]
    Unsupported {
        capability: Capability,
        context: &'static str,
    },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Function {function} expects {expected} argument(s), got {got}")]
    WrongArgumentCount {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("Integer out of range")]
    Overflow,
}

pub type EvalResult<T> = Result<T, EvalError>;
