// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Crate-level error type
//!
//! Every module area keeps its own error enum; [`SchemaChangeError`] wraps
//! them and sorts each failure into an [`ErrorClass`], which decides what the
//! executor and the job registry do next:
//!
//! | class        | effect                                           |
//! |--------------|--------------------------------------------------|
//! | `Semantic`   | reported to the caller, nothing persisted         |
//! | `Internal`   | defect; the run is reverted                       |
//! | `Transient`  | retried with backoff from the last checkpoint     |
//! | `Validation` | the change is unsafe; the run is reverted         |
//! | `Cancelled`  | explicit cancellation; the run is reverted        |
//! | `Reversion`  | the revert itself failed; terminal `FAILED`       |

use crate::backfill::OperatorError;
use crate::builder::BuildError;
use crate::catalog::CatalogError;
use crate::checkpoint::CheckpointError;
use crate::jobs::RunId;
use crate::rules::RuleError;
use crate::scheduler::ScheduleError;
use crate::storage::{DataError, StorageDriverError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How a failure is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    Semantic,
    Internal,
    Transient,
    Validation,
    Cancelled,
    Reversion,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClass::Semantic => "semantic",
            ErrorClass::Internal => "internal",
            ErrorClass::Transient => "transient",
            ErrorClass::Validation => "validation",
            ErrorClass::Cancelled => "cancelled",
            ErrorClass::Reversion => "reversion",
        };
        write!(f, "{}", name)
    }
}

#[derive(Error, Debug, Clone)]
pub enum SchemaChangeError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("Internal error: {0}")]
    Rule(#[from] RuleError),

    #[error("Internal error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Operator(#[from] OperatorError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("Schema change {0} was cancelled")]
    Cancelled(RunId),

    #[error("Schema change {0} not found")]
    RunNotFound(RunId),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// A planned element id is already used by another element or run
    #[error("Element collision: {0}")]
    Collision(String),

    /// Injected by a testing knob
    #[error("Injected failure: {message}")]
    Injected { message: String, class: ErrorClass },

    #[error("Failed to revert after \"{cause}\": {error}")]
    Reversion { cause: String, error: String },
}

impl SchemaChangeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SchemaChangeError::Build(_)
            | SchemaChangeError::RunNotFound(_)
            | SchemaChangeError::InvalidRequest(_) => ErrorClass::Semantic,
            SchemaChangeError::Rule(_)
            | SchemaChangeError::Schedule(_)
            | SchemaChangeError::Checkpoint(_)
            | SchemaChangeError::Internal(_) => ErrorClass::Internal,
            SchemaChangeError::Catalog(err) => match err {
                CatalogError::Conflict { .. }
                | CatalogError::StorageError(_)
                | CatalogError::IoError(_) => ErrorClass::Transient,
                _ => ErrorClass::Internal,
            },
            SchemaChangeError::Operator(err) => match err {
                OperatorError::Validation(_) => ErrorClass::Validation,
                OperatorError::Retriable(_) => ErrorClass::Transient,
                OperatorError::ElementMissing(_) => ErrorClass::Internal,
            },
            SchemaChangeError::Storage(_) => ErrorClass::Transient,
            SchemaChangeError::Data(err) => match err {
                DataError::Storage(_) | DataError::Serialization(_) => ErrorClass::Transient,
                _ => ErrorClass::Semantic,
            },
            SchemaChangeError::Collision(_) => ErrorClass::Validation,
            SchemaChangeError::Cancelled(_) => ErrorClass::Cancelled,
            SchemaChangeError::Injected { class, .. } => *class,
            SchemaChangeError::Reversion { .. } => ErrorClass::Reversion,
        }
    }

    /// Whether the failed step should simply be retried
    pub fn is_retriable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

impl From<StorageDriverError> for SchemaChangeError {
    fn from(err: StorageDriverError) -> Self {
        SchemaChangeError::Storage(err.to_string())
    }
}

pub type SchemaResult<T> = Result<T, SchemaChangeError>;
