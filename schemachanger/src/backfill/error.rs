// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Backfill and validation errors

use crate::storage::{DataError, StorageDriverError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperatorError {
    /// Existing data proves the change unsafe
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The operation may succeed if run again
    #[error("Retriable failure: {0}")]
    Retriable(String),

    #[error("{0} is missing from the catalog")]
    ElementMissing(String),
}

impl OperatorError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, OperatorError::Retriable(_))
    }
}

impl From<DataError> for OperatorError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::Storage(_) | DataError::Serialization(_) => {
                OperatorError::Retriable(err.to_string())
            }
            other => OperatorError::Validation(other.to_string()),
        }
    }
}

impl From<StorageDriverError> for OperatorError {
    fn from(err: StorageDriverError) -> Self {
        OperatorError::Retriable(err.to_string())
    }
}

impl From<bincode::Error> for OperatorError {
    fn from(err: bincode::Error) -> Self {
        OperatorError::Retriable(format!("progress record: {}", err))
    }
}

pub type OperatorResult<T> = Result<T, OperatorError>;
