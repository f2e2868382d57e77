// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for the versioned catalog

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// A value read by the transaction changed before it committed
    #[error("Transaction conflict on {key}")]
    Conflict { key: String },

    #[error("Table not found: {0}")]
    TableNotFound(u32),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Element already exists: {0}")]
    ElementAlreadyExists(String),

    #[error("{element} is {found}, expected {expected}")]
    UnexpectedStatus {
        element: String,
        expected: String,
        found: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl CatalogError {
    /// Whether retrying the transaction from scratch may succeed
    pub fn is_conflict(&self) -> bool {
        matches!(self, CatalogError::Conflict { .. })
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for CatalogError {
    fn from(err: bincode::Error) -> Self {
        CatalogError::SerializationError(err.to_string())
    }
}

impl From<crate::storage::StorageDriverError> for CatalogError {
    fn from(err: crate::storage::StorageDriverError) -> Self {
        CatalogError::StorageError(err.to_string())
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
