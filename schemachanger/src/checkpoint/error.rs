// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Checkpoint store errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckpointError {
    #[error("No checkpoint for run {0}")]
    NotFound(String),

    #[error("Corrupt checkpoint for run {run}: {reason}")]
    Corrupt { run: String, reason: String },

    #[error("Unsupported checkpoint format version {0}")]
    UnsupportedVersion(u16),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<bincode::Error> for CheckpointError {
    fn from(err: bincode::Error) -> Self {
        CheckpointError::Serialization(err.to_string())
    }
}

impl From<crate::storage::StorageDriverError> for CheckpointError {
    fn from(err: crate::storage::StorageDriverError) -> Self {
        CheckpointError::Storage(err.to_string())
    }
}

pub type CheckpointResult<T> = Result<T, CheckpointError>;
