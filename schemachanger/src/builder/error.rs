// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Semantic errors reported by the builder

use crate::eval::EvalError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Table \"{0}\" does not exist")]
    TableNotFound(String),

    #[error("Table \"{0}\" already exists")]
    TableAlreadyExists(String),

    #[error("Column \"{column}\" of table \"{table}\" does not exist")]
    ColumnNotFound { table: String, column: String },

    #[error("Column \"{column}\" of table \"{table}\" already exists")]
    ColumnAlreadyExists { table: String, column: String },

    #[error("Index \"{index}\" on table \"{table}\" does not exist")]
    IndexNotFound { table: String, index: String },

    #[error("Index \"{index}\" on table \"{table}\" already exists")]
    IndexAlreadyExists { table: String, index: String },

    #[error("Constraint \"{constraint}\" of table \"{table}\" does not exist")]
    ConstraintNotFound { table: String, constraint: String },

    #[error("Constraint \"{constraint}\" of table \"{table}\" already exists")]
    ConstraintAlreadyExists { table: String, constraint: String },

    #[error("Cannot drop {object} because {dependent} depends on it (use CASCADE)")]
    DependedOnBy { object: String, dependent: String },

    #[error("Cannot drop column \"{0}\" because it is part of the primary key")]
    CannotDropPrimaryKeyColumn(String),

    #[error("Cannot drop primary index \"{0}\"")]
    CannotDropPrimaryIndex(String),

    #[error("Table \"{0}\" has no primary key")]
    MissingPrimaryKey(String),

    #[error("Invalid identifier \"{name}\": {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Invalid expression {expr}: {source}")]
    InvalidExpression {
        expr: String,
        #[source]
        source: EvalError,
    },

    #[error("Invalid foreign key {name}: {reason}")]
    InvalidForeignKey { name: String, reason: String },

    #[error("Unsupported combination in one statement: {0}")]
    UnsupportedCombination(String),

    #[error("{0} is being changed by another schema change")]
    ObjectBusy(String),
}

pub type BuildResult<T> = Result<T, BuildError>;
