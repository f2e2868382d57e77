// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Datum and column type system
//!
//! Datums are the values stored in table rows and produced by expression
//! evaluation. The set is deliberately small: it only has to cover what
//! column defaults, check constraints and index keys need.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Bool,
    Int8,
    String,
    Timestamp,
    Uuid,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Bool => "BOOL",
            ColumnType::Int8 => "INT8",
            ColumnType::String => "STRING",
            ColumnType::Timestamp => "TIMESTAMPTZ",
            ColumnType::Uuid => "UUID",
        };
        write!(f, "{}", name)
    }
}

/// A single SQL value
///
/// The derived ordering sorts by variant first, so values of different types
/// never compare equal. Expression evaluation rejects cross-type comparisons
/// before the ordering is consulted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Datum {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

impl Datum {
    /// Type of this datum, or `None` for NULL
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Datum::Null => None,
            Datum::Bool(_) => Some(ColumnType::Bool),
            Datum::Int(_) => Some(ColumnType::Int8),
            Datum::String(_) => Some(ColumnType::String),
            Datum::Timestamp(_) => Some(ColumnType::Timestamp),
            Datum::Uuid(_) => Some(ColumnType::Uuid),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Convert a JSON value into a datum of the given column type
    ///
    /// Used by the CLI and test fixtures to seed rows.
    pub fn from_json(value: &serde_json::Value, ty: ColumnType) -> Result<Datum, String> {
        use serde_json::Value as Json;
        match (value, ty) {
            (Json::Null, _) => Ok(Datum::Null),
            (Json::Bool(b), ColumnType::Bool) => Ok(Datum::Bool(*b)),
            (Json::Number(n), ColumnType::Int8) => n
                .as_i64()
                .map(Datum::Int)
                .ok_or_else(|| format!("{} is not an INT8", n)),
            (Json::String(s), ColumnType::String) => Ok(Datum::String(s.clone())),
            (Json::String(s), ColumnType::Timestamp) => DateTime::parse_from_rfc3339(s)
                .map(|ts| Datum::Timestamp(ts.with_timezone(&Utc)))
                .map_err(|e| format!("invalid timestamp '{}': {}", s, e)),
            (Json::String(s), ColumnType::Uuid) => Uuid::parse_str(s)
                .map(Datum::Uuid)
                .map_err(|e| format!("invalid uuid '{}': {}", s, e)),
            (other, ty) => Err(format!("cannot convert {} to {}", other, ty)),
        }
    }

    /// Render this datum as JSON for CLI output
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Datum::Null => Json::Null,
            Datum::Bool(b) => Json::Bool(*b),
            Datum::Int(i) => Json::from(*i),
            Datum::String(s) => Json::String(s.clone()),
            Datum::Timestamp(ts) => Json::String(ts.to_rfc3339()),
            Datum::Uuid(u) => Json::String(u.to_string()),
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "NULL"),
            Datum::Bool(b) => write!(f, "{}", b),
            Datum::Int(i) => write!(f, "{}", i),
            Datum::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Datum::Timestamp(ts) => write!(f, "'{}'::TIMESTAMPTZ", ts.to_rfc3339()),
            Datum::Uuid(u) => write!(f, "'{}'::UUID", u),
        }
    }
}
