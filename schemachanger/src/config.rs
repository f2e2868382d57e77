// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Configuration records
//!
//! Two kinds of configuration flow through the crate:
//!
//! - [`ClusterSettings`]: an immutable record of cluster identity and session
//!   data. It is passed explicitly into the builder and the evaluation
//!   context; nothing reads it from process-wide state.
//! - [`SchemaChangerConfig`]: runtime knobs for storage, backfill batching and
//!   retry backoff, loaded once when a [`crate::SchemaChanger`] is opened.

use crate::storage::StorageType;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Session-scoped values visible to expression evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    /// User issuing the statement
    pub user: String,
    /// Current database name
    pub database: String,
    /// Client application name
    pub application_name: String,
}

impl Default for SessionData {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            database: "defaultdb".to_string(),
            application_name: String::new(),
        }
    }
}

/// Immutable cluster and session configuration consumed by the builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSettings {
    /// Identity of the cluster
    pub cluster_id: Uuid,
    /// Session issuing the schema change
    pub session: SessionData,
    /// Longest identifier accepted for new tables, columns, indexes and constraints
    pub max_identifier_length: usize,
    /// Region reported to expressions by the full evaluation context
    pub region: String,
    /// Tenant reported to expressions by the full evaluation context
    pub tenant: String,
}

impl ClusterSettings {
    pub fn new(cluster_id: Uuid, session: SessionData) -> Self {
        Self {
            cluster_id,
            session,
            ..Self::default()
        }
    }
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            cluster_id: Uuid::nil(),
            session: SessionData::default(),
            max_identifier_length: 63,
            region: "default".to_string(),
            tenant: "system".to_string(),
        }
    }
}

/// Backfill and validation batching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillConfig {
    /// Rows processed per batch; progress is persisted after each batch
    pub batch_size: usize,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self { batch_size: 1000 }
    }
}

/// Backoff policy for retriable failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for the delay between retries
    pub max_backoff: Duration,
    /// Growth factor applied after each failed attempt
    pub multiplier: f64,
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(32) as i32);
        let millis = (self.initial_backoff.as_millis() as f64 * factor)
            .min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Runtime configuration for a [`crate::SchemaChanger`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaChangerConfig {
    /// Storage backend
    pub storage_type: StorageType,
    /// Data directory (ignored by the memory backend)
    pub path: PathBuf,
    /// Cluster settings handed to the builder
    pub settings: ClusterSettings,
    /// Backfill batching
    pub backfill: BackfillConfig,
    /// Retry backoff for transient job failures
    pub retry: RetryConfig,
}

impl SchemaChangerConfig {
    /// Sled-backed configuration rooted at `path`
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            storage_type: StorageType::Sled,
            path: path.into(),
            ..Self::default()
        }
    }

    /// Memory-backed configuration
    pub fn in_memory() -> Self {
        Self {
            storage_type: StorageType::Memory,
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &std::path::Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

impl Default for SchemaChangerConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::default(),
            path: PathBuf::from("./schemachanger.db"),
            settings: ClusterSettings::default(),
            backfill: BackfillConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}
