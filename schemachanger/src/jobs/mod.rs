// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Long-running job contract
//!
//! A schema change runs as a job identified by a [`RunId`]. The job layer
//! knows nothing about stages: it calls [`Resumer::resume`] until the run
//! finishes, backs off and retries on transient errors, and hands any other
//! failure (or a cancellation) to [`Resumer::on_fail_or_cancel`].

pub mod registry;

pub use registry::JobRegistry;

use crate::error::SchemaResult;
use crate::executor::ExecutorState;
use crate::scheduler::Phase;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of one schema-change run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        RunId(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        RunId(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Raw bytes, used as a storage key prefix
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(RunId(Uuid::parse_str(s)?))
    }
}

/// Status of a job as seen by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Running,
    Reverting,
    Succeeded,
    Reverted,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Reverted | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Running => "running",
            JobStatus::Reverting => "reverting",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Reverted => "reverted",
            JobStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Persisted job metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub run_id: RunId,
    pub description: String,
    pub status: JobStatus,
    /// First non-retriable error, kept as the revert cause
    pub error: Option<String>,
    pub cancel_requested: bool,
    /// Transient failures retried so far
    pub retries: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(run_id: RunId, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            description: description.into(),
            status: JobStatus::Running,
            error: None,
            cancel_requested: false,
            retries: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Queryable status of one schema change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusRow {
    pub run_id: RunId,
    pub description: String,
    pub job_status: JobStatus,
    pub executor_state: ExecutorState,
    /// Phase of the next stage
    pub phase: Phase,
    pub stages_completed: usize,
    pub error: Option<String>,
}

/// Checked by a resumer at every stage boundary
pub type CancelCheck<'a> = &'a (dyn Fn() -> bool + Send + Sync);

/// What the registry drives
#[async_trait]
pub trait Resumer: Send + Sync {
    /// Run the job forward to completion
    async fn resume(&self, run_id: RunId, cancelled: CancelCheck<'_>) -> SchemaResult<()>;

    /// Undo the job after a non-retriable failure or a cancellation
    ///
    /// `Ok` means the job was reverted; a revert that cannot complete returns
    /// an error of class `Reversion`.
    async fn on_fail_or_cancel(&self, run_id: RunId, cause: &str) -> SchemaResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_text_roundtrip() {
        let id = RunId::new();
        let parsed: RunId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.as_bytes(), id.as_uuid().as_bytes());
        assert!("not-a-run".parse::<RunId>().is_err());
    }
}
