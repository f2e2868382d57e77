// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Schema changer - the embedding API
//!
//! Wires storage, catalog, table data, checkpoints, the event log, the
//! executor and the job registry together, and exposes the operations a
//! session or an operator console needs.

use crate::backfill::ProgressStore;
use crate::builder::{self, BuildError, Statement};
use crate::catalog::{CatalogSnapshot, CatalogStore};
use crate::checkpoint::CheckpointStore;
use crate::config::{ClusterSettings, SchemaChangerConfig};
use crate::element::TargetState;
use crate::error::{SchemaChangeError, SchemaResult};
use crate::eval::{CapabilityProvider, Datum};
use crate::events::{Event, EventLog, KvEventLog};
use crate::executor::{Executor, ExecutorState, TestingKnobs};
use crate::jobs::{JobRegistry, JobStatus, JobStatusRow, RunId};
use crate::scheduler::{Phase, Plan};
use crate::storage::{create_storage_driver, DynStorageDriver, Row, TableDataStore};
use std::sync::Arc;

const CATALOG_TREE: &str = "catalog";
const CHECKPOINT_TREE: &str = "checkpoints";
const EVENT_TREE: &str = "events";
const JOB_TREE: &str = "jobs";
const PROGRESS_TREE: &str = "backfill_progress";

/// Entry point for submitting and supervising schema changes
pub struct SchemaChanger {
    driver: Arc<DynStorageDriver>,
    settings: ClusterSettings,
    catalog: Arc<CatalogStore>,
    data: Arc<TableDataStore>,
    events: Arc<KvEventLog>,
    executor: Arc<Executor>,
    jobs: Arc<JobRegistry>,
}

impl SchemaChanger {
    /// Open (or create) the store described by `config`
    pub fn open(config: SchemaChangerConfig) -> SchemaResult<Self> {
        Self::with_knobs(config, TestingKnobs::default())
    }

    /// Throwaway instance backed by memory
    pub fn in_memory() -> SchemaResult<Self> {
        Self::open(SchemaChangerConfig::in_memory())
    }

    pub fn with_knobs(config: SchemaChangerConfig, knobs: TestingKnobs) -> SchemaResult<Self> {
        let driver: Arc<DynStorageDriver> =
            Arc::from(create_storage_driver(config.storage_type, &config.path)?);

        let catalog = Arc::new(CatalogStore::new(driver.open_tree(CATALOG_TREE)?));
        let data = Arc::new(TableDataStore::new(driver.clone()));
        let progress = Arc::new(ProgressStore::new(driver.open_tree(PROGRESS_TREE)?));
        let checkpoints = Arc::new(CheckpointStore::new(driver.open_tree(CHECKPOINT_TREE)?));
        let events = Arc::new(KvEventLog::new(driver.open_tree(EVENT_TREE)?));

        let executor = Arc::new(
            Executor::new(
                catalog.clone(),
                data.clone(),
                progress,
                checkpoints,
                events.clone(),
                config.settings.clone(),
            )
            .with_backfill(config.backfill.clone())
            .with_knobs(knobs),
        );
        let jobs = Arc::new(JobRegistry::new(
            driver.open_tree(JOB_TREE)?,
            executor.clone(),
            config.retry.clone(),
        ));

        log::debug!(
            "schema changer opened ({:?} storage at {})",
            config.storage_type,
            config.path.display()
        );
        Ok(Self {
            driver,
            settings: config.settings,
            catalog,
            data,
            events,
            executor,
            jobs,
        })
    }

    pub fn settings(&self) -> &ClusterSettings {
        &self.settings
    }

    pub fn snapshot(&self) -> SchemaResult<CatalogSnapshot> {
        Ok(self.catalog.snapshot()?)
    }

    /// Build the target state of `stmt` and plan all of its stages
    pub fn plan(&self, stmt: &Statement) -> SchemaResult<(TargetState, Plan)> {
        let snapshot = self.snapshot()?;
        let state = builder::build(stmt, &snapshot, &self.settings)?;
        let plan = Plan::compute(&state, Phase::Statement)?;
        Ok((state, plan))
    }

    /// Render the stages `stmt` would run, without running them
    pub fn explain(&self, stmt: &Statement) -> SchemaResult<String> {
        let (state, plan) = self.plan(stmt)?;
        Ok(format!("{}\n{}", stmt, plan.explain(&state)))
    }

    /// Run the statement and pre-commit stages of `stmt` and register a job
    /// for the rest
    ///
    /// Returns `None` when the statement changes nothing (e.g. `IF NOT EXISTS`
    /// on an existing object). Builder errors are returned before anything is
    /// persisted.
    pub fn submit(&self, stmt: &Statement) -> SchemaResult<Option<RunId>> {
        let (state, _) = self.plan(stmt)?;
        if state.is_empty() {
            log::info!("nothing to do for {}", stmt);
            return Ok(None);
        }
        let description = stmt.to_string();
        let run_id = self.executor.start(&description, state)?;
        self.jobs.create(run_id, description.as_str())?;
        if let Err(err) = self.executor.submit_phases(run_id) {
            // The job picks the run up from its last checkpoint
            log::warn!(
                "schema change {}: synchronous phases did not finish ({}): {}",
                run_id,
                err.class(),
                err
            );
        }
        Ok(Some(run_id))
    }

    /// Drive a submitted run to a terminal status
    pub async fn run_job(&self, run_id: RunId) -> SchemaResult<JobStatus> {
        self.jobs.run(run_id).await
    }

    /// Submit `stmt` and wait for its job to finish
    pub async fn execute(&self, stmt: &Statement) -> SchemaResult<Option<JobStatusRow>> {
        let Some(run_id) = self.submit(stmt)? else {
            return Ok(None);
        };
        self.run_job(run_id).await?;
        Ok(Some(self.status(run_id)?))
    }

    /// Request cancellation; the run reverts at its next stage boundary
    pub fn cancel(&self, run_id: RunId) -> SchemaResult<()> {
        let cp = self.executor.checkpoint(run_id)?;
        if cp.executor_state.is_terminal() || cp.executor_state == ExecutorState::Reverting {
            return Err(SchemaChangeError::InvalidRequest(format!(
                "schema change {} is already {}",
                run_id, cp.executor_state
            )));
        }
        if !cp.state.is_revertible() {
            return Err(SchemaChangeError::InvalidRequest(format!(
                "schema change {} can no longer be cancelled",
                run_id
            )));
        }
        self.jobs.request_cancel(run_id)
    }

    pub fn status(&self, run_id: RunId) -> SchemaResult<JobStatusRow> {
        let job = self
            .jobs
            .get(run_id)?
            .ok_or(SchemaChangeError::RunNotFound(run_id))?;
        let cp = self.executor.checkpoint(run_id)?;
        Ok(JobStatusRow {
            run_id,
            description: job.description,
            job_status: job.status,
            executor_state: cp.executor_state,
            phase: cp.phase,
            stages_completed: cp.stages_completed,
            error: job.error.or(cp.cause),
        })
    }

    /// Status of every job, oldest first
    pub fn list_jobs(&self) -> SchemaResult<Vec<JobStatusRow>> {
        self.jobs
            .list()?
            .into_iter()
            .map(|job| self.status(job.run_id))
            .collect()
    }

    pub fn events(&self, run_id: RunId) -> SchemaResult<Vec<Event>> {
        Ok(self.events.events(run_id)?)
    }

    /// Resume every job left unfinished by a previous process
    pub async fn adopt_jobs(&self) -> SchemaResult<Vec<(RunId, SchemaResult<JobStatus>)>> {
        self.jobs.adopt().await
    }

    /// Insert a row through the current catalog, honouring element statuses
    pub fn insert_row(&self, table: &str, values: &[(String, Datum)]) -> SchemaResult<()> {
        let snapshot = self.snapshot()?;
        let desc = snapshot
            .table_by_name(table)
            .ok_or_else(|| BuildError::TableNotFound(table.to_string()))?;
        let provider = CapabilityProvider::full(self.settings.clone());
        self.data.insert_row(desc, &snapshot, values, &provider)?;
        Ok(())
    }

    /// Every stored row of `table`, in primary key order
    pub fn rows(&self, table: &str) -> SchemaResult<Vec<Row>> {
        let snapshot = self.snapshot()?;
        let desc = snapshot
            .table_by_name(table)
            .ok_or_else(|| BuildError::TableNotFound(table.to_string()))?;
        Ok(self
            .data
            .scan_rows(desc.id)?
            .into_iter()
            .map(|(_, row)| row)
            .collect())
    }

    pub fn flush(&self) -> SchemaResult<()> {
        self.driver.flush()?;
        Ok(())
    }
}
