// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Job registry
//!
//! Persists one [`JobRecord`] per run and drives runs through a [`Resumer`].
//! Transient errors are retried without limit, spaced by
//! [`RetryConfig::backoff`]. After a restart, [`JobRegistry::adopt`] picks up
//! every job that had not reached a terminal status.

use super::{JobRecord, JobStatus, Resumer, RunId};
use crate::config::RetryConfig;
use crate::error::{SchemaChangeError, SchemaResult};
use crate::storage::StorageTree;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;

pub struct JobRegistry {
    tree: Box<dyn StorageTree>,
    resumer: Arc<dyn Resumer>,
    retry: RetryConfig,
    // Serializes read-modify-write of records
    write_lock: Mutex<()>,
}

impl JobRegistry {
    pub fn new(tree: Box<dyn StorageTree>, resumer: Arc<dyn Resumer>, retry: RetryConfig) -> Self {
        Self {
            tree,
            resumer,
            retry,
            write_lock: Mutex::new(()),
        }
    }

    pub fn create(&self, run_id: RunId, description: impl Into<String>) -> SchemaResult<JobRecord> {
        let record = JobRecord::new(run_id, description);
        let _guard = self.write_lock.lock();
        self.put(&record)?;
        log::info!("job {} created: {}", run_id, record.description);
        Ok(record)
    }

    pub fn get(&self, run_id: RunId) -> SchemaResult<Option<JobRecord>> {
        match self.tree.get(run_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(|e| {
                SchemaChangeError::Internal(format!("job record {}: {}", run_id, e))
            })?)),
            None => Ok(None),
        }
    }

    fn require(&self, run_id: RunId) -> SchemaResult<JobRecord> {
        self.get(run_id)?.ok_or(SchemaChangeError::RunNotFound(run_id))
    }

    fn put(&self, record: &JobRecord) -> SchemaResult<()> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| SchemaChangeError::Internal(format!("job record {}: {}", record.run_id, e)))?;
        self.tree.insert(record.run_id.as_bytes(), &bytes)?;
        Ok(())
    }

    fn update<F>(&self, run_id: RunId, change: F) -> SchemaResult<JobRecord>
    where
        F: FnOnce(&mut JobRecord),
    {
        let _guard = self.write_lock.lock();
        let mut record = self.require(run_id)?;
        change(&mut record);
        record.updated_at = Utc::now();
        self.put(&record)?;
        Ok(record)
    }

    /// Every job, oldest first
    pub fn list(&self) -> SchemaResult<Vec<JobRecord>> {
        let mut records = Vec::new();
        for item in self.tree.iter()? {
            let (_, bytes) = item?;
            let record: JobRecord = serde_json::from_slice(&bytes)
                .map_err(|e| SchemaChangeError::Internal(format!("job record: {}", e)))?;
            records.push(record);
        }
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    /// Ask a running job to stop; it reverts at its next stage boundary
    pub fn request_cancel(&self, run_id: RunId) -> SchemaResult<()> {
        let record = self.update(run_id, |r| {
            if !r.status.is_terminal() {
                r.cancel_requested = true;
            }
        })?;
        log::info!("job {}: cancel requested (status {})", run_id, record.status);
        Ok(())
    }

    pub fn is_cancel_requested(&self, run_id: RunId) -> bool {
        match self.get(run_id) {
            Ok(Some(record)) => record.cancel_requested,
            Ok(None) => false,
            Err(e) => {
                log::warn!("job {}: cannot read cancel flag: {}", run_id, e);
                false
            }
        }
    }

    /// Drive `run_id` until it reaches a terminal status
    pub async fn run(&self, run_id: RunId) -> SchemaResult<JobStatus> {
        let mut record = self.require(run_id)?;
        if record.status == JobStatus::Running {
            record = self.run_forward(run_id).await?;
        }
        if record.status == JobStatus::Reverting {
            record = self.run_revert(run_id, record.error.clone().unwrap_or_default()).await?;
        }
        Ok(record.status)
    }

    async fn run_forward(&self, run_id: RunId) -> SchemaResult<JobRecord> {
        let cancelled = move || self.is_cancel_requested(run_id);
        let mut attempt = 0;
        loop {
            match self.resumer.resume(run_id, &cancelled).await {
                Ok(()) => {
                    log::info!("job {} succeeded", run_id);
                    return self.update(run_id, |r| r.status = JobStatus::Succeeded);
                }
                Err(err) if err.is_retriable() => {
                    let delay = self.retry.backoff(attempt);
                    log::warn!("job {}: {} (retrying in {:?})", run_id, err, delay);
                    self.update(run_id, |r| r.retries += 1)?;
                    attempt = attempt.saturating_add(1);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    log::warn!("job {} failed ({}): {}", run_id, err.class(), err);
                    return self.update(run_id, |r| {
                        r.status = JobStatus::Reverting;
                        r.error = Some(err.to_string());
                    });
                }
            }
        }
    }

    async fn run_revert(&self, run_id: RunId, cause: String) -> SchemaResult<JobRecord> {
        let mut attempt = 0;
        loop {
            match self.resumer.on_fail_or_cancel(run_id, &cause).await {
                Ok(()) => {
                    log::info!("job {} reverted", run_id);
                    return self.update(run_id, |r| r.status = JobStatus::Reverted);
                }
                Err(err) if err.is_retriable() => {
                    let delay = self.retry.backoff(attempt);
                    log::warn!("job {}: revert: {} (retrying in {:?})", run_id, err, delay);
                    self.update(run_id, |r| r.retries += 1)?;
                    attempt = attempt.saturating_add(1);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    log::error!("job {} failed: {}", run_id, err);
                    return self.update(run_id, |r| {
                        r.status = JobStatus::Failed;
                        r.error = Some(err.to_string());
                    });
                }
            }
        }
    }

    /// Resume every non-terminal job concurrently
    pub async fn adopt(self: &Arc<Self>) -> SchemaResult<Vec<(RunId, SchemaResult<JobStatus>)>> {
        let pending: Vec<RunId> = self
            .list()?
            .into_iter()
            .filter(|r| !r.status.is_terminal())
            .map(|r| r.run_id)
            .collect();
        let mut handles = Vec::with_capacity(pending.len());
        for run_id in pending {
            log::info!("adopting job {}", run_id);
            let registry = Arc::clone(self);
            handles.push((run_id, tokio::spawn(async move { registry.run(run_id).await })));
        }
        let mut results = Vec::with_capacity(handles.len());
        for (run_id, handle) in handles {
            let result = handle
                .await
                .unwrap_or_else(|e| Err(SchemaChangeError::Internal(format!("job task: {}", e))));
            results.push((run_id, result));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use crate::jobs::CancelCheck;
    use crate::storage::{MemoryStorageDriver, StorageDriver};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Fails transiently `transient` times, then with `final_class` if set
    struct ScriptedResumer {
        transient: Mutex<u32>,
        final_class: Option<ErrorClass>,
        revert_fails: bool,
        reverted: Mutex<Vec<String>>,
    }

    impl ScriptedResumer {
        fn new(transient: u32, final_class: Option<ErrorClass>) -> Self {
            Self {
                transient: Mutex::new(transient),
                final_class,
                revert_fails: false,
                reverted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Resumer for ScriptedResumer {
        async fn resume(&self, run_id: RunId, cancelled: CancelCheck<'_>) -> SchemaResult<()> {
            if cancelled() {
                return Err(SchemaChangeError::Cancelled(run_id));
            }
            {
                let mut left = self.transient.lock();
                if *left > 0 {
                    *left -= 1;
                    return Err(SchemaChangeError::Injected {
                        message: "conflict".into(),
                        class: ErrorClass::Transient,
                    });
                }
            }
            match self.final_class {
                Some(class) => Err(SchemaChangeError::Injected {
                    message: "boom".into(),
                    class,
                }),
                None => Ok(()),
            }
        }

        async fn on_fail_or_cancel(&self, _run_id: RunId, cause: &str) -> SchemaResult<()> {
            self.reverted.lock().push(cause.to_string());
            if self.revert_fails {
                return Err(SchemaChangeError::Reversion {
                    cause: cause.to_string(),
                    error: "stuck".into(),
                });
            }
            Ok(())
        }
    }

    fn registry(resumer: Arc<ScriptedResumer>) -> Arc<JobRegistry> {
        let driver = MemoryStorageDriver::new();
        let retry = RetryConfig {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 2.0,
        };
        Arc::new(JobRegistry::new(driver.open_tree("jobs").unwrap(), resumer, retry))
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let resumer = Arc::new(ScriptedResumer::new(3, None));
        let jobs = registry(resumer.clone());
        let run = RunId::new();
        jobs.create(run, "ALTER TABLE t ADD COLUMN c INT8").unwrap();
        assert_eq!(jobs.run(run).await.unwrap(), JobStatus::Succeeded);
        assert_eq!(jobs.get(run).unwrap().unwrap().retries, 3);
        assert!(resumer.reverted.lock().is_empty());
    }

    #[tokio::test]
    async fn test_validation_failure_reverts() {
        let resumer = Arc::new(ScriptedResumer::new(0, Some(ErrorClass::Validation)));
        let jobs = registry(resumer.clone());
        let run = RunId::new();
        jobs.create(run, "x").unwrap();
        assert_eq!(jobs.run(run).await.unwrap(), JobStatus::Reverted);
        let record = jobs.get(run).unwrap().unwrap();
        assert_eq!(record.error.as_deref(), Some("Injected failure: boom"));
        assert_eq!(resumer.reverted.lock().as_slice(), ["Injected failure: boom"]);
    }

    #[tokio::test]
    async fn test_cancel_and_failed_revert() {
        let mut scripted = ScriptedResumer::new(0, None);
        scripted.revert_fails = true;
        let resumer = Arc::new(scripted);
        let jobs = registry(resumer);
        let run = RunId::new();
        jobs.create(run, "x").unwrap();
        jobs.request_cancel(run).unwrap();
        assert_eq!(jobs.run(run).await.unwrap(), JobStatus::Failed);
        // Terminal jobs ignore further cancels and runs
        jobs.request_cancel(run).unwrap();
        assert_eq!(jobs.run(run).await.unwrap(), JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_adopt_runs_pending_jobs_only() {
        let resumer = Arc::new(ScriptedResumer::new(0, None));
        let jobs = registry(resumer);
        let done = RunId::new();
        let pending = RunId::new();
        jobs.create(done, "done").unwrap();
        jobs.run(done).await.unwrap();
        jobs.create(pending, "pending").unwrap();

        let adopted = jobs.adopt().await.unwrap();
        assert_eq!(adopted.len(), 1);
        assert_eq!(adopted[0].0, pending);
        assert!(matches!(adopted[0].1, Ok(JobStatus::Succeeded)));
        assert_eq!(jobs.list().unwrap().len(), 2);
    }
}
