// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Schema-change executor
//!
//! The executor moves one run through its stages. Every stage is planned
//! again from the checkpointed statuses, executed (long-running operators,
//! then the catalog transaction, then data GC) and checkpointed before the
//! next one is planned. Execution therefore suspends at every stage boundary
//! and can continue in another process from the last checkpoint.
//!
//! Reverting flips every node and drives the same dependency graph back to
//! the initial statuses, entirely in the post-commit phase. A stage that
//! committed without its checkpoint is recorded first, so the flip starts
//! from what the catalog holds.

pub mod mutation;
pub mod state;

pub use mutation::{apply_mutations, catalog_status, stage_applied};
pub use state::ExecutorState;

use crate::backfill::{run_gc, run_long_running, OperatorContext, ProgressStore};
use crate::catalog::CatalogStore;
use crate::checkpoint::{Checkpoint, CheckpointStore, CommittedStage};
use crate::config::{BackfillConfig, ClusterSettings};
use crate::element::TargetState;
use crate::error::{SchemaChangeError, SchemaResult};
use crate::eval::CapabilityProvider;
use crate::events::{EventKind, EventLog};
use crate::jobs::{CancelCheck, Resumer, RunId};
use crate::scheduler::{Phase, Plan, Stage};
use crate::storage::TableDataStore;
use async_trait::async_trait;
use std::sync::Arc;

/// What a testing hook sees of the stage being executed
pub struct StageContext<'a> {
    pub run_id: RunId,
    pub stage: &'a Stage,
    pub reverting: bool,
    /// Stages committed before this one
    pub stages_completed: usize,
}

pub type StageHook = Arc<dyn Fn(&StageContext<'_>) -> SchemaResult<()> + Send + Sync>;

/// Failure injection points
#[derive(Clone, Default)]
pub struct TestingKnobs {
    /// Runs before a stage does anything
    pub before_stage: Option<StageHook>,
    /// Runs after the stage transaction committed, before its checkpoint is
    /// saved; an error here behaves like a crash at that point
    pub after_commit_before_checkpoint: Option<StageHook>,
}

pub struct Executor {
    catalog: Arc<CatalogStore>,
    data: Arc<TableDataStore>,
    progress: Arc<ProgressStore>,
    checkpoints: Arc<CheckpointStore>,
    events: Arc<dyn EventLog>,
    provider: CapabilityProvider,
    backfill: BackfillConfig,
    knobs: TestingKnobs,
}

impl Executor {
    pub fn new(
        catalog: Arc<CatalogStore>,
        data: Arc<TableDataStore>,
        progress: Arc<ProgressStore>,
        checkpoints: Arc<CheckpointStore>,
        events: Arc<dyn EventLog>,
        settings: ClusterSettings,
    ) -> Self {
        Self {
            catalog,
            data,
            progress,
            checkpoints,
            events,
            provider: CapabilityProvider::full(settings),
            backfill: BackfillConfig::default(),
            knobs: TestingKnobs::default(),
        }
    }

    pub fn with_backfill(mut self, backfill: BackfillConfig) -> Self {
        self.backfill = backfill;
        self
    }

    pub fn with_knobs(mut self, knobs: TestingKnobs) -> Self {
        self.knobs = knobs;
        self
    }

    pub fn checkpoint(&self, run_id: RunId) -> SchemaResult<Checkpoint> {
        self.checkpoints
            .get(run_id)?
            .ok_or(SchemaChangeError::RunNotFound(run_id))
    }

    /// Persist the initial checkpoint of a new run
    pub fn start(&self, description: &str, state: TargetState) -> SchemaResult<RunId> {
        // Fail before anything is persisted if the state cannot be planned
        Plan::compute(&state, Phase::Statement)?;
        let run_id = RunId::new();
        self.checkpoints.save(&Checkpoint::new(run_id, description, state))?;
        log::info!("schema change {} started: {}", run_id, description);
        Ok(run_id)
    }

    /// Execute the statement and pre-commit stages of `run_id`
    ///
    /// The remaining post-commit stages are left to [`Executor::resume_run`].
    pub fn submit_phases(&self, run_id: RunId) -> SchemaResult<()> {
        let mut cp = self.checkpoint(run_id)?;
        if cp.executor_state == ExecutorState::Initializing {
            self.transition(&mut cp, ExecutorState::Running)?;
            self.checkpoints.save(&cp)?;
        }
        self.drive(&mut cp, Phase::PreCommit, None)?;
        if cp.phase < Phase::PostCommit {
            cp.phase = Phase::PostCommit;
            self.checkpoints.save(&cp)?;
        }
        Ok(())
    }

    /// Run the remaining stages of `run_id` to completion
    ///
    /// `cancelled` is consulted before every stage while the run can still be
    /// reverted.
    pub fn resume_run(&self, run_id: RunId, cancelled: CancelCheck<'_>) -> SchemaResult<()> {
        let mut cp = self.checkpoint(run_id)?;
        match cp.executor_state {
            ExecutorState::Initializing => {
                self.transition(&mut cp, ExecutorState::Running)?;
                self.checkpoints.save(&cp)?;
            }
            ExecutorState::Running => {}
            ExecutorState::Succeeded => return Ok(()),
            ExecutorState::Reverting | ExecutorState::Reverted | ExecutorState::Failed => {
                return Err(SchemaChangeError::Internal(format!(
                    "schema change {} is {}: {}",
                    run_id,
                    cp.executor_state,
                    cp.cause.as_deref().unwrap_or("no cause recorded")
                )));
            }
        }

        self.drive(&mut cp, Phase::PostCommit, Some(cancelled))?;
        if !cp.state.all_terminal() {
            return Err(SchemaChangeError::Internal(format!(
                "schema change {} ran out of stages before every element was terminal",
                run_id
            )));
        }
        self.transition(&mut cp, ExecutorState::Succeeded)?;
        self.checkpoints.save(&cp)?;
        self.events
            .record(run_id, EventKind::Succeeded, cp.state.keys())?;
        self.clear_progress(run_id);
        Ok(())
    }

    /// Revert `run_id` after a non-retriable failure or a cancellation
    ///
    /// Returns a [`SchemaChangeError::Reversion`] once the run is `FAILED`.
    pub fn revert_run(&self, run_id: RunId, cause: &str) -> SchemaResult<()> {
        let mut cp = self.checkpoint(run_id)?;
        match cp.executor_state {
            ExecutorState::Reverted => return Ok(()),
            ExecutorState::Failed => {
                return Err(SchemaChangeError::Reversion {
                    cause: cp.cause.unwrap_or_else(|| cause.to_string()),
                    error: "the revert already failed".to_string(),
                })
            }
            ExecutorState::Succeeded => {
                return Err(SchemaChangeError::InvalidRequest(format!(
                    "schema change {} already succeeded",
                    run_id
                )))
            }
            ExecutorState::Reverting => {}
            ExecutorState::Initializing | ExecutorState::Running => {
                if let Err(err) = self.reconcile(&mut cp) {
                    if err.is_retriable() {
                        return Err(err);
                    }
                    cp.cause = Some(cause.to_string());
                    return Err(self.fail(&mut cp, err.to_string()));
                }
                if !cp.state.is_revertible() {
                    cp.cause = Some(cause.to_string());
                    return Err(self.fail(
                        &mut cp,
                        "the change can no longer be reverted".to_string(),
                    ));
                }
                if cp.executor_state == ExecutorState::Initializing {
                    self.transition(&mut cp, ExecutorState::Running)?;
                }
                self.transition(&mut cp, ExecutorState::Reverting)?;
                cp.state.flip_for_revert();
                cp.phase = Phase::PostCommit;
                cp.cause = Some(cause.to_string());
                self.checkpoints.save(&cp)?;
                self.events.record(
                    run_id,
                    EventKind::RevertStarted {
                        cause: cause.to_string(),
                    },
                    cp.state.keys(),
                )?;
            }
        }

        let cause = cp.cause.clone().unwrap_or_else(|| cause.to_string());
        match self.drive(&mut cp, Phase::PostCommit, None) {
            Ok(()) if cp.state.all_terminal() => {}
            Ok(()) => {
                return Err(self.fail(&mut cp, "revert ran out of stages".to_string()));
            }
            Err(err) if err.is_retriable() => return Err(err),
            Err(err) => return Err(self.fail(&mut cp, err.to_string())),
        }
        self.transition(&mut cp, ExecutorState::Reverted)?;
        self.checkpoints.save(&cp)?;
        self.events
            .record(run_id, EventKind::Reverted { cause }, cp.state.keys())?;
        self.clear_progress(run_id);
        Ok(())
    }

    fn transition(&self, cp: &mut Checkpoint, next: ExecutorState) -> SchemaResult<()> {
        if !cp.executor_state.can_transition_to(next) {
            return Err(SchemaChangeError::Internal(format!(
                "schema change {} cannot go from {} to {}",
                cp.run_id, cp.executor_state, next
            )));
        }
        log::debug!("schema change {}: {} -> {}", cp.run_id, cp.executor_state, next);
        cp.executor_state = next;
        Ok(())
    }

    /// Mark the run `FAILED` and build the error reported for it
    fn fail(&self, cp: &mut Checkpoint, error: String) -> SchemaChangeError {
        let cause = cp.cause.clone().unwrap_or_default();
        log::error!("schema change {} failed: {}", cp.run_id, error);
        if let Err(e) = self.transition(cp, ExecutorState::Failed) {
            log::error!("{}", e);
            cp.executor_state = ExecutorState::Failed;
        }
        if let Err(e) = self.checkpoints.save(cp) {
            log::error!("schema change {}: cannot persist FAILED: {}", cp.run_id, e);
        }
        if let Err(e) = self.events.record(
            cp.run_id,
            EventKind::Failed {
                error: error.clone(),
            },
            cp.state.keys(),
        ) {
            log::error!("schema change {}: cannot record failure: {}", cp.run_id, e);
        }
        SchemaChangeError::Reversion { cause, error }
    }

    /// Record a stage that committed after the last checkpoint was saved
    fn reconcile(&self, cp: &mut Checkpoint) -> SchemaResult<()> {
        self.flush_unrecorded(cp)?;
        let plan = Plan::compute(&cp.state, cp.phase)?;
        let Some(stage) = plan.stages.first() else {
            return Ok(());
        };
        let snapshot = self.catalog.snapshot()?;
        if !stage_applied(&snapshot, cp.run_id, stage) {
            return Ok(());
        }
        log::info!(
            "schema change {}: stage {} committed without a checkpoint",
            cp.run_id,
            cp.stages_completed + 1
        );
        for gc in stage.gc_ops() {
            run_gc(gc, &self.data)?;
        }
        self.checkpoint_stage(cp, stage, false)
    }

    /// Write the event saved with the checkpoint unless the log already has it
    fn flush_unrecorded(&self, cp: &mut Checkpoint) -> SchemaResult<()> {
        let Some(committed) = cp.unrecorded.clone() else {
            return Ok(());
        };
        let event = committed.event();
        if !self.events.events(cp.run_id)?.iter().any(|e| e.kind == event) {
            self.events.record(cp.run_id, event, committed.elements)?;
        }
        cp.unrecorded = None;
        Ok(())
    }

    /// Save `stage` as committed, with its event
    ///
    /// The stage is done once the checkpoint is saved. An event that cannot
    /// be written stays in the checkpoint until the next flush.
    fn checkpoint_stage(&self, cp: &mut Checkpoint, stage: &Stage, reverting: bool) -> SchemaResult<()> {
        stage.apply(&mut cp.state);
        cp.phase = stage.phase.next();
        cp.stages_completed += 1;
        cp.unrecorded = Some(CommittedStage {
            stage: cp.stages_completed - 1,
            phase: stage.phase,
            reverting,
            elements: stage.keys(),
        });
        self.checkpoints.save(cp)?;

        if let Some(committed) = cp.unrecorded.take() {
            if let Err(e) = self
                .events
                .record(cp.run_id, committed.event(), committed.elements.clone())
            {
                log::warn!("schema change {}: stage event deferred: {}", cp.run_id, e);
                cp.unrecorded = Some(committed);
            }
        }
        Ok(())
    }

    fn clear_progress(&self, run_id: RunId) {
        if let Err(e) = self.progress.clear_run(run_id) {
            log::warn!("schema change {}: cannot clear backfill progress: {}", run_id, e);
        }
    }

    /// Execute stages until none is left or the next one belongs to a phase
    /// after `max`
    fn drive(&self, cp: &mut Checkpoint, max: Phase, cancelled: Option<CancelCheck<'_>>) -> SchemaResult<()> {
        let reverting = cp.executor_state == ExecutorState::Reverting;
        loop {
            self.flush_unrecorded(cp)?;
            let plan = Plan::compute(&cp.state, cp.phase)?;
            let Some(stage) = plan.stages.into_iter().next() else {
                return Ok(());
            };
            if stage.phase > max {
                return Ok(());
            }
            if let Some(cancelled) = cancelled {
                if !reverting && cp.state.is_revertible() && cancelled() {
                    log::info!("schema change {}: cancellation observed", cp.run_id);
                    return Err(SchemaChangeError::Cancelled(cp.run_id));
                }
            }
            if let Err(err) = self.execute_stage(cp, &stage, reverting) {
                if !err.is_retriable() {
                    self.events.record(
                        cp.run_id,
                        EventKind::StageFailed {
                            error: err.to_string(),
                            class: err.class().to_string(),
                        },
                        stage.keys(),
                    )?;
                }
                return Err(err);
            }
        }
    }

    fn execute_stage(&self, cp: &mut Checkpoint, stage: &Stage, reverting: bool) -> SchemaResult<()> {
        let run_id = cp.run_id;
        let hook_ctx = StageContext {
            run_id,
            stage,
            reverting,
            stages_completed: cp.stages_completed,
        };
        if let Some(hook) = &self.knobs.before_stage {
            hook(&hook_ctx)?;
        }

        let snapshot = self.catalog.snapshot()?;
        if stage_applied(&snapshot, run_id, stage) {
            log::info!(
                "schema change {}: stage {} already applied, skipping",
                run_id,
                cp.stages_completed + 1
            );
        } else {
            let ctx = OperatorContext {
                run_id,
                catalog: &snapshot,
                data: &self.data,
                progress: &self.progress,
                provider: &self.provider,
                batch_size: self.backfill.batch_size,
            };
            for op in stage.long_running_ops() {
                log::debug!("schema change {}: {}", run_id, op);
                run_long_running(op, &ctx)?;
            }
            let mut txn = self.catalog.begin();
            apply_mutations(&mut txn, run_id, stage)?;
            txn.commit()?;
        }
        for gc in stage.gc_ops() {
            run_gc(gc, &self.data)?;
        }

        if let Some(hook) = &self.knobs.after_commit_before_checkpoint {
            hook(&hook_ctx)?;
        }

        self.checkpoint_stage(cp, stage, reverting)
    }
}

#[async_trait]
impl Resumer for Executor {
    async fn resume(&self, run_id: RunId, cancelled: CancelCheck<'_>) -> SchemaResult<()> {
        self.resume_run(run_id, cancelled)
    }

    async fn on_fail_or_cancel(&self, run_id: RunId, cause: &str) -> SchemaResult<()> {
        self.revert_run(run_id, cause)
    }
}
