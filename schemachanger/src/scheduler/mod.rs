// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Stage planning
//!
//! A [`Plan`] is derived from the target state alone: the dependency graph
//! comes from the rules, and each stage moves every node that may move by at
//! most one step along its path. Stages are computed by simulating the plan
//! from the current statuses, so resuming from a checkpoint yields the same
//! remaining stages as an uninterrupted run.
//!
//! Within a stage, nodes are considered in index order and the selection is
//! repeated until it stops growing, which makes the result independent of
//! anything but the inputs.

pub mod error;
pub mod ops;
pub mod policy;

pub use error::{ScheduleError, ScheduleResult};
pub use ops::{ops_for, BackfillOp, GcOp, MutationOp, Op, ValidationOp};
pub use policy::{earliest_phase, Phase};

use crate::element::{ElementKey, Node, Status, TargetState};
use crate::rules::{DepEdge, DepGraph, EdgeKind, RuleRegistry, STANDARD_RULES};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// One node moving one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub node: usize,
    pub key: ElementKey,
    pub from: Status,
    pub to: Status,
}

/// Transitions committed together in one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub ordinal: usize,
    pub phase: Phase,
    pub transitions: Vec<Transition>,
    pub ops: Vec<Op>,
    /// Whether the change can still be reverted once this stage committed
    pub revertible: bool,
}

impl Stage {
    pub fn keys(&self) -> Vec<ElementKey> {
        self.transitions.iter().map(|t| t.key).collect()
    }

    /// Record the stage's transitions in `state`
    pub fn apply(&self, state: &mut TargetState) {
        for transition in &self.transitions {
            if let Some(node) = state.nodes.get_mut(transition.node) {
                node.current = transition.to;
            }
        }
    }

    pub fn mutations(&self) -> impl Iterator<Item = &MutationOp> {
        self.ops.iter().filter_map(|op| match op {
            Op::Mutation(m) => Some(m),
            _ => None,
        })
    }

    pub fn long_running_ops(&self) -> impl Iterator<Item = &Op> {
        self.ops.iter().filter(|op| op.is_long_running())
    }

    pub fn gc_ops(&self) -> impl Iterator<Item = &GcOp> {
        self.ops.iter().filter_map(|op| match op {
            Op::Gc(gc) => Some(gc),
            _ => None,
        })
    }
}

/// The remaining stages of a schema change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub stages: Vec<Stage>,
}

impl Plan {
    /// Plan with the standard rules, starting no earlier than `start`
    pub fn compute(state: &TargetState, start: Phase) -> ScheduleResult<Plan> {
        Self::compute_with(&STANDARD_RULES, state, start)
    }

    pub fn compute_with(registry: &RuleRegistry, state: &TargetState, start: Phase) -> ScheduleResult<Plan> {
        let graph = registry.evaluate(state)?;
        let mut sim = state.clone();
        let mut stages = Vec::new();

        for phase in [Phase::Statement, Phase::PreCommit] {
            if phase < start || sim.all_terminal() {
                continue;
            }
            let moves = next_moves(&sim, &graph, phase);
            if !moves.is_empty() {
                stages.push(make_stage(&mut sim, stages.len(), phase, moves));
            }
        }

        while !sim.all_terminal() {
            let moves = next_moves(&sim, &graph, Phase::PostCommit);
            if moves.is_empty() {
                let stuck = sim
                    .nodes
                    .iter()
                    .filter(|n| !n.is_terminal())
                    .map(|n| n.to_string())
                    .collect();
                return Err(ScheduleError::Unschedulable { stuck });
            }
            stages.push(make_stage(&mut sim, stages.len(), Phase::PostCommit, moves));
        }

        log::debug!("planned {} stage(s) for {} node(s)", stages.len(), state.len());
        Ok(Plan { stages })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stages that run in `phase`
    pub fn stages_in(&self, phase: Phase) -> impl Iterator<Item = &Stage> {
        self.stages.iter().filter(move |s| s.phase == phase)
    }

    /// Render the plan for EXPLAIN
    pub fn explain(&self, state: &TargetState) -> String {
        let mut out = String::new();
        if self.stages.is_empty() {
            out.push_str("no stages\n");
            return out;
        }
        let total = self.stages.len();
        for stage in &self.stages {
            let _ = writeln!(
                out,
                "Stage {} of {} in {} phase{}",
                stage.ordinal + 1,
                total,
                stage.phase,
                if stage.revertible { "" } else { " (not revertible)" }
            );
            for t in &stage.transitions {
                let label = state
                    .nodes
                    .get(t.node)
                    .map(|n| n.element().to_string())
                    .unwrap_or_else(|| t.key.to_string());
                let _ = writeln!(out, "  {}: {} -> {}", label, t.from, t.to);
            }
            for op in &stage.ops {
                let _ = writeln!(out, "    * {}", op);
            }
        }
        out
    }
}

/// Statuses each node moves to in the next stage of `phase`
///
/// Returns `(node index, next status)` pairs in node order.
pub fn next_moves(state: &TargetState, graph: &DepGraph, phase: Phase) -> Vec<(usize, Status)> {
    let mut scheduled: Vec<Option<Status>> = vec![None; state.len()];
    loop {
        let mut progressed = false;
        for (i, node) in state.nodes.iter().enumerate() {
            if scheduled[i].is_some() {
                continue;
            }
            let next = match node.next_status() {
                Some(next) => next,
                None => continue,
            };
            if earliest_phase(node.kind(), node.direction(), next, node.target.direct) > phase {
                continue;
            }
            if graph
                .incoming(i)
                .all(|edge| edge_satisfied(state, &scheduled, edge, node, next))
            {
                scheduled[i] = Some(next);
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    scheduled
        .into_iter()
        .enumerate()
        .filter_map(|(i, s)| s.map(|s| (i, s)))
        .collect()
}

fn edge_satisfied(
    state: &TargetState,
    scheduled: &[Option<Status>],
    edge: &DepEdge,
    node: &Node,
    next: Status,
) -> bool {
    let direction = node.direction();
    let crosses =
        direction.reached(next, edge.to_status) && !direction.reached(node.current, edge.to_status);
    if !crosses {
        return true;
    }
    let source = &state.nodes[edge.from];
    if source.reached(edge.from_status) {
        return true;
    }
    match edge.kind {
        EdgeKind::Precedes => false,
        EdgeKind::SameStageOrBefore => scheduled[edge.from]
            .map(|s| source.direction().reached(s, edge.from_status))
            .unwrap_or(false),
    }
}

fn make_stage(sim: &mut TargetState, ordinal: usize, phase: Phase, moves: Vec<(usize, Status)>) -> Stage {
    let mut transitions = Vec::with_capacity(moves.len());
    let mut ops = Vec::new();
    for (i, to) in moves {
        let node = &sim.nodes[i];
        ops.extend(ops_for(node, node.current, to));
        transitions.push(Transition {
            node: i,
            key: node.key(),
            from: node.current,
            to,
        });
    }
    let mut stage = Stage {
        ordinal,
        phase,
        transitions,
        ops,
        revertible: true,
    };
    stage.apply(sim);
    stage.revertible = sim.is_revertible();
    stage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{self, test_support, AlterTable, AlterTableCommand, ColumnDef, Statement};
    use crate::config::ClusterSettings;
    use crate::element::{Direction, ElementKind};
    use crate::eval::{ColumnType, Datum, Expr};

    fn build(stmt: Statement) -> TargetState {
        builder::build(&stmt, &test_support::shop(), &ClusterSettings::default()).unwrap()
    }

    fn add_qty() -> Statement {
        Statement::AlterTable(AlterTable {
            table: "orders".into(),
            commands: vec![AlterTableCommand::AddColumn {
                column: ColumnDef::new("qty", ColumnType::Int8).with_default(Expr::literal(Datum::Int(1))),
                if_not_exists: false,
            }],
        })
    }

    #[test]
    fn test_add_column_stage_sequence() {
        let state = build(add_qty());
        let plan = Plan::compute(&state, Phase::Statement).unwrap();
        let steps: Vec<(Phase, Status)> = plan
            .stages
            .iter()
            .map(|s| (s.phase, s.transitions[0].to))
            .collect();
        assert_eq!(
            steps,
            vec![
                (Phase::Statement, Status::DeleteOnly),
                (Phase::PreCommit, Status::WriteOnly),
                (Phase::PostCommit, Status::Backfilling),
                (Phase::PostCommit, Status::Backfilled),
                (Phase::PostCommit, Status::Public),
            ]
        );
        assert!(plan.stages[3]
            .ops
            .iter()
            .any(|op| matches!(op, Op::Backfill(BackfillOp::ColumnDefault { .. }))));
        assert!(plan.stages.iter().all(|s| s.revertible));
    }

    #[test]
    fn test_resume_from_post_commit_skips_earlier_phases() {
        let mut state = build(add_qty());
        state.nodes[0].current = Status::WriteOnly;
        let plan = Plan::compute(&state, Phase::PostCommit).unwrap();
        assert_eq!(plan.len(), 3);
        assert!(plan.stages.iter().all(|s| s.phase == Phase::PostCommit));
    }

    #[test]
    fn test_drop_table_goes_offline_first() {
        let state = build(Statement::DropTable(builder::DropTable {
            name: "orders".into(),
            if_exists: false,
            cascade: false,
        }));
        let plan = Plan::compute(&state, Phase::Statement).unwrap();
        let first = &plan.stages[0];
        assert_eq!(first.phase, Phase::Statement);
        assert_eq!(first.transitions.len(), 1);
        assert_eq!(first.transitions[0].key.kind, ElementKind::Table);
        assert_eq!(first.transitions[0].to, Status::DeleteOnly);
        let last = plan.stages.last().unwrap();
        assert!(!last.revertible);
        assert!(last
            .ops
            .iter()
            .any(|op| matches!(op, Op::Gc(GcOp::TableData { table_id: 101 }))));
    }

    #[test]
    fn test_drop_index_cascade_orders_foreign_key_first() {
        let state = build(Statement::DropIndex(builder::DropIndex {
            table: "customers".into(),
            name: "customers_email_key".into(),
            if_exists: false,
            cascade: true,
        }));
        let plan = Plan::compute(&state, Phase::Statement).unwrap();
        let position = |kind: ElementKind, to: Status| {
            plan.stages
                .iter()
                .position(|s| s.transitions.iter().any(|t| t.key.kind == kind && t.to == to))
                .unwrap()
        };
        assert!(
            position(ElementKind::ForeignKey, Status::Absent)
                <= position(ElementKind::SecondaryIndex, Status::WriteOnly)
        );
    }

    #[test]
    fn test_revert_plan_returns_to_initial() {
        let mut state = build(add_qty());
        let plan = Plan::compute(&state, Phase::Statement).unwrap();
        for stage in &plan.stages[..3] {
            stage.apply(&mut state);
        }
        state.flip_for_revert();
        let revert = Plan::compute(&state, Phase::PostCommit).unwrap();
        for stage in &revert.stages {
            stage.apply(&mut state);
        }
        let node = &state.nodes[0];
        assert_eq!(node.direction(), Direction::Drop);
        assert_eq!(node.current, node.initial);
        assert!(revert
            .stages
            .last()
            .unwrap()
            .ops
            .iter()
            .any(|op| matches!(op, Op::Gc(GcOp::ColumnData { .. }))));
    }

    #[test]
    fn test_explain_lists_every_stage() {
        let state = build(add_qty());
        let plan = Plan::compute(&state, Phase::Statement).unwrap();
        let text = plan.explain(&state);
        assert!(text.starts_with("Stage 1 of 5 in STATEMENT phase"));
        assert!(text.contains("ABSENT -> DELETE_ONLY"));
        assert!(text.contains("backfill default of column#101.5"));
    }
}
