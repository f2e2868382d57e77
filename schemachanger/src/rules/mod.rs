// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Dependency rule engine
//!
//! Rules are typed functions registered per ordered pair of element kinds.
//! Evaluating a [`RuleRegistry`] over a target state calls the rules of every
//! ordered pair of nodes and collects the resulting ordering constraints into
//! a [`DepGraph`] over `(node, status)` vertices. Each node also contributes
//! the chain of its own path, so a cycle through a node's path is caught the
//! same way as a cycle between rules.

pub mod dep_rules;
pub mod error;
pub mod registry;

pub use error::{RuleError, RuleResult};
pub use registry::{NamedRule, RuleFn, RuleRegistry, STANDARD_RULES};

use crate::element::{Status, TargetState};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// How strictly the source vertex must precede the destination vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// The source status is reached in an earlier stage
    Precedes,
    /// The source status is reached in the same stage or an earlier one
    SameStageOrBefore,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Precedes => write!(f, "precedes"),
            EdgeKind::SameStageOrBefore => write!(f, "same stage or before"),
        }
    }
}

/// Constraint a rule emits from its first node to its second node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleEdge {
    pub from_status: Status,
    pub to_status: Status,
    pub kind: EdgeKind,
}

impl RuleEdge {
    pub fn precedes(from_status: Status, to_status: Status) -> Self {
        Self {
            from_status,
            to_status,
            kind: EdgeKind::Precedes,
        }
    }

    pub fn same_stage_or_before(from_status: Status, to_status: Status) -> Self {
        Self {
            from_status,
            to_status,
            kind: EdgeKind::SameStageOrBefore,
        }
    }
}

/// A constraint between two nodes of a target state
///
/// Node `from` must reach `from_status` no later than (or, for
/// [`EdgeKind::Precedes`], strictly before) node `to` reaches `to_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepEdge {
    pub from: usize,
    pub from_status: Status,
    pub to: usize,
    pub to_status: Status,
    pub kind: EdgeKind,
    pub rule: &'static str,
}

/// Dependency graph over `(node index, status)` vertices
#[derive(Debug)]
pub struct DepGraph {
    graph: DiGraph<(usize, Status), EdgeKind>,
    edges: Vec<DepEdge>,
    incoming: Vec<Vec<usize>>,
}

impl DepGraph {
    /// Assemble the graph and reject cycles
    pub(crate) fn build(state: &TargetState, edges: Vec<DepEdge>) -> RuleResult<Self> {
        let mut graph = DiGraph::new();
        let mut vertices: HashMap<(usize, Status), NodeIndex> = HashMap::new();
        for (i, node) in state.nodes.iter().enumerate() {
            let mut previous: Option<NodeIndex> = None;
            for status in node.path() {
                let vertex = graph.add_node((i, *status));
                vertices.insert((i, *status), vertex);
                if let Some(prev) = previous {
                    graph.add_edge(prev, vertex, EdgeKind::Precedes);
                }
                previous = Some(vertex);
            }
        }

        let mut incoming = vec![Vec::new(); state.len()];
        for (e, edge) in edges.iter().enumerate() {
            let source = vertices.get(&(edge.from, edge.from_status));
            let target = vertices.get(&(edge.to, edge.to_status));
            if let (Some(source), Some(target)) = (source, target) {
                graph.add_edge(*source, *target, edge.kind);
                incoming[edge.to].push(e);
            }
        }

        for component in tarjan_scc(&graph) {
            if component.len() < 2 {
                continue;
            }
            let describe = |v: NodeIndex| {
                let (i, status) = graph[v];
                format!("{} at {}", state.nodes[i].key(), status)
            };
            let first = component[0];
            let (first_node, _) = graph[first];
            let second = component
                .iter()
                .copied()
                .find(|v| graph[*v].0 != first_node)
                .unwrap_or(component[1]);
            log::warn!("dependency cycle across {} vertices", component.len());
            return Err(RuleError::Cycle {
                first: describe(first),
                second: describe(second),
                size: component.len(),
            });
        }

        Ok(Self {
            graph,
            edges,
            incoming,
        })
    }

    /// Every rule edge whose statuses lie on both nodes' paths
    pub fn edges(&self) -> impl Iterator<Item = &DepEdge> {
        self.incoming.iter().flatten().map(move |e| &self.edges[*e])
    }

    /// Rule edges constraining `node`
    pub fn incoming(&self, node: usize) -> impl Iterator<Item = &DepEdge> {
        self.incoming
            .get(node)
            .into_iter()
            .flatten()
            .map(move |e| &self.edges[*e])
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Path and rule edges together
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
