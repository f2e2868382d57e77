// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Rule registry keyed by ordered element-kind pairs

use super::error::{RuleError, RuleResult};
use super::{dep_rules, DepEdge, DepGraph, RuleEdge};
use crate::element::{ElementKind, Node, TargetState};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// A rule: ordering constraints from the first node to the second
pub type RuleFn = fn(&Node, &Node) -> Vec<RuleEdge>;

#[derive(Clone, Copy)]
pub struct NamedRule {
    pub name: &'static str,
    pub apply: RuleFn,
}

impl std::fmt::Debug for NamedRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// The rule set shipped with the crate
pub static STANDARD_RULES: Lazy<RuleRegistry> = Lazy::new(dep_rules::standard);

#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: HashMap<(ElementKind, ElementKind), Vec<NamedRule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, from: ElementKind, to: ElementKind, name: &'static str, apply: RuleFn) {
        self.rules
            .entry((from, to))
            .or_default()
            .push(NamedRule { name, apply });
    }

    /// Record that nodes of `from` never constrain nodes of `to`
    pub fn unconstrained(&mut self, from: ElementKind, to: ElementKind) {
        self.rules.entry((from, to)).or_default();
    }

    pub fn rules_for(&self, from: ElementKind, to: ElementKind) -> Option<&[NamedRule]> {
        self.rules.get(&(from, to)).map(Vec::as_slice)
    }

    /// Kind pairs with no entry at all
    pub fn missing_pairs(&self) -> Vec<(ElementKind, ElementKind)> {
        ElementKind::ALL
            .iter()
            .flat_map(|a| ElementKind::ALL.iter().map(move |b| (*a, *b)))
            .filter(|pair| !self.rules.contains_key(pair))
            .collect()
    }

    /// Apply every rule to every ordered pair of distinct nodes
    pub fn evaluate(&self, state: &TargetState) -> RuleResult<DepGraph> {
        let mut edges = Vec::new();
        for (i, a) in state.nodes.iter().enumerate() {
            for (j, b) in state.nodes.iter().enumerate() {
                if i == j {
                    continue;
                }
                let rules = self
                    .rules_for(a.kind(), b.kind())
                    .ok_or(RuleError::MissingRule {
                        from: a.kind(),
                        to: b.kind(),
                    })?;
                for rule in rules {
                    for edge in (rule.apply)(a, b) {
                        edges.push(DepEdge {
                            from: i,
                            from_status: edge.from_status,
                            to: j,
                            to_status: edge.to_status,
                            kind: edge.kind,
                            rule: rule.name,
                        });
                    }
                }
            }
        }
        log::debug!(
            "evaluated rules over {} node(s): {} edge(s)",
            state.len(),
            edges.len()
        );
        DepGraph::build(state, edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Status, TableElement, Target};

    fn tables() -> TargetState {
        let mut state = TargetState::new();
        for id in [100, 101] {
            state.push(Target::add(crate::element::Element::Table(TableElement {
                table_id: id,
                name: format!("t{}", id),
            })));
        }
        state
    }

    #[test]
    fn test_missing_rule_is_reported() {
        let registry = RuleRegistry::new();
        assert_eq!(
            registry.evaluate(&tables()).unwrap_err(),
            RuleError::MissingRule {
                from: ElementKind::Table,
                to: ElementKind::Table
            }
        );
        assert_eq!(registry.missing_pairs().len(), 36);
    }

    #[test]
    fn test_registered_rule_produces_edges() {
        fn first_table_first(a: &Node, b: &Node) -> Vec<RuleEdge> {
            if a.key().table_id < b.key().table_id {
                vec![RuleEdge::precedes(Status::Public, Status::Public)]
            } else {
                Vec::new()
            }
        }
        let mut registry = RuleRegistry::new();
        registry.register(ElementKind::Table, ElementKind::Table, "first table first", first_table_first);
        let graph = registry.evaluate(&tables()).unwrap();
        let edges: Vec<_> = graph.edges().collect();
        assert_eq!(edges.len(), 1);
        assert_eq!((edges[0].from, edges[0].to), (0, 1));
        assert_eq!(edges[0].rule, "first table first");
    }

    #[test]
    fn test_standard_registry_is_total() {
        assert!(STANDARD_RULES.missing_pairs().is_empty());
    }
}
