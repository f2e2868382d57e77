// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Executor run states

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of one schema-change run
///
/// ```text
/// INITIALIZING -> RUNNING -> SUCCEEDED
///                    |
///                    v
///                REVERTING -> REVERTED
///                    |
///                    v
///                  FAILED
/// ```
///
/// A run that fails once it can no longer be reverted goes straight from
/// RUNNING to FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutorState {
    Initializing,
    Running,
    Reverting,
    Succeeded,
    Failed,
    Reverted,
}

impl ExecutorState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutorState::Succeeded | ExecutorState::Failed | ExecutorState::Reverted
        )
    }

    pub fn can_transition_to(self, next: ExecutorState) -> bool {
        use ExecutorState::*;
        matches!(
            (self, next),
            (Initializing, Running)
                | (Initializing, Reverting)
                | (Running, Succeeded)
                | (Running, Reverting)
                | (Running, Failed)
                | (Reverting, Reverted)
                | (Reverting, Failed)
        )
    }
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutorState::Initializing => "INITIALIZING",
            ExecutorState::Running => "RUNNING",
            ExecutorState::Reverting => "REVERTING",
            ExecutorState::Succeeded => "SUCCEEDED",
            ExecutorState::Failed => "FAILED",
            ExecutorState::Reverted => "REVERTED",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use ExecutorState::*;
        assert!(Initializing.can_transition_to(Running));
        assert!(Running.can_transition_to(Reverting));
        assert!(Reverting.can_transition_to(Failed));
        assert!(Running.can_transition_to(Failed));
        assert!(!Reverting.can_transition_to(Running));
        assert!(!Succeeded.can_transition_to(Reverting));
        assert!(!Reverted.can_transition_to(Failed));
        for state in [Succeeded, Failed, Reverted] {
            assert!(state.is_terminal());
        }
    }
}
