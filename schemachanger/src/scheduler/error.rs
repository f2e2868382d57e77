// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Scheduling errors

use crate::rules::RuleError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("No transition can run; stuck: {}", stuck.join(", "))]
    Unschedulable { stuck: Vec<String> },
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
