// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! schemachanger - declarative online schema changes
//!
//! A DDL statement is turned into a set of element targets, the targets into
//! a dependency graph, and the graph into an ordered sequence of stages. Each
//! stage commits in its own catalog transaction; long-running backfills and
//! validations run between stages and are resumable on their own.
//!
//! # Pipeline
//!
//! - [`builder`]: statement + catalog snapshot -> [`element::TargetState`]
//! - [`rules`]: target state -> dependency graph
//! - [`scheduler`]: dependency graph + current statuses -> [`scheduler::Plan`]
//! - [`executor`]: runs stages, checkpoints after each, reverts on failure
//! - [`jobs`]: retries, cancellation and adoption of unfinished runs
//!
//! # Usage
//!
//! ```no_run
//! use schemachanger::{SchemaChanger, Statement};
//!
//! # async fn run(stmt: Statement) -> schemachanger::SchemaResult<()> {
//! let changer = SchemaChanger::in_memory()?;
//! println!("{}", changer.explain(&stmt)?);
//! if let Some(status) = changer.execute(&stmt).await? {
//!     println!("{} -> {}", status.description, status.job_status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backfill;
pub mod builder;
pub mod catalog;
pub mod checkpoint;
pub mod config;
pub mod coordinator;
pub mod element;
pub mod error;
pub mod eval;
pub mod events;
pub mod executor;
pub mod jobs;
pub mod rules;
pub mod scheduler;
pub mod storage;

pub use builder::Statement;
pub use config::{BackfillConfig, ClusterSettings, RetryConfig, SchemaChangerConfig};
pub use coordinator::SchemaChanger;
pub use error::{ErrorClass, SchemaChangeError, SchemaResult};
pub use events::{Event, EventKind};
pub use executor::{ExecutorState, StageContext, TestingKnobs};
pub use jobs::{JobStatus, JobStatusRow, RunId};
pub use scheduler::{Phase, Plan};

/// schemachanger version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// schemachanger crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
