// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI module for scctl
//!
//! Submits statements read from JSON files, inspects and cancels running
//! schema changes, and resumes the ones a previous process left behind.

pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{Cli, Commands};
pub use handlers::{
    handle_apply, handle_cancel, handle_events, handle_explain, handle_insert, handle_resume,
    handle_status, StoreArgs,
};
