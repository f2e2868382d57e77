// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Command-line arguments

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "scctl")]
#[command(version, about = "Operator console for declarative schema changes", long_about = None)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true, default_value = "./scdata")]
    pub path: PathBuf,

    /// JSON config file; overrides --path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<log::Level>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the statement in a JSON file
    Apply {
        /// Statement file
        statement: PathBuf,

        /// Return after the synchronous phases, leaving the job pending
        #[arg(long)]
        no_wait: bool,

        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Show the stages a statement would run
    Explain {
        /// Statement file
        statement: PathBuf,
    },

    /// Insert one row, given as a JSON object of column values
    Insert {
        table: String,

        /// e.g. '{"id": 1, "name": "ada"}'
        row: String,
    },

    /// Show one schema change, or all of them
    Status {
        run: Option<String>,

        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Show the event log of a schema change
    Events {
        run: String,

        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Cancel a running schema change
    Cancel { run: String },

    /// Resume every unfinished schema change
    Resume,

    /// Show version information
    Version,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}
