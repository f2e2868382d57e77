// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! scctl entry point

use clap::Parser;
use colored::Colorize;

mod cli;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        log::LevelFilter::Debug
    } else if let Some(level) = cli.log_level {
        level.to_level_filter()
    } else {
        // RUST_LOG can still raise it
        log::LevelFilter::Warn
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    let store = cli::StoreArgs {
        path: cli.path,
        config: cli.config,
    };

    match cli.command {
        Commands::Version => {
            println!("{} {}", "scctl".bold().green(), schemachanger::VERSION);
            println!("Declarative online schema changes");
            Ok(())
        }
        Commands::Apply {
            statement,
            no_wait,
            format,
        } => cli::handle_apply(&store, &statement, no_wait, format),
        Commands::Explain { statement } => cli::handle_explain(&store, &statement),
        Commands::Insert { table, row } => cli::handle_insert(&store, &table, &row),
        Commands::Status { run, format } => cli::handle_status(&store, run.as_deref(), format),
        Commands::Events { run, format } => cli::handle_events(&store, &run, format),
        Commands::Cancel { run } => cli::handle_cancel(&store, &run),
        Commands::Resume => cli::handle_resume(&store),
    }
}
