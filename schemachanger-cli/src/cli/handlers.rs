// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Command handlers

use super::commands::OutputFormat;
use super::output::ResultFormatter;
use colored::*;
use schemachanger::eval::Datum;
use schemachanger::{RunId, SchemaChanger, SchemaChangerConfig, Statement};
use std::error::Error;
use std::path::{Path, PathBuf};

type CliResult = Result<(), Box<dyn Error>>;

/// Where the store lives
pub struct StoreArgs {
    pub path: PathBuf,
    pub config: Option<PathBuf>,
}

fn open(store: &StoreArgs) -> Result<SchemaChanger, Box<dyn Error>> {
    let config = match &store.config {
        Some(file) => SchemaChangerConfig::from_json_file(file)?,
        None => SchemaChangerConfig::with_path(&store.path),
    };
    log::debug!("opening store at {}", config.path.display());
    Ok(SchemaChanger::open(config)?)
}

fn read_statement(path: &Path) -> Result<Statement, Box<dyn Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let stmt = serde_json::from_str(&text)
        .map_err(|e| format!("{} is not a valid statement: {}", path.display(), e))?;
    Ok(stmt)
}

fn json_to_datum(column: &str, value: serde_json::Value) -> Result<Datum, String> {
    match value {
        serde_json::Value::Null => Ok(Datum::Null),
        serde_json::Value::Bool(b) => Ok(Datum::Bool(b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Datum::Int)
            .ok_or_else(|| format!("column {}: {} is not an INT8", column, n)),
        serde_json::Value::String(s) => Ok(Datum::String(s)),
        other => Err(format!("column {}: unsupported value {}", column, other)),
    }
}

fn parse_row(text: &str) -> Result<Vec<(String, Datum)>, Box<dyn Error>> {
    let serde_json::Value::Object(map) = serde_json::from_str::<serde_json::Value>(text)? else {
        return Err("row must be a JSON object".into());
    };
    let mut values = Vec::with_capacity(map.len());
    for (column, value) in map {
        let datum = json_to_datum(&column, value)?;
        values.push((column, datum));
    }
    Ok(values)
}

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread().enable_all().build()
}

pub fn handle_apply(store: &StoreArgs, statement: &Path, no_wait: bool, format: OutputFormat) -> CliResult {
    let stmt = read_statement(statement)?;
    let changer = open(store)?;

    if no_wait {
        match changer.submit(&stmt)? {
            Some(run_id) => println!("{} {}", "Submitted".bold().green(), run_id),
            None => println!("{}", "Nothing to do".yellow()),
        }
        changer.flush()?;
        return Ok(());
    }

    let outcome = runtime()?.block_on(changer.execute(&stmt))?;
    changer.flush()?;
    match outcome {
        Some(row) => print!("{}", ResultFormatter::jobs(&[row], format)),
        None => println!("{}", "Nothing to do".yellow()),
    }
    Ok(())
}

pub fn handle_explain(store: &StoreArgs, statement: &Path) -> CliResult {
    let stmt = read_statement(statement)?;
    let changer = open(store)?;
    print!("{}", ResultFormatter::explain(&changer.explain(&stmt)?));
    Ok(())
}

pub fn handle_insert(store: &StoreArgs, table: &str, row: &str) -> CliResult {
    let values = parse_row(row)?;
    let changer = open(store)?;
    changer.insert_row(table, &values)?;
    changer.flush()?;
    println!("{}", format!("Inserted 1 row into {}", table).green());
    Ok(())
}

pub fn handle_status(store: &StoreArgs, run: Option<&str>, format: OutputFormat) -> CliResult {
    let changer = open(store)?;
    let rows = match run {
        Some(run) => vec![changer.status(run.parse::<RunId>()?)?],
        None => changer.list_jobs()?,
    };
    print!("{}", ResultFormatter::jobs(&rows, format));
    Ok(())
}

pub fn handle_events(store: &StoreArgs, run: &str, format: OutputFormat) -> CliResult {
    let changer = open(store)?;
    let events = changer.events(run.parse::<RunId>()?)?;
    print!("{}", ResultFormatter::events(&events, format));
    Ok(())
}

pub fn handle_cancel(store: &StoreArgs, run: &str) -> CliResult {
    let changer = open(store)?;
    let run_id = run.parse::<RunId>()?;
    changer.cancel(run_id)?;
    changer.flush()?;
    println!(
        "{} {} (it reverts when resumed)",
        "Cancel requested for".yellow(),
        run_id
    );
    Ok(())
}

pub fn handle_resume(store: &StoreArgs) -> CliResult {
    let changer = open(store)?;
    let results = runtime()?.block_on(changer.adopt_jobs())?;
    changer.flush()?;
    if results.is_empty() {
        println!("{}", "No unfinished schema changes".yellow());
        return Ok(());
    }
    for (run_id, result) in results {
        match result {
            Ok(status) => println!("{} {}", run_id, ResultFormatter::job_status(status)),
            Err(e) => println!("{} {}", run_id, format!("error: {}", e).red()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_row() {
        let values = parse_row(r#"{"id": 7, "name": "ada", "active": true, "note": null}"#).unwrap();
        assert!(values.contains(&("id".to_string(), Datum::Int(7))));
        assert!(values.contains(&("name".to_string(), Datum::String("ada".into()))));
        assert!(values.contains(&("active".to_string(), Datum::Bool(true))));
        assert!(values.contains(&("note".to_string(), Datum::Null)));

        assert!(parse_row("[1, 2]").is_err());
        assert!(parse_row(r#"{"id": 1.5}"#).is_err());
    }
}
