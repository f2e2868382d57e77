// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Result formatting for CLI output

use super::commands::OutputFormat;
use colored::*;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use schemachanger::{Event, EventKind, JobStatus, JobStatusRow};

pub struct ResultFormatter;

impl ResultFormatter {
    pub fn jobs(rows: &[JobStatusRow], format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => Self::jobs_table(rows),
            OutputFormat::Json => Self::to_json(rows),
        }
    }

    pub fn events(events: &[Event], format: OutputFormat) -> String {
        match format {
            OutputFormat::Table => Self::events_table(events),
            OutputFormat::Json => Self::to_json(events),
        }
    }

    /// Highlight stage headings of an EXPLAIN rendering
    pub fn explain(text: &str) -> String {
        let mut output = String::new();
        for line in text.lines() {
            if line.starts_with("Stage ") {
                output.push_str(&format!("{}\n", line.bold().cyan()));
            } else if line.trim_start().starts_with('*') {
                output.push_str(&format!("{}\n", line.dimmed()));
            } else {
                output.push_str(line);
                output.push('\n');
            }
        }
        output
    }

    pub fn job_status(status: JobStatus) -> ColoredString {
        let text = status.to_string();
        match status {
            JobStatus::Succeeded => text.green(),
            JobStatus::Reverted => text.yellow(),
            JobStatus::Failed => text.red().bold(),
            JobStatus::Running | JobStatus::Reverting => text.cyan(),
        }
    }

    fn status_color(status: JobStatus) -> Color {
        match status {
            JobStatus::Succeeded => Color::Green,
            JobStatus::Reverted => Color::Yellow,
            JobStatus::Failed => Color::Red,
            JobStatus::Running | JobStatus::Reverting => Color::Cyan,
        }
    }

    fn jobs_table(rows: &[JobStatusRow]) -> String {
        if rows.is_empty() {
            return format!("{}\n", "No schema changes found".yellow());
        }
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(
            ["run", "description", "status", "state", "phase", "stages", "error"]
                .into_iter()
                .map(|h| Cell::new(h).fg(Color::Green)),
        );
        for row in rows {
            table.add_row(vec![
                Cell::new(row.run_id),
                Cell::new(&row.description),
                Cell::new(row.job_status).fg(Self::status_color(row.job_status)),
                Cell::new(row.executor_state),
                Cell::new(row.phase),
                Cell::new(row.stages_completed),
                Cell::new(row.error.as_deref().unwrap_or("")),
            ]);
        }
        format!("{}\n", table)
    }

    fn events_table(events: &[Event]) -> String {
        if events.is_empty() {
            return format!("{}\n", "No events recorded".yellow());
        }
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(
            ["#", "time", "event", "elements"]
                .into_iter()
                .map(|h| Cell::new(h).fg(Color::Green)),
        );
        for event in events {
            let kind = Cell::new(&event.kind);
            let kind = match event.kind {
                EventKind::Succeeded => kind.fg(Color::Green),
                EventKind::Reverted { .. } | EventKind::RevertStarted { .. } => kind.fg(Color::Yellow),
                EventKind::Failed { .. } | EventKind::StageFailed { .. } => kind.fg(Color::Red),
                EventKind::StageCommitted { .. } => kind,
            };
            let elements: Vec<String> = event.elements.iter().map(|k| k.to_string()).collect();
            table.add_row(vec![
                Cell::new(event.sequence),
                Cell::new(event.timestamp.format("%Y-%m-%d %H:%M:%S%.3f")),
                kind,
                Cell::new(elements.join("\n")),
            ]);
        }
        format!("{}\n", table)
    }

    fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
        match serde_json::to_string_pretty(value) {
            Ok(json) => format!("{}\n", json),
            Err(e) => format!("{{\"status\": \"error\", \"error\": \"{}\"}}\n", e),
        }
    }
}
