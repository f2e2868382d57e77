// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Resolved data-definition statements
//!
//! Statements arrive already parsed and name-resolved. They are plain serde
//! types so the CLI can read them from JSON files. `Display` renders the
//! canonical DDL text, used as the operation's description.

use crate::eval::{ColumnType, Expr};
use serde::{Deserialize, Serialize};
use std::fmt;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    CreateTable(CreateTable),
    DropTable(DropTable),
    AlterTable(AlterTable),
    CreateIndex(CreateIndex),
    DropIndex(DropIndex),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<Expr>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: Expr) -> Self {
        self.default = Some(default);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTable {
    pub name: String,
    #[serde(default)]
    pub if_not_exists: bool,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub checks: Vec<CheckDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckDef {
    #[serde(default)]
    pub name: Option<String>,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropTable {
    pub name: String,
    #[serde(default)]
    pub if_exists: bool,
    #[serde(default)]
    pub cascade: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlterTable {
    pub table: String,
    pub commands: Vec<AlterTableCommand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlterTableCommand {
    AddColumn {
        column: ColumnDef,
        #[serde(default)]
        if_not_exists: bool,
    },
    DropColumn {
        name: String,
        #[serde(default)]
        if_exists: bool,
        #[serde(default)]
        cascade: bool,
    },
    AddConstraint(ConstraintDef),
    DropConstraint {
        name: String,
        #[serde(default)]
        if_exists: bool,
        #[serde(default)]
        cascade: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintDef {
    Check {
        #[serde(default)]
        name: Option<String>,
        expr: Expr,
    },
    ForeignKey {
        #[serde(default)]
        name: Option<String>,
        columns: Vec<String>,
        referenced_table: String,
        referenced_columns: Vec<String>,
    },
    Unique {
        #[serde(default)]
        name: Option<String>,
        columns: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateIndex {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropIndex {
    pub table: String,
    pub name: String,
    #[serde(default)]
    pub if_exists: bool,
    #[serde(default)]
    pub cascade: bool,
}

impl fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.column_type)?;
        if !self.nullable {
            write!(f, " NOT NULL")?;
        }
        if let Some(default) = &self.default {
            write!(f, " DEFAULT {}", default)?;
        }
        Ok(())
    }
}

impl fmt::Display for ConstraintDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstraintDef::Check { name, .. }
            | ConstraintDef::ForeignKey { name, .. }
            | ConstraintDef::Unique { name, .. } => name,
        };
        if let Some(name) = name {
            write!(f, "CONSTRAINT {} ", name)?;
        }
        match self {
            ConstraintDef::Check { expr, .. } => write!(f, "CHECK ({})", expr),
            ConstraintDef::ForeignKey {
                columns,
                referenced_table,
                referenced_columns,
                ..
            } => write!(
                f,
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                columns.join(", "),
                referenced_table,
                referenced_columns.join(", ")
            ),
            ConstraintDef::Unique { columns, .. } => write!(f, "UNIQUE ({})", columns.join(", ")),
        }
    }
}

impl fmt::Display for AlterTableCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlterTableCommand::AddColumn {
                column,
                if_not_exists,
            } => {
                write!(f, "ADD COLUMN ")?;
                if *if_not_exists {
                    write!(f, "IF NOT EXISTS ")?;
                }
                write!(f, "{}", column)
            }
            AlterTableCommand::DropColumn {
                name,
                if_exists,
                cascade,
            } => write!(
                f,
                "DROP COLUMN {}{}{}",
                if *if_exists { "IF EXISTS " } else { "" },
                name,
                if *cascade { " CASCADE" } else { "" }
            ),
            AlterTableCommand::AddConstraint(constraint) => write!(f, "ADD {}", constraint),
            AlterTableCommand::DropConstraint {
                name,
                if_exists,
                cascade,
            } => write!(
                f,
                "DROP CONSTRAINT {}{}{}",
                if *if_exists { "IF EXISTS " } else { "" },
                name,
                if *cascade { " CASCADE" } else { "" }
            ),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::CreateTable(stmt) => {
                write!(f, "CREATE TABLE ")?;
                if stmt.if_not_exists {
                    write!(f, "IF NOT EXISTS ")?;
                }
                write!(f, "{} (", stmt.name)?;
                for (i, column) in stmt.columns.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", column)?;
                }
                write!(f, ", PRIMARY KEY ({})", stmt.primary_key.join(", "))?;
                for check in &stmt.checks {
                    write!(f, ", ")?;
                    if let Some(name) = &check.name {
                        write!(f, "CONSTRAINT {} ", name)?;
                    }
                    write!(f, "CHECK ({})", check.expr)?;
                }
                write!(f, ")")
            }
            Statement::DropTable(stmt) => write!(
                f,
                "DROP TABLE {}{}{}",
                if stmt.if_exists { "IF EXISTS " } else { "" },
                stmt.name,
                if stmt.cascade { " CASCADE" } else { "" }
            ),
            Statement::AlterTable(stmt) => {
                write!(f, "ALTER TABLE {} ", stmt.table)?;
                for (i, command) in stmt.commands.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", command)?;
                }
                Ok(())
            }
            Statement::CreateIndex(stmt) => write!(
                f,
                "CREATE {}INDEX {}{} ON {} ({})",
                if stmt.unique { "UNIQUE " } else { "" },
                if stmt.if_not_exists { "IF NOT EXISTS " } else { "" },
                stmt.name,
                stmt.table,
                stmt.columns.join(", ")
            ),
            Statement::DropIndex(stmt) => write!(
                f,
                "DROP INDEX {}{}@{}{}",
                if stmt.if_exists { "IF EXISTS " } else { "" },
                stmt.table,
                stmt.name,
                if stmt.cascade { " CASCADE" } else { "" }
            ),
        }
    }
}
