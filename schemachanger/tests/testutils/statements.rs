//! DDL statements shared by the integration suites

use schemachanger::builder::{
    AlterTable, AlterTableCommand, ColumnDef, ConstraintDef, CreateIndex, CreateTable, DropIndex,
    DropTable,
};
use schemachanger::eval::{BinaryOp, ColumnType, Datum, Expr};
use schemachanger::Statement;

/// customers(id, email, name) keyed by id
pub fn create_customers() -> Statement {
    Statement::CreateTable(CreateTable {
        name: "customers".into(),
        if_not_exists: false,
        columns: vec![
            ColumnDef::new("id", ColumnType::Int8).not_null(),
            ColumnDef::new("email", ColumnType::String),
            ColumnDef::new("name", ColumnType::String),
        ],
        primary_key: vec!["id".into()],
        checks: vec![],
    })
}

/// orders(id, customer_email, total) keyed by id
pub fn create_orders() -> Statement {
    Statement::CreateTable(CreateTable {
        name: "orders".into(),
        if_not_exists: false,
        columns: vec![
            ColumnDef::new("id", ColumnType::Int8).not_null(),
            ColumnDef::new("customer_email", ColumnType::String),
            ColumnDef::new("total", ColumnType::Int8),
        ],
        primary_key: vec!["id".into()],
        checks: vec![],
    })
}

pub fn create_index(table: &str, name: &str, columns: &[&str], unique: bool) -> Statement {
    Statement::CreateIndex(CreateIndex {
        name: name.into(),
        table: table.into(),
        columns: columns.iter().map(|c| c.to_string()).collect(),
        unique,
        if_not_exists: false,
    })
}

pub fn drop_index(table: &str, name: &str, cascade: bool) -> Statement {
    Statement::DropIndex(DropIndex {
        table: table.into(),
        name: name.into(),
        if_exists: false,
        cascade,
    })
}

pub fn drop_table(name: &str, cascade: bool) -> Statement {
    Statement::DropTable(DropTable {
        name: name.into(),
        if_exists: false,
        cascade,
    })
}

pub fn alter(table: &str, commands: Vec<AlterTableCommand>) -> Statement {
    Statement::AlterTable(AlterTable {
        table: table.into(),
        commands,
    })
}

/// orders.customer_email -> customers.email
pub fn add_email_foreign_key() -> Statement {
    alter(
        "orders",
        vec![AlterTableCommand::AddConstraint(ConstraintDef::ForeignKey {
            name: Some("orders_customer_email_fkey".into()),
            columns: vec!["customer_email".into()],
            referenced_table: "customers".into(),
            referenced_columns: vec!["email".into()],
        })],
    )
}

/// ADD COLUMN <name> INT8 NOT NULL DEFAULT <value>
pub fn add_int_column(name: &str, value: i64) -> AlterTableCommand {
    AlterTableCommand::AddColumn {
        column: ColumnDef::new(name, ColumnType::Int8)
            .not_null()
            .with_default(Expr::Literal(Datum::Int(value))),
        if_not_exists: false,
    }
}

pub fn drop_column(name: &str) -> AlterTableCommand {
    AlterTableCommand::DropColumn {
        name: name.into(),
        if_exists: false,
        cascade: false,
    }
}

pub fn add_unique(name: &str, columns: &[&str]) -> AlterTableCommand {
    AlterTableCommand::AddConstraint(ConstraintDef::Unique {
        name: Some(name.into()),
        columns: columns.iter().map(|c| c.to_string()).collect(),
    })
}

/// CHECK (<column> >= <min>)
pub fn add_min_check(name: &str, column: &str, min: i64) -> AlterTableCommand {
    AlterTableCommand::AddConstraint(ConstraintDef::Check {
        name: Some(name.into()),
        expr: Expr::binary(
            BinaryOp::GtEq,
            Expr::column(column),
            Expr::Literal(Datum::Int(min)),
        ),
    })
}
