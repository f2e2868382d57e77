//! Test fixture for schema changer integration tests
//!
//! Every fixture owns a sled store in its own temporary directory and goes
//! through the public SchemaChanger API only.

use super::statements;
use schemachanger::config::{BackfillConfig, RetryConfig};
use schemachanger::eval::Datum;
use schemachanger::{
    JobStatus, JobStatusRow, SchemaChanger, SchemaChangerConfig, Statement, TestingKnobs,
};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Test fixture with an isolated store
pub struct TestFixture {
    changer: SchemaChanger,
    path: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl TestFixture {
    /// Create an empty store
    pub fn new() -> Result<Self, Box<dyn Error>> {
        Self::with_knobs(TestingKnobs::default())
    }

    /// Create an empty store whose executor runs the given hooks
    pub fn with_knobs(knobs: TestingKnobs) -> Result<Self, Box<dyn Error>> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("schemachanger_test");
        let changer = SchemaChanger::with_knobs(Self::config(&path), knobs)?;
        Ok(Self {
            changer,
            path,
            _temp_dir: temp_dir,
        })
    }

    /// Small batches and fast retries so tests cover batching without waiting
    pub fn config(path: &Path) -> SchemaChangerConfig {
        let mut config = SchemaChangerConfig::with_path(path);
        config.backfill = BackfillConfig { batch_size: 2 };
        config.retry = RetryConfig {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(10),
            multiplier: 2.0,
        };
        config
    }

    /// Close the store and open it again, as a restarted process would
    pub fn reopen(self) -> Result<Self, Box<dyn Error>> {
        let TestFixture {
            changer,
            path,
            _temp_dir,
        } = self;
        changer.flush()?;
        drop(changer);
        let changer = SchemaChanger::open(Self::config(&path))?;
        Ok(Self {
            changer,
            path,
            _temp_dir,
        })
    }

    pub fn changer(&self) -> &SchemaChanger {
        &self.changer
    }

    /// Run `stmt` to completion and return its final status row
    pub async fn execute(&self, stmt: &Statement) -> Result<JobStatusRow, Box<dyn Error>> {
        self.changer
            .execute(stmt)
            .await?
            .ok_or_else(|| format!("{} changed nothing", stmt).into())
    }

    /// Run `stmt` and require it to succeed
    pub async fn apply(&self, stmt: &Statement) -> Result<(), Box<dyn Error>> {
        let row = self.execute(stmt).await?;
        if row.job_status != JobStatus::Succeeded {
            return Err(format!("{} ended {}: {:?}", stmt, row.job_status, row.error).into());
        }
        Ok(())
    }

    /// customers and orders, a unique index on customers.email and a foreign
    /// key from orders.customer_email to it, with a few rows in each
    pub async fn setup_shop(&self) -> Result<(), Box<dyn Error>> {
        self.apply(&statements::create_customers()).await?;
        self.apply(&statements::create_orders()).await?;
        self.apply(&statements::create_index(
            "customers",
            "customers_email_key",
            &["email"],
            true,
        ))
        .await?;
        self.apply(&statements::add_email_foreign_key()).await?;

        for (id, name) in [(1, "ada"), (2, "bob"), (3, "ada")] {
            self.insert(
                "customers",
                &[
                    ("id", Datum::Int(id)),
                    ("email", Datum::String(format!("{}{}@example.com", name, id))),
                    ("name", Datum::String(name.to_string())),
                ],
            )?;
        }
        for (id, customer, total) in [(10, 1, 25), (11, 1, 40), (12, 2, 5)] {
            let email = if customer == 1 { "ada1@example.com" } else { "bob2@example.com" };
            self.insert(
                "orders",
                &[
                    ("id", Datum::Int(id)),
                    ("customer_email", Datum::String(email.to_string())),
                    ("total", Datum::Int(total)),
                ],
            )?;
        }
        Ok(())
    }

    pub fn insert(&self, table: &str, values: &[(&str, Datum)]) -> Result<(), Box<dyn Error>> {
        let values: Vec<(String, Datum)> = values
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        self.changer.insert_row(table, &values)?;
        Ok(())
    }

    /// Values of `column` across every row of `table`, in primary key order
    pub fn column_values(&self, table: &str, column: &str) -> Result<Vec<Option<Datum>>, Box<dyn Error>> {
        let snapshot = self.changer.snapshot()?;
        let id = snapshot
            .table_by_name(table)
            .and_then(|t| t.column_by_name(column))
            .map(|c| c.id)
            .ok_or_else(|| format!("column {}.{} not found", table, column))?;
        Ok(self
            .changer
            .rows(table)?
            .into_iter()
            .map(|row| row.get(&id).cloned())
            .collect())
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.changer
            .snapshot()
            .ok()
            .and_then(|s| s.table_by_name(table).map(|t| t.column_by_name(column).is_some()))
            .unwrap_or(false)
    }

    pub fn has_index(&self, table: &str, index: &str) -> bool {
        self.changer
            .snapshot()
            .ok()
            .and_then(|s| s.table_by_name(table).map(|t| t.index_by_name(index).is_some()))
            .unwrap_or(false)
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.changer
            .snapshot()
            .map(|s| s.table_by_name(table).is_some())
            .unwrap_or(false)
    }

    /// Tables, columns, indexes and constraints still owned by a schema change
    pub fn busy_elements(&self) -> usize {
        self.changer
            .snapshot()
            .map(|s| s.tables().map(|t| t.busy_elements().len()).sum())
            .unwrap_or(0)
    }
}
