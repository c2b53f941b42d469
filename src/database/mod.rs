//! Destination storage.
//!
//! The pipeline talks to storage only through [`SqlExecutor`]: DDL as
//! plain statements and row data as append-only [`InsertBatch`]es.
//! [`PostgresDatabase`] is the real backend; [`MemoryDatabase`] records
//! everything in memory for dry runs and tests.

pub mod memory;
pub mod postgres;

pub use memory::MemoryDatabase;
pub use postgres::PostgresDatabase;

use crate::error::Result;
use std::fmt;

/// Storage column type chosen by type inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Numeric,
    /// Bounded text with a maximum length in characters
    Varchar(usize),
    Text,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Numeric => write!(f, "DOUBLE PRECISION"),
            ColumnType::Varchar(n) => write!(f, "VARCHAR({})", n),
            ColumnType::Text => write!(f, "TEXT"),
        }
    }
}

/// One cell bound into an insert.
///
/// Nulls stay typed so a driver can bind them against the column type.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Number(Option<f64>),
    Text(Option<String>),
}

/// Rows for a single append-only bulk insert
#[derive(Debug, Clone, PartialEq)]
pub struct InsertBatch {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl InsertBatch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Minimal statement interface the loader needs from a database
pub trait SqlExecutor {
    /// Run a statement that returns no rows
    fn execute(&mut self, sql: &str) -> Result<()>;

    /// Insert every row of the batch or none of them; returns rows written
    fn insert_rows(&mut self, batch: &InsertBatch) -> Result<u64>;
}

/// Double-quote an identifier, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(table))
}

pub fn create_table_sql(table: &str, columns: &[(String, ColumnType)]) -> String {
    let definitions: Vec<String> = columns
        .iter()
        .map(|(name, column_type)| format!("{} {}", quote_ident(name), column_type))
        .collect();
    format!(
        "CREATE TABLE {} ({})",
        quote_ident(table),
        definitions.join(", ")
    )
}
