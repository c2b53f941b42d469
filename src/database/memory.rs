//! In-memory statement recorder

use super::{InsertBatch, SqlExecutor, SqlValue};
use crate::error::{LoaderError, Result};
use std::collections::HashMap;
use tracing::debug;

type InsertFailure = Box<dyn FnMut(&InsertBatch) -> bool + Send>;

/// Records DDL and inserted rows instead of talking to a server.
///
/// Inserts can be made to fail on demand to exercise retry handling.
#[derive(Default)]
pub struct MemoryDatabase {
    statements: Vec<String>,
    tables: HashMap<String, Vec<Vec<SqlValue>>>,
    columns: HashMap<String, Vec<String>>,
    insert_calls: usize,
    fail_insert: Option<InsertFailure>,
}

impl std::fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDatabase")
            .field("statements", &self.statements.len())
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .field("insert_calls", &self.insert_calls)
            .finish()
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every insert for which the predicate returns true
    pub fn fail_inserts_where(
        mut self,
        predicate: impl FnMut(&InsertBatch) -> bool + Send + 'static,
    ) -> Self {
        self.fail_insert = Some(Box::new(predicate));
        self
    }

    /// Statements passed to `execute`, in order
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Rows persisted into a table
    pub fn rows(&self, table: &str) -> &[Vec<SqlValue>] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Column names of the last insert into a table
    pub fn columns(&self, table: &str) -> &[String] {
        self.columns.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of insert attempts, failed ones included
    pub fn insert_calls(&self) -> usize {
        self.insert_calls
    }
}

impl SqlExecutor for MemoryDatabase {
    fn execute(&mut self, sql: &str) -> Result<()> {
        debug!("[memory] {}", sql);
        if let Some(table) = sql.strip_prefix("DROP TABLE IF EXISTS ") {
            let table = table.trim().trim_matches('"').replace("\"\"", "\"");
            self.tables.remove(&table);
            self.columns.remove(&table);
        }
        self.statements.push(sql.to_string());
        Ok(())
    }

    fn insert_rows(&mut self, batch: &InsertBatch) -> Result<u64> {
        self.insert_calls += 1;

        if let Some(fail) = self.fail_insert.as_mut() {
            if fail(batch) {
                return Err(LoaderError::database("injected insert failure"));
            }
        }

        self.columns
            .insert(batch.table.clone(), batch.columns.clone());
        self.tables
            .entry(batch.table.clone())
            .or_default()
            .extend(batch.rows.iter().cloned());
        Ok(batch.rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(rows: usize) -> InsertBatch {
        InsertBatch {
            table: "shipments".to_string(),
            columns: vec!["qty".to_string()],
            rows: (0..rows).map(|i| vec![SqlValue::Number(Some(i as f64))]).collect(),
        }
    }

    #[test]
    fn test_records_statements_and_rows() {
        let mut db = MemoryDatabase::new();
        db.execute("DROP TABLE IF EXISTS \"shipments\"").unwrap();
        assert_eq!(db.insert_rows(&batch(3)).unwrap(), 3);
        assert_eq!(db.insert_rows(&batch(2)).unwrap(), 2);

        assert_eq!(db.statements().len(), 1);
        assert_eq!(db.rows("shipments").len(), 5);
        assert_eq!(db.columns("shipments"), ["qty".to_string()]);
        assert!(db.rows("other").is_empty());
    }

    #[test]
    fn test_drop_table_discards_rows() {
        let mut db = MemoryDatabase::new();
        db.insert_rows(&batch(3)).unwrap();
        db.execute("DROP TABLE IF EXISTS \"shipments\"").unwrap();

        assert!(db.rows("shipments").is_empty());
        assert!(db.columns("shipments").is_empty());
    }

    #[test]
    fn test_injected_failures_persist_nothing() {
        let mut db = MemoryDatabase::new().fail_inserts_where(|b| b.rows.len() == 2);

        assert!(db.insert_rows(&batch(2)).is_err());
        assert_eq!(db.insert_rows(&batch(1)).unwrap(), 1);
        assert_eq!(db.rows("shipments").len(), 1);
        assert_eq!(db.insert_calls(), 2);
    }
}
