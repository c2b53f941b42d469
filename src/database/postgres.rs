//! PostgreSQL backend driven synchronously.
//!
//! tokio-postgres is async; a current-thread runtime owned by the
//! connection blocks on every call so the loader stays single-threaded and
//! strictly sequential.

use super::{InsertBatch, SqlExecutor, SqlValue, quote_ident};
use crate::config::DatabaseConfig;
use crate::constants::MAX_BIND_PARAMETERS;
use crate::error::{LoaderError, Result};
use tokio::runtime::{Builder, Runtime};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info, warn};

pub struct PostgresDatabase {
    runtime: Runtime,
    config: DatabaseConfig,
    client: Option<Client>,
}

impl std::fmt::Debug for PostgresDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDatabase")
            .field("config", &self.config)
            .field("connected", &self.client.is_some())
            .finish()
    }
}

impl PostgresDatabase {
    /// Prepare a backend; the connection is opened on first use
    pub fn new(config: DatabaseConfig) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            runtime,
            config,
            client: None,
        })
    }

    fn client(&mut self) -> Result<&mut Client> {
        if self.client.as_ref().is_some_and(Client::is_closed) {
            warn!("Database connection closed, reconnecting");
            self.client = None;
        }

        if self.client.is_none() {
            let config = &self.config;
            let mut pg_config = tokio_postgres::Config::new();
            pg_config
                .host(&config.host)
                .port(config.port)
                .user(&config.user)
                .password(&config.password)
                .dbname(&config.database);

            let (client, connection) = self
                .runtime
                .block_on(pg_config.connect(NoTls))
                .map_err(|e| LoaderError::Database {
                    message: format!(
                        "Failed to connect to {}:{}/{}: {}",
                        config.host, config.port, config.database, e
                    ),
                    source: Some(Box::new(e)),
                })?;

            // The connection makes progress whenever the runtime is blocked on
            self.runtime.spawn(async move {
                if let Err(e) = connection.await {
                    error!("PostgreSQL connection error: {}", e);
                }
            });

            info!(
                "Connected to {}:{}/{} as {}",
                config.host, config.port, config.database, config.user
            );
            self.client = Some(client);
        }

        self.client
            .as_mut()
            .ok_or_else(|| LoaderError::database("connection unavailable"))
    }
}

impl SqlExecutor for PostgresDatabase {
    fn execute(&mut self, sql: &str) -> Result<()> {
        debug!("Executing: {}", sql);
        self.client()?;
        let Self { runtime, client, .. } = self;
        let client = client
            .as_ref()
            .ok_or_else(|| LoaderError::database("connection unavailable"))?;
        runtime.block_on(client.batch_execute(sql))?;
        Ok(())
    }

    fn insert_rows(&mut self, batch: &InsertBatch) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let rows_per_statement = rows_per_statement(batch.columns.len());
        self.client()?;
        let Self { runtime, client, .. } = self;
        let client = client
            .as_mut()
            .ok_or_else(|| LoaderError::database("connection unavailable"))?;

        runtime.block_on(async {
            let transaction = client.transaction().await?;
            let mut written = 0u64;

            for chunk in batch.rows.chunks(rows_per_statement) {
                let sql = insert_sql(&batch.table, &batch.columns, chunk.len());
                let params: Vec<&(dyn ToSql + Sync)> = chunk
                    .iter()
                    .flat_map(|row| row.iter().map(bind))
                    .collect();
                written += transaction.execute(sql.as_str(), &params).await?;
            }

            transaction.commit().await?;
            Ok::<_, LoaderError>(written)
        })
    }
}

fn bind(value: &SqlValue) -> &(dyn ToSql + Sync) {
    match value {
        SqlValue::Number(number) => number,
        SqlValue::Text(text) => text,
    }
}

/// Rows that fit in one statement without exceeding the bind limit
fn rows_per_statement(width: usize) -> usize {
    (MAX_BIND_PARAMETERS / width.max(1)).max(1)
}

/// Multi-row parameterized insert for `rows` rows
fn insert_sql(table: &str, columns: &[String], rows: usize) -> String {
    let column_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let width = columns.len();

    let tuples: Vec<String> = (0..rows)
        .map(|row| {
            let placeholders: Vec<String> = (1..=width)
                .map(|col| format!("${}", row * width + col))
                .collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table),
        column_list.join(", "),
        tuples.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sql_numbers_placeholders_row_major() {
        let sql = insert_sql(
            "shipments",
            &["qty".to_string(), "unit".to_string()],
            2,
        );
        assert_eq!(
            sql,
            "INSERT INTO \"shipments\" (\"qty\", \"unit\") VALUES ($1, $2), ($3, $4)"
        );
    }

    #[test]
    fn test_rows_per_statement_respects_bind_limit() {
        assert_eq!(rows_per_statement(73), MAX_BIND_PARAMETERS / 73);
        assert!(rows_per_statement(73) * 73 <= MAX_BIND_PARAMETERS);
        assert_eq!(rows_per_statement(0), MAX_BIND_PARAMETERS);
        assert_eq!(rows_per_statement(100_000), 1);
    }
}
