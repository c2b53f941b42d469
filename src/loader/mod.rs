//! Destination table creation and batch loading.
//!
//! The table is dropped and recreated from inferred column types on every
//! run, then the combined dataset is appended in batches. Schema creation
//! failures abort the load; batch failures do not.

pub mod batch;
pub mod inference;
pub mod retry;

pub use batch::BatchLoader;
pub use inference::{TypeInferencer, parse_number};
pub use retry::RetryPolicy;

use crate::config::LoaderConfig;
use crate::database::{ColumnType, SqlExecutor, create_table_sql, drop_table_sql};
use crate::error::Result;
use crate::models::LoadReport;
use indicatif::ProgressBar;
use polars::prelude::DataFrame;
use tracing::info;

/// Drop and recreate `table` with the given columns
pub fn create_table(
    db: &mut dyn SqlExecutor,
    table: &str,
    columns: &[(String, ColumnType)],
) -> Result<()> {
    db.execute(&drop_table_sql(table))?;
    db.execute(&create_table_sql(table, columns))?;
    info!("[+] Created table \"{}\" with {} columns", table, columns.len());
    Ok(())
}

/// Infer the table schema from the dataset, recreate the table and upload
/// every row
pub fn load_dataset(
    frame: &DataFrame,
    config: &LoaderConfig,
    db: &mut dyn SqlExecutor,
    progress: ProgressBar,
) -> Result<LoadReport> {
    let columns = TypeInferencer::new(config.inference.clone()).infer_frame(frame);
    create_table(db, &config.table_name, &columns)?;

    let retry = RetryPolicy::new(config.load.max_attempts, config.load.backoff_base());
    let report = BatchLoader::new(&config.table_name, &columns, config.load.batch_size, retry)
        .with_progress(progress)
        .load(frame, db);

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDatabase;
    use polars::prelude::*;

    #[test]
    fn test_load_dataset_recreates_table_then_inserts() {
        let frame = DataFrame::new(vec![
            Column::new("qty".into(), vec![Some("1"), Some("2,500"), None]),
            Column::new("unit".into(), vec![Some("KGS"), Some("PCS"), Some("KGS")]),
        ])
        .unwrap();
        let config = LoaderConfig::default()
            .with_table_name("exports")
            .with_retry(1, 0);
        let mut db = MemoryDatabase::new();

        let report = load_dataset(&frame, &config, &mut db, ProgressBar::hidden()).unwrap();

        assert_eq!(
            db.statements(),
            [
                "DROP TABLE IF EXISTS \"exports\"".to_string(),
                "CREATE TABLE \"exports\" (\"qty\" DOUBLE PRECISION, \"unit\" VARCHAR(50))"
                    .to_string(),
            ]
        );
        assert_eq!(report.persisted_rows, 3);
        assert_eq!(db.rows("exports")[1][0], crate::database::SqlValue::Number(Some(2500.0)));
    }
}
