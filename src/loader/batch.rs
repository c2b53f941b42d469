//! Batched upload of the combined dataset

use super::inference::parse_number;
use super::retry::RetryPolicy;
use crate::database::{ColumnType, InsertBatch, SqlExecutor, SqlValue};
use crate::error::Result;
use crate::models::LoadReport;
use indicatif::ProgressBar;
use polars::prelude::*;
use tracing::{debug, error, info, warn};

/// Uploads a frame in fixed-size batches, retrying each batch
/// independently and moving on when one is abandoned
pub struct BatchLoader<'a> {
    table: &'a str,
    columns: &'a [(String, ColumnType)],
    batch_size: usize,
    retry: RetryPolicy,
    progress: ProgressBar,
}

/// Counters gathered while converting values for storage
#[derive(Debug, Default, Clone, Copy)]
struct Coercions {
    nulls: usize,
    truncated: usize,
}

impl<'a> BatchLoader<'a> {
    pub fn new(
        table: &'a str,
        columns: &'a [(String, ColumnType)],
        batch_size: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            table,
            columns,
            batch_size: batch_size.max(1),
            retry,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report progress (in rows) on the given bar
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn batch_count(&self, rows: usize) -> usize {
        rows.div_ceil(self.batch_size)
    }

    /// Upload every batch; failed batches are logged and counted, never
    /// fatal
    pub fn load(&self, frame: &DataFrame, db: &mut dyn SqlExecutor) -> LoadReport {
        let total_rows = frame.height();
        let batches = self.batch_count(total_rows);
        let mut report = LoadReport {
            total_rows,
            batches,
            ..LoadReport::default()
        };

        self.progress.set_length(total_rows as u64);
        info!(
            "Uploading {} rows in {} batches of up to {} ({} attempts per batch)",
            total_rows,
            batches,
            self.batch_size,
            self.retry.max_attempts()
        );

        for index in 0..batches {
            let number = index + 1;
            let offset = index * self.batch_size;
            let len = self.batch_size.min(total_rows - offset);
            let label = format!("Batch {}/{}", number, batches);

            let outcome = self.build_batch(frame, offset, len).and_then(|(batch, coercions)| {
                let written = self.retry.run(&label, |_| db.insert_rows(&batch))?;
                Ok((written, coercions))
            });

            match outcome {
                Ok((written, coercions)) => {
                    report.persisted_rows += written as usize;
                    report.coerced_nulls += coercions.nulls;
                    report.truncated_values += coercions.truncated;
                    debug!("{} uploaded ({} rows)", label, written);
                }
                Err(e) => {
                    error!("[!] {} failed, skipping {} rows: {}", label, len, e);
                    report.failed_batches.push(number);
                }
            }
            self.progress.inc(len as u64);
        }

        self.progress.finish_and_clear();

        if report.coerced_nulls > 0 {
            warn!(
                "{} non-numeric values in numeric columns were stored as NULL",
                report.coerced_nulls
            );
        }
        if report.truncated_values > 0 {
            warn!(
                "{} values were truncated to their column length",
                report.truncated_values
            );
        }
        info!(
            "Uploaded {}/{} rows ({} of {} batches failed)",
            report.persisted_rows,
            report.total_rows,
            report.failed_batches.len(),
            report.batches
        );
        report
    }

    /// Convert one slice of the frame into storage values
    fn build_batch(
        &self,
        frame: &DataFrame,
        offset: usize,
        len: usize,
    ) -> Result<(InsertBatch, Coercions)> {
        let slice = frame.slice(offset as i64, len);
        let mut coercions = Coercions::default();
        let mut rows: Vec<Vec<SqlValue>> = (0..len)
            .map(|_| Vec::with_capacity(self.columns.len()))
            .collect();

        for (name, column_type) in self.columns {
            let values = slice.column(name)?.str()?;
            for (row, value) in rows.iter_mut().zip(values.into_iter()) {
                row.push(coerce(value, *column_type, &mut coercions));
            }
        }

        let batch = InsertBatch {
            table: self.table.to_string(),
            columns: self.columns.iter().map(|(name, _)| name.clone()).collect(),
            rows,
        };
        Ok((batch, coercions))
    }
}

/// Storage value for one cell of a column with the given type
fn coerce(value: Option<&str>, column_type: ColumnType, coercions: &mut Coercions) -> SqlValue {
    match column_type {
        ColumnType::Numeric => {
            let number = value.and_then(parse_number);
            if value.is_some() && number.is_none() {
                coercions.nulls += 1;
            }
            SqlValue::Number(number)
        }
        ColumnType::Varchar(limit) => SqlValue::Text(value.map(|text| {
            if text.chars().count() > limit {
                coercions.truncated += 1;
                text.chars().take(limit).collect()
            } else {
                text.to_string()
            }
        })),
        ColumnType::Text => SqlValue::Text(value.map(str::to_string)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDatabase;
    use std::time::Duration;

    fn frame(rows: usize) -> DataFrame {
        let ids: Vec<String> = (0..rows).map(|i| i.to_string()).collect();
        let qty: Vec<Option<String>> = (0..rows)
            .map(|i| match i % 3 {
                0 => Some(format!("{},000", i)),
                1 => None,
                _ => Some("n.a.".to_string()),
            })
            .collect();
        DataFrame::new(vec![
            Column::new("record_id".into(), ids),
            Column::new("qty".into(), qty),
        ])
        .unwrap()
    }

    fn columns() -> Vec<(String, ColumnType)> {
        vec![
            ("record_id".to_string(), ColumnType::Varchar(50)),
            ("qty".to_string(), ColumnType::Numeric),
        ]
    }

    fn no_wait(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::ZERO)
    }

    fn first_id(batch: &InsertBatch) -> Option<&str> {
        match batch.rows.first().and_then(|row| row.first()) {
            Some(SqlValue::Text(Some(id))) => Some(id.as_str()),
            _ => None,
        }
    }

    #[test]
    fn test_all_batches_persist() {
        let data = frame(25);
        let columns = columns();
        let mut db = MemoryDatabase::new();

        let report = BatchLoader::new("shipments", &columns, 10, no_wait(3)).load(&data, &mut db);

        assert_eq!(report.batches, 3);
        assert_eq!(report.persisted_rows, 25);
        assert!(report.is_complete());
        assert_eq!(db.rows("shipments").len(), 25);
        assert_eq!(db.columns("shipments"), ["record_id".to_string(), "qty".to_string()]);
    }

    #[test]
    fn test_failed_batch_is_skipped_and_loading_continues() {
        let data = frame(30);
        let columns = columns();
        // rows 6..9 make up the third batch
        let mut db = MemoryDatabase::new().fail_inserts_where(|b| first_id(b) == Some("6"));

        let report = BatchLoader::new("shipments", &columns, 3, no_wait(3)).load(&data, &mut db);

        assert_eq!(report.batches, 10);
        assert_eq!(report.failed_batches, vec![3]);
        assert_eq!(report.persisted_rows, 27);
        assert!(!report.is_complete());
        assert_eq!(db.rows("shipments").len(), 27);
        // nine clean batches plus three attempts at the failing one
        assert_eq!(db.insert_calls(), 12);
    }

    #[test]
    fn test_values_are_coerced_for_storage() {
        let data = frame(3);
        let columns = vec![
            ("record_id".to_string(), ColumnType::Varchar(50)),
            ("qty".to_string(), ColumnType::Numeric),
        ];
        let mut db = MemoryDatabase::new();

        let report = BatchLoader::new("shipments", &columns, 10, no_wait(1)).load(&data, &mut db);

        let rows = db.rows("shipments");
        assert_eq!(rows[0][1], SqlValue::Number(Some(0.0)));
        assert_eq!(rows[1][1], SqlValue::Number(None));
        assert_eq!(rows[2][1], SqlValue::Number(None));
        assert_eq!(report.coerced_nulls, 1);
    }

    #[test]
    fn test_bounded_text_is_truncated() {
        let mut coercions = Coercions::default();
        let value = coerce(Some("abcdef"), ColumnType::Varchar(4), &mut coercions);
        assert_eq!(value, SqlValue::Text(Some("abcd".to_string())));
        assert_eq!(coercions.truncated, 1);

        let value = coerce(Some("abc"), ColumnType::Varchar(4), &mut coercions);
        assert_eq!(value, SqlValue::Text(Some("abc".to_string())));
        assert_eq!(coercions.truncated, 1);
    }
}
