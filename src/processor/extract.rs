//! Per-file extraction into the unified column set
//!
//! Reads one spreadsheet as text, renames its headers through the shared
//! mapping, aligns the result to the final column list and stamps the
//! provenance columns.

use crate::constants::provenance;
use crate::error::{LoaderError, Result};
use crate::models::SourceFile;
use crate::schema::{HeaderMapping, dedupe_columns, normalize_for_matching, sanitize_column_name};
use crate::workbook::{SheetTable, WorkbookReader};
use polars::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Turns source files into frames with exactly the final columns
#[derive(Debug)]
pub struct FileExtractor<'a> {
    reader: &'a WorkbookReader,
    mapping: &'a HeaderMapping,
    final_columns: &'a [String],
}

impl<'a> FileExtractor<'a> {
    pub fn new(
        reader: &'a WorkbookReader,
        mapping: &'a HeaderMapping,
        final_columns: &'a [String],
    ) -> Self {
        Self {
            reader,
            mapping,
            final_columns,
        }
    }

    /// Read and align one file; `None` when it yields no data rows
    pub fn extract(&self, file: &SourceFile, processed_at: &str) -> Result<Option<DataFrame>> {
        let table = self.reader.read_table(&file.path)?;
        self.align(&table, file, processed_at)
            .map_err(|e| LoaderError::ExtractionFailed {
                path: file.path.clone(),
                reason: e.to_string(),
            })
    }

    /// Align an already-read sheet to the final columns
    pub fn align(
        &self,
        table: &SheetTable,
        file: &SourceFile,
        processed_at: &str,
    ) -> Result<Option<DataFrame>> {
        if table.rows.is_empty() {
            warn!("{} is empty, skipping", file.file_name);
            return Ok(None);
        }

        let renamed = self.target_columns(&table.headers);
        let positions: HashMap<&str, usize> = renamed
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let height = table.rows.len();
        let mut columns = Vec::with_capacity(self.final_columns.len());
        for name in self.data_columns() {
            let column = match positions.get(name.as_str()) {
                Some(&index) => {
                    let values: Vec<Option<String>> =
                        table.rows.iter().map(|row| row[index].clone()).collect();
                    Column::new(name.as_str().into(), values)
                }
                None => Column::full_null(name.as_str().into(), height, &DataType::String),
            };
            columns.push(column);
        }

        let dropped: Vec<&String> = renamed
            .iter()
            .filter(|name| !self.final_columns.contains(name))
            .collect();
        if !dropped.is_empty() {
            debug!(
                "{}: {} columns outside the unified schema dropped: {:?}",
                file.file_name,
                dropped.len(),
                dropped
            );
        }

        let mut frame = DataFrame::new(columns)?;
        frame = self.drop_leaked_headers(frame)?;

        if frame.height() == 0 {
            warn!("{} has no rows left after header cleanup, skipping", file.file_name);
            return Ok(None);
        }

        let height = frame.height();
        frame.with_column(Column::new(
            provenance::SOURCE_FILE.into(),
            vec![file.file_name.as_str(); height],
        ))?;
        frame.with_column(Column::new(
            provenance::SOURCE_FOLDER.into(),
            vec![file.folder.as_str(); height],
        ))?;
        frame.with_column(Column::new(
            provenance::PROCESSED_TIMESTAMP.into(),
            vec![processed_at; height],
        ))?;

        info!(
            "[+] Processed: {} | Rows: {} | Columns: {}",
            file.file_name,
            frame.height(),
            frame.width()
        );
        Ok(Some(frame))
    }

    /// Raw headers mapped, sanitized and made unique, in sheet order
    pub fn target_columns(&self, headers: &[String]) -> Vec<String> {
        let sanitized: Vec<String> = headers
            .iter()
            .map(|raw| sanitize_column_name(self.mapping.resolve(raw)))
            .collect();
        dedupe_columns(&sanitized)
    }

    fn data_columns(&self) -> impl Iterator<Item = &String> {
        self.final_columns
            .iter()
            .filter(|name| !provenance::ALL.contains(&name.as_str()))
    }

    /// Drop rows whose first column repeats that column's own header
    fn drop_leaked_headers(&self, frame: DataFrame) -> Result<DataFrame> {
        let Some(first) = self.data_columns().next() else {
            return Ok(frame);
        };
        let marker = normalize_for_matching(first);

        let mask: BooleanChunked = frame
            .column(first)?
            .str()?
            .into_iter()
            .map(|value| value.is_none_or(|v| v.trim().to_lowercase() != marker))
            .collect();

        let before = frame.height();
        let filtered = frame.filter(&mask)?;
        if filtered.height() < before {
            debug!("Removed {} repeated header rows", before - filtered.height());
        }
        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SchemaMapper, UnifiedSchema};
    use std::path::PathBuf;

    const STAMP: &str = "2024-03-01 10:00:00";

    fn source() -> SourceFile {
        SourceFile {
            path: PathBuf::from("exports/jan.xlsx"),
            file_name: "jan.xlsx".to_string(),
            folder: "exports".to_string(),
            sheet: "Data Sheet".to_string(),
        }
    }

    fn table(headers: &[&str], rows: Vec<Vec<Option<&str>>>) -> SheetTable {
        SheetTable {
            path: PathBuf::from("exports/jan.xlsx"),
            sheet: "Data Sheet".to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|v| v.map(str::to_string)).collect())
                .collect(),
        }
    }

    fn text(frame: &DataFrame, column: &str, row: usize) -> Option<String> {
        frame
            .column(column)
            .unwrap()
            .str()
            .unwrap()
            .get(row)
            .map(str::to_string)
    }

    #[test]
    fn test_rows_align_to_final_columns() {
        let schema = UnifiedSchema::standard();
        let headers = ["Shipper Name", "HS CODE", "Internal Memo"];
        let mapping = SchemaMapper::new(&schema, 0.8).build(headers);
        let final_columns = schema.final_columns();
        let reader = WorkbookReader::new(1, "data sheet");
        let extractor = FileExtractor::new(&reader, &mapping, &final_columns);

        let sheet = table(
            &headers,
            vec![
                vec![Some("Acme"), Some("8471"), Some("call back")],
                vec![Some("Globex"), None, Some("n/a")],
            ],
        );
        let frame = extractor.align(&sheet, &source(), STAMP).unwrap().unwrap();

        let names: Vec<String> = frame
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, final_columns);
        assert!(!names.contains(&"internal_memo".to_string()));

        assert_eq!(frame.height(), 2);
        assert_eq!(text(&frame, "shipper_name", 0).as_deref(), Some("Acme"));
        assert_eq!(text(&frame, "hs_code", 0).as_deref(), Some("8471"));
        assert_eq!(text(&frame, "hs_code", 1), None);
        assert_eq!(frame.column("consignee_name").unwrap().null_count(), 2);

        assert_eq!(text(&frame, "source_file", 1).as_deref(), Some("jan.xlsx"));
        assert_eq!(text(&frame, "source_folder", 0).as_deref(), Some("exports"));
        assert_eq!(text(&frame, "processed_timestamp", 0).as_deref(), Some(STAMP));
    }

    #[test]
    fn test_duplicate_targets_keep_first_occurrence() {
        let schema = UnifiedSchema::standard();
        let headers = ["QTY", "Quantity"];
        let mapping = SchemaMapper::new(&schema, 0.8).build(headers);
        let final_columns = schema.final_columns();
        let reader = WorkbookReader::new(1, "data sheet");
        let extractor = FileExtractor::new(&reader, &mapping, &final_columns);

        let renamed = extractor.target_columns(&["QTY".to_string(), "Quantity".to_string()]);
        assert_eq!(renamed, vec!["qty".to_string(), "qty_1".to_string()]);

        let sheet = table(&headers, vec![vec![Some("5"), Some("7")]]);
        let frame = extractor.align(&sheet, &source(), STAMP).unwrap().unwrap();
        assert_eq!(text(&frame, "qty", 0).as_deref(), Some("5"));
    }

    #[test]
    fn test_leaked_header_rows_removed() {
        let schema = UnifiedSchema::standard();
        let headers = ["Date", "Shipper Name"];
        let mapping = SchemaMapper::new(&schema, 0.8).build(headers);
        let final_columns = schema.final_columns();
        let reader = WorkbookReader::new(1, "data sheet");
        let extractor = FileExtractor::new(&reader, &mapping, &final_columns);

        let sheet = table(
            &headers,
            vec![
                vec![Some("2024-01-02"), Some("Acme")],
                vec![Some(" DATE "), Some("Shipper Name")],
                vec![None, Some("Globex")],
            ],
        );
        let frame = extractor.align(&sheet, &source(), STAMP).unwrap().unwrap();

        assert_eq!(frame.height(), 2);
        assert_eq!(text(&frame, "shipper_name", 1).as_deref(), Some("Globex"));
    }

    #[test]
    fn test_empty_sheet_yields_none() {
        let schema = UnifiedSchema::standard();
        let mapping = SchemaMapper::new(&schema, 0.8).build(["Date"]);
        let final_columns = schema.final_columns();
        let reader = WorkbookReader::new(1, "data sheet");
        let extractor = FileExtractor::new(&reader, &mapping, &final_columns);

        let sheet = table(&["Date"], vec![]);
        assert!(extractor.align(&sheet, &source(), STAMP).unwrap().is_none());
    }
}
