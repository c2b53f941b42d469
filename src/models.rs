//! Data models shared across the loader pipeline.

use serde::Serialize;
use std::path::PathBuf;

/// A discovered spreadsheet and where it sits in the export tree
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Bare file name, stamped into `source_file`
    pub file_name: String,
    /// Relative parent folders joined with `/`, stamped into `source_folder`
    pub folder: String,
    /// Sheet selected when the file was probed
    pub sheet: String,
}

/// Completeness of a single column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnCompleteness {
    pub column: String,
    pub non_null: usize,
    pub percent: f64,
}

/// Summary statistics for the combined dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityReport {
    pub total_rows: usize,
    pub total_columns: usize,
    /// Rows whose data columns (provenance excluded) are all null
    pub empty_rows: usize,
    pub completeness: Vec<ColumnCompleteness>,
}

/// Outcome of the batch upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub total_rows: usize,
    pub persisted_rows: usize,
    pub batches: usize,
    /// 1-based numbers of batches abandoned after exhausting retries
    pub failed_batches: Vec<usize>,
    /// Numeric-column values that did not parse and were stored as NULL
    pub coerced_nulls: usize,
    /// Bounded-text values cut to the declared length
    pub truncated_values: usize,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed_batches.is_empty() && self.persisted_rows == self.total_rows
    }
}

/// End-of-run statistics
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub files_discovered: usize,
    pub files_extracted: usize,
    pub files_skipped: usize,
    pub distinct_headers: usize,
    pub header_patterns: usize,
    pub total_rows: usize,
    pub total_columns: usize,
    pub load: Option<LoadReport>,
    pub processing_time_ms: u128,
}
