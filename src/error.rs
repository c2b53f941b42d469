//! Error handling for shipment loading operations.
//!
//! Provides error types with context for workbook reading, schema
//! reconciliation, type inference and database loading failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Input directory not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("No spreadsheet files found under: {path}")]
    NoInputFiles { path: PathBuf },

    #[error("No valid data found in any of {file_count} files")]
    NoUsableData { file_count: usize },

    #[error("Could not open workbook {path}: {reason}")]
    WorkbookOpen { path: PathBuf, reason: String },

    #[error("Could not read sheet '{sheet}' in {path}: {reason}")]
    SheetRead {
        path: PathBuf,
        sheet: String,
        reason: String,
    },

    #[error("Header row {row} not found in sheet '{sheet}' of {path}")]
    HeaderRowMissing {
        path: PathBuf,
        sheet: String,
        row: usize,
    },

    #[error("Extraction failed for file: {path} - {reason}")]
    ExtractionFailed { path: PathBuf, reason: String },

    #[error("Type inference failed for column '{column}': {reason}")]
    TypeInference { column: String, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Missing database setting {name} (set it in the environment or the env file)")]
    MissingCredential { name: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Report serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LoaderError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a database error without an underlying source
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    /// Whether this error should stop the run rather than be contained
    /// at a per-file, per-column or per-batch boundary
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InputNotFound { .. }
                | Self::NoInputFiles { .. }
                | Self::NoUsableData { .. }
                | Self::Configuration { .. }
                | Self::MissingCredential { .. }
        )
    }
}

impl From<tokio_postgres::Error> for LoaderError {
    fn from(error: tokio_postgres::Error) -> Self {
        Self::Database {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(LoaderError::configuration("bad cutoff").is_fatal());
        assert!(
            LoaderError::MissingCredential {
                name: "DB_USER".to_string()
            }
            .is_fatal()
        );
        assert!(LoaderError::NoUsableData { file_count: 3 }.is_fatal());

        assert!(!LoaderError::database("connection reset").is_fatal());
        assert!(
            !LoaderError::ExtractionFailed {
                path: PathBuf::from("a.xlsx"),
                reason: "bad cell".to_string()
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = LoaderError::HeaderRowMissing {
            path: PathBuf::from("exports/jan.xlsx"),
            sheet: "Data Sheet".to_string(),
            row: 1,
        };
        let message = err.to_string();
        assert!(message.contains("jan.xlsx"));
        assert!(message.contains("Data Sheet"));
    }
}
