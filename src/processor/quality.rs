//! Combined dataset assembly and data-quality reporting

use crate::constants::provenance;
use crate::error::{LoaderError, Result};
use crate::models::{ColumnCompleteness, QualityReport};
use polars::prelude::*;
use tracing::info;

/// Stack per-file frames into one dataset; every frame must carry the
/// same column set in the same order
pub fn combine_frames(frames: Vec<DataFrame>) -> Result<DataFrame> {
    let mut iter = frames.into_iter();
    let mut combined = iter
        .next()
        .ok_or(LoaderError::NoUsableData { file_count: 0 })?;

    for frame in iter {
        combined.vstack_mut(&frame)?;
    }

    info!(
        "Combined dataset: {} rows x {} columns",
        combined.height(),
        combined.width()
    );
    Ok(combined)
}

impl QualityReport {
    /// Row and column counts, fully-empty rows and leading column
    /// completeness
    pub fn from_frame(frame: &DataFrame, report_columns: usize) -> Result<Self> {
        let height = frame.height();

        let mut has_data = BooleanChunked::full("has_data".into(), false, height);
        for column in frame.get_columns() {
            if provenance::ALL.contains(&column.name().as_str()) {
                continue;
            }
            has_data = &has_data | &column.is_not_null();
        }
        let empty_rows = has_data.into_iter().filter(|v| *v != Some(true)).count();

        let completeness = frame
            .get_columns()
            .iter()
            .take(report_columns)
            .map(|column| {
                let non_null = height - column.null_count();
                let percent = if height == 0 {
                    0.0
                } else {
                    non_null as f64 / height as f64 * 100.0
                };
                ColumnCompleteness {
                    column: column.name().to_string(),
                    non_null,
                    percent,
                }
            })
            .collect();

        Ok(Self {
            total_rows: height,
            total_columns: frame.width(),
            empty_rows,
            completeness,
        })
    }

    pub fn log(&self) {
        info!("Data quality report:");
        info!("  Total rows: {}", self.total_rows);
        info!("  Total columns: {}", self.total_columns);
        info!("  Empty rows: {}", self.empty_rows);
        for entry in &self.completeness {
            info!(
                "  {}: {:.1}% complete ({}/{})",
                entry.column, entry.percent, entry.non_null, self.total_rows
            );
        }
    }
}
