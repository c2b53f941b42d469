//! Column type inference from sampled values

use crate::config::InferenceConfig;
use crate::constants::provenance;
use crate::database::ColumnType;
use crate::error::{LoaderError, Result};
use polars::prelude::*;
use tracing::{debug, warn};

/// Parse a value as a number, tolerating thousands separators
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").trim().parse::<f64>().ok()
}

/// Chooses a storage type per column from a sample of its values
#[derive(Debug, Clone)]
pub struct TypeInferencer {
    config: InferenceConfig,
}

impl TypeInferencer {
    pub fn new(config: InferenceConfig) -> Self {
        Self { config }
    }

    /// Classify a column from its non-null values in dataset order
    pub fn infer_values<'a, I>(&self, values: I) -> ColumnType
    where
        I: IntoIterator<Item = &'a str>,
    {
        let sample: Vec<&str> = values.into_iter().take(self.config.sample_size).collect();
        if sample.is_empty() {
            return ColumnType::Text;
        }

        let probe = &sample[..sample.len().min(self.config.numeric_probe_size)];
        let numeric = probe.iter().filter(|v| parse_number(v).is_some()).count();
        if numeric as f64 / probe.len() as f64 > self.config.numeric_ratio {
            return ColumnType::Numeric;
        }

        let max_len = sample.iter().map(|v| v.chars().count()).max().unwrap_or(0);
        self.text_type(max_len)
    }

    /// Text type for values of at most `max_len` characters
    fn text_type(&self, max_len: usize) -> ColumnType {
        if max_len == 0 || max_len >= self.config.text_length_threshold {
            ColumnType::Text
        } else {
            let scaled = (max_len as f64 * self.config.varchar_scale) as usize;
            ColumnType::Varchar(scaled.clamp(self.config.varchar_min, self.config.varchar_max))
        }
    }

    /// Provenance columns are always text, sized from every value so no
    /// label is ever coerced or truncated
    fn infer_provenance(&self, column: &Column) -> Result<ColumnType> {
        let values = column.str().map_err(|e| LoaderError::TypeInference {
            column: column.name().to_string(),
            reason: e.to_string(),
        })?;
        let max_len = values
            .into_iter()
            .flatten()
            .map(|v| v.chars().count())
            .max()
            .unwrap_or(0);
        Ok(self.text_type(max_len))
    }

    /// Classify one string column of the combined dataset
    pub fn infer_column(&self, column: &Column) -> Result<ColumnType> {
        let values = column.str().map_err(|e| LoaderError::TypeInference {
            column: column.name().to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.infer_values(values.into_iter().flatten()))
    }

    /// Storage type for every column; a column that cannot be inferred
    /// falls back to unbounded text
    pub fn infer_frame(&self, frame: &DataFrame) -> Vec<(String, ColumnType)> {
        frame
            .get_columns()
            .iter()
            .map(|column| {
                let name = column.name().to_string();
                let inferred = if provenance::ALL.contains(&name.as_str()) {
                    self.infer_provenance(column)
                } else {
                    self.infer_column(column)
                };
                let column_type = match inferred {
                    Ok(column_type) => column_type,
                    Err(e) => {
                        warn!("[!] Failed to detect type for column '{}': {}", name, e);
                        ColumnType::Text
                    }
                };
                debug!("Column '{}' -> {}", name, column_type);
                (name, column_type)
            })
            .collect()
    }
}
