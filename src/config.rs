//! Configuration management and validation.
//!
//! Provides configuration structures for run parameters, type inference
//! thresholds, batch loading and database connection settings. Values are
//! layered: defaults, then an optional TOML file, then CLI overrides.

use crate::constants::defaults;
use crate::error::{LoaderError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Type inference thresholds used when building the destination table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Non-null values sampled per column
    pub sample_size: usize,

    /// Leading sample values probed for numeric parsing
    pub numeric_probe_size: usize,

    /// Parse-success ratio that must be exceeded to classify numeric
    pub numeric_ratio: f64,

    /// Max observed length at or above which a column is unbounded text
    pub text_length_threshold: usize,

    /// Clamp bounds for bounded text columns
    pub varchar_min: usize,
    pub varchar_max: usize,

    /// Headroom applied to the observed max length
    pub varchar_scale: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            sample_size: defaults::TYPE_SAMPLE_SIZE,
            numeric_probe_size: defaults::NUMERIC_PROBE_SIZE,
            numeric_ratio: defaults::NUMERIC_RATIO,
            text_length_threshold: defaults::TEXT_LENGTH_THRESHOLD,
            varchar_min: defaults::VARCHAR_MIN,
            varchar_max: defaults::VARCHAR_MAX,
            varchar_scale: defaults::VARCHAR_SCALE,
        }
    }
}

/// Batch upload settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Rows per uploaded batch
    pub batch_size: usize,

    /// Attempts per batch before it is abandoned
    pub max_attempts: u32,

    /// Base backoff; the delay after the n-th failure is base * 2^n
    pub backoff_base_ms: u64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::BATCH_SIZE,
            max_attempts: defaults::MAX_ATTEMPTS,
            backoff_base_ms: defaults::BACKOFF_BASE_MS,
        }
    }
}

impl LoadConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

/// Global configuration for a loader run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Root of the spreadsheet export tree
    pub input_dir: PathBuf,

    /// Destination table, dropped and recreated every run
    pub table_name: String,

    /// 0-based sheet row holding the real header
    pub header_row: usize,

    /// Case-insensitive substring marking the preferred sheet
    pub sheet_marker: String,

    /// Accepted spreadsheet extensions (case-insensitive, without dot)
    pub extensions: Vec<String>,

    /// Minimum similarity (0..=1) for a fuzzy header match
    pub fuzzy_cutoff: f64,

    /// Directory receiving the per-run log file
    pub log_dir: PathBuf,

    /// Number of leading columns covered by the completeness report
    pub quality_report_columns: usize,

    /// Analyze headers and mapping then exit without loading
    pub discovery_only: bool,

    /// Run the full pipeline against an in-memory database
    pub dry_run: bool,

    /// Optional path receiving the header mapping as JSON
    pub mapping_report: Option<PathBuf>,

    pub inference: InferenceConfig,

    pub load: LoadConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(defaults::INPUT_DIR),
            table_name: defaults::TABLE_NAME.to_string(),
            header_row: defaults::HEADER_ROW,
            sheet_marker: defaults::SHEET_MARKER.to_string(),
            extensions: defaults::EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            fuzzy_cutoff: defaults::FUZZY_CUTOFF,
            log_dir: PathBuf::from(defaults::LOG_DIR),
            quality_report_columns: defaults::QUALITY_REPORT_COLUMNS,
            discovery_only: false,
            dry_run: false,
            mapping_report: None,
            inference: InferenceConfig::default(),
            load: LoadConfig::default(),
        }
    }
}

impl LoaderConfig {
    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            LoaderError::configuration(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&text).map_err(|e| {
            LoaderError::configuration(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Set the input directory
    pub fn with_input_dir(mut self, input_dir: impl Into<PathBuf>) -> Self {
        self.input_dir = input_dir.into();
        self
    }

    /// Set the destination table name
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Set the header row offset
    pub fn with_header_row(mut self, header_row: usize) -> Self {
        self.header_row = header_row;
        self
    }

    /// Set the fuzzy match cutoff
    pub fn with_fuzzy_cutoff(mut self, cutoff: f64) -> Self {
        self.fuzzy_cutoff = cutoff;
        self
    }

    /// Set the upload batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.load.batch_size = batch_size;
        self
    }

    /// Set retry attempts and backoff base for batch uploads
    pub fn with_retry(mut self, max_attempts: u32, backoff_base_ms: u64) -> Self {
        self.load.max_attempts = max_attempts;
        self.load.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Set the log directory
    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    /// Enable discovery only mode
    pub fn with_discovery_only(mut self) -> Self {
        self.discovery_only = true;
        self
    }

    /// Enable dry run mode
    pub fn with_dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Write the mapping report to the given path
    pub fn with_mapping_report(mut self, path: impl Into<PathBuf>) -> Self {
        self.mapping_report = Some(path.into());
        self
    }

    /// Reject values that would make the run meaningless
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(LoaderError::configuration("table name must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.fuzzy_cutoff) {
            return Err(LoaderError::configuration(format!(
                "fuzzy cutoff must be within 0..=1, got {}",
                self.fuzzy_cutoff
            )));
        }
        if self.extensions.is_empty() {
            return Err(LoaderError::configuration(
                "at least one spreadsheet extension is required",
            ));
        }
        if self.load.batch_size == 0 {
            return Err(LoaderError::configuration("batch size must be positive"));
        }
        if self.load.max_attempts == 0 {
            return Err(LoaderError::configuration("max attempts must be positive"));
        }
        let inference = &self.inference;
        if inference.sample_size == 0 || inference.numeric_probe_size == 0 {
            return Err(LoaderError::configuration(
                "type inference sample sizes must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&inference.numeric_ratio) {
            return Err(LoaderError::configuration(format!(
                "numeric ratio must be within 0..=1, got {}",
                inference.numeric_ratio
            )));
        }
        if inference.varchar_min == 0 || inference.varchar_min > inference.varchar_max {
            return Err(LoaderError::configuration(format!(
                "invalid varchar bounds {}..={}",
                inference.varchar_min, inference.varchar_max
            )));
        }
        Ok(())
    }
}

/// Connection settings for the destination database
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

impl DatabaseConfig {
    /// Seed the environment from an env file (if present) and read settings
    pub fn load(env_file: &Path) -> Result<Self> {
        match dotenvy::from_path(env_file) {
            Ok(()) => debug!("Loaded environment from {}", env_file.display()),
            Err(e) if e.not_found() => {
                debug!("No env file at {}, using process environment", env_file.display())
            }
            Err(e) => {
                return Err(LoaderError::configuration(format!(
                    "Failed to read env file '{}': {}",
                    env_file.display(),
                    e
                )));
            }
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| LoaderError::MissingCredential {
                    name: name.to_string(),
                })
        };

        let user = required("DB_USER")?;
        let password = required("DB_PASS")?;
        let host = required("DB_HOST")?;

        let database = lookup("DB_NAME")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| defaults::DB_NAME.to_string());

        let port = match lookup("DB_PORT") {
            Some(raw) if !raw.trim().is_empty() => raw.trim().parse::<u16>().map_err(|_| {
                LoaderError::configuration(format!("DB_PORT is not a valid port: {}", raw))
            })?,
            _ => defaults::DB_PORT,
        };

        Ok(Self {
            host,
            port,
            user,
            password,
            database,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = LoaderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.header_row, 1);
        assert_eq!(config.load.batch_size, 25_000);
        assert_eq!(config.fuzzy_cutoff, 0.80);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(LoaderConfig::default().with_batch_size(0).validate().is_err());
        assert!(
            LoaderConfig::default()
                .with_fuzzy_cutoff(1.5)
                .validate()
                .is_err()
        );
        assert!(LoaderConfig::default().with_table_name(" ").validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("loader.toml");
        std::fs::write(
            &path,
            "table_name = \"exports\"\nfuzzy_cutoff = 0.9\n\n[load]\nbatch_size = 500\n",
        )
        .unwrap();

        let config = LoaderConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.table_name, "exports");
        assert_eq!(config.fuzzy_cutoff, 0.9);
        assert_eq!(config.load.batch_size, 500);
        assert_eq!(config.load.max_attempts, defaults::MAX_ATTEMPTS);
        assert_eq!(config.header_row, defaults::HEADER_ROW);
    }

    #[test]
    fn test_database_config_requires_credentials() {
        let result = DatabaseConfig::from_lookup(lookup_from(&[
            ("DB_USER", "loader"),
            ("DB_HOST", "db.internal"),
        ]));
        match result {
            Err(LoaderError::MissingCredential { name }) => assert_eq!(name, "DB_PASS"),
            other => panic!("Expected MissingCredential, got {:?}", other),
        }
    }

    #[test]
    fn test_database_config_defaults_and_redaction() {
        let config = DatabaseConfig::from_lookup(lookup_from(&[
            ("DB_USER", "loader"),
            ("DB_PASS", "s3cret"),
            ("DB_HOST", "db.internal"),
        ]))
        .unwrap();

        assert_eq!(config.database, defaults::DB_NAME);
        assert_eq!(config.port, defaults::DB_PORT);
        assert!(!format!("{:?}", config).contains("s3cret"));
    }

    #[test]
    fn test_database_port_must_parse() {
        let result = DatabaseConfig::from_lookup(lookup_from(&[
            ("DB_USER", "loader"),
            ("DB_PASS", "pw"),
            ("DB_HOST", "db"),
            ("DB_PORT", "not-a-port"),
        ]));
        assert!(matches!(result, Err(LoaderError::Configuration { .. })));
    }
}
