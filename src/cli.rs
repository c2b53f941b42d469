//! Command-line interface components.

use crate::config::{DatabaseConfig, LoaderConfig};
use crate::constants::defaults;
use crate::database::{MemoryDatabase, PostgresDatabase, SqlExecutor};
use crate::logging::{LogLevel, init_run_log};
use crate::models::RunSummary;
use crate::processor::{Analysis, IngestPipeline, RunContext};
use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{Dispatch, error, info};

#[derive(Parser, Debug)]
#[command(name = "shipment_loader")]
#[command(
    about = "Reconcile heterogeneous trade-shipment spreadsheets into one database table"
)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Root of the spreadsheet export tree (default: Final_Download)
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: Option<PathBuf>,

    /// TOML configuration file; command-line flags override its values
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Env file seeding the DB_* connection settings
    #[arg(long, value_name = "FILE", default_value = defaults::ENV_FILE)]
    pub env_file: PathBuf,

    /// Destination table, dropped and recreated on every run
    #[arg(short, long)]
    pub table: Option<String>,

    /// Rows per uploaded batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Minimum similarity (0..=1) for a fuzzy header match
    #[arg(long)]
    pub fuzzy_cutoff: Option<f64>,

    /// 0-based sheet row holding the column headers
    #[arg(long)]
    pub header_row: Option<usize>,

    /// Directory for the per-run log file
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Discovery mode: analyze headers and mapping then exit (no database access)
    #[arg(long)]
    pub discovery_only: bool,

    /// Run the full pipeline against an in-memory database
    #[arg(long, conflicts_with = "discovery_only")]
    pub dry_run: bool,

    /// Write the header mapping as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub mapping_report: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Defaults, then the TOML file, then explicit flags
    pub fn build_config(&self) -> crate::Result<LoaderConfig> {
        let mut config = match &self.config {
            Some(path) => LoaderConfig::from_toml_file(path)?,
            None => LoaderConfig::default(),
        };

        if let Some(input_dir) = &self.input_dir {
            config = config.with_input_dir(input_dir);
        }
        if let Some(table) = &self.table {
            config = config.with_table_name(table);
        }
        if let Some(batch_size) = self.batch_size {
            config = config.with_batch_size(batch_size);
        }
        if let Some(cutoff) = self.fuzzy_cutoff {
            config = config.with_fuzzy_cutoff(cutoff);
        }
        if let Some(header_row) = self.header_row {
            config = config.with_header_row(header_row);
        }
        if let Some(log_dir) = &self.log_dir {
            config = config.with_log_dir(log_dir);
        }
        if let Some(path) = &self.mapping_report {
            config = config.with_mapping_report(path);
        }
        if self.discovery_only {
            config = config.with_discovery_only();
        }
        if self.dry_run {
            config = config.with_dry_run();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_flags(self.verbose, self.quiet)
    }
}

/// Main command runner.
///
/// 1. Build and validate configuration, open the run log
/// 2. Check database credentials unless no database is needed
/// 3. Run the pipeline and print the summary
pub fn run(args: Args) -> Result<RunSummary> {
    let start_time = Instant::now();
    let config = args.build_config().context("Invalid configuration")?;
    let run_log = init_run_log(&config.log_dir, args.log_level())
        .with_context(|| format!("Failed to create log file in {}", config.log_dir.display()))?;
    let dispatch = run_log.dispatch.clone();

    tracing::dispatcher::with_default(&dispatch, || {
        info!("Starting shipment loader");
        info!("Log file: {}", run_log.path.display());
    });

    let needs_database = !config.discovery_only && !config.dry_run;
    let credentials = if needs_database {
        match DatabaseConfig::load(&args.env_file) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                log_error(&dispatch, &e);
                return Err(e).context("Database settings unavailable");
            }
        }
    } else {
        None
    };

    let context = RunContext::new(config.clone(), dispatch.clone()).with_progress(!args.quiet);
    let pipeline = IngestPipeline::new(context);

    if config.discovery_only {
        let analysis = pipeline.analyze().inspect_err(|e| log_error(&dispatch, e))?;
        print_mapping(&analysis);
        let mut summary = analysis.summary();
        summary.processing_time_ms = start_time.elapsed().as_millis();
        pipeline.log_summary(&summary);
        print_summary(&summary, &run_log.path);
        return Ok(summary);
    }

    let mut db: Box<dyn SqlExecutor> = match credentials {
        Some(credentials) => Box::new(PostgresDatabase::new(credentials)?),
        None => {
            tracing::dispatcher::with_default(&dispatch, || {
                info!("Dry run: loading into an in-memory database")
            });
            Box::new(MemoryDatabase::new())
        }
    };

    let summary = pipeline
        .run(&mut *db)
        .inspect_err(|e| log_error(&dispatch, e))?;
    print_summary(&summary, &run_log.path);
    Ok(summary)
}

/// Record a run-ending error in the run log
fn log_error(dispatch: &Dispatch, e: &dyn std::fmt::Display) {
    tracing::dispatcher::with_default(dispatch, || error!("{}", e));
}

/// Print every raw header and where it maps
pub fn print_mapping(analysis: &Analysis) {
    println!("\n{}", "Header mapping".bright_green().bold());
    for (raw, decision) in analysis.mapping.iter() {
        let strategy = match decision.strategy {
            Some(strategy) => format!("{:?}", strategy).to_lowercase(),
            None => "unmapped".to_string(),
        };
        let line = format!("  {:<40} -> {:<30} [{}]", raw, decision.target, strategy);
        if decision.is_mapped() {
            println!("{}", line);
        } else {
            println!("{}", line.yellow());
        }
    }

    let stats = analysis.mapping.stats();
    println!(
        "  {} alias, {} normalized, {} fuzzy, {} unmapped",
        stats.alias.to_string().bright_white().bold(),
        stats.normalized.to_string().bright_white().bold(),
        stats.fuzzy.to_string().bright_white().bold(),
        stats.unmapped.to_string().bright_yellow().bold()
    );
}

/// Print the end-of-run summary
pub fn print_summary(summary: &RunSummary, log_path: &Path) {
    println!("\n{}", "Run summary".bright_green().bold());
    println!(
        "  {} {} discovered, {} extracted, {} skipped",
        "Files:".bright_cyan(),
        summary.files_discovered.to_string().bright_white().bold(),
        summary.files_extracted,
        summary.files_skipped
    );
    println!(
        "  {} {} distinct headers in {} patterns",
        "Headers:".bright_cyan(),
        summary.distinct_headers,
        summary.header_patterns
    );

    if summary.total_rows > 0 {
        println!(
            "  {} {} rows x {} columns",
            "Dataset:".bright_cyan(),
            summary.total_rows.to_string().bright_white().bold(),
            summary.total_columns
        );
    }

    if let Some(load) = &summary.load {
        let persisted = format!("{}/{}", load.persisted_rows, load.total_rows);
        let persisted = if load.is_complete() {
            persisted.bright_green()
        } else {
            persisted.bright_red()
        };
        println!("  {} {} rows persisted", "Upload:".bright_cyan(), persisted);
        if !load.failed_batches.is_empty() {
            println!(
                "  {} {:?}",
                "Failed batches:".bright_red(),
                load.failed_batches
            );
        }
    }

    println!(
        "  {} {:.2}s",
        "Elapsed:".bright_cyan(),
        summary.processing_time_ms as f64 / 1000.0
    );
    println!("  {} {}", "Log file:".bright_cyan(), log_path.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "shipment_loader",
            "exports",
            "--table",
            "trade",
            "--batch-size",
            "500",
            "--fuzzy-cutoff",
            "0.9",
            "--dry-run",
        ]);
        let config = args.build_config().unwrap();

        assert_eq!(config.input_dir, PathBuf::from("exports"));
        assert_eq!(config.table_name, "trade");
        assert_eq!(config.load.batch_size, 500);
        assert_eq!(config.fuzzy_cutoff, 0.9);
        assert!(config.dry_run);
        assert_eq!(args.env_file, PathBuf::from(defaults::ENV_FILE));
    }

    #[test]
    fn test_invalid_flag_values_rejected() {
        let args = Args::parse_from(["shipment_loader", "--batch-size", "0"]);
        assert!(args.build_config().is_err());
    }

    #[test]
    fn test_discovery_and_dry_run_conflict() {
        let result = Args::try_parse_from(["shipment_loader", "--discovery-only", "--dry-run"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_file_then_flags() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("loader.toml");
        std::fs::write(&path, "table_name = \"from_file\"\nheader_row = 3\n").unwrap();

        let args = Args::parse_from([
            "shipment_loader",
            "--config",
            path.to_str().unwrap(),
            "--header-row",
            "2",
        ]);
        let config = args.build_config().unwrap();
        assert_eq!(config.table_name, "from_file");
        assert_eq!(config.header_row, 2);
    }

    #[test]
    fn test_dry_run_summary_reaches_log_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let input = temp_dir.path().join("exports");
        let log_dir = temp_dir.path().join("logs");
        crate::processor::tests::fixtures::write_export(
            &input.join("jan.xlsx"),
            &["Shipper Name", "QTY"],
            &[vec!["Acme", "3"]],
        );

        let args = Args::parse_from([
            "shipment_loader",
            input.to_str().unwrap(),
            "--log-dir",
            log_dir.to_str().unwrap(),
            "--dry-run",
        ]);
        let summary = run(args).unwrap();
        assert_eq!(summary.total_rows, 1);

        let log_file = std::fs::read_dir(&log_dir)
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        let contents = std::fs::read_to_string(log_file).unwrap();
        assert!(contents.contains("PROCESSING COMPLETE"));
        assert!(contents.contains("Total rows: 1"));
        assert!(contents.contains("Elapsed time:"));
    }
}
