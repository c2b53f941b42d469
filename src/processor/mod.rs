//! Ingestion pipeline.
//!
//! Runs the load strictly in phase order: discovery, header inventory,
//! mapping, per-file extraction, combination, then table creation and
//! batched upload. The header mapping is built once from the whole corpus
//! before any file is extracted.

pub mod discovery;
pub mod extract;
pub mod quality;

#[cfg(test)]
pub mod tests;

use self::{discovery::FileDiscovery, extract::FileExtractor, quality::combine_frames};

use crate::config::LoaderConfig;
use crate::constants::{defaults, provenance};
use crate::database::SqlExecutor;
use crate::error::{LoaderError, Result};
use crate::header::HeaderInventory;
use crate::loader::load_dataset;
use crate::models::{QualityReport, RunSummary, SourceFile};
use crate::schema::{HeaderMapping, SchemaMapper, UnifiedSchema};
use crate::workbook::WorkbookReader;

use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::DataFrame;
use std::time::Instant;
use tracing::{Dispatch, debug, error, info, warn};

/// Everything a run needs, passed explicitly rather than held globally
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: LoaderConfig,
    pub dispatch: Dispatch,
    pub show_progress: bool,
}

impl RunContext {
    pub fn new(config: LoaderConfig, dispatch: Dispatch) -> Self {
        Self {
            config,
            dispatch,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}

/// Result of the discovery phases
#[derive(Debug, Clone)]
pub struct Analysis {
    pub files: Vec<SourceFile>,
    pub inventory: HeaderInventory,
    pub mapping: HeaderMapping,
    pub final_columns: Vec<String>,
}

impl Analysis {
    /// Run summary covering the discovery phases only
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            files_discovered: self.files.len(),
            distinct_headers: self.inventory.headers().len(),
            header_patterns: self.inventory.pattern_count(),
            ..RunSummary::default()
        }
    }
}

/// Combined dataset ready for loading
#[derive(Debug, Clone)]
pub struct Dataset {
    pub frame: DataFrame,
    pub quality: QualityReport,
    pub files_extracted: usize,
    pub files_skipped: usize,
}

/// The end-to-end loader
#[derive(Debug)]
pub struct IngestPipeline {
    context: RunContext,
    schema: UnifiedSchema,
    reader: WorkbookReader,
}

impl IngestPipeline {
    /// Create a pipeline over the built-in schema
    pub fn new(context: RunContext) -> Self {
        Self::with_schema(context, UnifiedSchema::standard())
    }

    pub fn with_schema(context: RunContext, schema: UnifiedSchema) -> Self {
        let reader = WorkbookReader::new(context.config.header_row, &context.config.sheet_marker);
        Self {
            context,
            schema,
            reader,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.context.config
    }

    /// Discover files, inventory their headers and build the mapping
    pub fn analyze(&self) -> Result<Analysis> {
        self.in_context(|| {
            let config = &self.context.config;
            info!("Processing folder: {}", config.input_dir.display());

            let files = FileDiscovery::new(&config.input_dir, config.extensions.clone())
                .discover(&self.reader)?;
            if files.is_empty() {
                error!("No Excel files found in {}", config.input_dir.display());
                return Err(LoaderError::NoInputFiles {
                    path: config.input_dir.clone(),
                });
            }

            info!("Analyzing header variations...");
            let inventory = HeaderInventory::collect(&files, &self.reader);
            inventory.log_summary(defaults::TOP_HEADER_PATTERNS);

            let mapping =
                SchemaMapper::new(&self.schema, config.fuzzy_cutoff).build(inventory.headers());
            for raw in mapping.unmapped() {
                debug!("Unmapped header kept as-is: '{}'", raw);
            }

            if let Some(path) = &config.mapping_report {
                std::fs::write(path, mapping.to_json()?)?;
                info!("Wrote mapping report to {}", path.display());
            }

            Ok(Analysis {
                files,
                inventory,
                mapping,
                final_columns: self.schema.final_columns(),
            })
        })
    }

    /// Extract every file against the shared mapping and combine them
    pub fn extract(&self, analysis: &Analysis) -> Result<Dataset> {
        self.in_context(|| {
            let extractor =
                FileExtractor::new(&self.reader, &analysis.mapping, &analysis.final_columns);
            let progress = self.progress_bar(analysis.files.len() as u64, "Extracting");

            let mut frames = Vec::with_capacity(analysis.files.len());
            let mut skipped = 0;
            let total = analysis.files.len();

            for (i, file) in analysis.files.iter().enumerate() {
                info!("Processing file {}/{}: {}", i + 1, total, file.file_name);
                progress.set_message(file.file_name.clone());

                let processed_at = chrono::Local::now()
                    .format(provenance::TIMESTAMP_FORMAT)
                    .to_string();
                match extractor.extract(file, &processed_at) {
                    Ok(Some(frame)) => frames.push(frame),
                    Ok(None) => skipped += 1,
                    Err(e) => {
                        error!("[!] Failed to process {}: {}", file.file_name, e);
                        skipped += 1;
                    }
                }
                progress.inc(1);
            }
            progress.finish_and_clear();

            if frames.is_empty() {
                error!("No valid data found in any files");
                return Err(LoaderError::NoUsableData { file_count: total });
            }

            let files_extracted = frames.len();
            info!("Combining {} dataframes...", files_extracted);
            let frame = combine_frames(frames)?;

            let quality =
                QualityReport::from_frame(&frame, self.context.config.quality_report_columns)?;
            quality.log();

            Ok(Dataset {
                frame,
                quality,
                files_extracted,
                files_skipped: skipped,
            })
        })
    }

    /// Run the whole pipeline, loading into `db`
    pub fn run(&self, db: &mut dyn SqlExecutor) -> Result<RunSummary> {
        let start_time = Instant::now();
        let analysis = self.analyze()?;
        let mut summary = analysis.summary();

        if self.context.config.discovery_only {
            self.in_context(|| info!("Discovery only: skipping extraction and upload"));
            summary.processing_time_ms = start_time.elapsed().as_millis();
            self.log_summary(&summary);
            return Ok(summary);
        }

        let dataset = self.extract(&analysis)?;
        summary.files_extracted = dataset.files_extracted;
        summary.files_skipped = dataset.files_skipped;
        summary.total_rows = dataset.quality.total_rows;
        summary.total_columns = dataset.quality.total_columns;

        let report = self.in_context(|| {
            info!(
                "Uploading to table \"{}\"...",
                self.context.config.table_name
            );
            let progress = self.progress_bar(0, "Uploading");
            load_dataset(&dataset.frame, &self.context.config, db, progress)
        })?;

        if !report.is_complete() {
            self.in_context(|| {
                warn!(
                    "Only {}/{} rows persisted; failed batches: {:?}",
                    report.persisted_rows, report.total_rows, report.failed_batches
                )
            });
        }
        summary.load = Some(report);
        summary.processing_time_ms = start_time.elapsed().as_millis();

        self.in_context(|| info!("Data upload complete"));
        self.log_summary(&summary);
        Ok(summary)
    }

    /// Write the end-of-run summary to the run's log stream
    pub fn log_summary(&self, summary: &RunSummary) {
        self.in_context(|| {
            info!("{}", "=".repeat(60));
            info!("PROCESSING COMPLETE");
            info!(
                "Files: {} discovered, {} extracted, {} skipped",
                summary.files_discovered, summary.files_extracted, summary.files_skipped
            );
            info!(
                "Headers: {} distinct in {} patterns",
                summary.distinct_headers, summary.header_patterns
            );
            info!("Total rows: {}", summary.total_rows);
            info!("Total columns: {}", summary.total_columns);
            if let Some(load) = &summary.load {
                info!(
                    "Rows persisted: {}/{} ({} failed batches)",
                    load.persisted_rows,
                    load.total_rows,
                    load.failed_batches.len()
                );
            }
            info!(
                "Elapsed time: {:.2}s",
                summary.processing_time_ms as f64 / 1000.0
            );
            info!("{}", "=".repeat(60));
        });
    }

    /// Run `f` with this run's dispatch as the default subscriber
    fn in_context<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.context.dispatch, f)
    }

    fn progress_bar(&self, total: u64, message: &str) -> ProgressBar {
        if !self.context.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(message.to_string());
        pb
    }
}
