//! Per-run logging setup.
//!
//! Each run gets its own `tracing` dispatch with two layers: a console
//! layer on stderr and a plain-text layer writing to a log file named
//! after the run's start time.

use crate::constants::defaults;
use crate::error::Result;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::Dispatch;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

/// Console verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Quiet,
    Normal,
    Verbose,
}

impl LogLevel {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            LogLevel::Quiet
        } else if verbose {
            LogLevel::Verbose
        } else {
            LogLevel::Normal
        }
    }

    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Quiet => "warn",
            LogLevel::Normal => "info",
            LogLevel::Verbose => "debug",
        }
    }
}

/// A run's dispatch and the file it writes to
#[derive(Debug, Clone)]
pub struct RunLog {
    pub dispatch: Dispatch,
    pub path: PathBuf,
}

/// Log file path for a run started at `started_at` (unix seconds)
pub fn log_file_path(log_dir: &Path, started_at: i64) -> PathBuf {
    log_dir.join(format!("{}_{}.log", defaults::LOG_FILE_PREFIX, started_at))
}

/// Build the dispatch for one run, creating its log file
pub fn init_run_log(log_dir: &Path, level: LogLevel) -> Result<RunLog> {
    std::fs::create_dir_all(log_dir)?;
    let path = log_file_path(log_dir, chrono::Local::now().timestamp());
    let file = File::create(&path)?;

    // RUST_LOG wins over the CLI flags
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("shipment_loader={}", level.as_filter()))
    });

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stderr),
        )
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        );

    Ok(RunLog {
        dispatch: Dispatch::new(subscriber),
        path,
    })
}

/// Dispatch that drops everything, for library use without a log file
pub fn silent() -> Dispatch {
    Dispatch::none()
}
