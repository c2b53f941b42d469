//! Shipment Loader Library
//!
//! Reconciles a tree of heterogeneous trade-shipment spreadsheet exports
//! into a single relational table.
//!
//! This library provides tools for:
//! - Discovering `.xlsx`/`.xls` files in arbitrarily nested folders
//! - Inventorying header variants across the whole corpus
//! - Mapping raw headers onto a unified schema (alias, normalized and fuzzy matching)
//! - Aligning every file to one column set with provenance columns
//! - Inferring storage types and loading in retried batches

pub mod cli;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod header;
pub mod loader;
pub mod logging;
pub mod models;
pub mod processor;
pub mod schema;
pub mod workbook;

pub use config::{DatabaseConfig, LoaderConfig};
pub use error::{LoaderError, Result};
pub use processor::{IngestPipeline, RunContext};
