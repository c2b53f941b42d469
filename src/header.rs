//! Header inventory across the whole corpus.
//!
//! Reads only the header row of every discovered file, tallies how many
//! files share each exact header sequence and collects the union of all
//! distinct header strings the mapper has to resolve.

use crate::models::SourceFile;
use crate::workbook::WorkbookReader;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Distinct header strings and header-sequence frequencies
#[derive(Debug, Clone, Default)]
pub struct HeaderInventory {
    patterns: BTreeMap<Vec<String>, usize>,
    headers: BTreeSet<String>,
    files_read: usize,
    files_failed: usize,
}

impl HeaderInventory {
    /// Read the header row of every file; unreadable files are skipped
    pub fn collect(files: &[SourceFile], reader: &WorkbookReader) -> Self {
        let mut inventory = Self::default();

        for file in files {
            match reader.read_headers(&file.path) {
                Ok((_, headers)) => inventory.record(headers),
                Err(e) => {
                    warn!("[!] Failed to read headers from {}: {}", file.file_name, e);
                    inventory.files_failed += 1;
                }
            }
        }

        debug!(
            "Header inventory: {} files read, {} failed",
            inventory.files_read, inventory.files_failed
        );
        inventory
    }

    /// Add one file's header sequence
    pub fn record(&mut self, headers: Vec<String>) {
        self.headers.extend(headers.iter().map(|h| h.trim().to_string()));
        *self.patterns.entry(headers).or_insert(0) += 1;
        self.files_read += 1;
    }

    /// Union of all distinct trimmed header strings
    pub fn headers(&self) -> &BTreeSet<String> {
        &self.headers
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn files_read(&self) -> usize {
        self.files_read
    }

    pub fn files_failed(&self) -> usize {
        self.files_failed
    }

    /// Most frequent header sequences, ties broken by sequence order
    pub fn top_patterns(&self, n: usize) -> Vec<(&[String], usize)> {
        let mut ranked: Vec<_> = self
            .patterns
            .iter()
            .map(|(pattern, count)| (pattern.as_slice(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }

    /// Log pattern and header counts plus the most common patterns
    pub fn log_summary(&self, top_n: usize) {
        info!("Found {} different header patterns", self.pattern_count());
        info!("Total unique columns: {}", self.headers.len());

        for (i, (pattern, count)) in self.top_patterns(top_n).into_iter().enumerate() {
            let preview: Vec<&str> = pattern.iter().take(5).map(String::as_str).collect();
            let ellipsis = if pattern.len() > 5 { ", ..." } else { "" };
            info!(
                "Pattern {} (used in {} files): [{}{}]",
                i + 1,
                count,
                preview.join(", "),
                ellipsis
            );
        }
    }
}
