//! File discovery for spreadsheet export trees
//!
//! Walks the input directory recursively, keeps files with an accepted
//! spreadsheet extension and labels each with the folder chain it was
//! found under.

use crate::error::{LoaderError, Result};
use crate::models::SourceFile;
use crate::workbook::WorkbookReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// File discovery component for export trees
#[derive(Debug)]
pub struct FileDiscovery {
    root: PathBuf,
    extensions: Vec<String>,
}

impl FileDiscovery {
    /// Create a new file discovery instance
    pub fn new(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            root: root.into(),
            extensions,
        }
    }

    /// Find all candidate spreadsheets, ordered by path
    ///
    /// Export trees are nested arbitrarily deep:
    /// ```text
    /// Final_Download/
    ///   2023/
    ///     Q1/
    ///       jan.xlsx       -> folder "2023/Q1"
    ///   loose.xlsx         -> folder "Final_Download"
    /// ```
    pub fn candidates(&self) -> Result<Vec<SourceFile>> {
        if !self.root.is_dir() {
            return Err(LoaderError::InputNotFound {
                path: self.root.clone(),
            });
        }

        debug!("Searching for spreadsheets in: {}", self.root.display());

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable directory entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.has_accepted_extension(entry.path()) {
                continue;
            }

            let path = entry.path().to_path_buf();
            files.push(SourceFile {
                file_name: entry.file_name().to_string_lossy().into_owned(),
                folder: self.folder_label(&path),
                path,
                sheet: String::new(),
            });
        }

        Ok(files)
    }

    /// Find all spreadsheets that open, recording the sheet each will be
    /// read from. Files that fail to open are warned about and skipped.
    pub fn discover(&self, reader: &WorkbookReader) -> Result<Vec<SourceFile>> {
        let mut files = Vec::new();

        for mut file in self.candidates()? {
            match reader.probe(&file.path) {
                Ok(sheet) => {
                    debug!("{} -> sheet '{}' ({})", file.file_name, sheet, file.folder);
                    file.sheet = sheet;
                    files.push(file);
                }
                Err(e) => warn!("[!] Could not read {}: {}", file.file_name, e),
            }
        }

        info!("Found {} Excel files across all folders", files.len());
        Ok(files)
    }

    fn has_accepted_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Relative parent chain joined with `/`; the root's own name for
    /// files directly under the root
    fn folder_label(&self, path: &Path) -> String {
        let parents: Vec<String> = path
            .strip_prefix(&self.root)
            .ok()
            .and_then(Path::parent)
            .map(|parent| {
                parent
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();

        if parents.is_empty() {
            self.root
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.root.display().to_string())
        } else {
            parents.join("/")
        }
    }
}
