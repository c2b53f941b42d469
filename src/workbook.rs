//! Spreadsheet access.
//!
//! Opens `.xlsx`/`.xls` workbooks with calamine, picks the sheet carrying
//! the shipment data and turns its cells into text. Everything downstream
//! sees only trimmed header strings and optional text values.

use crate::constants::{CELL_DATETIME_FORMAT, NULL_TOKENS};
use crate::error::{LoaderError, Result};
use calamine::{Data, Range, Reader, Sheets, Xlsx, open_workbook_auto};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One sheet read as text: header row plus the data rows below it
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub path: PathBuf,
    pub sheet: String,
    pub headers: Vec<String>,
    /// Row-major cells, each row exactly `headers.len()` wide
    pub rows: Vec<Vec<Option<String>>>,
}

impl SheetTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Reads the data sheet of a workbook at a fixed header offset
#[derive(Debug, Clone)]
pub struct WorkbookReader {
    header_row: usize,
    sheet_marker: String,
}

impl WorkbookReader {
    pub fn new(header_row: usize, sheet_marker: impl Into<String>) -> Self {
        Self {
            header_row,
            sheet_marker: sheet_marker.into().to_lowercase(),
        }
    }

    /// Open the workbook and return the sheet that would be read
    pub fn probe(&self, path: &Path) -> Result<String> {
        let workbook = open_workbook(path)?;
        self.choose_sheet(&workbook, path)
    }

    /// Read only the header row of the selected sheet.
    ///
    /// `.xlsx` sheets are streamed and reading stops past the header row;
    /// other formats have no cell reader and are loaded whole.
    pub fn read_headers(&self, path: &Path) -> Result<(String, Vec<String>)> {
        let mut workbook = open_workbook(path)?;
        let sheet = self.choose_sheet(&workbook, path)?;

        if let Sheets::Xlsx(xlsx) = &mut workbook {
            let headers = self.stream_header_cells(xlsx, path, &sheet)?;
            return Ok((sheet, headers));
        }

        let range = load_range(&mut workbook, path, &sheet)?;
        let headers = self.header_cells(path, &sheet, &range)?;
        Ok((sheet, headers))
    }

    /// Read the header row and every non-empty row below it
    pub fn read_table(&self, path: &Path) -> Result<SheetTable> {
        let (sheet, range) = self.open_sheet(path)?;
        let headers = self.header_cells(path, &sheet, &range)?;
        let width = headers.len();

        let mut rows = Vec::new();
        if let Some((end_row, _)) = range.end() {
            for row in (self.header_row + 1) as u32..=end_row {
                let values: Vec<Option<String>> = (0..width as u32)
                    .map(|col| range.get_value((row, col)).and_then(cell_value))
                    .collect();
                if values.iter().any(Option::is_some) {
                    rows.push(values);
                }
            }
        }

        debug!(
            "Read {} rows x {} columns from '{}' in {}",
            rows.len(),
            width,
            sheet,
            path.display()
        );

        Ok(SheetTable {
            path: path.to_path_buf(),
            sheet,
            headers,
            rows,
        })
    }

    /// Open the workbook and load the preferred sheet
    fn open_sheet(&self, path: &Path) -> Result<(String, Range<Data>)> {
        let mut workbook = open_workbook(path)?;
        let sheet = self.choose_sheet(&workbook, path)?;
        let range = load_range(&mut workbook, path, &sheet)?;
        Ok((sheet, range))
    }

    fn choose_sheet<RS: Read + Seek>(&self, workbook: &Sheets<RS>, path: &Path) -> Result<String> {
        select_sheet(&workbook.sheet_names(), &self.sheet_marker)
            .cloned()
            .ok_or_else(|| LoaderError::WorkbookOpen {
                path: path.to_path_buf(),
                reason: "workbook has no sheets".to_string(),
            })
    }

    /// Header row of an `.xlsx` sheet, parsing cells only up to that row.
    /// The width comes from the sheet's declared dimensions so it agrees
    /// with a full read.
    fn stream_header_cells<RS: Read + Seek>(
        &self,
        xlsx: &mut Xlsx<RS>,
        path: &Path,
        sheet: &str,
    ) -> Result<Vec<String>> {
        let sheet_error = |reason: String| LoaderError::SheetRead {
            path: path.to_path_buf(),
            sheet: sheet.to_string(),
            reason,
        };
        let missing = || LoaderError::HeaderRowMissing {
            path: path.to_path_buf(),
            sheet: sheet.to_string(),
            row: self.header_row,
        };

        let mut cells = xlsx
            .worksheet_cells_reader(sheet)
            .map_err(|e| sheet_error(e.to_string()))?;
        let declared_end_col = cells.dimensions().end.1;
        let header_row = self.header_row as u32;

        let mut first_row = None;
        let mut reached = false;
        let mut found: Vec<(u32, Data)> = Vec::new();
        while let Some(cell) = cells.next_cell().map_err(|e| sheet_error(e.to_string()))? {
            let (row, col) = cell.get_position();
            let value = Data::from(cell.get_value().clone());
            if value == Data::Empty {
                continue;
            }
            first_row.get_or_insert(row);
            if row > header_row {
                reached = true;
                break;
            }
            if row == header_row {
                reached = true;
                found.push((col, value));
            }
        }

        if !reached || first_row.is_some_and(|row| row > header_row) {
            return Err(missing());
        }

        let end_col = found
            .iter()
            .map(|(col, _)| *col)
            .max()
            .unwrap_or(0)
            .max(declared_end_col);
        Ok(header_names(end_col, |col| {
            found
                .iter()
                .find(|(c, _)| *c == col)
                .and_then(|(_, value)| cell_text(value))
        }))
    }

    /// Header strings at the configured absolute row, trimmed, with blank
    /// cells named after their column index
    fn header_cells(&self, path: &Path, sheet: &str, range: &Range<Data>) -> Result<Vec<String>> {
        let missing = || LoaderError::HeaderRowMissing {
            path: path.to_path_buf(),
            sheet: sheet.to_string(),
            row: self.header_row,
        };

        let (start_row, _) = range.start().ok_or_else(missing)?;
        let (end_row, end_col) = range.end().ok_or_else(missing)?;
        let header_row = self.header_row as u32;
        if header_row < start_row || header_row > end_row {
            return Err(missing());
        }

        Ok(header_names(end_col, |col| {
            range.get_value((header_row, col)).and_then(cell_text)
        }))
    }
}

fn open_workbook(path: &Path) -> Result<Sheets<std::io::BufReader<std::fs::File>>> {
    open_workbook_auto(path).map_err(|e| LoaderError::WorkbookOpen {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn load_range<RS: Read + Seek>(
    workbook: &mut Sheets<RS>,
    path: &Path,
    sheet: &str,
) -> Result<Range<Data>> {
    workbook
        .worksheet_range(sheet)
        .map_err(|e| LoaderError::SheetRead {
            path: path.to_path_buf(),
            sheet: sheet.to_string(),
            reason: e.to_string(),
        })
}

/// Trimmed header text for columns `0..=end_col`, blanks named after
/// their column index
fn header_names(end_col: u32, text_at: impl Fn(u32) -> Option<String>) -> Vec<String> {
    (0..=end_col)
        .map(|col| {
            text_at(col)
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| format!("unnamed_{}", col))
        })
        .collect()
}

/// First sheet whose name contains the marker (case-insensitive), else the
/// first sheet
pub fn select_sheet<'a>(names: &'a [String], marker: &str) -> Option<&'a String> {
    let marker = marker.to_lowercase();
    names
        .iter()
        .find(|name| name.to_lowercase().contains(&marker))
        .or_else(|| names.first())
}

/// Cell as text, `None` for empty and error cells
pub fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(format_float(*f)),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(match dt.as_datetime() {
            Some(datetime) => datetime.format(CELL_DATETIME_FORMAT).to_string(),
            None => format_float(dt.as_f64()),
        }),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}

/// Cell as a data value: like `cell_text` but missing-value tokens are null
pub fn cell_value(cell: &Data) -> Option<String> {
    cell_text(cell).filter(|text| !NULL_TOKENS.contains(&text.as_str()))
}

/// Integral floats print without a fractional part
fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::tests::fixtures::{Cell, write_grid};
    use tempfile::TempDir;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_select_sheet_prefers_marker() {
        let sheets = names(&["Summary", "Export DATA SHEET", "Other"]);
        assert_eq!(
            select_sheet(&sheets, "data sheet").unwrap(),
            "Export DATA SHEET"
        );

        let sheets = names(&["Summary", "Other"]);
        assert_eq!(select_sheet(&sheets, "data sheet").unwrap(), "Summary");

        assert!(select_sheet(&[], "data sheet").is_none());
    }

    #[test]
    fn test_cell_formatting() {
        assert_eq!(cell_text(&Data::Float(42.0)).unwrap(), "42");
        assert_eq!(cell_text(&Data::Float(1234.5)).unwrap(), "1234.5");
        assert_eq!(cell_text(&Data::Int(-7)).unwrap(), "-7");
        assert_eq!(cell_text(&Data::String("  Acme ".into())).unwrap(), "  Acme ");
        assert!(cell_text(&Data::Empty).is_none());

        assert!(cell_value(&Data::String("N/A".into())).is_none());
        assert!(cell_value(&Data::String("".into())).is_none());
        assert_eq!(cell_value(&Data::String("NAB".into())).unwrap(), "NAB");
    }

    #[test]
    fn test_read_table_uses_header_offset() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("jan.xlsx");
        write_grid(
            &path,
            &[
                ("Summary", vec![vec![Cell::from("ignore me")]]),
                (
                    "Data Sheet",
                    vec![
                        vec![Cell::from("Export Report January")],
                        vec![Cell::from(" Shipper Name "), Cell::Empty, Cell::from("QTY")],
                        vec![Cell::from("Acme"), Cell::from("x"), Cell::from(12.0)],
                        vec![Cell::Empty, Cell::Empty, Cell::Empty],
                        vec![Cell::from("Globex"), Cell::Empty, Cell::from("NA")],
                    ],
                ),
            ],
        );

        let reader = WorkbookReader::new(1, "data sheet");
        let table = reader.read_table(&path).unwrap();

        assert_eq!(table.sheet, "Data Sheet");
        assert_eq!(table.headers, names(&["Shipper Name", "unnamed_1", "QTY"]));
        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.rows[0],
            vec![Some("Acme".to_string()), Some("x".to_string()), Some("12".to_string())]
        );
        assert_eq!(table.rows[1], vec![Some("Globex".to_string()), None, None]);
    }

    #[test]
    fn test_header_read_agrees_with_full_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wide.xlsx");
        let mut grid = vec![
            vec![Cell::from("Export Report")],
            vec![Cell::from("Date"), Cell::Empty, Cell::from(" QTY ")],
        ];
        grid.extend((0..500).map(|i| {
            vec![
                Cell::from("2024-01-01"),
                Cell::from("x"),
                Cell::from(i as f64),
                Cell::from("overflow"),
            ]
        }));
        write_grid(&path, &[("Data Sheet", grid)]);

        let reader = WorkbookReader::new(1, "data sheet");
        let (sheet, headers) = reader.read_headers(&path).unwrap();
        let table = reader.read_table(&path).unwrap();

        assert_eq!(sheet, "Data Sheet");
        assert_eq!(headers, names(&["Date", "unnamed_1", "QTY", "unnamed_3"]));
        assert_eq!(headers, table.headers);
    }

    #[test]
    fn test_missing_header_row_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("short.xlsx");
        write_grid(&path, &[("Data Sheet", vec![vec![Cell::from("Title only")]])]);

        let reader = WorkbookReader::new(1, "data sheet");
        let result = reader.read_headers(&path);
        assert!(matches!(result, Err(LoaderError::HeaderRowMissing { row: 1, .. })));
    }

    #[test]
    fn test_unreadable_file_is_open_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a zip archive").unwrap();

        let reader = WorkbookReader::new(1, "data sheet");
        let result = reader.read_headers(&path);
        assert!(matches!(result, Err(LoaderError::WorkbookOpen { .. })));
    }
}
