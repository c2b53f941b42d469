//! Application constants for the shipment loader
//!
//! This module contains the unified target schema, the curated alias table,
//! and the default values used throughout the loader.

// =============================================================================
// Unified Target Schema
// =============================================================================

/// Canonical field catalog every source header is reconciled against.
///
/// Order matters: it is the column order of the destination table and the
/// tie-break order for fuzzy matches.
pub const UNIFIED_SCHEMA: &[&str] = &[
    "Date",
    "HS Code",
    "Product Description",
    "HS Description",
    "HS2",
    "HS4",
    "Month",
    "Shipper Name",
    "Consignee Name",
    "Notify Party",
    "Shipper Address1",
    "Shipper Address2",
    "Shipper City",
    "Shipper State",
    "Shipper Pincode",
    "Shipper Phone",
    "Shipper Email",
    "Shipper Contact Person",
    "Consignee Address 1",
    "Consignee Address 2",
    "Consignee City",
    "Consignee State",
    "Consignee Pincode",
    "Consignee Phone",
    "Consignee E-mail",
    "Contact Person",
    "Port of Origin",
    "Port of Destination",
    "Country of Origin",
    "Country of Destination",
    "Shipment Mode",
    "Standard Qty",
    "Standard Unit",
    "QTY",
    "Unit",
    "Standard Unit Rate $",
    "Estimated F.O.B Value $",
    "Estimated CIF Value $",
    "Estimated Unit Rate $",
    "Unit Rate $",
    "Value in FC",
    "Rate In FC",
    "Rate Currency",
    "Landed Value $",
    "Tax $",
    "Tax %",
    "Freight Value $",
    "Insurance Value $",
    "BL TYP",
    "Terms",
    "Gross Weight",
    "Gross Weight Unit",
    "Raw Shipper Name",
    "Raw Consignee Name",
    "Raw Shipper Address1",
    "Raw Shipper Address2",
    "Raw Shipper City",
    "Raw Shipper State",
    "Raw Consignee Add1",
    "Raw Consignee Add2",
    "Raw Consignee City",
    "Raw Consignee State",
    "Raw Consignee Pincode",
    "Raw Consignee Phone",
    "Raw Consignee E-mail",
    "Raw Consignee Country",
    "Is Unique",
    "IsUnique",
    "Record Id",
    "IEC",
];

/// Known header spellings keyed by their match-normalized form.
///
/// Keys must already be in match-normalized form (lowercase, single spaces)
/// or they can never be hit.
pub const HEADER_ALIASES: &[(&str, &str)] = &[
    ("shipper name", "Shipper Name"),
    ("consignee name", "Consignee Name"),
    ("hs code", "HS Code"),
    ("product description", "Product Description"),
    ("country of origin", "Country of Origin"),
    ("country of destination", "Country of Destination"),
    ("port of origin", "Port of Origin"),
    ("port of destination", "Port of Destination"),
    ("shipment mode", "Shipment Mode"),
    ("date", "Date"),
    ("month", "Month"),
    ("qty", "QTY"),
    ("quantity", "QTY"),
    ("unit", "Unit"),
    ("value", "Estimated F.O.B Value $"),
    ("fob value", "Estimated F.O.B Value $"),
    ("cif value", "Estimated CIF Value $"),
];

// =============================================================================
// Provenance Columns
// =============================================================================

pub mod provenance {
    pub const SOURCE_FILE: &str = "source_file";
    pub const SOURCE_FOLDER: &str = "source_folder";
    pub const PROCESSED_TIMESTAMP: &str = "processed_timestamp";

    pub const ALL: &[&str] = &[SOURCE_FILE, SOURCE_FOLDER, PROCESSED_TIMESTAMP];

    /// Format of the processing timestamp stamped on every row
    pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
}

// =============================================================================
// Column Normalization
// =============================================================================

/// Identifier used when a header is empty or normalizes to nothing
pub const PLACEHOLDER_COLUMN: &str = "unnamed";

/// Prefix for identifiers that would otherwise start with a digit
pub const DIGIT_PREFIX: &str = "col_";

/// Punctuation replaced with an underscore before general cleanup
pub const REPLACED_PUNCTUATION: &[char] = &['$', '%', '.', '?', '(', ')', '[', ']', '{', '}'];

// =============================================================================
// Cell Reading
// =============================================================================

/// Cell texts read as missing values
pub const NULL_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Format used when a spreadsheet cell holds a date/time
pub const CELL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// Defaults
// =============================================================================

pub mod defaults {
    pub const INPUT_DIR: &str = "Final_Download";
    pub const TABLE_NAME: &str = "shipments";
    pub const ENV_FILE: &str = "credentials.env";
    pub const LOG_DIR: &str = ".";
    pub const LOG_FILE_PREFIX: &str = "shipment_loader";

    /// 0-based sheet row holding the real header (row 0 is a title)
    pub const HEADER_ROW: usize = 1;
    pub const SHEET_MARKER: &str = "data sheet";
    pub const EXTENSIONS: &[&str] = &["xlsx", "xls"];

    pub const FUZZY_CUTOFF: f64 = 0.80;

    pub const BATCH_SIZE: usize = 25_000;
    pub const MAX_ATTEMPTS: u32 = 3;
    pub const BACKOFF_BASE_MS: u64 = 1_000;

    pub const TYPE_SAMPLE_SIZE: usize = 1_000;
    pub const NUMERIC_PROBE_SIZE: usize = 100;
    pub const NUMERIC_RATIO: f64 = 0.8;
    pub const TEXT_LENGTH_THRESHOLD: usize = 255;
    pub const VARCHAR_MIN: usize = 50;
    pub const VARCHAR_MAX: usize = 255;
    pub const VARCHAR_SCALE: f64 = 1.2;

    pub const QUALITY_REPORT_COLUMNS: usize = 10;
    pub const TOP_HEADER_PATTERNS: usize = 3;

    pub const DB_NAME: &str = "shipments";
    pub const DB_PORT: u16 = 5432;
}

/// Postgres caps a single statement at this many bind parameters
pub const MAX_BIND_PARAMETERS: usize = 65_535;
