//! Unified target schema and header reconciliation.
//!
//! `UnifiedSchema` is the field catalog every source header is matched
//! against. The destination column set is derived from it: sanitized
//! field names in catalog order, followed by the provenance columns.

pub mod mapper;
pub mod normalize;

pub use mapper::{HeaderMapping, MappingDecision, MappingStats, MatchStrategy, SchemaMapper};
pub use normalize::{dedupe_columns, normalize_for_matching, sanitize_column_name};

use crate::constants::{HEADER_ALIASES, UNIFIED_SCHEMA, provenance};
use std::collections::HashSet;
use tracing::warn;

/// Ordered field catalog plus curated header aliases
#[derive(Debug, Clone)]
pub struct UnifiedSchema {
    fields: Vec<String>,
    aliases: Vec<(String, String)>,
    data_columns: Vec<String>,
}

impl UnifiedSchema {
    /// The built-in trade shipment catalog
    pub fn standard() -> Self {
        Self::new(
            UNIFIED_SCHEMA.iter().map(|f| f.to_string()).collect(),
            HEADER_ALIASES
                .iter()
                .map(|(alias, field)| (alias.to_string(), field.to_string()))
                .collect(),
        )
    }

    pub fn new(fields: Vec<String>, aliases: Vec<(String, String)>) -> Self {
        let data_columns = sanitized_columns(&fields);
        Self {
            fields,
            aliases,
            data_columns,
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn aliases(&self) -> &[(String, String)] {
        &self.aliases
    }

    /// Sanitized catalog fields in catalog order
    pub fn data_columns(&self) -> &[String] {
        &self.data_columns
    }

    /// Destination columns: data columns followed by provenance columns
    pub fn final_columns(&self) -> Vec<String> {
        let mut columns = self.data_columns.clone();
        columns.retain(|c| !provenance::ALL.contains(&c.as_str()));
        columns.extend(provenance::ALL.iter().map(|c| c.to_string()));
        columns
    }
}

/// Fields that sanitize to the same identifier collapse into the first
/// one, so the result never carries a duplicate label
fn sanitized_columns(fields: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(fields.len());
    let mut columns = Vec::with_capacity(fields.len());

    for field in fields {
        let column = sanitize_column_name(field);
        if seen.insert(column.clone()) {
            columns.push(column);
        } else {
            warn!(
                "Field '{}' collapses into existing column '{}', keeping the first",
                field, column
            );
        }
    }

    columns
}

impl Default for UnifiedSchema {
    fn default() -> Self {
        Self::standard()
    }
}
