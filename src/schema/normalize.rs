//! Header normalization.
//!
//! Two distinct normal forms are used: a loose, space-separated form for
//! comparing headers against the unified schema, and a strict identifier
//! form for destination column names.

use crate::constants::{DIGIT_PREFIX, PLACEHOLDER_COLUMN, REPLACED_PUNCTUATION};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static UNDERSCORE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").unwrap());

/// Normalize a header for matching: lowercase, every non-alphanumeric run
/// becomes a single space, trimmed.
pub fn normalize_for_matching(raw: &str) -> String {
    raw.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Convert any header into a storage-safe identifier.
///
/// The result contains only lowercase word characters and underscores and
/// never starts with a digit. Applying it twice is a no-op.
pub fn sanitize_column_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return PLACEHOLDER_COLUMN.to_string();
    }

    let replaced: String = trimmed
        .chars()
        .map(|c| if REPLACED_PUNCTUATION.contains(&c) { '_' } else { c })
        .collect();
    let replaced = NON_WORD.replace_all(&replaced, "_");
    let replaced = WHITESPACE_RUN.replace_all(&replaced, "_");
    let collapsed = UNDERSCORE_RUN.replace_all(&replaced, "_");
    let identifier = collapsed.trim_matches('_').to_lowercase();

    if identifier.is_empty() {
        PLACEHOLDER_COLUMN.to_string()
    } else if identifier.starts_with(char::is_numeric) {
        format!("{}{}", DIGIT_PREFIX, identifier)
    } else {
        identifier
    }
}

/// Make a column list unique by suffixing repeats with `_1`, `_2`, ...
///
/// The first occurrence keeps its bare name. A suffix already present in
/// the list is skipped so the output never contains duplicates.
pub fn dedupe_columns(columns: &[String]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(columns.len());
    let mut out = Vec::with_capacity(columns.len());

    for column in columns {
        if taken.insert(column.clone()) {
            out.push(column.clone());
            continue;
        }

        let mut suffix = 1usize;
        loop {
            let candidate = format!("{}_{}", column, suffix);
            if !columns.contains(&candidate) && taken.insert(candidate.clone()) {
                out.push(candidate);
                break;
            }
            suffix += 1;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_for_matching_variants_collapse() {
        assert_eq!(normalize_for_matching("Shipper Name"), "shipper name");
        assert_eq!(normalize_for_matching("shipper_name"), "shipper name");
        assert_eq!(normalize_for_matching("SHIPPER  NAME"), "shipper name");
        assert_eq!(normalize_for_matching("  shipper_name "), "shipper name");
        assert_eq!(
            normalize_for_matching("Estimated F.O.B Value $"),
            "estimated f o b value"
        );
        assert_eq!(normalize_for_matching("---"), "");
    }

    #[test]
    fn test_sanitize_column_name() {
        assert_eq!(sanitize_column_name("Shipper Name"), "shipper_name");
        assert_eq!(
            sanitize_column_name("Estimated F.O.B Value $"),
            "estimated_f_o_b_value"
        );
        assert_eq!(sanitize_column_name("Consignee E-mail"), "consignee_e_mail");
        assert_eq!(sanitize_column_name("Tax %"), "tax");
        assert_eq!(sanitize_column_name("  HS Code  "), "hs_code");
        assert_eq!(sanitize_column_name("(Qty) [kg]"), "qty_kg");
    }

    #[test]
    fn test_sanitize_placeholder_and_digit_prefix() {
        assert_eq!(sanitize_column_name(""), "unnamed");
        assert_eq!(sanitize_column_name("   "), "unnamed");
        assert_eq!(sanitize_column_name("$%?"), "unnamed");
        assert_eq!(sanitize_column_name("2023 Value"), "col_2023_value");
        assert_eq!(sanitize_column_name("٣ Value"), "col_٣_value");
        assert_eq!(sanitize_column_name("col_٣_value"), "col_٣_value");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let inputs = [
            "Shipper Name",
            "Estimated F.O.B Value $",
            "2023 Value",
            "__weird__  header__",
            "",
            "Raw Consignee E-mail",
            "Rate In FC",
        ];
        for input in inputs {
            let once = sanitize_column_name(input);
            assert_eq!(sanitize_column_name(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn test_sanitized_names_match_identifier_grammar() {
        let grammar = Regex::new(r"^[a-z_][a-z0-9_]*$").unwrap();
        for field in crate::constants::UNIFIED_SCHEMA {
            let name = sanitize_column_name(field);
            assert!(grammar.is_match(&name), "{} -> {}", field, name);
        }
    }

    #[test]
    fn test_dedupe_repeats_in_first_seen_order() {
        assert_eq!(
            dedupe_columns(&owned(&["qty", "qty", "qty"])),
            owned(&["qty", "qty_1", "qty_2"])
        );
        assert_eq!(
            dedupe_columns(&owned(&["a", "b", "a", "c", "b"])),
            owned(&["a", "b", "a_1", "c", "b_1"])
        );
    }

    #[test]
    fn test_dedupe_skips_taken_suffixes() {
        let out = dedupe_columns(&owned(&["qty", "qty_1", "qty"]));
        assert_eq!(out, owned(&["qty", "qty_1", "qty_2"]));

        let unique: HashSet<_> = out.iter().collect();
        assert_eq!(unique.len(), out.len());
    }
}
