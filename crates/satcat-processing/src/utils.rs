//! Shared utilities for the catalog build pipeline.

use std::collections::BTreeMap;

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Characters commonly used in numeric formatting that should be stripped.
pub const NUMERIC_FORMAT_CHARS: [char; 6] = [',', '$', '%', '€', '£', ' '];

/// Literal placeholders the catalogs use for "no value".
pub const NULL_SENTINELS: [&str; 2] = ["-", "nan"];

/// Whole-cell markers for an unknown value, normalized to `Unknown`.
pub const UNKNOWN_MARKERS: [&str; 3] = ["?", "UNK", "Unk"];

/// Replacement for [`UNKNOWN_MARKERS`].
pub const UNKNOWN: &str = "Unknown";

/// Clean a string for numeric parsing by removing formatting characters.
///
/// # Example
///
/// ```rust
/// use satcat_processing::utils::clean_numeric_string;
///
/// assert_eq!(clean_numeric_string("1,234.5"), "1234.5");
/// assert_eq!(clean_numeric_string("  42%  "), "42");
/// ```
pub fn clean_numeric_string(s: &str) -> String {
    let mut result = s.trim().to_string();
    for c in NUMERIC_FORMAT_CHARS {
        result = result.replace(c, "");
    }
    result
}

/// Try to parse a string as a finite number, tolerating formatting symbols.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let cleaned = clean_numeric_string(s);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Check if a string is a null placeholder (`-` or `nan`, any case).
pub fn is_null_sentinel(s: &str) -> bool {
    let trimmed = s.trim();
    NULL_SENTINELS
        .iter()
        .any(|sentinel| trimmed.eq_ignore_ascii_case(sentinel))
}

/// Check if a string is exactly one of the unknown markers.
pub fn is_unknown_marker(s: &str) -> bool {
    UNKNOWN_MARKERS.contains(&s)
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Most frequent value; ties go to the smallest value.
pub fn most_frequent<'a, I, T>(values: I) -> Option<T>
where
    I: IntoIterator<Item = &'a T>,
    T: Ord + Clone + 'a,
{
    let mut counts: BTreeMap<&T, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    let max = counts.values().copied().max()?;
    counts
        .into_iter()
        .find(|(_, count)| *count == max)
        .map(|(value, _)| value.clone())
}

// =============================================================================
// Column Name Utilities
// =============================================================================

/// Columns holding Julian day numbers.
pub fn is_julian_column(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("_jd") || lower.contains("julian_date")
}

/// Columns holding calendar dates or times (flag columns excluded).
pub fn is_date_column(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    (lower.contains("date") || lower.contains("time")) && !lower.contains("flag")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_string() {
        assert_eq!(parse_numeric_string("1,000"), Some(1000.0));
        assert_eq!(parse_numeric_string(" 83.6 "), Some(83.6));
        assert_eq!(parse_numeric_string("15%"), Some(15.0));
        assert_eq!(parse_numeric_string("-"), None);
        assert_eq!(parse_numeric_string("nan"), None);
        assert_eq!(parse_numeric_string("83.6?"), None);
        assert_eq!(parse_numeric_string(""), None);
    }

    #[test]
    fn test_null_sentinels() {
        assert!(is_null_sentinel("-"));
        assert!(is_null_sentinel(" nan "));
        assert!(is_null_sentinel("NaN"));
        assert!(!is_null_sentinel("--"));
        assert!(!is_null_sentinel("n/a"));
    }

    #[test]
    fn test_unknown_markers_are_exact() {
        assert!(is_unknown_marker("?"));
        assert!(is_unknown_marker("UNK"));
        assert!(is_unknown_marker("Unk"));
        assert!(!is_unknown_marker("unk"));
        assert!(!is_unknown_marker("US?"));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace(" 1957  Oct   4 "), "1957 Oct 4");
    }

    #[test]
    fn test_most_frequent_breaks_ties_low() {
        let values = vec!["PAY".to_string(), "DEB".to_string(), "PAY".to_string(), "DEB".to_string()];
        assert_eq!(most_frequent(&values), Some("DEB".to_string()));
        let empty: Vec<String> = Vec::new();
        assert_eq!(most_frequent(&empty), None);
    }

    #[test]
    fn test_column_name_classification() {
        assert!(is_julian_column("Julian_Date"));
        assert!(is_julian_column("launch_jd"));
        assert!(is_date_column("launch_date"));
        assert!(is_date_column("oper_time"));
        assert!(!is_date_column("time_flag"));
        assert!(!is_date_column("mass"));
    }
}
