//! Binary-declared columns and bind placeholders.

use encoding_rs::IBM866;

use crate::core::{Row, SqlValue};
use crate::dialect::Dialect;

/// Encode text with the legacy single-byte code page (IBM866).
///
/// Returns `None` when a character has no mapping.
pub fn encode_legacy(text: &str) -> Option<Vec<u8>> {
    let (bytes, _, had_errors) = IBM866.encode(text);
    if had_errors {
        None
    } else {
        Some(bytes.into_owned())
    }
}

/// Per-column binary flags for a live result shape.
pub fn binary_mask(columns: &[String], is_binary: impl Fn(&str) -> bool) -> Vec<bool> {
    columns.iter().map(|c| is_binary(c)).collect()
}

/// Convert non-empty text values of binary-declared columns to legacy bytes.
///
/// Everything else, including empty strings and NULLs in binary columns,
/// passes through unchanged. On failure returns the (row, column) position
/// of the first value that cannot be encoded.
pub fn encode_bin(rows: Vec<Row>, binary: &[bool]) -> Result<Vec<Row>, (usize, usize)> {
    if !binary.iter().any(|b| *b) {
        return Ok(rows);
    }
    rows.into_iter()
        .enumerate()
        .map(|(r, row)| {
            row.into_iter()
                .enumerate()
                .map(|(c, value)| {
                    let is_binary = binary.get(c).copied().unwrap_or(false);
                    match value {
                        SqlValue::Text(text) if is_binary && !text.is_empty() => {
                            encode_legacy(&text).map(SqlValue::Bytes).ok_or((r, c))
                        }
                        other => Ok(other),
                    }
                })
                .collect()
        })
        .collect()
}

/// Positional placeholders, 1-based, in column order.
pub fn placeholders(dialect: &dyn Dialect, binary: &[bool]) -> Vec<String> {
    binary
        .iter()
        .enumerate()
        .map(|(i, is_binary)| dialect.placeholder(i + 1, *is_binary))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Backend;
    use crate::dialect::for_backend;

    fn text(s: &str) -> SqlValue {
        SqlValue::Text(s.to_string())
    }

    #[test]
    fn test_encode_bin_only_touches_binary_column() {
        let rows = vec![
            vec![text("1"), text("2"), text("4"), text("\u{1}")],
            vec![text("2"), text("2"), text("4"), text("\u{4}")],
        ];
        let encoded = encode_bin(rows, &[false, false, false, true]).unwrap();
        assert_eq!(
            encoded,
            vec![
                vec![text("1"), text("2"), text("4"), SqlValue::Bytes(vec![1])],
                vec![text("2"), text("2"), text("4"), SqlValue::Bytes(vec![4])],
            ]
        );
    }

    #[test]
    fn test_encode_bin_leaves_empty_and_null() {
        let rows = vec![vec![text(""), SqlValue::Null, SqlValue::I64(3)]];
        let encoded = encode_bin(rows.clone(), &[true, true, true]).unwrap();
        assert_eq!(encoded, rows);
    }

    #[test]
    fn test_encode_bin_reports_unmappable() {
        let rows = vec![vec![text("ok")], vec![text("\u{4e2d}")]];
        assert_eq!(encode_bin(rows, &[true]).unwrap_err(), (1, 0));
    }

    #[test]
    fn test_legacy_cyrillic() {
        assert_eq!(encode_legacy("Привет").unwrap(), vec![0x8f, 0xe0, 0xa8, 0xa2, 0xa5, 0xe2]);
    }

    #[test]
    fn test_placeholders_postgres() {
        let d = for_backend(Backend::Postgres);
        assert_eq!(
            placeholders(d, &[true, false, true]),
            vec!["$1::bytea", "$2", "$3::bytea"]
        );
    }

    #[test]
    fn test_placeholders_oracle() {
        let d = for_backend(Backend::Oracle);
        assert_eq!(placeholders(d, &[true, false]), vec![":1", ":2"]);
    }

    #[test]
    fn test_binary_mask() {
        let cols = vec!["ID".to_string(), "PAYLOAD".to_string()];
        assert_eq!(binary_mask(&cols, |c| c == "PAYLOAD"), vec![false, true]);
    }
}
