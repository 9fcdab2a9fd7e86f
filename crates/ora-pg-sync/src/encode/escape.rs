//! COPY text-format escaping.
//!
//! Each of backspace, form-feed, line-feed, carriage-return, tab,
//! vertical-tab and backslash is written as a backslash followed by the
//! character itself. PostgreSQL decodes a backslash followed by any
//! character that is not a recognized escape letter as that character, so
//! the value survives unchanged. NULL is the two-character token `\N`.

use crate::core::SqlValue;

use super::binary::encode_legacy;

/// Token for SQL NULL in a COPY text stream.
pub const NULL_TOKEN: &str = "\\N";

const SPECIAL: [char; 7] = ['\u{8}', '\u{c}', '\n', '\r', '\t', '\u{b}', '\\'];

/// Escape one field; `None` becomes `\N`.
pub fn escape(field: Option<&str>) -> String {
    match field {
        None => NULL_TOKEN.to_string(),
        Some(text) => {
            let mut out = String::with_capacity(text.len());
            escape_into(&mut out, text);
            out
        }
    }
}

fn escape_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        if SPECIAL.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
}

/// Render one row as a tab-delimited, newline-terminated UTF-8 line.
///
/// `binary[i]` marks binary-declared columns: their non-empty text values
/// are converted to legacy-encoded bytes and written as bytea hex.
/// Returns the offending column index when a value cannot be represented in
/// the legacy encoding.
pub fn escape_row(row: &[SqlValue], binary: &[bool]) -> Result<Vec<u8>, usize> {
    let mut line = String::with_capacity(row.len() * 8);
    for (i, value) in row.iter().enumerate() {
        if i > 0 {
            line.push('\t');
        }
        let is_binary = binary.get(i).copied().unwrap_or(false);
        match value {
            SqlValue::Null => line.push_str(NULL_TOKEN),
            SqlValue::Text(text) if is_binary && !text.is_empty() => {
                let bytes = encode_legacy(text).ok_or(i)?;
                push_bytea(&mut line, &bytes);
            }
            SqlValue::Bytes(bytes) => push_bytea(&mut line, bytes),
            other => {
                if let Some(text) = other.to_text() {
                    escape_into(&mut line, &text);
                }
            }
        }
    }
    line.push('\n');
    Ok(line.into_bytes())
}

// `\x` hex with the backslash itself escaped for the COPY stream.
fn push_bytea(line: &mut String, bytes: &[u8]) {
    line.push_str("\\\\x");
    line.push_str(&hex::encode(bytes));
}

/// Decode one COPY text field the way PostgreSQL does.
///
/// Recognizes `\N`, the letter escapes `\b \f \n \r \t \v`, and a backslash
/// before any other character standing for that character.
pub fn unescape(field: &str) -> Option<String> {
    if field == NULL_TOKEN {
        return None;
    }
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('v') => out.push('\u{b}'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    Some(out)
}
