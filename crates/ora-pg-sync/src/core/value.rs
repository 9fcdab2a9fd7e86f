//! Backend-neutral row values.
//!
//! Both adapters convert their driver rows into [`SqlValue`] vectors so the
//! encoder and loader never see driver types.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

/// A single field value read from a source row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,

    /// Boolean value.
    Bool(bool),

    /// Integer value.
    I64(i64),

    /// Binary floating point value.
    F64(f64),

    /// Exact numeric kept in its textual form (Oracle NUMBER, PostgreSQL numeric).
    Numeric(String),

    /// Character data.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// UUID value.
    Uuid(Uuid),

    /// Date without time component.
    Date(NaiveDate),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),

    /// Timestamp with timezone offset.
    DateTimeOffset(DateTime<FixedOffset>),

    /// Time without date component.
    Time(NaiveTime),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Textual form of the value, `None` for NULL.
    ///
    /// Bytes are rendered as PostgreSQL hex (`\x0102`).
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        let text = match self {
            SqlValue::Null => return None,
            SqlValue::Bool(b) => if *b { "t" } else { "f" }.to_string(),
            SqlValue::I64(n) => n.to_string(),
            SqlValue::F64(n) => n.to_string(),
            SqlValue::Numeric(s) | SqlValue::Text(s) => s.clone(),
            SqlValue::Bytes(b) => format!("\\x{}", hex::encode(b)),
            SqlValue::Uuid(u) => u.to_string(),
            SqlValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            SqlValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            SqlValue::DateTimeOffset(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string(),
            SqlValue::Time(t) => t.format("%H:%M:%S%.f").to_string(),
        };
        Some(text)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One source row in result-column order.
pub type Row = Vec<SqlValue>;

/// An ordered, bounded run of rows fetched from one cursor.
///
/// Column names come from the live result description, so an override query
/// that projects or reorders columns is reflected here.
#[derive(Debug, Clone)]
pub struct RowBatch {
    /// Column names shared by every batch of the same cursor.
    pub columns: Arc<[String]>,

    /// Rows in fetch order.
    pub rows: Vec<Row>,
}

impl RowBatch {
    /// Create a batch over the given columns.
    pub fn new(columns: Arc<[String]>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Get the number of rows in this batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_text_renders_non_strings() {
        assert_eq!(SqlValue::Null.to_text(), None);
        assert_eq!(SqlValue::I64(42).to_text().as_deref(), Some("42"));
        assert_eq!(SqlValue::Bool(true).to_text().as_deref(), Some("t"));
        assert_eq!(
            SqlValue::Numeric("12.500".into()).to_text().as_deref(),
            Some("12.500")
        );
        assert_eq!(
            SqlValue::Bytes(vec![0x01, 0xff]).to_text().as_deref(),
            Some("\\x01ff")
        );
    }

    #[test]
    fn test_datetime_text_omits_zero_fraction() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 5)
            .unwrap();
        assert_eq!(
            SqlValue::DateTime(dt).to_text().as_deref(),
            Some("2024-03-01 12:30:05")
        );
    }

    #[test]
    fn test_option_conversion() {
        let v: SqlValue = None::<i64>.into();
        assert!(v.is_null());
        let v: SqlValue = Some("x").into();
        assert_eq!(v, SqlValue::Text("x".into()));
    }

    #[test]
    fn test_batch_len() {
        let cols: Arc<[String]> = vec!["ID".to_string()].into();
        let batch = RowBatch::new(cols, vec![vec![1i64.into()], vec![2i64.into()]]);
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
    }
}
