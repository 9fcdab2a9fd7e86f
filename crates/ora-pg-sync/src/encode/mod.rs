//! Dual-mode row encoding.
//!
//! A run uses one [`LoadMode`] for every table:
//!
//! - **Copy**: each row becomes an escaped, tab-delimited, newline-terminated
//!   UTF-8 line for the bulk-load protocol (see [`escape`]). Escaping may run
//!   on an [`EscapePool`]; line order always matches row order.
//! - **Bind**: rows pass through as parameter tuples, except binary-declared
//!   columns whose non-empty text is converted to legacy bytes
//!   ([`encode_bin`]). The insert statement and its placeholders are built
//!   once per table from the live column order.

mod binary;
mod escape;
mod pool;

pub use binary::{binary_mask, encode_bin, encode_legacy, placeholders};
pub use escape::{escape, escape_row, unescape, NULL_TOKEN};
pub use pool::EscapePool;

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::core::{LoadMode, Row, RowBatch, TableSpec};
use crate::dialect::Dialect;
use crate::error::{Result, SyncError};

/// Encoded form of one batch.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedBatch {
    /// One COPY text line per row.
    TextLines(Vec<Vec<u8>>),

    /// One parameter tuple per row, aligned with the placeholders.
    ParamTuples(Vec<Row>),
}

impl EncodedBatch {
    pub fn len(&self) -> usize {
        match self {
            EncodedBatch::TextLines(lines) => lines.len(),
            EncodedBatch::ParamTuples(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split into single-row batches, in order.
    pub fn into_single_rows(self) -> Vec<EncodedBatch> {
        match self {
            EncodedBatch::TextLines(lines) => lines
                .into_iter()
                .map(|l| EncodedBatch::TextLines(vec![l]))
                .collect(),
            EncodedBatch::ParamTuples(rows) => rows
                .into_iter()
                .map(|r| EncodedBatch::ParamTuples(vec![r]))
                .collect(),
        }
    }
}

/// Concatenate COPY lines into one payload.
pub fn text_payload(lines: &[Vec<u8>]) -> Bytes {
    let mut buf = BytesMut::with_capacity(lines.iter().map(Vec::len).sum());
    for line in lines {
        buf.extend_from_slice(line);
    }
    buf.freeze()
}

/// Per-table encoding state derived from the live result shape.
#[derive(Debug, Clone)]
pub struct TablePlan {
    pub table: String,
    pub columns: Arc<[String]>,

    /// Binary-declared flag per column.
    pub binary: Vec<bool>,

    /// `COPY ... FROM STDIN` or the parameterized insert.
    pub statement: String,
}

/// Converts row batches for the configured load mode.
pub struct Encoder {
    mode: LoadMode,
    pool: EscapePool,
}

impl Encoder {
    /// Create an encoder; `workers > 1` enables parallel escaping in copy mode.
    pub fn new(mode: LoadMode, workers: usize) -> Result<Self> {
        let pool = match mode {
            LoadMode::Copy => EscapePool::new(workers)?,
            LoadMode::Bind => EscapePool::new(1)?,
        };
        Ok(Self { mode, pool })
    }

    pub fn mode(&self) -> LoadMode {
        self.mode
    }

    /// Build the load statement for a table's live columns.
    pub fn plan(
        &self,
        spec: &TableSpec,
        columns: Arc<[String]>,
        dialect: &dyn Dialect,
    ) -> Result<TablePlan> {
        let binary = binary_mask(&columns, |c| spec.is_binary(c));
        let statement = match self.mode {
            LoadMode::Copy => dialect.copy_sql(&spec.name, &columns).ok_or_else(|| {
                SyncError::Config(format!(
                    "bulk load is not available for a {} destination",
                    dialect.backend()
                ))
            })?,
            LoadMode::Bind => {
                let values = placeholders(dialect, &binary);
                dialect.insert_sql(&spec.name, &columns, &values)
            }
        };
        debug!("{}", statement);
        Ok(TablePlan {
            table: spec.name.clone(),
            columns,
            binary,
            statement,
        })
    }

    /// Encode one batch.
    pub fn encode(&self, plan: &TablePlan, batch: RowBatch) -> Result<EncodedBatch> {
        let failed = |(row, col): (usize, usize)| {
            SyncError::transfer(
                plan.table.clone(),
                format!(
                    "value of column {} in batch row {} has no legacy byte encoding",
                    plan.columns.get(col).map(String::as_str).unwrap_or("?"),
                    row
                ),
            )
        };
        match self.mode {
            LoadMode::Copy => self
                .pool
                .escape_rows(&batch.rows, &plan.binary)
                .map(EncodedBatch::TextLines)
                .map_err(failed),
            LoadMode::Bind => encode_bin(batch.rows, &plan.binary)
                .map(EncodedBatch::ParamTuples)
                .map_err(failed),
        }
    }
}
