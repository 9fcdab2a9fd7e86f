//! Core traits for backend-agnostic copying.
//!
//! This module defines the seams between the engine and the outside world:
//!
//! - [`SourceStore`] / [`RowCursor`]: read the table catalog and stream rows
//! - [`DestinationStore`]: load encoded batches and run protection/sequence DDL
//! - [`ProgressSink`]: per-table progress and per-row error reporting
//! - [`Confirmation`]: operator acknowledgement before destructive steps
//!
//! Adapters live in `drivers`; the engine components only see these traits.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::dialect::Dialect;
use crate::error::Result;

use super::schema::{CopyOutcome, LoadReport, RowError, SequenceValue};
use super::value::Row;

/// Operations both sides of a copy provide.
#[async_trait]
pub trait Store: Send + Sync {
    /// SQL dialect of this store.
    fn dialect(&self) -> &'static dyn Dialect;

    /// Round-trip a trivial statement to prove the connection is alive.
    async fn ping(&self) -> Result<()>;

    /// Run a `count(*)` query and return its single value.
    async fn count(&self, query: &str) -> Result<u64>;

    /// Sequence catalog as (upper-cased name, last allocated value).
    async fn sequences(&self) -> Result<Vec<SequenceValue>>;
}

/// An open, forward-only result set.
///
/// A cursor is consumed once; copying the same table again requires a new
/// [`SourceStore::open`].
#[async_trait]
pub trait RowCursor: Send {
    /// Column names of the live result, in result order.
    fn columns(&self) -> Arc<[String]>;

    /// Fetch up to `max_rows` rows. An empty vector means the cursor is exhausted.
    async fn fetch(&mut self, max_rows: usize) -> Result<Vec<Row>>;
}

/// Read side of a copy.
#[async_trait]
pub trait SourceStore: Store {
    /// All user tables, in catalog order.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Execute `query` for `table` and return a cursor over its rows.
    ///
    /// Fails with [`SchemaLookup`](crate::SyncError::SchemaLookup) when the
    /// result description cannot be obtained.
    async fn open(&self, table: &str, query: &str) -> Result<Box<dyn RowCursor>>;
}

/// Write side of a copy.
///
/// Writes accumulate in an open transaction until [`commit`](Self::commit).
/// A load unit that fails is rolled back by the store before the error is
/// returned, leaving earlier committed units untouched.
#[async_trait]
pub trait DestinationStore: Store {
    /// Stream a pre-encoded text payload through the bulk-load protocol.
    async fn bulk_load(&self, table: &str, copy_sql: &str, data: Bytes) -> Result<u64>;

    /// Execute a parameterized insert once per row as one unit.
    ///
    /// Stores with native batch errors report rejected rows in the returned
    /// [`LoadReport`]; the others fail the whole unit with
    /// [`UniqueViolation`](crate::SyncError::UniqueViolation).
    async fn execute_batch(&self, table: &str, insert_sql: &str, rows: &[Row])
        -> Result<LoadReport>;

    /// Commit everything written since the last commit.
    async fn commit(&self) -> Result<()>;

    /// Execute a DDL or DML statement outside the load path.
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Referential constraint names defined on `table`.
    async fn foreign_keys(&self, table: &str) -> Result<Vec<String>>;

    /// Allocate one value from a sequence.
    async fn next_sequence_value(&self, name: &str) -> Result<i64>;
}

/// Receives per-table progress. All methods default to no-ops.
pub trait ProgressSink: Send + Sync {
    /// A table copy begins; `expected_rows` is `None` when counting was skipped.
    fn table_started(&self, _table: &str, _expected_rows: Option<u64>) {}

    /// A batch of `rows` rows was processed, whatever its load result.
    fn rows_processed(&self, _table: &str, _rows: u64) {}

    /// A row was rejected and dropped.
    fn row_failed(&self, _table: &str, _error: &RowError) {}

    fn table_finished(&self, _outcome: &CopyOutcome) {}
}

/// Progress sink that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Operator acknowledgement for destructive steps.
pub trait Confirmation: Send + Sync {
    /// Return true to allow truncating `tables`.
    fn confirm_truncate(&self, tables: &[String]) -> bool;
}

/// Confirmation that always agrees (`force`).
#[derive(Debug, Default, Clone, Copy)]
pub struct Preconfirmed;

impl Confirmation for Preconfirmed {
    fn confirm_truncate(&self, _tables: &[String]) -> bool {
        true
    }
}
