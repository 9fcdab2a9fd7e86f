//! Table, sequence and outcome types shared by the engine components.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Database engine behind a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Oracle,
    Postgres,
}

impl Backend {
    /// Short name used in logs and messages.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Oracle => "oracle",
            Backend::Postgres => "postgres",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Copy direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Oracle source, PostgreSQL destination.
    #[default]
    OraToPg,

    /// PostgreSQL source, Oracle destination.
    PgToOra,
}

impl Direction {
    pub fn source(&self) -> Backend {
        match self {
            Direction::OraToPg => Backend::Oracle,
            Direction::PgToOra => Backend::Postgres,
        }
    }

    pub fn destination(&self) -> Backend {
        match self {
            Direction::OraToPg => Backend::Postgres,
            Direction::PgToOra => Backend::Oracle,
        }
    }
}

/// How encoded rows reach the destination. Chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Bound-parameter batches.
    #[default]
    Bind,

    /// Bulk-load text protocol (PostgreSQL COPY).
    Copy,
}

/// Per-table copy settings, fixed for the whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    /// Table name as known to both stores.
    pub name: String,

    /// Query replacing the default `select * from <name>`.
    pub override_query: Option<String>,

    /// Columns whose text values are routed through the legacy byte encoding.
    /// Stored upper-cased; lookups ignore case.
    pub binary_columns: HashSet<String>,

    /// Maximum rows per fetched batch.
    pub batch_size: usize,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, batch_size: usize) -> Self {
        Self {
            name: name.into(),
            override_query: None,
            binary_columns: HashSet::new(),
            batch_size,
        }
    }

    pub fn with_override(mut self, query: Option<String>) -> Self {
        self.override_query = query;
        self
    }

    pub fn with_binary_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.binary_columns = columns
            .into_iter()
            .map(|c| c.into().to_uppercase())
            .collect();
        self
    }

    /// The query used to extract rows.
    pub fn select_query(&self) -> String {
        self.override_query
            .clone()
            .unwrap_or_else(|| format!("select * from {}", self.name))
    }

    pub fn is_binary(&self, column: &str) -> bool {
        self.binary_columns.contains(&column.to_uppercase())
    }
}

/// A named sequence and its last allocated value on one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceValue {
    pub name: String,
    pub last_value: i64,
}

/// Allocator state of one sequence present on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceState {
    pub name: String,
    pub source_last: i64,
    pub destination_last: i64,
}

impl SequenceState {
    /// True when the destination allocator lags behind the source.
    pub fn needs_advance(&self) -> bool {
        self.destination_last < self.source_last
    }
}

/// A row rejected by the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// Offset of the row inside its batch.
    pub offset: usize,

    /// Destination error message.
    pub reason: String,
}

impl RowError {
    pub fn new(offset: usize, reason: impl Into<String>) -> Self {
        Self {
            offset,
            reason: reason.into(),
        }
    }
}

/// Result of loading one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: u64,
    pub errors: Vec<RowError>,
}

/// Per-table copy result.
///
/// `rows_attempted` is what the progress indicator counts; `rows_loaded`
/// excludes rejected rows. Both are kept because the two readings of
/// "progress" differ whenever rows are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyOutcome {
    pub table: String,
    pub rows_attempted: u64,
    pub rows_loaded: u64,
    pub errors: Vec<RowError>,

    /// Set when the table was skipped because it could not be described.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl CopyOutcome {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn skipped(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            skipped: Some(reason.into()),
            ..Default::default()
        }
    }

    /// Fold one batch report into the table totals.
    pub fn absorb(&mut self, batch_len: usize, report: LoadReport) {
        self.rows_attempted += batch_len as u64;
        self.rows_loaded += report.loaded;
        self.errors.extend(report.errors);
    }
}
