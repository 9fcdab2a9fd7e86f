//! In-memory store for unit tests.
//!
//! Behaves like either backend depending on its dialect: an Oracle-flavored
//! store reports unique violations per row inside a batch, a
//! PostgreSQL-flavored one rolls the whole unit back. Writes stay pending
//! until `commit`.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::{
    Backend, DestinationStore, LoadReport, Row, RowCursor, RowError, SequenceValue, SourceStore,
    SqlValue, Store,
};
use crate::dialect::{for_backend, Dialect};
use crate::encode::unescape;
use crate::error::{Result, SyncError};

#[derive(Default)]
struct Table {
    columns: Vec<String>,
    unique: Vec<usize>,
    rows: Vec<Row>,
    projection: Option<Vec<String>>,
}

#[derive(Clone, Copy)]
struct Sequence {
    last: i64,
    increment: i64,

    // false after RESTART until the next allocation
    is_called: bool,
}

impl Sequence {
    fn allocated(&self) -> i64 {
        if self.is_called {
            self.last
        } else {
            self.last - self.increment
        }
    }
}

#[derive(Default)]
struct State {
    catalog: Vec<String>,
    tables: HashMap<String, Table>,
    pending: Vec<(String, Row)>,
    sequences: BTreeMap<String, Sequence>,
    foreign_keys: HashMap<String, Vec<String>>,
    statements: Vec<String>,
    commits: usize,
    fail_on: Option<String>,
}

pub struct MemoryStore {
    dialect: &'static dyn Dialect,
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn oracle() -> Self {
        Self::new(Backend::Oracle)
    }

    pub fn postgres() -> Self {
        Self::new(Backend::Postgres)
    }

    fn new(backend: Backend) -> Self {
        Self {
            dialect: for_backend(backend),
            state: Mutex::new(State::default()),
        }
    }

    pub fn add_table(&self, name: &str, columns: &[&str], unique: &[&str]) {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let unique = unique
            .iter()
            .filter_map(|u| columns.iter().position(|c| c == u))
            .collect();
        let mut state = self.state.lock().unwrap();
        state.catalog.push(name.to_string());
        state.tables.insert(
            name.to_string(),
            Table {
                columns,
                unique,
                ..Default::default()
            },
        );
    }

    pub fn seed_rows(&self, table: &str, rows: Vec<Row>) {
        let mut state = self.state.lock().unwrap();
        state.tables.get_mut(table).unwrap().rows.extend(rows);
    }

    /// Make `open` return only these columns, in this order.
    pub fn set_projection(&self, table: &str, columns: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.tables.get_mut(table).unwrap().projection =
            Some(columns.iter().map(|c| c.to_string()).collect());
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        let state = self.state.lock().unwrap();
        state.tables[table].rows.clone()
    }

    pub fn add_sequence(&self, name: &str, last: i64) {
        let mut state = self.state.lock().unwrap();
        state
            .sequences
            .insert(
                name.to_string(),
                Sequence {
                    last,
                    increment: 1,
                    is_called: true,
                },
            );
    }

    pub fn sequence_last(&self, name: &str) -> i64 {
        self.state.lock().unwrap().sequences[name].allocated()
    }

    pub fn add_foreign_key(&self, table: &str, constraint: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .foreign_keys
            .entry(table.to_string())
            .or_default()
            .push(constraint.to_string());
    }

    /// Statements issued through `execute`, in order.
    pub fn statements(&self) -> Vec<String> {
        self.state.lock().unwrap().statements.clone()
    }

    pub fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }

    /// Fail any `execute` whose statement contains `fragment`.
    pub fn fail_on(&self, fragment: &str) {
        self.state.lock().unwrap().fail_on = Some(fragment.to_string());
    }

    fn unique_message(&self) -> &'static str {
        match self.dialect.backend() {
            Backend::Oracle => "ORA-00001: unique constraint violated",
            Backend::Postgres => "unique violation",
        }
    }

    // Insert one unit of rows. Oracle reports per-row errors, PostgreSQL
    // discards the unit on the first conflict.
    fn insert_unit(&self, table: &str, rows: Vec<Row>) -> Result<LoadReport> {
        let mut state = self.state.lock().unwrap();
        let unique = match state.tables.get(table) {
            Some(t) => t.unique.clone(),
            None => return Err(SyncError::transfer(table, "relation does not exist")),
        };
        let key = |row: &Row| -> Vec<String> {
            unique
                .iter()
                .map(|&i| format!("{:?}", row.get(i)))
                .collect()
        };

        let mut report = LoadReport::default();
        let mut accepted: Vec<(String, Row)> = Vec::new();
        for (offset, row) in rows.into_iter().enumerate() {
            let k = key(&row);
            let clash = !unique.is_empty()
                && state.tables[table]
                    .rows
                    .iter()
                    .chain(state.pending.iter().filter(|(t, _)| t == table).map(|(_, r)| r))
                    .chain(accepted.iter().map(|(_, r)| r))
                    .any(|existing| key(existing) == k);
            if clash {
                // Oracle batch errors report the row and keep going
                if self.dialect.backend() == Backend::Oracle {
                    report.errors.push(RowError::new(offset, self.unique_message()));
                    continue;
                }
                state.pending.clear();
                return Err(SyncError::unique_violation(table, self.unique_message()));
            }
            accepted.push((table.to_string(), row));
        }
        report.loaded = accepted.len() as u64;
        state.pending.extend(accepted);
        Ok(report)
    }
}

// Split a COPY line at unescaped tabs and decode each field.
fn parse_copy_line(line: &str) -> Row {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                current.push(ch);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '\t' => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
        .iter()
        .map(|f| unescape(f).map_or(SqlValue::Null, SqlValue::Text))
        .collect()
}

fn table_after_from(query: &str) -> Option<String> {
    let lower = query.to_ascii_lowercase();
    let at = lower.find(" from ")? + " from ".len();
    query[at..].split_whitespace().next().map(str::to_uppercase)
}

struct MemoryCursor {
    columns: Arc<[String]>,
    rows: VecDeque<Row>,
}

#[async_trait]
impl RowCursor for MemoryCursor {
    fn columns(&self) -> Arc<[String]> {
        Arc::clone(&self.columns)
    }

    async fn fetch(&mut self, max_rows: usize) -> Result<Vec<Row>> {
        let n = max_rows.min(self.rows.len());
        Ok(self.rows.drain(..n).collect())
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn dialect(&self) -> &'static dyn Dialect {
        self.dialect
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn count(&self, query: &str) -> Result<u64> {
        let table = table_after_from(query)
            .ok_or_else(|| SyncError::Config(format!("no table in {}", query)))?;
        let state = self.state.lock().unwrap();
        state
            .tables
            .get(&table)
            .map(|t| t.rows.len() as u64)
            .ok_or_else(|| SyncError::transfer(table, "relation does not exist"))
    }

    async fn sequences(&self) -> Result<Vec<SequenceValue>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .sequences
            .iter()
            .map(|(name, s)| SequenceValue {
                name: name.clone(),
                last_value: s.allocated(),
            })
            .collect())
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().catalog.clone())
    }

    async fn open(&self, table: &str, _query: &str) -> Result<Box<dyn RowCursor>> {
        let state = self.state.lock().unwrap();
        let t = state
            .tables
            .get(table)
            .ok_or_else(|| SyncError::schema_lookup(table, "table or view does not exist"))?;
        let (columns, rows) = match &t.projection {
            None => (t.columns.clone(), t.rows.clone()),
            Some(projection) => {
                let idx: Vec<usize> = projection
                    .iter()
                    .filter_map(|p| t.columns.iter().position(|c| c == p))
                    .collect();
                let rows = t
                    .rows
                    .iter()
                    .map(|r| idx.iter().map(|&i| r[i].clone()).collect())
                    .collect();
                (projection.clone(), rows)
            }
        };
        Ok(Box::new(MemoryCursor {
            columns: columns.into(),
            rows: rows.into(),
        }))
    }
}

#[async_trait]
impl DestinationStore for MemoryStore {
    async fn bulk_load(&self, table: &str, _copy_sql: &str, data: Bytes) -> Result<u64> {
        let text = String::from_utf8(data.to_vec())
            .map_err(|e| SyncError::transfer(table, e.to_string()))?;
        let rows: Vec<Row> = text
            .strip_suffix('\n')
            .unwrap_or(&text)
            .split('\n')
            .filter(|l| !l.is_empty())
            .map(parse_copy_line)
            .collect();
        Ok(self.insert_unit(table, rows)?.loaded)
    }

    async fn execute_batch(&self, table: &str, _insert_sql: &str, rows: &[Row]) -> Result<LoadReport> {
        self.insert_unit(table, rows.to_vec())
    }

    async fn commit(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let pending = std::mem::take(&mut state.pending);
        for (table, row) in pending {
            if let Some(t) = state.tables.get_mut(&table) {
                t.rows.push(row);
            }
        }
        state.commits += 1;
        Ok(())
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(fragment) = &state.fail_on {
            if sql.contains(fragment.as_str()) {
                return Err(SyncError::transfer("-", format!("statement failed: {}", sql)));
            }
        }
        state.statements.push(sql.to_string());

        let words: Vec<&str> = sql.split_whitespace().collect();
        match words.as_slice() {
            ["truncate", "table", table, ..] => {
                if let Some(t) = state.tables.get_mut(*table) {
                    t.rows.clear();
                }
            }
            ["ALTER", "SEQUENCE", name, "RESTART", "WITH", value] => {
                let value: i64 = value.parse().unwrap();
                if let Some(s) = state.sequences.get_mut(*name) {
                    s.last = value;
                    s.is_called = false;
                }
            }
            ["ALTER", "SEQUENCE", name, "INCREMENT", "BY", step] => {
                let step: i64 = step.parse().unwrap();
                if let Some(s) = state.sequences.get_mut(*name) {
                    s.increment = step;
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state.foreign_keys.get(table).cloned().unwrap_or_default())
    }

    async fn next_sequence_value(&self, name: &str) -> Result<i64> {
        let mut state = self.state.lock().unwrap();
        let seq = state
            .sequences
            .get_mut(name)
            .ok_or_else(|| SyncError::transfer(name, "sequence does not exist"))?;
        if seq.is_called {
            seq.last += seq.increment;
        }
        seq.is_called = true;
        Ok(seq.last)
    }
}
