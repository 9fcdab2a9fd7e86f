//! Oracle store on the blocking `oracle` driver.
//!
//! Short calls run on the blocking pool. A table cursor lives on its own
//! thread for its whole lifetime and is driven through a request channel.

use std::sync::Arc;
use std::thread;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use oracle::sql_type::{OracleType, ToSql};
use oracle::Connection;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::OracleConfig;
use crate::core::{
    DestinationStore, LoadReport, Row, RowCursor, RowError, SequenceValue, SourceStore, SqlValue,
    Store,
};
use crate::dialect::{Dialect, OracleDialect};
use crate::error::{Result, SyncError};

const MAX_VARCHAR2: usize = 4000;
const MAX_RAW: usize = 2000;

/// Oracle side of a copy.
pub struct OracleStore {
    conn: Arc<Connection>,
}

impl OracleStore {
    pub async fn connect(config: &OracleConfig) -> Result<Self> {
        let user = config.user.clone();
        let password = config.password.clone();
        let connect_string = config.connect_string.clone();
        let conn = tokio::task::spawn_blocking(move || {
            Connection::connect(&user, &password, &connect_string)
        })
        .await
        .map_err(std::io::Error::from)?
        .map_err(|e| SyncError::connection("oracle", e))?;

        info!("Connected to Oracle: {}@{}", config.user, config.connect_string);
        Ok(Self {
            conn: Arc::new(conn),
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&conn))
            .await
            .map_err(std::io::Error::from)?
    }
}

/// Decode one column of a fetched row by its declared type.
fn decode(row: &oracle::Row, idx: usize, ty: &OracleType) -> Result<SqlValue> {
    fn opt<T>(v: Option<T>, f: impl FnOnce(T) -> SqlValue) -> SqlValue {
        v.map(f).unwrap_or(SqlValue::Null)
    }

    let value = match ty {
        OracleType::Number(p, 0) if *p > 0 && *p <= 18 => {
            opt(row.get::<_, Option<i64>>(idx)?, SqlValue::I64)
        }
        OracleType::Int64 => opt(row.get::<_, Option<i64>>(idx)?, SqlValue::I64),
        OracleType::Number(_, _) | OracleType::Float(_) => {
            opt(row.get::<_, Option<String>>(idx)?, SqlValue::Numeric)
        }
        OracleType::BinaryFloat | OracleType::BinaryDouble => {
            opt(row.get::<_, Option<f64>>(idx)?, SqlValue::F64)
        }
        OracleType::Date | OracleType::Timestamp(_) => {
            opt(row.get::<_, Option<NaiveDateTime>>(idx)?, SqlValue::DateTime)
        }
        OracleType::TimestampTZ(_) | OracleType::TimestampLTZ(_) => opt(
            row.get::<_, Option<DateTime<FixedOffset>>>(idx)?,
            SqlValue::DateTimeOffset,
        ),
        OracleType::Raw(_) | OracleType::LongRaw | OracleType::BLOB => {
            opt(row.get::<_, Option<Vec<u8>>>(idx)?, SqlValue::Bytes)
        }
        _ => opt(row.get::<_, Option<String>>(idx)?, SqlValue::Text),
    };
    Ok(value)
}

enum CursorRequest {
    Fetch(usize, oneshot::Sender<Result<Vec<Row>>>),
}

/// Result set owned by a dedicated thread.
struct OracleCursor {
    columns: Arc<[String]>,
    requests: mpsc::Sender<CursorRequest>,
}

impl OracleCursor {
    fn spawn(conn: Arc<Connection>, table: String, query: String) -> oneshot::Receiver<Result<Self>> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (req_tx, mut req_rx) = mpsc::channel::<CursorRequest>(1);

        thread::spawn(move || {
            let rs = match conn.query(&query, &[]) {
                Ok(rs) => rs,
                Err(e) => {
                    let _ = ready_tx.send(Err(SyncError::schema_lookup(&table, e)));
                    return;
                }
            };
            let types: Vec<OracleType> = rs
                .column_info()
                .iter()
                .map(|c| c.oracle_type().clone())
                .collect();
            let columns: Arc<[String]> = rs
                .column_info()
                .iter()
                .map(|c| c.name().to_string())
                .collect::<Vec<_>>()
                .into();

            let cursor = OracleCursor {
                columns,
                requests: req_tx,
            };
            if ready_tx.send(Ok(cursor)).is_err() {
                return;
            }

            let mut rows = rs;
            while let Some(CursorRequest::Fetch(max_rows, reply)) = req_rx.blocking_recv() {
                let mut batch = Vec::with_capacity(max_rows);
                let mut failure = None;
                for fetched in rows.by_ref().take(max_rows) {
                    let decoded = fetched.map_err(SyncError::from).and_then(|row| {
                        types
                            .iter()
                            .enumerate()
                            .map(|(i, ty)| decode(&row, i, ty))
                            .collect::<Result<Row>>()
                    });
                    match decoded {
                        Ok(row) => batch.push(row),
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }
                let _ = reply.send(match failure {
                    Some(e) => Err(e),
                    None => Ok(batch),
                });
            }
            debug!("cursor for {} closed", table);
        });

        ready_rx
    }
}

#[async_trait]
impl RowCursor for OracleCursor {
    fn columns(&self) -> Arc<[String]> {
        Arc::clone(&self.columns)
    }

    async fn fetch(&mut self, max_rows: usize) -> Result<Vec<Row>> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(CursorRequest::Fetch(max_rows, tx))
            .await
            .map_err(|_| SyncError::Config("Oracle cursor thread has exited".into()))?;
        rx.await
            .map_err(|_| SyncError::Config("Oracle cursor thread has exited".into()))?
    }
}

/// How a destination column is bound for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BindKind {
    Int,
    Double,
    Timestamp,
    TimestampTz,
    Raw,
    Text,
}

/// Pick the bind kind of column `idx` from the values in the batch.
fn bind_kind(rows: &[Row], idx: usize) -> BindKind {
    let mut kind: Option<BindKind> = None;
    for value in rows.iter().map(|r| &r[idx]) {
        let this = match value {
            SqlValue::Null => continue,
            SqlValue::I64(_) | SqlValue::Bool(_) => BindKind::Int,
            SqlValue::F64(_) => BindKind::Double,
            SqlValue::Date(_) | SqlValue::DateTime(_) => BindKind::Timestamp,
            SqlValue::DateTimeOffset(_) => BindKind::TimestampTz,
            SqlValue::Bytes(_) => BindKind::Raw,
            _ => BindKind::Text,
        };
        kind = Some(match (kind, this) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(BindKind::Int), BindKind::Double) | (Some(BindKind::Double), BindKind::Int) => {
                BindKind::Double
            }
            _ => BindKind::Text,
        });
    }
    kind.unwrap_or(BindKind::Text)
}

fn bind_type(rows: &[Row], idx: usize, kind: BindKind) -> OracleType {
    match kind {
        BindKind::Int => OracleType::Int64,
        BindKind::Double => OracleType::BinaryDouble,
        BindKind::Timestamp => OracleType::Timestamp(9),
        BindKind::TimestampTz => OracleType::TimestampTZ(9),
        BindKind::Raw => {
            let len = rows
                .iter()
                .map(|r| match &r[idx] {
                    SqlValue::Bytes(b) => b.len(),
                    _ => 0,
                })
                .max()
                .unwrap_or(0)
                .max(1);
            if len <= MAX_RAW {
                OracleType::Raw(len as u32)
            } else {
                OracleType::LongRaw
            }
        }
        BindKind::Text => {
            let len = rows
                .iter()
                .map(|r| r[idx].to_text().map_or(0, |s| s.len()))
                .max()
                .unwrap_or(0)
                .max(1);
            if len <= MAX_VARCHAR2 {
                OracleType::Varchar2(len as u32)
            } else {
                OracleType::Long
            }
        }
    }
}

/// Convert a value to a bind parameter of the chosen kind.
fn bind_value(value: &SqlValue, kind: BindKind) -> Box<dyn ToSql + Send> {
    match (kind, value) {
        (BindKind::Int, SqlValue::I64(n)) => Box::new(Some(*n)),
        (BindKind::Int, SqlValue::Bool(b)) => Box::new(Some(i64::from(*b))),
        (BindKind::Int, _) => Box::new(None::<i64>),
        (BindKind::Double, SqlValue::F64(f)) => Box::new(Some(*f)),
        (BindKind::Double, SqlValue::I64(n)) => Box::new(Some(*n as f64)),
        (BindKind::Double, _) => Box::new(None::<f64>),
        (BindKind::Timestamp, SqlValue::DateTime(dt)) => Box::new(Some(*dt)),
        (BindKind::Timestamp, SqlValue::Date(d)) => Box::new(Some(d.and_time(chrono::NaiveTime::MIN))),
        (BindKind::Timestamp, _) => Box::new(None::<NaiveDateTime>),
        (BindKind::TimestampTz, SqlValue::DateTimeOffset(dt)) => Box::new(Some(*dt)),
        (BindKind::TimestampTz, _) => Box::new(None::<DateTime<FixedOffset>>),
        (BindKind::Raw, SqlValue::Bytes(b)) => Box::new(Some(b.clone())),
        (BindKind::Raw, _) => Box::new(None::<Vec<u8>>),
        (BindKind::Text, v) => Box::new(v.to_text()),
    }
}

/// Run a batched insert with per-row error collection.
fn insert_batch(conn: &Connection, table: &str, sql: &str, rows: &[Row]) -> Result<LoadReport> {
    let width = rows.first().map_or(0, Vec::len);
    let kinds: Vec<BindKind> = (0..width).map(|i| bind_kind(rows, i)).collect();

    let mut batch = conn.batch(sql, rows.len()).with_batch_errors().build()?;
    for (i, kind) in kinds.iter().enumerate() {
        batch.set_type(i + 1, &bind_type(rows, i, *kind))?;
    }
    for row in rows {
        let params: Vec<Box<dyn ToSql + Send>> = row
            .iter()
            .zip(&kinds)
            .map(|(v, k)| bind_value(v, *k))
            .collect();
        let refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref() as &dyn ToSql).collect();
        batch.append_row(&refs)?;
    }

    match batch.execute() {
        Ok(()) => Ok(LoadReport {
            loaded: rows.len() as u64,
            errors: Vec::new(),
        }),
        Err(oracle::Error::BatchErrors(errors)) => {
            let errors: Vec<RowError> = errors
                .iter()
                .map(|e| RowError::new(e.offset() as usize, e.message()))
                .collect();
            Ok(LoadReport {
                loaded: (rows.len() - errors.len()) as u64,
                errors,
            })
        }
        Err(e) => {
            if let Err(rollback) = conn.rollback() {
                warn!("Oracle rollback failed: {}", rollback);
            }
            Err(load_error(table, e))
        }
    }
}

/// ORA-00001 becomes a uniqueness failure, anything else a transfer error.
fn load_error(table: &str, e: oracle::Error) -> SyncError {
    match &e {
        oracle::Error::OciError(db) if db.code() == 1 => {
            SyncError::unique_violation(table, db.message())
        }
        _ => SyncError::transfer(table, e.to_string()),
    }
}

#[async_trait]
impl Store for OracleStore {
    fn dialect(&self) -> &'static dyn Dialect {
        &OracleDialect
    }

    async fn ping(&self) -> Result<()> {
        self.blocking(|conn| {
            conn.ping().map_err(|e| SyncError::connection("oracle", e))
        })
        .await
    }

    async fn count(&self, query: &str) -> Result<u64> {
        let query = query.to_string();
        self.blocking(move |conn| {
            let n = conn.query_row_as::<i64>(&query, &[])?;
            Ok(n.max(0) as u64)
        })
        .await
    }

    async fn sequences(&self) -> Result<Vec<SequenceValue>> {
        self.blocking(|conn| {
            let rows = conn.query_as::<(String, i64)>(OracleDialect.sequences_query(), &[])?;
            let mut sequences = Vec::new();
            for row in rows {
                let (name, last_value) = row?;
                sequences.push(SequenceValue { name, last_value });
            }
            Ok(sequences)
        })
        .await
    }
}

#[async_trait]
impl SourceStore for OracleStore {
    async fn list_tables(&self) -> Result<Vec<String>> {
        self.blocking(|conn| {
            let rows = conn.query_as::<String>(OracleDialect.user_tables_query(), &[])?;
            let mut tables = Vec::new();
            for row in rows {
                tables.push(row?);
            }
            Ok(tables)
        })
        .await
    }

    async fn open(&self, table: &str, query: &str) -> Result<Box<dyn RowCursor>> {
        let ready = OracleCursor::spawn(
            Arc::clone(&self.conn),
            table.to_string(),
            query.to_string(),
        );
        let cursor = ready
            .await
            .map_err(|_| SyncError::schema_lookup(table, "cursor thread exited"))??;
        Ok(Box::new(cursor))
    }
}

#[async_trait]
impl DestinationStore for OracleStore {
    async fn bulk_load(&self, table: &str, _copy_sql: &str, _data: Bytes) -> Result<u64> {
        Err(SyncError::transfer(
            table,
            "Oracle has no text bulk-load protocol, use bind mode",
        ))
    }

    async fn execute_batch(&self, table: &str, insert_sql: &str, rows: &[Row]) -> Result<LoadReport> {
        if rows.is_empty() {
            return Ok(LoadReport::default());
        }
        let table = table.to_string();
        let sql = insert_sql.to_string();
        let rows = rows.to_vec();
        self.blocking(move |conn| insert_batch(conn, &table, &sql, &rows))
            .await
    }

    async fn commit(&self) -> Result<()> {
        self.blocking(|conn| Ok(conn.commit()?)).await
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.blocking(move |conn| {
            conn.execute(&sql, &[])?;
            Ok(())
        })
        .await
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<String>> {
        let table = table.to_uppercase();
        self.blocking(move |conn| {
            let rows = conn.query_as::<String>(OracleDialect.foreign_keys_query(), &[&table])?;
            let mut names = Vec::new();
            for row in rows {
                names.push(row?);
            }
            Ok(names)
        })
        .await
    }

    async fn next_sequence_value(&self, name: &str) -> Result<i64> {
        let sql = OracleDialect.nextval_sql(name);
        self.blocking(move |conn| Ok(conn.query_row_as::<i64>(&sql, &[])?))
            .await
    }
}
