//! PostgreSQL store on a single tokio-postgres connection.
//!
//! As a source, a table query runs through a server-side `NO SCROLL` cursor
//! inside its own transaction and is fetched `n` rows at a time. As a
//! destination, every load unit opens a transaction that stays open until
//! [`DestinationStore::commit`]; a failing unit is rolled back before the
//! error is returned.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::SinkExt;
use tokio::sync::Mutex;
use tokio_postgres::error::SqlState;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};
use tokio_postgres::types::{to_sql_checked, Format, IsNull, ToSql, Type};
use tokio_postgres::{Client, Config as PgConfig, NoTls, Socket, Statement};
use tracing::{debug, error, info, warn};

use super::tls::SslMode;
use crate::config::PostgresConfig;
use crate::core::{
    DestinationStore, LoadReport, Row, RowCursor, SequenceValue, SourceStore, SqlValue, Store,
};
use crate::dialect::{Dialect, PostgresDialect};
use crate::error::{Result, SyncError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const CURSOR_NAME: &str = "ora_pg_sync_cursor";

struct Session {
    client: Client,
    in_transaction: bool,

    // last prepared insert, reused while the same statement is loaded
    prepared: Option<(String, Statement)>,
}

impl Session {
    async fn begin(&mut self) -> Result<()> {
        if !self.in_transaction {
            self.client.batch_execute("BEGIN").await?;
            self.in_transaction = true;
        }
        Ok(())
    }

    async fn rollback(&mut self) {
        if self.in_transaction {
            if let Err(e) = self.client.batch_execute("ROLLBACK").await {
                warn!("PostgreSQL rollback failed: {}", e);
            }
            self.in_transaction = false;
        }
    }

    async fn statement(&mut self, sql: &str) -> Result<Statement> {
        if let Some((cached, stmt)) = &self.prepared {
            if cached == sql {
                return Ok(stmt.clone());
            }
        }
        let stmt = self.client.prepare(sql).await?;
        self.prepared = Some((sql.to_string(), stmt.clone()));
        Ok(stmt)
    }
}

/// PostgreSQL side of a copy.
pub struct PgStore {
    session: Arc<Mutex<Session>>,
}

impl PgStore {
    /// Connect and verify the connection.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let ssl_mode = SslMode::parse(&config.ssl_mode)?;
        let mut pg_config = config.pg_config();
        pg_config.ssl_mode(ssl_mode.negotiation());
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(CONNECT_TIMEOUT);

        let client = match ssl_mode.connector()? {
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                connect_with(&pg_config, NoTls).await?
            }
            Some(tls) => connect_with(&pg_config, tls).await?,
        };
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| SyncError::connection("postgres", e))?;

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            session: Arc::new(Mutex::new(Session {
                client,
                in_transaction: false,
                prepared: None,
            })),
        })
    }
}

async fn connect_with<T>(config: &PgConfig, tls: T) -> Result<Client>
where
    T: MakeTlsConnect<Socket> + Send + 'static,
    T::Stream: Send + 'static,
    T::TlsConnect: Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let (client, connection) = config
        .connect(tls)
        .await
        .map_err(|e| SyncError::connection("postgres", e))?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("PostgreSQL connection error: {}", e);
        }
    });
    Ok(client)
}

/// Map a load failure: unique violations become recoverable.
fn load_error(table: &str, e: tokio_postgres::Error) -> SyncError {
    if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        let message = e
            .as_db_error()
            .map(|db| db.message().to_string())
            .unwrap_or_else(|| e.to_string());
        SyncError::unique_violation(table, message)
    } else {
        SyncError::transfer(table, e.to_string())
    }
}

/// Last value handed out by a sequence. Until `nextval` is called on a fresh
/// or restarted sequence, `last_value` is the value it hands out next.
fn allocated_value(last_value: i64, is_called: bool, increment: i64) -> i64 {
    if is_called {
        last_value
    } else {
        last_value - increment
    }
}

/// Bind parameter sent in text format so the server casts it to the
/// target column type. Bytes go out in binary format for `bytea`.
#[derive(Debug)]
enum PgParam<'a> {
    Text(Option<String>),
    Bytes(&'a [u8]),
}

impl<'a> From<&'a SqlValue> for PgParam<'a> {
    fn from(value: &'a SqlValue) -> Self {
        match value {
            SqlValue::Bytes(b) => PgParam::Bytes(b),
            other => PgParam::Text(other.to_text()),
        }
    }
}

impl ToSql for PgParam<'_> {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn StdError + Sync + Send>> {
        match self {
            PgParam::Text(None) => return Ok(IsNull::Yes),
            PgParam::Text(Some(s)) => out.extend_from_slice(s.as_bytes()),
            PgParam::Bytes(b) if *ty == Type::BYTEA => out.extend_from_slice(b),
            PgParam::Bytes(b) => {
                out.extend_from_slice(b"\\x");
                out.extend_from_slice(hex::encode(b).as_bytes());
            }
        }
        Ok(IsNull::No)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, ty: &Type) -> Format {
        match self {
            PgParam::Bytes(_) if *ty == Type::BYTEA => Format::Binary,
            _ => Format::Text,
        }
    }

    to_sql_checked!();
}

/// Decode one column of a result row.
fn decode(row: &tokio_postgres::Row, idx: usize) -> Result<SqlValue> {
    fn opt<T>(v: Option<T>, f: impl FnOnce(T) -> SqlValue) -> SqlValue {
        v.map(f).unwrap_or(SqlValue::Null)
    }

    let ty = row.columns()[idx].type_().clone();
    let value = match ty {
        Type::BOOL => opt(row.try_get::<_, Option<bool>>(idx)?, SqlValue::Bool),
        Type::INT2 => opt(row.try_get::<_, Option<i16>>(idx)?, |v| SqlValue::I64(v.into())),
        Type::INT4 => opt(row.try_get::<_, Option<i32>>(idx)?, |v| SqlValue::I64(v.into())),
        Type::INT8 => opt(row.try_get::<_, Option<i64>>(idx)?, SqlValue::I64),
        Type::FLOAT4 => opt(row.try_get::<_, Option<f32>>(idx)?, |v| SqlValue::F64(v.into())),
        Type::FLOAT8 => opt(row.try_get::<_, Option<f64>>(idx)?, SqlValue::F64),
        Type::NUMERIC => opt(row.try_get::<_, Option<rust_decimal::Decimal>>(idx)?, |v| {
            SqlValue::Numeric(v.to_string())
        }),
        Type::BYTEA => opt(row.try_get::<_, Option<Vec<u8>>>(idx)?, SqlValue::Bytes),
        Type::UUID => opt(row.try_get::<_, Option<uuid::Uuid>>(idx)?, SqlValue::Uuid),
        Type::DATE => opt(row.try_get::<_, Option<chrono::NaiveDate>>(idx)?, SqlValue::Date),
        Type::TIME => opt(row.try_get::<_, Option<chrono::NaiveTime>>(idx)?, SqlValue::Time),
        Type::TIMESTAMP => opt(
            row.try_get::<_, Option<chrono::NaiveDateTime>>(idx)?,
            SqlValue::DateTime,
        ),
        Type::TIMESTAMPTZ => opt(
            row.try_get::<_, Option<chrono::DateTime<chrono::FixedOffset>>>(idx)?,
            SqlValue::DateTimeOffset,
        ),
        Type::JSON | Type::JSONB => opt(row.try_get::<_, Option<serde_json::Value>>(idx)?, |v| {
            SqlValue::Text(v.to_string())
        }),
        _ => opt(row.try_get::<_, Option<String>>(idx)?, SqlValue::Text),
    };
    Ok(value)
}

fn decode_row(row: &tokio_postgres::Row) -> Result<Row> {
    (0..row.len()).map(|i| decode(row, i)).collect()
}

/// Server-side cursor over one table query.
struct PgCursor {
    session: Arc<Mutex<Session>>,
    columns: Arc<[String]>,
    open: bool,
}

#[async_trait]
impl RowCursor for PgCursor {
    fn columns(&self) -> Arc<[String]> {
        Arc::clone(&self.columns)
    }

    async fn fetch(&mut self, max_rows: usize) -> Result<Vec<Row>> {
        if !self.open {
            return Ok(Vec::new());
        }
        let mut session = self.session.lock().await;
        let sql = format!("FETCH {} FROM {}", max_rows, CURSOR_NAME);
        let rows = session.client.query(sql.as_str(), &[]).await?;
        if rows.is_empty() {
            session
                .client
                .batch_execute(&format!("CLOSE {}; COMMIT", CURSOR_NAME))
                .await?;
            session.in_transaction = false;
            self.open = false;
            return Ok(Vec::new());
        }
        rows.iter().map(decode_row).collect()
    }
}

#[async_trait]
impl Store for PgStore {
    fn dialect(&self) -> &'static dyn Dialect {
        &PostgresDialect
    }

    async fn ping(&self) -> Result<()> {
        let session = self.session.lock().await;
        session
            .client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| SyncError::connection("postgres", e))?;
        Ok(())
    }

    async fn count(&self, query: &str) -> Result<u64> {
        let session = self.session.lock().await;
        let row = session.client.query_one(query, &[]).await?;
        Ok(row.get::<_, i64>(0).max(0) as u64)
    }

    async fn sequences(&self) -> Result<Vec<SequenceValue>> {
        let session = self.session.lock().await;
        let rows = session
            .client
            .query(PostgresDialect.sequences_query(), &[])
            .await?;
        let mut sequences = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.get(0);
            let increment: i64 = row.get(1);
            let state = session
                .client
                .query_one(PostgresDialect.sequence_value_sql(&name).as_str(), &[])
                .await?;
            sequences.push(SequenceValue {
                name: name.to_uppercase(),
                last_value: allocated_value(state.get(0), state.get(1), increment),
            });
        }
        Ok(sequences)
    }
}

#[async_trait]
impl SourceStore for PgStore {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let session = self.session.lock().await;
        let rows = session
            .client
            .query(PostgresDialect.user_tables_query(), &[])
            .await?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn open(&self, table: &str, query: &str) -> Result<Box<dyn RowCursor>> {
        let mut session = self.session.lock().await;
        let described = session
            .client
            .prepare(query)
            .await
            .map_err(|e| SyncError::schema_lookup(table, e))?;
        let columns: Arc<[String]> = described
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect::<Vec<_>>()
            .into();

        session.begin().await?;
        let declare = format!("DECLARE {} NO SCROLL CURSOR FOR {}", CURSOR_NAME, query);
        debug!("{}", declare);
        if let Err(e) = session.client.batch_execute(&declare).await {
            session.rollback().await;
            return Err(SyncError::schema_lookup(table, e));
        }

        Ok(Box::new(PgCursor {
            session: Arc::clone(&self.session),
            columns,
            open: true,
        }))
    }
}

#[async_trait]
impl DestinationStore for PgStore {
    async fn bulk_load(&self, table: &str, copy_sql: &str, data: Bytes) -> Result<u64> {
        let mut session = self.session.lock().await;
        session.begin().await?;

        let result = async {
            let sink = session.client.copy_in(copy_sql).await?;
            futures::pin_mut!(sink);
            sink.send(data).await?;
            sink.finish().await
        }
        .await;

        match result {
            Ok(rows) => Ok(rows),
            Err(e) => {
                session.rollback().await;
                Err(load_error(table, e))
            }
        }
    }

    async fn execute_batch(&self, table: &str, insert_sql: &str, rows: &[Row]) -> Result<LoadReport> {
        let mut session = self.session.lock().await;
        session.begin().await?;
        let stmt = match session.statement(insert_sql).await {
            Ok(stmt) => stmt,
            Err(e) => {
                session.rollback().await;
                return Err(e);
            }
        };

        for row in rows {
            let params: Vec<PgParam<'_>> = row.iter().map(PgParam::from).collect();
            let refs: Vec<&(dyn ToSql + Sync)> =
                params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
            if let Err(e) = session.client.execute(&stmt, &refs).await {
                session.rollback().await;
                return Err(load_error(table, e));
            }
        }

        Ok(LoadReport {
            loaded: rows.len() as u64,
            errors: Vec::new(),
        })
    }

    async fn commit(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.in_transaction {
            session.client.batch_execute("COMMIT").await?;
            session.in_transaction = false;
        }
        Ok(())
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        let session = self.session.lock().await;
        session.client.batch_execute(sql).await?;
        Ok(())
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<String>> {
        let session = self.session.lock().await;
        let rows = session
            .client
            .query(
                PostgresDialect.foreign_keys_query(),
                &[&table.to_lowercase()],
            )
            .await?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    async fn next_sequence_value(&self, name: &str) -> Result<i64> {
        let session = self.session.lock().await;
        let row = session
            .client
            .query_one(PostgresDialect.nextval_sql(name).as_str(), &[])
            .await?;
        Ok(row.get(0))
    }
}
