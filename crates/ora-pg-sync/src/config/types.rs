//! Configuration type definitions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{Direction, LoadMode};

/// Anchor tables copied first when no dependency list is configured.
pub const LEGACY_ANCHORS: [&str; 3] = ["HISTORY", "TEXT_TLG_NEW", "ARC_REF"];

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Copy direction (default: ora_to_pg).
    #[serde(default)]
    pub direction: Direction,

    /// Oracle connection settings.
    pub oracle: OracleConfig,

    /// PostgreSQL connection settings.
    pub postgres: PostgresConfig,

    /// Copy behavior.
    #[serde(default)]
    pub copy: CopyConfig,
}

/// Oracle connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    pub user: String,

    pub password: String,

    /// Easy-connect string or TNS alias (e.g. `dbhost:1521/ORCLPDB1`).
    pub connect_string: String,
}

impl fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleConfig")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("connect_string", &self.connect_string)
            .finish()
    }
}

/// PostgreSQL connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    pub database: String,

    pub user: String,

    pub password: String,

    /// Schema put first on the search path (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// SSL mode: disable, prefer, require, verify-ca, verify-full (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Copy behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyConfig {
    /// Tables to copy, in the given order.
    pub tables: Vec<String>,

    /// Tables to leave out of the full source catalog.
    pub exclude_tables: Vec<String>,

    /// Per-table query replacing `select * from <table>`.
    pub replace_query: BTreeMap<String, String>,

    /// Columns routed through the legacy byte encoding.
    pub binary_columns: Vec<String>,

    /// Rows per fetched batch (default: 6000).
    pub batch_size: usize,

    /// Bound-parameter batches or bulk COPY (default: bind).
    pub load_mode: LoadMode,

    /// Escape worker threads in copy mode (default: 1, no pool).
    pub workers: usize,

    /// Truncate destination tables before copying.
    pub truncate: bool,

    /// Disable destination triggers during the copy.
    pub disable_triggers: bool,

    /// Disable destination referential constraints during the copy.
    pub disable_foreign_keys: bool,

    /// Skip the truncate confirmation.
    pub force: bool,

    /// Do not count rows before copying.
    pub skip_count: bool,

    /// Table ordering strategy, written as `{ anchors: [...] }` or
    /// `{ dependencies: [...] }`.
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub ordering: Ordering,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            tables: Vec::new(),
            exclude_tables: Vec::new(),
            replace_query: BTreeMap::new(),
            binary_columns: Vec::new(),
            batch_size: default_batch_size(),
            load_mode: LoadMode::default(),
            workers: 1,
            truncate: false,
            disable_triggers: false,
            disable_foreign_keys: false,
            force: false,
            skip_count: false,
            ordering: Ordering::default(),
        }
    }
}

/// How the table worklist is reordered before copying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ordering {
    /// Move each named table to the head, in list order (the last one ends up first).
    Anchors(Vec<String>),

    /// Topological order over explicit edges, stable among independent tables.
    Dependencies(Vec<Dependency>),
}

impl Default for Ordering {
    fn default() -> Self {
        Ordering::Anchors(LEGACY_ANCHORS.iter().map(|s| s.to_string()).collect())
    }
}

/// `table` must be loaded after every table in `depends_on`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub table: String,

    #[serde(default)]
    pub depends_on: Vec<String>,
}

fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_batch_size() -> usize {
    6000
}
