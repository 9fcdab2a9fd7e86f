//! SQL dialects (Strategy pattern).
//!
//! Every statement the engine issues against a store is rendered by a
//! [`Dialect`], so the components above the adapters never contain
//! backend-specific SQL.

mod oracle;
mod postgres;

pub use oracle::OracleDialect;
pub use postgres::PostgresDialect;

use crate::core::Backend;

/// How a destination allocator is moved forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStrategy {
    /// `RESTART WITH n` is available.
    Restart,

    /// Temporarily widen the increment step and allocate once.
    IncrementStep,
}

/// Backend-specific SQL syntax.
pub trait Dialect: Send + Sync {
    /// The backend this dialect renders for.
    fn backend(&self) -> Backend;

    /// Column name as it must appear in a column list (reserved words quoted).
    fn mask_column(&self, column: &str) -> String;

    /// Positional bind placeholder, 1-based.
    fn placeholder(&self, position: usize, binary: bool) -> String;

    /// Bulk-load statement, `None` when the backend has no text bulk protocol.
    fn copy_sql(&self, table: &str, columns: &[String]) -> Option<String>;

    fn truncate_sql(&self, table: &str) -> String;

    fn triggers_sql(&self, table: &str, enabled: bool) -> String;

    /// Query listing referential constraint names of one table (one bind parameter).
    fn foreign_keys_query(&self) -> &'static str;

    /// Statements suspending or restoring referential checks on a table.
    fn foreign_keys_sql(&self, table: &str, constraints: &[String], enabled: bool) -> Vec<String>;

    fn drop_constraint_sql(&self, table: &str, constraint: &str) -> String {
        format!("ALTER TABLE {} DROP CONSTRAINT {}", table, constraint)
    }

    /// Query listing user tables (one text column).
    fn user_tables_query(&self) -> &'static str;

    /// Query listing sequences as (name, last value).
    fn sequences_query(&self) -> &'static str;

    fn sequence_strategy(&self) -> SequenceStrategy;

    fn restart_sequence_sql(&self, name: &str, value: i64) -> String {
        format!("ALTER SEQUENCE {} RESTART WITH {}", name, value)
    }

    fn sequence_increment_sql(&self, name: &str, step: i64) -> String {
        format!("ALTER SEQUENCE {} INCREMENT BY {}", name, step)
    }

    fn nextval_sql(&self, name: &str) -> String;

    /// Row count query for a whole table.
    fn count_sql(&self, table: &str) -> String {
        format!("select count(*) from {}", table)
    }

    /// Parameterized insert for the given live column order.
    fn insert_sql(&self, table: &str, columns: &[String], placeholders: &[String]) -> String {
        let masked: Vec<String> = columns.iter().map(|c| self.mask_column(c)).collect();
        format!(
            "insert into {}({}) values ({})",
            table,
            masked.join(","),
            placeholders.join(",")
        )
    }
}

/// Dialect for a backend.
pub fn for_backend(backend: Backend) -> &'static dyn Dialect {
    match backend {
        Backend::Oracle => &OracleDialect,
        Backend::Postgres => &PostgresDialect,
    }
}
