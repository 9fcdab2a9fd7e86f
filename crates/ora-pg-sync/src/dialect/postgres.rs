//! PostgreSQL dialect.

use super::{Dialect, SequenceStrategy};
use crate::core::Backend;

/// Column names that collide with PostgreSQL reserved words.
const RESERVED_COLUMNS: &[&str] = &["END"];

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn backend(&self) -> Backend {
        Backend::Postgres
    }

    fn mask_column(&self, column: &str) -> String {
        if RESERVED_COLUMNS.contains(&column) {
            format!("\"{}\"", column)
        } else {
            column.to_string()
        }
    }

    fn placeholder(&self, position: usize, binary: bool) -> String {
        if binary {
            format!("${}::bytea", position)
        } else {
            format!("${}", position)
        }
    }

    fn copy_sql(&self, table: &str, columns: &[String]) -> Option<String> {
        let masked: Vec<String> = columns.iter().map(|c| self.mask_column(c)).collect();
        Some(format!("copy {}({}) from STDIN", table, masked.join(",")))
    }

    fn truncate_sql(&self, table: &str) -> String {
        format!("truncate table {}", table)
    }

    fn triggers_sql(&self, table: &str, enabled: bool) -> String {
        let action = if enabled { "ENABLE" } else { "DISABLE" };
        format!("ALTER TABLE {} {} TRIGGER USER", table, action)
    }

    fn foreign_keys_query(&self) -> &'static str {
        "select constraint_name from information_schema.table_constraints \
         where constraint_type='FOREIGN KEY' and table_name = $1"
    }

    // Referential checks run as internal triggers; there is no per-constraint switch.
    fn foreign_keys_sql(&self, table: &str, _constraints: &[String], enabled: bool) -> Vec<String> {
        let action = if enabled { "ENABLE" } else { "DISABLE" };
        vec![format!("ALTER TABLE {} {} TRIGGER ALL", table, action)]
    }

    fn user_tables_query(&self) -> &'static str {
        "select upper(tablename) from pg_tables where schemaname = current_schema() order by tablename"
    }

    // Names and steps only; the value comes from `sequence_value_sql`.
    fn sequences_query(&self) -> &'static str {
        "select sequencename, increment_by from pg_sequences \
         where schemaname = current_schema() order by sequencename"
    }

    fn sequence_strategy(&self) -> SequenceStrategy {
        SequenceStrategy::Restart
    }

    fn nextval_sql(&self, name: &str) -> String {
        format!("select nextval('{}')", name)
    }
}

impl PostgresDialect {
    /// Allocator state of one sequence, read from the sequence relation.
    pub fn sequence_value_sql(&self, name: &str) -> String {
        format!(
            "select last_value, is_called from \"{}\"",
            name.replace('"', "\"\"")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        let d = PostgresDialect;
        assert_eq!(d.placeholder(1, true), "$1::bytea");
        assert_eq!(d.placeholder(2, false), "$2");
    }

    #[test]
    fn test_copy_sql() {
        let d = PostgresDialect;
        let cols = vec!["ID".to_string(), "END".to_string()];
        assert_eq!(
            d.copy_sql("EVENTS", &cols).unwrap(),
            "copy EVENTS(ID,\"END\") from STDIN"
        );
    }

    #[test]
    fn test_sequence_grammar() {
        let d = PostgresDialect;
        assert_eq!(d.sequence_strategy(), SequenceStrategy::Restart);
        assert_eq!(
            d.restart_sequence_sql("ORDERS_SEQ", 101),
            "ALTER SEQUENCE ORDERS_SEQ RESTART WITH 101"
        );
        assert_eq!(
            d.sequence_value_sql("orders_seq"),
            "select last_value, is_called from \"orders_seq\""
        );
    }

    #[test]
    fn test_triggers_and_foreign_keys() {
        let d = PostgresDialect;
        assert_eq!(
            d.triggers_sql("CHILD", false),
            "ALTER TABLE CHILD DISABLE TRIGGER USER"
        );
        assert_eq!(
            d.foreign_keys_sql("CHILD", &["FK_1".into()], true),
            vec!["ALTER TABLE CHILD ENABLE TRIGGER ALL".to_string()]
        );
    }
}
