//! Oracle dialect.

use super::{Dialect, SequenceStrategy};
use crate::core::Backend;

#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDialect;

impl Dialect for OracleDialect {
    fn backend(&self) -> Backend {
        Backend::Oracle
    }

    fn mask_column(&self, column: &str) -> String {
        column.to_string()
    }

    fn placeholder(&self, position: usize, _binary: bool) -> String {
        format!(":{}", position)
    }

    fn copy_sql(&self, _table: &str, _columns: &[String]) -> Option<String> {
        None
    }

    fn truncate_sql(&self, table: &str) -> String {
        format!("truncate table {} cascade", table)
    }

    fn triggers_sql(&self, table: &str, enabled: bool) -> String {
        let action = if enabled { "ENABLE" } else { "DISABLE" };
        format!("ALTER TABLE {} {} ALL TRIGGERS", table, action)
    }

    fn foreign_keys_query(&self) -> &'static str {
        "select constraint_name from user_constraints \
         where table_name = :1 and constraint_type = 'R'"
    }

    fn foreign_keys_sql(&self, table: &str, constraints: &[String], enabled: bool) -> Vec<String> {
        let action = if enabled { "ENABLE" } else { "DISABLE" };
        constraints
            .iter()
            .map(|c| format!("ALTER TABLE {} {} CONSTRAINT {}", table, action, c))
            .collect()
    }

    fn user_tables_query(&self) -> &'static str {
        "select table_name from user_tables"
    }

    fn sequences_query(&self) -> &'static str {
        "select sequence_name, last_number from user_sequences"
    }

    fn sequence_strategy(&self) -> SequenceStrategy {
        SequenceStrategy::IncrementStep
    }

    fn nextval_sql(&self, name: &str) -> String {
        format!("select {}.nextval from dual", name)
    }
}
