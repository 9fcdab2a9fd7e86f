//! Configuration validation.

use super::{Config, Ordering};
use crate::core::{Direction, LoadMode};
use crate::count;
use crate::error::{Result, SyncError};
use crate::planner;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Oracle validation
    if config.oracle.user.is_empty() {
        return Err(SyncError::Config("oracle.user is required".into()));
    }
    if config.oracle.connect_string.is_empty() {
        return Err(SyncError::Config("oracle.connect_string is required".into()));
    }

    // PostgreSQL validation
    if config.postgres.host.is_empty() {
        return Err(SyncError::Config("postgres.host is required".into()));
    }
    if config.postgres.database.is_empty() {
        return Err(SyncError::Config("postgres.database is required".into()));
    }
    if config.postgres.user.is_empty() {
        return Err(SyncError::Config("postgres.user is required".into()));
    }

    let copy = &config.copy;
    if copy.batch_size == 0 {
        return Err(SyncError::Config("copy.batch_size must be at least 1".into()));
    }
    if copy.workers == 0 {
        return Err(SyncError::Config("copy.workers must be at least 1".into()));
    }
    if copy.load_mode == LoadMode::Copy && config.direction == Direction::PgToOra {
        return Err(SyncError::Config(
            "copy.load_mode 'copy' requires a PostgreSQL destination".into(),
        ));
    }
    if !copy.tables.is_empty() && !copy.exclude_tables.is_empty() {
        return Err(SyncError::Config(
            "copy.tables and copy.exclude_tables are mutually exclusive".into(),
        ));
    }

    for (table, query) in &copy.replace_query {
        if count::from_keyword_end(query).is_none() {
            return Err(SyncError::Config(format!(
                "replace_query for {} has no FROM clause: {}",
                table, query
            )));
        }
    }

    if let Ordering::Dependencies(deps) = &copy.ordering {
        let mut tables: Vec<String> = Vec::new();
        for dep in deps {
            for name in std::iter::once(&dep.table).chain(dep.depends_on.iter()) {
                if !tables.contains(name) {
                    tables.push(name.clone());
                }
            }
        }
        planner::dependency_order(&tables, deps)?;
    }

    Ok(())
}
