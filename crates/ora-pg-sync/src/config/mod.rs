//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::collections::BTreeMap;
use std::path::Path;

use tokio_postgres::Config as PgConfig;

use crate::core::TableSpec;
use crate::error::{Result, SyncError};

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(yaml)?;
        config.copy.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl PostgresConfig {
    /// Build the tokio-postgres connection settings.
    ///
    /// TLS is negotiated by the connector, so `sslmode` is not set here.
    pub fn pg_config(&self) -> PgConfig {
        let mut pg_config = PgConfig::new();
        pg_config.host(&self.host);
        pg_config.port(self.port);
        pg_config.dbname(&self.database);
        pg_config.user(&self.user);
        pg_config.password(&self.password);
        pg_config.options(&format!("-c search_path={}", self.schema));
        pg_config
    }
}

impl CopyConfig {
    /// Upper-case table names, override keys and ordering names so they match
    /// catalog names.
    pub fn normalize(&mut self) {
        for name in self.tables.iter_mut().chain(self.exclude_tables.iter_mut()) {
            *name = name.trim().to_uppercase();
        }
        match &mut self.ordering {
            Ordering::Anchors(anchors) => {
                for name in anchors.iter_mut() {
                    *name = name.trim().to_uppercase();
                }
            }
            Ordering::Dependencies(deps) => {
                for dep in deps.iter_mut() {
                    dep.table = dep.table.trim().to_uppercase();
                    for name in dep.depends_on.iter_mut() {
                        *name = name.trim().to_uppercase();
                    }
                }
            }
        }
        self.replace_query = std::mem::take(&mut self.replace_query)
            .into_iter()
            .map(|(table, query)| (table.trim().to_uppercase(), query))
            .collect();
    }

    /// Build the immutable per-table settings for the given worklist.
    pub fn table_specs(&self, tables: &[String]) -> Vec<TableSpec> {
        tables
            .iter()
            .map(|name| {
                TableSpec::new(name.clone(), self.batch_size)
                    .with_override(self.replace_query.get(name).cloned())
                    .with_binary_columns(self.binary_columns.iter().cloned())
            })
            .collect()
    }
}

/// Parse a comma separated table list: spaces and newlines are dropped and
/// names upper-cased.
pub fn parse_table_list(list: &str) -> Vec<String> {
    list.chars()
        .filter(|c| *c != ' ' && *c != '\n' && *c != '\r')
        .collect::<String>()
        .to_uppercase()
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `TABLE[query]` overrides into a map keyed by upper-cased table name.
pub fn parse_replace_query<S: AsRef<str>>(items: &[S]) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for item in items {
        let item = item.as_ref().trim();
        let parsed = item
            .strip_suffix(']')
            .and_then(|body| body.split_once('['));
        match parsed {
            Some((table, query)) if !table.trim().is_empty() => {
                map.insert(table.trim().to_uppercase(), query.to_string());
            }
            _ => {
                return Err(SyncError::Config(format!(
                    "Format error, use: \"table[query]\", not: \"{}\"",
                    item
                )))
            }
        }
    }
    Ok(map)
}
