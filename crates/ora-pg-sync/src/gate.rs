//! Referential and trigger protection around a load.
//!
//! Disabling walks the tables in load order and enabling walks them in
//! reverse, so teardown and restore mirror each other without a dependency
//! graph. Truncate also walks in reverse (children before parents).

use tracing::{debug, info};

use crate::core::{Confirmation, DestinationStore};
use crate::error::{Result, SyncError};

/// Toggles destination protections for a table list.
pub struct ConstraintGate<'a> {
    destination: &'a dyn DestinationStore,
}

impl<'a> ConstraintGate<'a> {
    pub fn new(destination: &'a dyn DestinationStore) -> Self {
        Self { destination }
    }

    /// Suspend referential checks, forward order.
    pub async fn disable(&self, tables: &[String]) -> Result<()> {
        for table in tables {
            self.toggle_foreign_keys(table, false).await?;
        }
        Ok(())
    }

    /// Restore referential checks, reverse order.
    pub async fn enable(&self, tables: &[String]) -> Result<()> {
        for table in tables.iter().rev() {
            self.toggle_foreign_keys(table, true).await?;
        }
        Ok(())
    }

    async fn toggle_foreign_keys(&self, table: &str, enabled: bool) -> Result<()> {
        let dialect = self.destination.dialect();
        let constraints = self.destination.foreign_keys(table).await?;
        for sql in dialect.foreign_keys_sql(table, &constraints, enabled) {
            self.run(&sql).await?;
        }
        Ok(())
    }

    pub async fn disable_triggers(&self, tables: &[String]) -> Result<()> {
        for table in tables {
            let sql = self.destination.dialect().triggers_sql(table, false);
            self.run(&sql).await?;
        }
        Ok(())
    }

    pub async fn enable_triggers(&self, tables: &[String]) -> Result<()> {
        for table in tables.iter().rev() {
            let sql = self.destination.dialect().triggers_sql(table, true);
            self.run(&sql).await?;
        }
        Ok(())
    }

    /// Empty every table after an explicit confirmation.
    pub async fn truncate(&self, tables: &[String], confirmation: &dyn Confirmation) -> Result<()> {
        if !confirmation.confirm_truncate(tables) {
            return Err(SyncError::NotConfirmed);
        }
        for table in tables.iter().rev() {
            let sql = self.destination.dialect().truncate_sql(table);
            self.run(&sql).await?;
        }
        info!("Truncated {} tables", tables.len());
        Ok(())
    }

    /// Drop every referential constraint of every table.
    ///
    /// Returns (table, constraint) pairs in the order they were dropped.
    pub async fn drop_foreign_keys(&self, tables: &[String]) -> Result<Vec<(String, String)>> {
        let mut dropped = Vec::new();
        for table in tables {
            for constraint in self.destination.foreign_keys(table).await? {
                let sql = self
                    .destination
                    .dialect()
                    .drop_constraint_sql(table, &constraint);
                self.run(&sql).await?;
                dropped.push((table.clone(), constraint));
            }
        }
        Ok(dropped)
    }

    async fn run(&self, sql: &str) -> Result<()> {
        debug!("{}", sql);
        self.destination.execute(sql).await
    }
}
