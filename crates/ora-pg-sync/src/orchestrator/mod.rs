//! Run coordinator.
//!
//! Resolves the table worklist, plans its order and drives every table
//! through extraction, encoding and loading, one table and one batch at a
//! time. The terminal modes (sequence reconciliation, FK drop, count and
//! table-list comparison, health check) bypass the copy pipeline.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::{
    Confirmation, CopyOutcome, DestinationStore, Preconfirmed, ProgressSink, SequenceState,
    SourceStore, TableSpec,
};
use crate::count;
use crate::encode::Encoder;
use crate::error::{Result, SyncError};
use crate::extract::Extraction;
use crate::gate::ConstraintGate;
use crate::loader::BatchLoader;
use crate::planner;
use crate::sequence::SequenceReconciler;

/// Coordinates one invocation against a source and a destination store.
pub struct Orchestrator<S, D> {
    config: Config,
    source: S,
    destination: D,
}

/// Result of a copy run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyResult {
    /// Unique run identifier.
    pub run_id: String,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Per-table outcomes, in load order.
    pub tables: Vec<CopyOutcome>,

    /// Rows fed to the loader.
    pub rows_attempted: u64,

    /// Rows the destination accepted.
    pub rows_loaded: u64,

    /// Rows rejected and dropped.
    pub rows_failed: u64,

    /// Tables skipped because they could not be described.
    pub skipped_tables: Vec<String>,
}

impl CopyResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Source vs destination row count of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountComparison {
    pub table: String,

    /// The source count used the table's override query.
    pub overridden: bool,

    pub source_count: u64,
    pub destination_count: u64,
}

impl CountComparison {
    pub fn matches(&self) -> bool {
        self.source_count == self.destination_count
    }
}

impl std::fmt::Display for CountComparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}: source: {}, destination: {}",
            if self.overridden { "*" } else { " " },
            self.table,
            self.source_count,
            self.destination_count
        )
    }
}

/// Configured table list vs the source catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableListComparison {
    /// Listed tables absent from the catalog.
    pub extra: Vec<String>,

    /// Catalog tables not listed.
    pub not_listed: Vec<String>,
}

/// Connectivity of both stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub destination_connected: bool,
    pub destination_latency_ms: u64,
    pub destination_error: Option<String>,
    pub healthy: bool,
}

impl<S: SourceStore, D: DestinationStore> Orchestrator<S, D> {
    /// Bind a configuration to its stores.
    ///
    /// Fails when the stores do not match the configured direction.
    pub fn new(config: Config, source: S, destination: D) -> Result<Self> {
        let direction = config.direction;
        if source.dialect().backend() != direction.source()
            || destination.dialect().backend() != direction.destination()
        {
            return Err(SyncError::Config(format!(
                "direction {:?} needs a {} source and a {} destination",
                direction,
                direction.source(),
                direction.destination()
            )));
        }
        Ok(Self {
            config,
            source,
            destination,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The worklist: the configured tables, or the source catalog minus the
    /// exclusions, in catalog order.
    pub async fn resolve_tables(&self) -> Result<Vec<String>> {
        let copy = &self.config.copy;
        if !copy.tables.is_empty() {
            return Ok(copy.tables.clone());
        }
        let catalog = self.source.list_tables().await?;
        Ok(catalog
            .into_iter()
            .filter(|t| !copy.exclude_tables.contains(t))
            .collect())
    }

    /// Resolve and order the worklist.
    pub async fn plan_tables(&self) -> Result<Vec<String>> {
        let tables = self.resolve_tables().await?;
        let ordered = planner::plan(&tables, &self.config.copy.ordering)?;
        info!("Copy order: {}", ordered.join(", "));
        Ok(ordered)
    }

    /// Copy every table, with the configured protections around the load.
    pub async fn copy(
        &self,
        progress: &dyn ProgressSink,
        confirmation: &dyn Confirmation,
    ) -> Result<CopyResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let copy = &self.config.copy;
        info!(
            "Starting copy run {} ({:?}, {:?} mode)",
            run_id, self.config.direction, copy.load_mode
        );

        let tables = self.plan_tables().await?;
        let gate = ConstraintGate::new(&self.destination);

        let disabled = async {
            if copy.disable_triggers {
                gate.disable_triggers(&tables).await?;
            }
            if copy.disable_foreign_keys {
                gate.disable(&tables).await?;
            }
            Ok::<(), SyncError>(())
        }
        .await;
        if let Err(e) = disabled {
            return Err(self.restore(&gate, &tables, e).await);
        }

        let result = async {
            if copy.truncate {
                let confirmation: &dyn Confirmation = if copy.force {
                    &Preconfirmed
                } else {
                    confirmation
                };
                gate.truncate(&tables, confirmation).await?;
            }
            self.copy_tables(&tables, progress).await
        }
        .await;

        let outcomes = match result {
            Ok(outcomes) => {
                self.restore_protections(&gate, &tables).await?;
                outcomes
            }
            Err(e) => return Err(self.restore(&gate, &tables, e).await),
        };

        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        let result = CopyResult {
            run_id,
            started_at,
            completed_at,
            duration_seconds,
            rows_attempted: outcomes.iter().map(|o| o.rows_attempted).sum(),
            rows_loaded: outcomes.iter().map(|o| o.rows_loaded).sum(),
            rows_failed: outcomes.iter().map(|o| o.errors.len() as u64).sum(),
            skipped_tables: outcomes
                .iter()
                .filter(|o| o.skipped.is_some())
                .map(|o| o.table.clone())
                .collect(),
            tables: outcomes,
        };
        info!(
            "Copy run {} finished: {} rows loaded, {} rejected in {:.2}s",
            result.run_id, result.rows_loaded, result.rows_failed, result.duration_seconds
        );
        Ok(result)
    }

    async fn restore_protections(&self, gate: &ConstraintGate<'_>, tables: &[String]) -> Result<()> {
        if self.config.copy.disable_foreign_keys {
            gate.enable(tables).await?;
        }
        if self.config.copy.disable_triggers {
            gate.enable_triggers(tables).await?;
        }
        Ok(())
    }

    /// Re-enable every configured protection on every table after a failure,
    /// whether or not it was reached before the failure. The original error
    /// wins.
    async fn restore(
        &self,
        gate: &ConstraintGate<'_>,
        tables: &[String],
        original: SyncError,
    ) -> SyncError {
        let copy = &self.config.copy;
        if copy.disable_foreign_keys {
            for table in tables.iter().rev() {
                if let Err(e) = gate.enable(std::slice::from_ref(table)).await {
                    error!("Failed to restore foreign keys of {}: {}", table, e);
                }
            }
        }
        if copy.disable_triggers {
            for table in tables.iter().rev() {
                if let Err(e) = gate.enable_triggers(std::slice::from_ref(table)).await {
                    error!("Failed to restore triggers of {}: {}", table, e);
                }
            }
        }
        original
    }

    async fn copy_tables(
        &self,
        tables: &[String],
        progress: &dyn ProgressSink,
    ) -> Result<Vec<CopyOutcome>> {
        let copy = &self.config.copy;
        let encoder = Encoder::new(copy.load_mode, copy.workers)?;
        let mut outcomes = Vec::with_capacity(tables.len());

        for spec in copy.table_specs(tables) {
            let outcome = match self.copy_table(&spec, &encoder, progress).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_table_local() => {
                    error!("Skipping table {}: {}", spec.name, e);
                    CopyOutcome::skipped(spec.name.clone(), e.to_string())
                }
                Err(e) => return Err(e),
            };
            progress.table_finished(&outcome);
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Copy one table batch by batch.
    pub async fn copy_table(
        &self,
        spec: &TableSpec,
        encoder: &Encoder,
        progress: &dyn ProgressSink,
    ) -> Result<CopyOutcome> {
        let mut extraction = Extraction::open(&self.source, spec).await?;
        let plan = encoder.plan(spec, extraction.columns(), self.destination.dialect())?;
        let expected = count::estimate(&self.source, spec, self.config.copy.skip_count).await?;

        match expected {
            Some(rows) => info!("Copying {} ({} rows)", spec.name, rows),
            None => info!("Copying {}", spec.name),
        }
        progress.table_started(&spec.name, expected);

        let loader = BatchLoader::new(&self.destination, progress);
        let mut outcome = CopyOutcome::new(spec.name.clone());
        while let Some(batch) = extraction.fetch_batch().await? {
            let batch_len = batch.rows.len();
            let encoded = encoder.encode(&plan, batch)?;
            let report = loader.load(&plan, encoded).await?;
            outcome.absorb(batch_len, report);
        }

        info!(
            "{}: {} of {} rows loaded",
            spec.name, outcome.rows_loaded, outcome.rows_attempted
        );
        Ok(outcome)
    }

    /// Align destination sequences with the source.
    pub async fn reconcile_sequences(&self) -> Result<Vec<SequenceState>> {
        SequenceReconciler::new(&self.source, &self.destination)
            .reconcile()
            .await
    }

    /// Drop every referential constraint of the worklist tables.
    pub async fn drop_foreign_keys(&self) -> Result<Vec<(String, String)>> {
        let tables = self.resolve_tables().await?;
        let dropped = ConstraintGate::new(&self.destination)
            .drop_foreign_keys(&tables)
            .await?;
        info!("Dropped {} foreign keys", dropped.len());
        Ok(dropped)
    }

    /// Row counts of every worklist table on both sides.
    pub async fn compare_counts(&self) -> Result<Vec<CountComparison>> {
        let tables = self.resolve_tables().await?;
        let mut comparisons = Vec::with_capacity(tables.len());
        for spec in self.config.copy.table_specs(&tables) {
            let source_count = self.source.count(&count::count_query(&spec)?).await?;
            let destination_count = self
                .destination
                .count(&self.destination.dialect().count_sql(&spec.name))
                .await?;
            let comparison = CountComparison {
                overridden: spec.override_query.is_some(),
                table: spec.name,
                source_count,
                destination_count,
            };
            if comparison.matches() {
                info!("{}: {} rows (match)", comparison.table, source_count);
            } else {
                warn!("{} (MISMATCH)", comparison);
            }
            comparisons.push(comparison);
        }
        Ok(comparisons)
    }

    /// Compare the configured table list with the source catalog.
    pub async fn compare_table_list(&self) -> Result<TableListComparison> {
        let mut not_listed = self.source.list_tables().await?;
        let mut extra = Vec::new();
        for table in &self.resolve_tables().await? {
            match not_listed.iter().position(|t| t == table) {
                Some(idx) => {
                    not_listed.remove(idx);
                }
                None => extra.push(table.clone()),
            }
        }
        Ok(TableListComparison { extra, not_listed })
    }

    /// Ping both stores and time the round trips.
    pub async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let source = self.source.ping().await;
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let destination = self.destination.ping().await;
        let destination_latency_ms = start.elapsed().as_millis() as u64;

        HealthCheckResult {
            source_connected: source.is_ok(),
            source_latency_ms,
            destination_connected: destination.is_ok(),
            destination_latency_ms,
            healthy: source.is_ok() && destination.is_ok(),
            source_error: source.err().map(|e| e.to_string()),
            destination_error: destination.err().map(|e| e.to_string()),
        }
    }
}
