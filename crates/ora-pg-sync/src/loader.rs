//! Batch loading with row-granular failure isolation.
//!
//! A batch is submitted as one unit and committed. Destinations with native
//! batch errors report rejected rows inline. Otherwise a unique violation
//! aborts the unit; the loader then re-submits every row on its own,
//! committing each success and dropping the conflicting rows. Progress
//! always advances by the full batch length.

use tracing::{debug, error};

use crate::core::{DestinationStore, LoadReport, ProgressSink, RowError};
use crate::encode::{text_payload, EncodedBatch, TablePlan};
use crate::error::{Result, SyncError};

/// Submits encoded batches to a destination.
pub struct BatchLoader<'a> {
    destination: &'a dyn DestinationStore,
    progress: &'a dyn ProgressSink,
}

impl<'a> BatchLoader<'a> {
    pub fn new(destination: &'a dyn DestinationStore, progress: &'a dyn ProgressSink) -> Self {
        Self {
            destination,
            progress,
        }
    }

    /// Load one batch and report what was loaded and what was dropped.
    pub async fn load(&self, plan: &TablePlan, batch: EncodedBatch) -> Result<LoadReport> {
        let batch_len = batch.len();
        if batch_len == 0 {
            return Ok(LoadReport::default());
        }

        let report = match self.submit(plan, &batch).await {
            Ok(report) => {
                self.destination.commit().await?;
                report
            }
            Err(e) if e.is_unique_violation() => {
                error!("UniqueError on batch insert into {}: {}", plan.table, e);
                self.load_row_by_row(plan, batch).await?
            }
            Err(e) => return Err(e),
        };

        for row_error in &report.errors {
            error!(
                "{}: row {} has error {}",
                plan.table, row_error.offset, row_error.reason
            );
            self.progress.row_failed(&plan.table, row_error);
        }
        self.progress.rows_processed(&plan.table, batch_len as u64);
        debug!(
            "{}: batch of {} rows, {} loaded",
            plan.table, batch_len, report.loaded
        );
        Ok(report)
    }

    async fn load_row_by_row(&self, plan: &TablePlan, batch: EncodedBatch) -> Result<LoadReport> {
        let mut report = LoadReport::default();
        for (offset, single) in batch.into_single_rows().into_iter().enumerate() {
            match self.submit(plan, &single).await {
                Ok(row_report) => {
                    self.destination.commit().await?;
                    report.loaded += row_report.loaded;
                    report.errors.extend(
                        row_report
                            .errors
                            .into_iter()
                            .map(|e| RowError::new(offset, e.reason)),
                    );
                }
                Err(SyncError::UniqueViolation { message, .. }) => {
                    report.errors.push(RowError::new(offset, message));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    async fn submit(&self, plan: &TablePlan, batch: &EncodedBatch) -> Result<LoadReport> {
        match batch {
            EncodedBatch::TextLines(lines) => {
                let loaded = self
                    .destination
                    .bulk_load(&plan.table, &plan.statement, text_payload(lines))
                    .await?;
                Ok(LoadReport {
                    loaded,
                    errors: Vec::new(),
                })
            }
            EncodedBatch::ParamTuples(rows) => {
                self.destination
                    .execute_batch(&plan.table, &plan.statement, rows)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::core::{Backend, LoadMode, RowBatch, SqlValue, TableSpec};
    use crate::dialect::for_backend;
    use crate::encode::Encoder;
    use crate::testing::MemoryStore;

    #[derive(Default)]
    struct Counter {
        processed: AtomicU64,
        failed: AtomicU64,
    }

    impl ProgressSink for Counter {
        fn rows_processed(&self, _table: &str, rows: u64) {
            self.processed.fetch_add(rows, Ordering::SeqCst);
        }

        fn row_failed(&self, _table: &str, _error: &RowError) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn text(s: &str) -> SqlValue {
        SqlValue::Text(s.to_string())
    }

    fn parent(store: &MemoryStore) {
        store.add_table("PARENT", &["ID", "NAME"], &["ID"]);
        store.seed_rows("PARENT", vec![vec![text("2"), text("old")]]);
    }

    fn encode(mode: LoadMode, backend: Backend, rows: Vec<Vec<SqlValue>>) -> (TablePlan, EncodedBatch) {
        let columns: Arc<[String]> = vec!["ID".to_string(), "NAME".to_string()].into();
        let encoder = Encoder::new(mode, 1).unwrap();
        let plan = encoder
            .plan(&TableSpec::new("PARENT", 3), columns.clone(), for_backend(backend))
            .unwrap();
        let batch = encoder.encode(&plan, RowBatch::new(columns, rows)).unwrap();
        (plan, batch)
    }

    fn three_rows() -> Vec<Vec<SqlValue>> {
        vec![
            vec![text("1"), text("r1")],
            vec![text("2"), text("r2")],
            vec![text("3"), text("r3")],
        ]
    }

    #[tokio::test]
    async fn test_clean_batch_commits_once() {
        let store = MemoryStore::postgres();
        store.add_table("PARENT", &["ID", "NAME"], &["ID"]);
        let progress = Counter::default();
        let (plan, batch) = encode(LoadMode::Bind, Backend::Postgres, three_rows());

        let report = BatchLoader::new(&store, &progress).load(&plan, batch).await.unwrap();
        assert_eq!(report.loaded, 3);
        assert!(report.errors.is_empty());
        assert_eq!(store.commits(), 1);
        assert_eq!(store.rows("PARENT").len(), 3);
    }

    #[tokio::test]
    async fn test_bind_unique_violation_degrades_to_rows() {
        let store = MemoryStore::postgres();
        parent(&store);
        let progress = Counter::default();
        let (plan, batch) = encode(LoadMode::Bind, Backend::Postgres, three_rows());

        let report = BatchLoader::new(&store, &progress).load(&plan, batch).await.unwrap();
        assert_eq!(report.loaded, 2);
        assert_eq!(report.errors, vec![RowError::new(1, "unique violation")]);
        assert_eq!(progress.processed.load(Ordering::SeqCst), 3);
        assert_eq!(progress.failed.load(Ordering::SeqCst), 1);
        // one commit per surviving row
        assert_eq!(store.commits(), 2);
        assert_eq!(store.rows("PARENT").len(), 3);
    }

    #[tokio::test]
    async fn test_copy_unique_violation_degrades_to_rows() {
        let store = MemoryStore::postgres();
        parent(&store);
        let progress = Counter::default();
        let (plan, batch) = encode(LoadMode::Copy, Backend::Postgres, three_rows());

        let report = BatchLoader::new(&store, &progress).load(&plan, batch).await.unwrap();
        assert_eq!(report.loaded, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].offset, 1);
        assert_eq!(progress.processed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_native_batch_errors_skip_degrade() {
        let store = MemoryStore::oracle();
        parent(&store);
        let progress = Counter::default();
        let (plan, batch) = encode(LoadMode::Bind, Backend::Oracle, three_rows());

        let report = BatchLoader::new(&store, &progress).load(&plan, batch).await.unwrap();
        assert_eq!(report.loaded, 2);
        assert_eq!(report.errors[0].offset, 1);
        assert!(report.errors[0].reason.starts_with("ORA-00001"));
        assert_eq!(store.commits(), 1);
        assert_eq!(progress.processed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_fatal() {
        let store = MemoryStore::postgres();
        let progress = Counter::default();
        let (plan, batch) = encode(LoadMode::Bind, Backend::Postgres, three_rows());

        let err = BatchLoader::new(&store, &progress)
            .load(&plan, batch)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(progress.processed.load(Ordering::SeqCst), 0);
    }
}
