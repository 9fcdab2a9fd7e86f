//! Streaming extraction of source rows in bounded batches.

use std::sync::Arc;

use tracing::debug;

use crate::core::{RowBatch, RowCursor, SourceStore, TableSpec};
use crate::error::Result;

/// A consumed-once stream of batches over one table query.
pub struct Extraction {
    cursor: Box<dyn RowCursor>,
    columns: Arc<[String]>,
    batch_size: usize,
    done: bool,
}

impl Extraction {
    /// Run the table's query (default or override) and describe its result.
    pub async fn open(source: &dyn SourceStore, spec: &TableSpec) -> Result<Self> {
        let query = spec.select_query();
        debug!("{}", query);
        let cursor = source.open(&spec.name, &query).await?;
        let columns = cursor.columns();
        Ok(Self {
            cursor,
            columns,
            batch_size: spec.batch_size.max(1),
            done: false,
        })
    }

    /// Column names of the live result.
    pub fn columns(&self) -> Arc<[String]> {
        Arc::clone(&self.columns)
    }

    /// Next batch of at most `batch_size` rows, `None` once exhausted.
    pub async fn fetch_batch(&mut self) -> Result<Option<RowBatch>> {
        if self.done {
            return Ok(None);
        }
        let mut rows = self.cursor.fetch(self.batch_size).await?;
        if rows.is_empty() {
            self.done = true;
            return Ok(None);
        }
        rows.truncate(self.batch_size);
        Ok(Some(RowBatch::new(Arc::clone(&self.columns), rows)))
    }
}
