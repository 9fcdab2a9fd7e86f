//! Bounded worker group for COPY row escaping.

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::info;

use crate::core::Row;
use crate::error::{Result, SyncError};

use super::escape::escape_row;

/// Escapes rows either inline or across a fixed number of worker threads.
///
/// Results always come back in input order; rows are index-tagged by the
/// indexed parallel iterator and collected positionally.
pub struct EscapePool {
    pool: Option<ThreadPool>,
}

impl EscapePool {
    /// Build a pool of `workers` threads. One worker escapes inline.
    pub fn new(workers: usize) -> Result<Self> {
        if workers <= 1 {
            return Ok(Self { pool: None });
        }
        info!("Initializing escape pool with {} threads", workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("escape-{}", i))
            .build()
            .map_err(|e| SyncError::Config(format!("cannot build escape pool: {}", e)))?;
        Ok(Self { pool: Some(pool) })
    }

    pub fn workers(&self) -> usize {
        self.pool.as_ref().map_or(1, |p| p.current_num_threads())
    }

    /// Escape every row of a batch into COPY text lines.
    ///
    /// On failure returns the (row, column) of a value the legacy encoding
    /// rejects.
    pub fn escape_rows(
        &self,
        rows: &[Row],
        binary: &[bool],
    ) -> std::result::Result<Vec<Vec<u8>>, (usize, usize)> {
        let escape = |(r, row): (usize, &Row)| escape_row(row, binary).map_err(|c| (r, c));
        match &self.pool {
            None => rows.iter().enumerate().map(escape).collect(),
            Some(pool) => pool.install(|| rows.par_iter().enumerate().map(escape).collect()),
        }
    }
}
