//! # ora-pg-sync
//!
//! Table copy and sequence synchronization between Oracle and PostgreSQL.
//!
//! This library moves the rows of a pre-mapped set of tables from one store
//! to the other with support for:
//!
//! - **Bulk loads** through the PostgreSQL text COPY protocol
//! - **Bind mode** with positional parameters and explicit binary columns
//! - **Row-granular failure isolation** when a batch hits a unique constraint
//! - **Constraint and trigger toggling** around the load
//! - **Sequence reconciliation** so destination allocators never fall behind
//!
//! ## Example
//!
//! ```rust,no_run
//! use ora_pg_sync::{Config, NoProgress, OracleStore, Orchestrator, PgStore, Preconfirmed};
//!
//! #[tokio::main]
//! async fn main() -> ora_pg_sync::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let source = OracleStore::connect(&config.oracle).await?;
//!     let destination = PgStore::connect(&config.postgres).await?;
//!     let orchestrator = Orchestrator::new(config, source, destination)?;
//!     let result = orchestrator.copy(&NoProgress, &Preconfirmed).await?;
//!     println!("Loaded {} rows", result.rows_loaded);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod count;
pub mod dialect;
pub mod drivers;
pub mod encode;
pub mod error;
pub mod extract;
pub mod gate;
pub mod loader;
pub mod orchestrator;
pub mod planner;
pub mod sequence;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{Config, CopyConfig, Dependency, OracleConfig, Ordering, PostgresConfig};
pub use core::{
    Backend, Confirmation, CopyOutcome, DestinationStore, Direction, LoadMode, NoProgress,
    Preconfirmed, ProgressSink, RowError, SequenceState, SourceStore, SqlValue, Store, TableSpec,
};
pub use drivers::{OracleStore, PgStore, SslMode};
pub use error::{Result, SyncError};
pub use orchestrator::{
    CopyResult, CountComparison, HealthCheckResult, Orchestrator, TableListComparison,
};
