//! Core abstractions for backend-agnostic copying.
//!
//! - [`schema`]: table specs, sequence state and copy outcomes
//! - [`value`]: the ordered-named-field row representation
//! - [`traits`]: store, cursor, progress and confirmation seams
//!
//! The core module only defines types and traits; the database adapters in
//! `drivers` implement them and the engine components consume them.

pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{
    Backend, CopyOutcome, Direction, LoadMode, LoadReport, RowError, SequenceState, SequenceValue,
    TableSpec,
};
pub use traits::{
    Confirmation, DestinationStore, NoProgress, Preconfirmed, ProgressSink, RowCursor,
    SourceStore, Store,
};
pub use value::{Row, RowBatch, SqlValue};
