//! Error types for the copy engine.

use thiserror::Error;

/// Main error type for copy and synchronization operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error (invalid YAML, malformed override, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// PostgreSQL driver error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Oracle driver error
    #[error("Oracle error: {0}")]
    Oracle(#[from] oracle::Error),

    /// A store could not be reached
    #[error("Cannot connect to {backend}: {message}")]
    Connection { backend: String, message: String },

    /// The result description of a table query could not be obtained
    #[error("Cannot describe table {table}: {message}")]
    SchemaLookup { table: String, message: String },

    /// A load unit was rejected by a unique constraint
    #[error("Unique violation on {table}: {message}")]
    UniqueViolation { table: String, message: String },

    /// Data transfer failed for a specific table
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// Truncate was requested but the operator did not confirm it
    #[error("Truncate not confirmed")]
    NotConfirmed,

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Create a Connection error for the named backend.
    pub fn connection(backend: impl Into<String>, message: impl ToString) -> Self {
        SyncError::Connection {
            backend: backend.into(),
            message: message.to_string(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a SchemaLookup error
    pub fn schema_lookup(table: impl Into<String>, message: impl ToString) -> Self {
        SyncError::SchemaLookup {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a UniqueViolation error
    pub fn unique_violation(table: impl Into<String>, message: impl ToString) -> Self {
        SyncError::UniqueViolation {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// True when the failure is a recoverable uniqueness rejection.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, SyncError::UniqueViolation { .. })
    }

    /// True when the failure only affects the current table.
    pub fn is_table_local(&self) -> bool {
        matches!(self, SyncError::SchemaLookup { .. })
    }

    /// True when the run must abort.
    pub fn is_fatal(&self) -> bool {
        !self.is_unique_violation() && !self.is_table_local()
    }

    /// Process exit code used by the command line front end.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::Config(_) | SyncError::Yaml(_) => 2,
            SyncError::Connection { .. } => 3,
            SyncError::NotConfirmed => 4,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for copy operations.
pub type Result<T> = std::result::Result<T, SyncError>;
