//! Database driver implementations.
//!
//! Each driver implements [`SourceStore`](crate::core::SourceStore) and
//! [`DestinationStore`](crate::core::DestinationStore) for one backend:
//!
//! - [`oracle`]: Oracle through the blocking `oracle` driver
//! - [`postgres`]: PostgreSQL through `tokio-postgres`
//! - [`tls`]: TLS negotiation for the PostgreSQL connection

pub mod oracle;
pub mod postgres;
pub mod tls;

pub use oracle::OracleStore;
pub use postgres::PgStore;
pub use tls::SslMode;
