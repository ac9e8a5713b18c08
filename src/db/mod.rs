//! Database abstraction layer for Metagate.
//!
//! Provides trait-based interfaces for the connection pool and for the
//! per-batch session checked out of it, allowing different metadata store
//! backends to be used interchangeably.

mod mock;
mod postgres;
mod types;

pub use mock::MockMetastorePool;
#[allow(unused_imports)]
pub use postgres::PostgresMetastorePool;
pub use types::{ColumnInfo, RecordSet, Row, Value};

use crate::config::MetastoreConfig;
use crate::error::{MetagateError, Result};
use async_trait::async_trait;

/// Supported metadata store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetastoreBackend {
    #[default]
    Postgres,
    // Future: MySQL, SQLite, etc.
}

impl MetastoreBackend {
    /// Returns the backend as a string for display and persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
        }
    }

    /// Parses a driver identifier from configuration.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }

    /// Returns the URL scheme for this backend.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
        }
    }
}

/// Creates a connection pool for the driver named in the configuration.
///
/// This is the central factory function for metastore pools. Fails with a
/// `Configuration` error when the driver identifier is unknown or required
/// configuration is missing; network and auth problems surface later, at
/// [`MetastorePool::acquire`] time.
pub fn connect(config: &MetastoreConfig) -> Result<Box<dyn MetastorePool>> {
    let backend = MetastoreBackend::parse(&config.driver).ok_or_else(|| {
        MetagateError::configuration(format!(
            "unknown metastore driver '{}' (supported: postgres)",
            config.driver
        ))
    })?;

    match backend {
        MetastoreBackend::Postgres => {
            let pool = PostgresMetastorePool::build(config)?;
            Ok(Box::new(pool))
        }
    }
}

/// A bounded pool of reusable sessions against the metadata store.
///
/// Constructed once from configuration and shared across in-flight batches;
/// `acquire`/release are safe to call concurrently. A pool instance is
/// dependency-injected into the gateway rather than reached through global
/// state, so tests can substitute [`MockMetastorePool`].
#[async_trait]
pub trait MetastorePool: Send + Sync + std::fmt::Debug {
    /// Checks one session out of the pool, waiting up to the configured
    /// max-wait. Fails with a `ConnectionAcquisition` error on exhaustion,
    /// network failure, or auth failure.
    ///
    /// The returned session is exclusively owned by the caller; dropping
    /// it returns the underlying connection to the pool. Release-on-drop
    /// makes double release and release-after-failed-acquire
    /// unrepresentable.
    async fn acquire(&self) -> Result<Box<dyn MetastoreSession>>;

    /// Number of idle sessions currently sitting in the pool.
    fn idle_sessions(&self) -> usize;

    /// Closes the pool and its connections. Terminal; a closed pool fails
    /// all further `acquire` calls.
    async fn shutdown(&self);
}

/// One session checked out for the duration of a single batch.
///
/// Statements issued through the same session observe earlier context
/// changes (e.g. a schema switch) from the same batch.
#[async_trait]
pub trait MetastoreSession: Send + std::fmt::Debug {
    /// Executes a statement that returns rows, binding `params`
    /// positionally (1-based), and materializes the full result set.
    async fn run_query(&mut self, sql: &str, params: &[Value]) -> Result<RecordSet>;

    /// Executes a statement through the update path, binding `params`
    /// positionally. Returns the affected-row count.
    async fn run_mutation(&mut self, sql: &str, params: &[Value]) -> Result<u64>;
}
