//! PostgreSQL metastore backend.
//!
//! Implements the pool and session traits over sqlx. The pool is built
//! lazily: construction validates configuration only, and network or auth
//! problems surface at acquire time.

use crate::config::MetastoreConfig;
use crate::db::{ColumnInfo, MetastorePool, MetastoreSession, RecordSet, Row, Value};
use crate::error::{MetagateError, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column as SqlxColumn, Postgres, Row as SqlxRow, TypeInfo};
use std::time::{Duration, Instant};
use tracing::debug;

/// Connection pool against a PostgreSQL-backed metadata store.
#[derive(Debug)]
pub struct PostgresMetastorePool {
    pool: PgPool,
    max_wait_ms: u64,
}

impl PostgresMetastorePool {
    /// Builds the pool from configuration without touching the network.
    ///
    /// Fails with a `Configuration` error when the URL or credentials are
    /// unusable; connectivity is only exercised by [`Self::acquire`].
    pub fn build(config: &MetastoreConfig) -> Result<Self> {
        let store_url = config.store_url()?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_active)
            .acquire_timeout(Duration::from_millis(config.max_wait_ms))
            .connect_lazy(&store_url)
            .map_err(|e| MetagateError::configuration(format!("invalid metastore URL: {e}")))?;

        debug!(
            "metastore pool configured: {} (max_active={}, max_wait={}ms)",
            config.display_string(),
            config.max_active,
            config.max_wait_ms
        );

        Ok(Self {
            pool,
            max_wait_ms: config.max_wait_ms,
        })
    }

    /// Creates a pool wrapper from an existing sqlx pool.
    ///
    /// This is primarily useful for testing.
    #[allow(dead_code)]
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            max_wait_ms: crate::config::DEFAULT_MAX_WAIT_MS,
        }
    }
}

#[async_trait]
impl MetastorePool for PostgresMetastorePool {
    async fn acquire(&self) -> Result<Box<dyn MetastoreSession>> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_acquire_error(e, self.max_wait_ms))?;

        debug!("session checked out ({} idle)", self.pool.num_idle());
        Ok(Box::new(PostgresMetastoreSession { conn }))
    }

    fn idle_sessions(&self) -> usize {
        self.pool.num_idle()
    }

    async fn shutdown(&self) {
        self.pool.close().await;
    }
}

/// One pooled PostgreSQL connection, exclusively owned for a batch.
///
/// Dropping the session returns the connection to the pool.
#[derive(Debug)]
struct PostgresMetastoreSession {
    conn: sqlx::pool::PoolConnection<Postgres>,
}

#[async_trait]
impl MetastoreSession for PostgresMetastoreSession {
    async fn run_query(&mut self, sql: &str, params: &[Value]) -> Result<RecordSet> {
        let start = Instant::now();

        let query = bind_params(sqlx::query(sql), params);
        let fetched = query
            .fetch_all(&mut *self.conn)
            .await
            .map_err(classify_statement_error)?;

        let execution_time = start.elapsed();

        // Column metadata comes from the first row; a zero-row result has
        // no column metadata to offer.
        let columns: Vec<ColumnInfo> = fetched
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();

        let rows: Vec<Row> = fetched.iter().map(convert_row).collect();
        let row_count = rows.len();

        debug!("query returned {} rows in {:?}", row_count, execution_time);

        Ok(RecordSet {
            columns,
            rows,
            execution_time,
            row_count,
        })
    }

    async fn run_mutation(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let query = bind_params(sqlx::query(sql), params);
        let result = query
            .execute(&mut *self.conn)
            .await
            .map_err(classify_statement_error)?;

        Ok(result.rows_affected())
    }
}

/// Binds parameters positionally onto a query (`$1` is `params[0]`).
fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[Value],
) -> Query<'q, Postgres, PgArguments> {
    for value in params {
        query = match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::Float(f) => query.bind(*f),
            Value::String(s) => query.bind(s.clone()),
            Value::Bytes(b) => query.bind(b.clone()),
            Value::Date(d) => query.bind(*d),
            Value::Time(t) => query.bind(*t),
            Value::Timestamp(ts) => query.bind(*ts),
        };
    }
    query
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .ok()
            .flatten()
            .map(Value::Date)
            .unwrap_or(Value::Null),

        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(index)
            .ok()
            .flatten()
            .map(Value::Time)
            .unwrap_or(Value::Null),

        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Timestamp(v.and_utc()))
            .unwrap_or(Value::Null),

        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),

        // For all other types, try to get as string
        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Maps an acquire-time sqlx error to an acquisition error whose message
/// carries the operator diagnostic.
fn map_acquire_error(error: sqlx::Error, max_wait_ms: u64) -> MetagateError {
    let error_str = error.to_string().to_lowercase();

    if matches!(error, sqlx::Error::PoolTimedOut) {
        return MetagateError::acquisition(format!(
            "no session available within {max_wait_ms}ms; \
             check the metadata connection configuration and pool sizing"
        ));
    }

    if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
        || error_str.contains("permission denied")
        || error_str.contains("pg_hba.conf")
    {
        MetagateError::acquisition(format!(
            "check that the metadata user exists and has the required privileges: {error}"
        ))
    } else {
        MetagateError::acquisition(format!(
            "check that the metadata connection configuration is correct: {error}"
        ))
    }
}

/// Classifies an execution-time sqlx error as a binding or execution error.
///
/// Postgres reports bind-count mismatches as protocol violations (08P01,
/// "bind message supplies N parameters...") or undefined parameters
/// (42P02); both belong to the parameter binding kind.
fn classify_statement_error(error: sqlx::Error) -> MetagateError {
    if let Some(db_err) = error.as_database_error() {
        let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
        let message = db_err.message().to_lowercase();

        if code == "08P01" || code == "42P02" || message.contains("bind message supplies") {
            return MetagateError::binding(db_err.message().to_string());
        }
    }

    MetagateError::execution(format_statement_error(error))
}

/// Formats a statement error with Postgres detail and hint if available.
fn format_statement_error(error: sqlx::Error) -> String {
    let mut result = String::new();

    if let Some(db_error) = error.as_database_error() {
        result.push_str(db_error.message());

        if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
            if let Some(detail) = pg_error.detail() {
                result.push_str("\n  DETAIL: ");
                result.push_str(detail);
            }

            if let Some(hint) = pg_error.hint() {
                result.push_str("\n  HINT: ");
                result.push_str(hint);
            }
        }
    } else {
        result = error.to_string();
    }

    result
}
