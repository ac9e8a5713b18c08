//! Batch coordination.
//!
//! The gateway is the public entry point: it checks one session out of the
//! pool, splits the batch, classifies and executes each statement in order,
//! and returns the last query's record set.

use crate::db::{MetastorePool, RecordSet, Value};
use crate::error::{MetagateError, Result};
use crate::sql::{split_statements, StatementKind};
use std::sync::Arc;
use tracing::{debug, warn};

/// Callback invoked with the operator diagnostic when a session cannot be
/// acquired. Supplied by the caller; the gateway renders no UI itself.
pub type AcquireNotifier = Box<dyn Fn(&str) + Send + Sync>;

/// Executes semicolon-delimited SQL batches against a metadata store.
///
/// The pool is dependency-injected, so tests can substitute
/// [`crate::db::MockMetastorePool`].
pub struct MetastoreGateway {
    pool: Arc<dyn MetastorePool>,
    acquire_notifier: Option<AcquireNotifier>,
}

impl MetastoreGateway {
    /// Creates a gateway over the given pool.
    pub fn new(pool: Arc<dyn MetastorePool>) -> Self {
        Self {
            pool,
            acquire_notifier: None,
        }
    }

    /// Registers a callback for acquisition-failure diagnostics.
    pub fn with_acquire_notifier(
        mut self,
        notifier: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.acquire_notifier = Some(Box::new(notifier));
        self
    }

    /// Executes one batch and returns the last query's record set.
    ///
    /// The whole batch runs on a single session, acquired up front and
    /// returned to the pool on every exit path. Statements execute
    /// strictly in split order; queries capture their result
    /// last-write-wins, mutations and context changes run through the
    /// update path and their affected-row counts are discarded. A batch
    /// with no query statement returns `Ok(None)`.
    ///
    /// `params_list`, when supplied, is aligned by position with the split
    /// statements and must cover every statement; a shorter list fails
    /// with a `ParameterBinding` error before anything executes.
    ///
    /// Any statement failure aborts the remaining statements and
    /// propagates; acquisition failure propagates before any statement
    /// executes.
    pub async fn process_batch(
        &self,
        sql: &str,
        params_list: Option<&[Vec<Value>]>,
    ) -> Result<Option<RecordSet>> {
        let mut session = match self.pool.acquire().await {
            Ok(session) => session,
            Err(e) => {
                warn!("session acquisition failed: {e}");
                if let Some(notify) = &self.acquire_notifier {
                    notify(&e.to_string());
                }
                return Err(e);
            }
        };

        let statements = split_statements(sql);

        if let Some(lists) = params_list {
            if lists.len() < statements.len() {
                return Err(MetagateError::binding(format!(
                    "parameter list shorter than statement count \
                     ({} lists for {} statements)",
                    lists.len(),
                    statements.len()
                )));
            }
        }

        let mut last_result: Option<RecordSet> = None;

        for (position, statement) in statements.iter().enumerate() {
            let kind = StatementKind::classify(statement);
            let params: &[Value] = params_list
                .map(|lists| lists[position].as_slice())
                .unwrap_or(&[]);

            debug!(
                "executing statement {} of {} ({kind})",
                position + 1,
                statements.len()
            );

            if kind.has_result_set() {
                last_result = Some(session.run_query(statement, params).await?);
            } else {
                let affected = session.run_mutation(statement, params).await?;
                debug!("{kind} affected {affected} rows");
            }
        }

        Ok(last_result)
    }
}
