//! Mock metastore pool for testing.
//!
//! Provides an in-memory pool/session pair with acquire/release accounting,
//! scripted failures, and a log of executed statements.

use super::{ColumnInfo, MetastorePool, MetastoreSession, RecordSet, Value};
use crate::error::{MetagateError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A statement as it reached the mock driver.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    /// The statement text.
    pub sql: String,
    /// Positional bind parameters, in bind order.
    pub params: Vec<Value>,
    /// Whether the query or the update path ran it.
    pub was_query: bool,
}

#[derive(Debug)]
struct MockPoolState {
    capacity: usize,
    checked_out: AtomicUsize,
    fail_acquire: AtomicBool,
    fail_on: Mutex<Option<String>>,
    executed: Mutex<Vec<ExecutedStatement>>,
}

/// A mock pool that hands out scripted in-memory sessions.
///
/// Queries return a single row echoing the statement text, so tests can
/// assert which statement produced the surviving result.
#[derive(Debug, Clone)]
pub struct MockMetastorePool {
    state: Arc<MockPoolState>,
}

impl MockMetastorePool {
    /// Creates a mock pool holding one session.
    pub fn new() -> Self {
        Self::with_capacity(1)
    }

    /// Creates a mock pool holding `capacity` sessions.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(MockPoolState {
                capacity,
                checked_out: AtomicUsize::new(0),
                fail_acquire: AtomicBool::new(false),
                fail_on: Mutex::new(None),
                executed: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Makes every subsequent acquire fail.
    pub fn fail_acquires(&self) {
        self.state.fail_acquire.store(true, Ordering::SeqCst);
    }

    /// Makes any statement containing `fragment` fail with an execution
    /// error.
    pub fn fail_on_statement(&self, fragment: impl Into<String>) {
        *self.state.fail_on.lock().unwrap() = Some(fragment.into());
    }

    /// Returns the statements executed so far, in order.
    pub fn executed(&self) -> Vec<ExecutedStatement> {
        self.state.executed.lock().unwrap().clone()
    }

    /// Number of sessions currently checked out.
    pub fn checked_out(&self) -> usize {
        self.state.checked_out.load(Ordering::SeqCst)
    }
}

impl Default for MockMetastorePool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetastorePool for MockMetastorePool {
    async fn acquire(&self) -> Result<Box<dyn MetastoreSession>> {
        if self.state.fail_acquire.load(Ordering::SeqCst) {
            return Err(MetagateError::acquisition(
                "mock acquire failure; check the metadata connection configuration",
            ));
        }

        let held = self.state.checked_out.load(Ordering::SeqCst);
        if held >= self.state.capacity {
            return Err(MetagateError::acquisition(format!(
                "pool exhausted ({held} of {} checked out)",
                self.state.capacity
            )));
        }

        self.state.checked_out.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockMetastoreSession {
            state: Arc::clone(&self.state),
        }))
    }

    fn idle_sessions(&self) -> usize {
        self.state.capacity - self.state.checked_out.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) {
        self.state.fail_acquire.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct MockMetastoreSession {
    state: Arc<MockPoolState>,
}

impl MockMetastoreSession {
    fn record(&self, sql: &str, params: &[Value], was_query: bool) -> Result<()> {
        if let Some(fragment) = self.state.fail_on.lock().unwrap().as_deref() {
            if sql.contains(fragment) {
                return Err(MetagateError::execution(format!(
                    "mock failure injected for statement: {sql}"
                )));
            }
        }

        self.state.executed.lock().unwrap().push(ExecutedStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
            was_query,
        });
        Ok(())
    }
}

impl Drop for MockMetastoreSession {
    fn drop(&mut self) {
        self.state.checked_out.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetastoreSession for MockMetastoreSession {
    async fn run_query(&mut self, sql: &str, params: &[Value]) -> Result<RecordSet> {
        self.record(sql, params, true)?;

        Ok(RecordSet {
            columns: vec![ColumnInfo::new("statement", "text")],
            rows: vec![vec![Value::String(sql.to_string())]],
            execution_time: Duration::from_millis(1),
            row_count: 1,
        })
    }

    async fn run_mutation(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.record(sql, params, false)?;
        Ok(1)
    }
}
