//! Connector boundary: how the harness talks to the cluster under test.
//!
//! Real drivers (and the in-memory [`crate::sim`] double) implement these
//! traits; everything above them is driver-agnostic.

use faultline_types::{DbError, Isolation, NodeId};
use std::future::Future;
use std::time::Duration;

/// A positional statement parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Int(i64),
    Text(String),
}

impl SqlValue {
    /// The value as text, the way a driver would render it into a TEXT
    /// column.
    pub fn as_text(&self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

/// What a statement produced: result rows or an affected-row count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecResult {
    Rows(Vec<Vec<SqlValue>>),
    Count(u64),
}

impl ExecResult {
    /// Affected-row count, or zero for row results.
    pub fn count(&self) -> u64 {
        match self {
            Self::Rows(_) => 0,
            Self::Count(n) => *n,
        }
    }
}

/// Connect and per-statement deadlines for one connection.
///
/// Workload connections run tight deadlines so a wedged node surfaces as a
/// `Communication` failure quickly. Recovery connections run deadlines on
/// the order of minutes, because halting replication can itself block while
/// the node drains its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub connect: Duration,
    pub statement: Duration,
}

impl TimeoutPolicy {
    pub fn new(connect: Duration, statement: Duration) -> Self {
        Self { connect, statement }
    }

    /// Policy from millisecond values, the shape configuration carries.
    pub fn from_millis(connect_ms: u64, statement_ms: u64) -> Self {
        Self {
            connect: Duration::from_millis(connect_ms),
            statement: Duration::from_millis(statement_ms),
        }
    }
}

/// One open connection to one node.
///
/// Implementations surface every failure as a [`DbError`] so the classifier
/// can map it; they must not collapse distinct failure modes into one
/// variant. Written in desugared form so the futures are `Send` and callers
/// can drive connections from spawned tasks.
pub trait Connection: Send {
    /// Executes one statement with positional parameters.
    fn execute(
        &mut self,
        statement: &str,
        params: &[SqlValue],
    ) -> impl Future<Output = Result<ExecResult, DbError>> + Send;

    /// Opens a transaction at the given isolation level.
    fn begin(&mut self, isolation: Isolation) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Commits the open transaction.
    fn commit(&mut self) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Rolls back the open transaction.
    fn rollback(&mut self) -> impl Future<Output = Result<(), DbError>> + Send;
}

/// Opens connections to cluster nodes.
pub trait Connector: Clone + Send + Sync + 'static {
    type Conn: Connection + Send + 'static;

    /// Opens a connection to `node` under the given timeout policy.
    fn open(
        &self,
        node: &NodeId,
        timeouts: TimeoutPolicy,
    ) -> impl Future<Output = Result<Self::Conn, DbError>> + Send;
}
