//! Errors that terminate workload execution instead of becoming outcomes.

use faultline_types::DbError;
use thiserror::Error;

/// Failures the executor cannot convert into an outcome.
///
/// Everything here is deliberately fatal: turning either variant into a
/// `Fail` or `Info` would hand history analysis a conclusion the harness
/// cannot stand behind.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The optimistic upsert exhausted its retry: the row was not
    /// updatable, not insertable, and then not updatable again. Unreachable
    /// under correct engine semantics.
    #[error("invariant violation: key {key} in {table} neither updatable nor insertable")]
    InvariantViolation { table: String, key: u64 },

    /// A database error the classifier does not recognize, propagated
    /// unchanged.
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Failures of a whole workload run.
#[derive(Debug, Error)]
pub enum RunError {
    /// A worker hit a fatal executor error.
    #[error("worker {worker}: {source}")]
    Worker {
        worker: u64,
        #[source]
        source: ExecutorError,
    },

    /// A worker task panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Join(String),
}
