//! Raw database error surface and per-call execution knobs.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Phase of a transaction during which a connection can be lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnPhase {
    Commit,
    Rollback,
}

impl fmt::Display for TxnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commit => f.write_str("commit"),
            Self::Rollback => f.write_str("rollback"),
        }
    }
}

/// A raw failure reported by a database connector.
///
/// Connector implementations translate their driver's failures into this
/// surface; the classifier in `faultline-client` maps it onto the outcome
/// trichotomy. Server-reported errors keep the driver error code — the code
/// is the stable dispatch key, the message is only a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbError {
    /// The server answered with an error.
    #[error("server error {code}: {message}")]
    Server { code: u16, message: String },

    /// The connection was closed before any response was received.
    #[error("connection closed before any response")]
    ConnectionClosed,

    /// Network-level failure or timeout; the request did not complete.
    #[error("communication failure: {0}")]
    Communication(String),

    /// The connection was lost while a commit or rollback was in flight,
    /// so the transaction's fate is unknown.
    #[error("connection lost during {0}")]
    LostDuring(TxnPhase),

    /// Abort injected by the harness, distinct from anything the database
    /// can produce.
    #[error("injected abort")]
    InjectedAbort,
}

impl DbError {
    /// Builds a server error.
    pub fn server(code: u16, message: impl Into<String>) -> Self {
        Self::Server { code, message: message.into() }
    }

    /// Whether this is a server-reported duplicate-key violation.
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            Self::Server { code, message } => {
                *code == ER_DUP_ENTRY || message.contains("Duplicate entry")
            }
            _ => false,
        }
    }
}

/// Duplicate primary-key violation; consumed by the optimistic upsert path,
/// never surfaced as an outcome on its own.
pub const ER_DUP_ENTRY: u16 = 1062;

/// Transaction isolation level requested for multi-operation transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Isolation {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl Isolation {
    /// The SQL spelling of this level.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// Locking applied to a read whose key is written later in the same
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockMode {
    /// Plain read.
    None,

    /// Shared-lock read.
    Shared,

    /// Exclusive-lock read.
    Exclusive,
}

impl LockMode {
    /// Suffix appended to a SELECT under this mode, if any.
    pub fn read_suffix(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Shared => " LOCK IN SHARE MODE",
            Self::Exclusive => " FOR UPDATE",
        }
    }
}

/// How a write micro-operation reaches the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteStrategy {
    /// Single insert-or-update statement; the server merges on conflict.
    AtomicUpsert,

    /// Update first, insert under a savepoint if the row is absent, retry
    /// the update once on a duplicate-key race.
    OptimisticUpsert,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Isolation::ReadUncommitted, "READ UNCOMMITTED")]
    #[test_case(Isolation::ReadCommitted, "READ COMMITTED")]
    #[test_case(Isolation::RepeatableRead, "REPEATABLE READ")]
    #[test_case(Isolation::Serializable, "SERIALIZABLE")]
    fn test_isolation_sql(level: Isolation, sql: &str) {
        assert_eq!(level.as_sql(), sql);
    }

    #[test]
    fn test_lock_suffixes() {
        assert_eq!(LockMode::None.read_suffix(), "");
        assert_eq!(LockMode::Shared.read_suffix(), " LOCK IN SHARE MODE");
        assert_eq!(LockMode::Exclusive.read_suffix(), " FOR UPDATE");
    }

    #[test]
    fn test_duplicate_key_detection() {
        assert!(DbError::server(1062, "Duplicate entry '5' for key 'PRIMARY'").is_duplicate_key());
        // Fallback on message text when a driver maps the code away.
        assert!(DbError::server(0, "Duplicate entry '5'").is_duplicate_key());
        assert!(!DbError::server(1213, "Deadlock found").is_duplicate_key());
        assert!(!DbError::ConnectionClosed.is_duplicate_key());
    }
}
