//! Maps raw database failures onto the outcome trichotomy.
//!
//! This table is the correctness contract of the whole harness: `Fail`
//! promises the transaction did not take effect, `Info` promises nothing
//! either way, and anything the table does not recognize propagates uncaught
//! rather than being silently downgraded — a misclassified unknown would
//! corrupt every downstream conclusion.
//!
//! Dispatch keys on the driver error code wherever the server reports one;
//! message-text matching is kept only as a fallback for drivers that mangle
//! codes, and is expected to be fragile across driver versions.

use faultline_types::{DbError, ErrorReason};
use std::time::Duration;

/// Deadlock detected while waiting for a lock.
pub const ER_LOCK_DEADLOCK: u16 = 1213;
/// Lock wait timed out; the transaction was rolled back.
pub const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
/// The replication plugin forced a rollback at commit.
pub const ER_TRANSACTION_ROLLBACK_DURING_COMMIT: u16 = 3101;
/// The schema does not exist yet on this peer.
pub const ER_BAD_DB_ERROR: u16 = 1049;
/// The table does not exist yet on this peer.
pub const ER_NO_SUCH_TABLE: u16 = 1146;
/// Statement refused because the server runs read-only.
pub const ER_OPTION_PREVENTS_STATEMENT: u16 = 1290;
/// Write refused because the server is in super-read-only mode.
pub const ER_READ_ONLY_MODE: u16 = 1836;

/// How long to pause before reporting a read-only refusal, so a fleet of
/// workers does not hammer a secondary in a tight loop.
pub const READ_ONLY_BACKOFF: Duration = Duration::from_millis(500);

/// Verdict of the classifier for one raw error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The transaction definitely did not take effect.
    Fail(ErrorReason),

    /// As [`Classification::Fail`], after pausing for the given duration.
    FailAfterBackoff(ErrorReason, Duration),

    /// The transaction may or may not have taken effect.
    Info(ErrorReason),

    /// Not in the table. The caller must propagate this error unchanged.
    Unknown,
}

/// Classifies one raw database error.
pub fn classify(error: &DbError) -> Classification {
    use Classification::{Fail, FailAfterBackoff, Info, Unknown};
    use ErrorReason::{Abort, Communication, Conflict, Indeterminate, Unavailable};

    match error {
        DbError::InjectedAbort => Fail(Abort),
        DbError::ConnectionClosed => Fail(Communication),
        DbError::Communication(_) => Info(Communication),
        DbError::LostDuring(_) => Info(Indeterminate),
        DbError::Server { code, message } => match *code {
            ER_LOCK_DEADLOCK | ER_LOCK_WAIT_TIMEOUT | ER_TRANSACTION_ROLLBACK_DURING_COMMIT => {
                Fail(Conflict)
            }
            ER_BAD_DB_ERROR | ER_NO_SUCH_TABLE => Fail(Unavailable),
            ER_OPTION_PREVENTS_STATEMENT | ER_READ_ONLY_MODE => {
                FailAfterBackoff(Unavailable, READ_ONLY_BACKOFF)
            }
            // Fallback: substring dispatch on message text.
            _ => {
                if message.contains("Deadlock found") {
                    Fail(Conflict)
                } else if message.contains("Unknown database") {
                    Fail(Unavailable)
                } else if message.contains("read-only") || message.contains("read only") {
                    FailAfterBackoff(Unavailable, READ_ONLY_BACKOFF)
                } else {
                    Unknown
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_types::TxnPhase;
    use test_case::test_case;

    #[test_case(DbError::InjectedAbort => Classification::Fail(ErrorReason::Abort))]
    #[test_case(DbError::server(1213, "Deadlock found when trying to get lock")
        => Classification::Fail(ErrorReason::Conflict))]
    #[test_case(DbError::server(1205, "Lock wait timeout exceeded")
        => Classification::Fail(ErrorReason::Conflict))]
    #[test_case(DbError::server(3101, "Plugin instructed the server to rollback the current transaction.")
        => Classification::Fail(ErrorReason::Conflict))]
    #[test_case(DbError::server(1049, "Unknown database 'faultline'")
        => Classification::Fail(ErrorReason::Unavailable))]
    #[test_case(DbError::server(1146, "Table 'faultline.kv_3' doesn't exist")
        => Classification::Fail(ErrorReason::Unavailable))]
    #[test_case(DbError::server(1290, "The MySQL server is running with the --read-only option")
        => Classification::FailAfterBackoff(ErrorReason::Unavailable, READ_ONLY_BACKOFF))]
    #[test_case(DbError::server(1836, "Running in read-only mode")
        => Classification::FailAfterBackoff(ErrorReason::Unavailable, READ_ONLY_BACKOFF))]
    #[test_case(DbError::ConnectionClosed => Classification::Fail(ErrorReason::Communication))]
    #[test_case(DbError::Communication("connect timeout".to_string())
        => Classification::Info(ErrorReason::Communication))]
    #[test_case(DbError::LostDuring(TxnPhase::Commit)
        => Classification::Info(ErrorReason::Indeterminate))]
    #[test_case(DbError::LostDuring(TxnPhase::Rollback)
        => Classification::Info(ErrorReason::Indeterminate))]
    fn test_catalogued_errors(error: DbError) -> Classification {
        classify(&error)
    }

    #[test_case("Deadlock found when trying to get lock; try restarting transaction"
        => Classification::Fail(ErrorReason::Conflict))]
    #[test_case("Unknown database 'faultline'" => Classification::Fail(ErrorReason::Unavailable))]
    #[test_case("server is in read only mode"
        => Classification::FailAfterBackoff(ErrorReason::Unavailable, READ_ONLY_BACKOFF))]
    fn test_substring_fallback_when_code_is_unmapped(message: &str) -> Classification {
        classify(&DbError::server(0, message))
    }

    #[test]
    fn test_unrecognized_errors_stay_unknown() {
        let error = DbError::server(1064, "You have an error in your SQL syntax");
        assert_eq!(classify(&error), Classification::Unknown);
    }
}
