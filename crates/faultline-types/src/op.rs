//! Micro-operations, transactions, and the three-valued operation outcome.

use crate::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value read from or written to the cluster under test.
///
/// Overwrite workloads store scalars; append workloads store the list of
/// every element appended so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Scalar value (overwrite workloads).
    Int(i64),

    /// Accumulated list value (append workloads).
    List(Vec<i64>),
}

/// One step of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MicroOp {
    /// Read the current value of `key`. `value` is `None` until the read
    /// completes.
    Read { key: u64, value: Option<Value> },

    /// Append `value` to the list stored under `key`.
    Append { key: u64, value: i64 },

    /// Overwrite the scalar stored under `key` with `value`.
    Write { key: u64, value: i64 },
}

impl MicroOp {
    /// The key this operation touches.
    pub fn key(&self) -> u64 {
        match self {
            Self::Read { key, .. } | Self::Append { key, .. } | Self::Write { key, .. } => *key,
        }
    }

    /// Whether this operation mutates its key.
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Append { .. } | Self::Write { .. })
    }
}

/// An ordered sequence of micro-operations, executed as a unit when it has
/// more than one step.
pub type Transaction = Vec<MicroOp>;

/// Why an operation failed or is indeterminate.
///
/// This is the structured reason attached to [`Outcome::Fail`] and
/// [`Outcome::Info`]; parse failures and upsert-retry exhaustion are not
/// outcomes at all and travel as hard errors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorReason {
    /// Abort injected by the harness itself.
    Abort,

    /// Deadlock, serialization failure, or forced rollback.
    Conflict,

    /// Peer is read-only or still provisioning its schema.
    Unavailable,

    /// Network-level failure; the request demonstrably did not complete.
    Communication,

    /// Connection lost mid-commit; the effect is genuinely unknown.
    Indeterminate,
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Abort => "abort",
            Self::Conflict => "conflict",
            Self::Unavailable => "unavailable",
            Self::Communication => "communication",
            Self::Indeterminate => "indeterminate",
        };
        f.write_str(s)
    }
}

/// The outcome of one completed transaction, exactly one per attempt.
///
/// The contract with history analysis: `Ok` means every effect definitely
/// took place (reads carry their values), `Fail` means nothing took place,
/// and `Info` means the effect may or may not have landed and must be
/// treated as indeterminate — never as a confirmed non-event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "outcome")]
pub enum Outcome {
    /// All micro-operations completed; reads are filled in.
    Ok { ops: Vec<MicroOp> },

    /// The transaction definitely did not take effect.
    Fail { reason: ErrorReason },

    /// The transaction may or may not have taken effect.
    Info { reason: ErrorReason },
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail { .. })
    }

    pub fn is_info(&self) -> bool {
        matches!(self, Self::Info { .. })
    }

    /// The failure reason, if any.
    pub fn reason(&self) -> Option<ErrorReason> {
        match self {
            Self::Ok { .. } => None,
            Self::Fail { reason } | Self::Info { reason } => Some(*reason),
        }
    }
}

/// How workload keys are spread over the key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessPattern {
    /// Every key equally likely.
    Uniform,

    /// 80% of traffic lands on the first 20% of the key space.
    Hotspot,
}

/// One completed transaction as handed to the analysis consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedOp {
    /// Which worker issued the transaction.
    pub worker: u64,

    /// Which node it was issued against.
    pub node: NodeId,

    /// The attempted transaction as generated (reads unfilled).
    pub attempted: Transaction,

    /// What happened.
    pub outcome: Outcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_micro_op_key_and_kind() {
        let read = MicroOp::Read { key: 7, value: None };
        let append = MicroOp::Append { key: 7, value: 3 };
        assert_eq!(read.key(), 7);
        assert!(!read.is_write());
        assert!(append.is_write());
    }

    #[test]
    fn test_outcome_reason() {
        let ok = Outcome::Ok { ops: vec![] };
        let fail = Outcome::Fail { reason: ErrorReason::Conflict };
        let info = Outcome::Info { reason: ErrorReason::Indeterminate };
        assert_eq!(ok.reason(), None);
        assert_eq!(fail.reason(), Some(ErrorReason::Conflict));
        assert!(info.is_info());
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let fail = Outcome::Fail { reason: ErrorReason::Abort };
        let json = serde_json::to_string(&fail).unwrap();
        assert!(json.contains("\"outcome\":\"fail\""));
        assert!(json.contains("\"reason\":\"abort\""));
    }
}
