//! Shared vocabulary for the Faultline harness.
//!
//! Every crate in the workspace speaks in these types: cluster node
//! identifiers, micro-operations and the transactions built from them, the
//! three-valued [`Outcome`] handed to history analysis, the
//! [`ErrorReason`] taxonomy behind `Fail`/`Info`, and the raw
//! [`DbError`] surface produced by database connectors.

pub mod db;
pub mod op;

pub use db::{DbError, Isolation, LockMode, TxnPhase, WriteStrategy};
pub use op::{AccessPattern, CompletedOp, ErrorReason, MicroOp, Outcome, Transaction, Value};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one cluster node, e.g. `"n1"` or `"db-3.internal"`.
///
/// Ordering is lexicographic; recovery relies on that for its deterministic
/// tie-break and join order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Creates a node id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_ordering_is_lexicographic() {
        let mut ids = vec![NodeId::from("n3"), NodeId::from("n1"), NodeId::from("n10")];
        ids.sort();
        // Lexicographic, not numeric: "n10" sorts before "n3".
        assert_eq!(ids, vec!["n1".into(), "n10".into(), "n3".into()]);
    }

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId::from("n1").to_string(), "n1");
    }
}
