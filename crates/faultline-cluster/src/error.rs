//! Errors for cluster coordination and recovery.

use faultline_progress::ParseError;
use faultline_types::{DbError, NodeId};
use thiserror::Error;

/// Errors from deployment control and restart coordination.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error from process or filesystem control.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A node process could not be spawned.
    #[error("failed to spawn process for {node}: {reason}")]
    Spawn { node: NodeId, reason: String },

    /// No process is known for the node.
    #[error("node {0} is not running")]
    NotRunning(NodeId),

    /// The node did not become reachable within the restart deadline.
    #[error("node {0} did not become reachable after restart")]
    RestartTimeout(NodeId),

    /// The restart-permit pool was closed; only happens at shutdown.
    #[error("restart permit pool closed")]
    PermitPoolClosed,
}

/// Result type for cluster operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A failed recovery attempt.
///
/// Recovery performs no internal retries: the first per-node failure aborts
/// the whole attempt and it is the caller's decision whether to re-invoke.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// An administrative call against one node failed.
    #[error("node {node}: {source}")]
    NodeQuery {
        node: NodeId,
        #[source]
        source: DbError,
    },

    /// A node reported progress text the algebra cannot read. Fatal — a set
    /// we cannot parse is a set we cannot trust recovery with.
    #[error("node {node}: malformed progress set: {source}")]
    Progress {
        node: NodeId,
        #[source]
        source: ParseError,
    },

    /// The context has no nodes to recover.
    #[error("no nodes to recover")]
    NoNodes,

    /// A survey task panicked or was cancelled.
    #[error("recovery task failed: {0}")]
    Task(String),
}
