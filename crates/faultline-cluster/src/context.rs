//! Per-deployment cluster context.
//!
//! One `ClusterContext` exists per deployment and is passed explicitly to
//! every call that needs shared cluster state — the restart-permit pool and
//! the recovery gate live here rather than in ambient process-wide cells.

use faultline_types::NodeId;
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex, MutexGuard, Semaphore};
use tracing::info;

/// Members needed for the replication group to elect and keep a primary:
/// `⌈(n + 1) / 2⌉`, the smallest strict majority.
pub fn majority(nodes: usize) -> usize {
    (nodes + 1).div_ceil(2)
}

/// How many nodes may be mid-restart at once.
///
/// `max(1, majority(n) − 2)`: beyond the bare majority, two extra working
/// members stay reserved as a buffer against unrelated failures landing
/// inside the restart window.
pub fn restart_permit_capacity(nodes: usize) -> usize {
    majority(nodes).saturating_sub(2).max(1)
}

/// Shared state for one cluster deployment.
#[derive(Debug)]
pub struct ClusterContext {
    nodes: Vec<NodeId>,
    restart_permits: OnceLock<Arc<Semaphore>>,
    recovery_gate: Mutex<()>,
}

impl ClusterContext {
    /// Context over a fixed node membership.
    pub fn new(nodes: Vec<NodeId>) -> Self {
        Self {
            nodes,
            restart_permits: OnceLock::new(),
            recovery_gate: Mutex::new(()),
        }
    }

    /// The cluster membership, in the order given at construction.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// The restart-permit pool, created exactly once on first use and sized
    /// from the node count for the lifetime of the deployment.
    pub fn restart_permits(&self) -> &Arc<Semaphore> {
        self.restart_permits.get_or_init(|| {
            let capacity = restart_permit_capacity(self.nodes.len());
            info!(capacity, nodes = self.nodes.len(), "creating restart permit pool");
            Arc::new(Semaphore::new(capacity))
        })
    }

    /// Serializes recovery attempts: at most one runs at a time.
    pub(crate) async fn lock_recovery(&self) -> MutexGuard<'_, ()> {
        self.recovery_gate.lock().await
    }
}
