//! Quorum-loss recovery: pick the most-advanced node and rebuild the
//! replication group around it.
//!
//! Invoked only when no node claims to be a functioning primary. The
//! protocol is deliberately rigid: survey every node in parallel, elect by
//! progress-set cardinality, bootstrap the winner, then join the rest one
//! at a time — concurrent joins are documented to race in the group
//! membership protocol. Any per-node failure aborts the whole attempt; the
//! caller decides whether to try again.

use crate::context::ClusterContext;
use crate::deploy::PrimaryDiscovery;
use crate::error::RecoveryError;
use faultline_client::TimeoutPolicy;
use faultline_progress::{ProgressSet, most_recent_node};
use faultline_types::{DbError, NodeId};
use std::collections::BTreeMap;
use std::future::Future;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Administrative session on one node, for recovery-time operations.
pub trait AdminSession: Send {
    /// Halts the node's participation in replication. Can block for a long
    /// time while the node drains; callers use the recovery timeout policy.
    fn halt_replication(&mut self) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Progress text for transactions this node has applied.
    fn applied_progress(&mut self) -> impl Future<Output = Result<String, DbError>> + Send;

    /// Progress text for transactions received but not yet applied.
    fn pending_progress(&mut self) -> impl Future<Output = Result<String, DbError>> + Send;

    /// Re-creates the replication group with this node as its first member.
    fn bootstrap_group(&mut self) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Joins the already-bootstrapped replication group.
    fn join_group(&mut self) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Which node this node currently believes is primary, if any.
    fn current_primary(&mut self) -> impl Future<Output = Result<Option<NodeId>, DbError>> + Send;
}

/// Opens administrative sessions on cluster nodes.
pub trait AdminConnector: Clone + Send + Sync + 'static {
    type Session: AdminSession + Send + 'static;

    fn open(
        &self,
        node: &NodeId,
        timeouts: TimeoutPolicy,
    ) -> impl Future<Output = Result<Self::Session, DbError>> + Send;
}

/// Recovers the replication group after quorum loss.
///
/// Holds the context's recovery gate for the whole attempt, so at most one
/// recovery runs per deployment. Returns the node elected as the new
/// primary. No internal retries and no tolerance for unreachable nodes: a
/// node we cannot survey might be the most advanced one.
pub async fn recover<A: AdminConnector>(
    ctx: &ClusterContext,
    connector: &A,
    timeouts: TimeoutPolicy,
) -> Result<NodeId, RecoveryError> {
    let _gate = ctx.lock_recovery().await;
    info!(nodes = ctx.nodes().len(), "starting cluster recovery");

    // Phase 1, parallel per node: halt replication, fetch both progress
    // sets, union them into the node's total progress.
    let mut survey: JoinSet<Result<(NodeId, A::Session, ProgressSet), RecoveryError>> =
        JoinSet::new();
    for node in ctx.nodes() {
        let connector = connector.clone();
        let node = node.clone();
        survey.spawn(async move {
            let mut session = connector
                .open(&node, timeouts)
                .await
                .map_err(|e| RecoveryError::NodeQuery { node: node.clone(), source: e })?;
            session
                .halt_replication()
                .await
                .map_err(|e| RecoveryError::NodeQuery { node: node.clone(), source: e })?;
            let applied = fetch_progress(&node, session.applied_progress().await)?;
            let pending = fetch_progress(&node, session.pending_progress().await)?;
            let total = applied.union(&pending);
            debug!(%node, cardinality = total.cardinality(), "surveyed");
            Ok((node, session, total))
        });
    }

    let mut surveyed: BTreeMap<NodeId, (A::Session, ProgressSet)> = BTreeMap::new();
    while let Some(joined) = survey.join_next().await {
        // The first failure aborts the attempt; dropping the set cancels
        // whatever is still in flight.
        let (node, session, progress) =
            joined.map_err(|e| RecoveryError::Task(e.to_string()))??;
        surveyed.insert(node, (session, progress));
    }

    // Phase 2: elect by cardinality.
    let sets: BTreeMap<NodeId, ProgressSet> =
        surveyed.iter().map(|(node, (_, set))| (node.clone(), set.clone())).collect();
    let primary = most_recent_node(&sets).ok_or(RecoveryError::NoNodes)?;

    // Phase 3: bootstrap the winner before anyone may join.
    info!(%primary, "bootstrapping replication group");
    let (mut primary_session, _) = surveyed.remove(&primary).expect("primary was surveyed");
    primary_session
        .bootstrap_group()
        .await
        .map_err(|e| RecoveryError::NodeQuery { node: primary.clone(), source: e })?;

    // Phase 4: strictly sequential joins, in node-id order.
    for (node, (mut session, _)) in surveyed {
        info!(%node, "joining replication group");
        session
            .join_group()
            .await
            .map_err(|e| RecoveryError::NodeQuery { node: node.clone(), source: e })?;
    }

    info!(%primary, "recovery complete");
    Ok(primary)
}

fn fetch_progress(
    node: &NodeId,
    text: Result<String, DbError>,
) -> Result<ProgressSet, RecoveryError> {
    let text = text.map_err(|e| RecoveryError::NodeQuery { node: node.clone(), source: e })?;
    text.parse().map_err(|e| RecoveryError::Progress { node: node.clone(), source: e })
}

/// Primary discovery over administrative sessions: polls every node and
/// reports the first primary claim. Nodes that are unreachable or undecided
/// are skipped — during fault injection that is the normal case.
pub struct ClusterAdmin<A: AdminConnector> {
    connector: A,
    nodes: Vec<NodeId>,
    timeouts: TimeoutPolicy,
}

impl<A: AdminConnector> ClusterAdmin<A> {
    pub fn new(connector: A, nodes: Vec<NodeId>, timeouts: TimeoutPolicy) -> Self {
        Self { connector, nodes, timeouts }
    }
}

impl<A: AdminConnector> PrimaryDiscovery for ClusterAdmin<A> {
    async fn primary(&self) -> Option<NodeId> {
        for node in &self.nodes {
            match self.connector.open(node, self.timeouts).await {
                Ok(mut session) => match session.current_primary().await {
                    Ok(Some(primary)) => return Some(primary),
                    Ok(None) => {}
                    Err(error) => debug!(%node, %error, "primary query failed"),
                },
                Err(error) => debug!(%node, %error, "unreachable during discovery"),
            }
        }
        None
    }
}
