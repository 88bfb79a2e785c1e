//! Bounded-concurrency node restarts.
//!
//! A node must hold a permit from the deployment's pool for its whole
//! restart window — from just before the kill until the database answers
//! again — so a burst of scheduled restarts can never eat the quorum.

use crate::context::ClusterContext;
use crate::deploy::ProcessControl;
use crate::error::{Error, Result};
use faultline_types::NodeId;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

/// Answers whether a node's database is accepting connections again.
pub trait Probe: Send + Sync {
    fn reachable(&self, node: &NodeId) -> impl Future<Output = bool> + Send;
}

/// Pacing for the post-restart reachability wait.
#[derive(Debug, Clone, Copy)]
pub struct RestartOptions {
    /// How often to probe.
    pub probe_interval: Duration,

    /// How long to keep probing before giving up.
    pub deadline: Duration,
}

impl Default for RestartOptions {
    fn default() -> Self {
        Self { probe_interval: Duration::from_millis(500), deadline: Duration::from_secs(60) }
    }
}

/// Restarts one node under a permit.
///
/// The permit is acquired before the kill and released by drop on every
/// exit path — success, spawn failure, or reachability timeout — only after
/// this function returns.
pub async fn restart_node<D, P>(
    ctx: &ClusterContext,
    deploy: &mut D,
    probe: &P,
    node: &NodeId,
    opts: RestartOptions,
) -> Result<()>
where
    D: ProcessControl,
    P: Probe,
{
    let _permit = ctx
        .restart_permits()
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| Error::PermitPoolClosed)?;

    info!(%node, "restarting node");
    deploy.kill(node).await?;
    deploy.start(node).await?;
    wait_reachable(probe, node, opts).await?;
    info!(%node, "node reachable again");
    Ok(())
}

async fn wait_reachable<P: Probe>(probe: &P, node: &NodeId, opts: RestartOptions) -> Result<()> {
    let deadline = Instant::now() + opts.deadline;
    loop {
        if probe.reachable(node).await {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(Error::RestartTimeout(node.clone()));
        }
        debug!(%node, "not reachable yet");
        sleep(opts.probe_interval).await;
    }
}
