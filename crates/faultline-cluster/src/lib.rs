//! Cluster coordination for the Faultline harness.
//!
//! Everything a deployment shares lives behind an explicit
//! [`ClusterContext`] passed to every call:
//! - the restart-permit pool that stops scheduled restarts from eating the
//!   cluster's quorum,
//! - the recovery gate serializing quorum-loss recovery attempts.
//!
//! Deployment topologies implement the capability traits in [`deploy`];
//! [`recovery`] rebuilds the replication group from per-node progress sets
//! after quorum loss.

pub mod context;
pub mod deploy;
mod error;
pub mod recovery;
pub mod restart;

pub use context::{ClusterContext, majority, restart_permit_capacity};
pub use deploy::{
    FaultyStorage, Lifecycle, LocalDeployment, PauseControl, PrimaryDiscovery, ProcessControl,
};
pub use error::{Error, RecoveryError, Result};
pub use recovery::{AdminConnector, AdminSession, ClusterAdmin, recover};
pub use restart::{Probe, RestartOptions, restart_node};
