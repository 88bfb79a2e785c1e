//! Workload execution against the cluster under test.
//!
//! The layers, bottom up:
//! - [`connector`] — the driver boundary: connections, statements, timeout
//!   policies. Real drivers and the in-memory [`sim`] double implement it.
//! - [`classify`] — maps every raw database failure onto the `Ok` / `Fail` /
//!   `Info` trichotomy, or refuses to.
//! - [`executor`] — runs one transaction's micro-operations: partitioning,
//!   lock-aware reads, upsert strategies, injected aborts.
//! - [`workload`] / [`runner`] — seeded generation and the concurrent
//!   workers that drive it all, producing the history for analysis.

pub mod classify;
pub mod connector;
mod error;
pub mod executor;
pub mod runner;
pub mod sim;
pub mod sql;
pub mod workload;

pub use classify::{Classification, classify};
pub use connector::{Connection, Connector, ExecResult, SqlValue, TimeoutPolicy};
pub use error::{ExecutorError, RunError};
pub use executor::{ExecOptions, Executor};
pub use runner::{RunPlan, RunReport, run_workload};
pub use sim::{Fault, SimCluster, SimConnector};
pub use workload::{WorkloadGenerator, WorkloadSpec};
