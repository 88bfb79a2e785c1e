//! Configuration for the Faultline harness.
//!
//! Layered loading with the usual precedence:
//! 1. Environment variables (`FLT_*` prefix)
//! 2. `faultline.toml` in the project directory
//! 3. Built-in defaults

use faultline_types::{AccessPattern, Isolation, LockMode, WriteStrategy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

/// Top-level harness configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultlineConfig {
    pub cluster: ClusterSection,
    pub workload: WorkloadSection,
    pub timeouts: TimeoutSection,
}

/// The cluster under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterSection {
    /// Node names, one per cluster member.
    pub nodes: Vec<String>,

    /// Port every node's database listens on.
    pub port: u16,

    /// Scratch directory for locally-managed deployments.
    pub data_dir: PathBuf,
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            nodes: vec!["n1".to_string(), "n2".to_string(), "n3".to_string()],
            port: 3306,
            data_dir: PathBuf::from(".faultline/data"),
        }
    }
}

/// Shape of the transactional workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadSection {
    /// Number of partition tables keys are spread across.
    pub tables: u32,

    /// Isolation level for multi-operation transactions.
    pub isolation: Isolation,

    /// Probability that a read goes through the secondary index instead of
    /// the primary key.
    pub secondary_read_probability: f64,

    /// Locking applied to reads whose key is written later in the same
    /// transaction.
    pub lock_mode: LockMode,

    /// Write strategies the executor may choose among. Must not be empty.
    pub write_strategies: Vec<WriteStrategy>,

    /// Probability that a transaction aborts itself after its last
    /// micro-operation.
    pub abort_probability: f64,

    /// Mean of the exponential delay between micro-operations, in
    /// milliseconds. Zero disables the delay.
    pub delay_mean_ms: f64,

    /// Concurrent workers, one connection each.
    pub workers: u32,

    /// Transactions each worker issues.
    pub transactions_per_worker: u32,

    /// Micro-operations per transaction, uniform in `1..=max`.
    pub max_ops_per_transaction: u32,

    /// Distinct keys in play.
    pub key_space: u64,

    /// Fraction of generated micro-operations that are reads.
    pub read_ratio: f64,

    /// Fraction of the key space given to overwrite (register) keys; the
    /// rest take appends.
    pub overwrite_ratio: f64,

    /// How keys are spread over the key space.
    pub access_pattern: AccessPattern,

    /// Seed for the workload generator and every per-worker RNG.
    pub seed: u64,
}

impl Default for WorkloadSection {
    fn default() -> Self {
        Self {
            tables: 5,
            isolation: Isolation::RepeatableRead,
            secondary_read_probability: 0.2,
            lock_mode: LockMode::None,
            write_strategies: vec![WriteStrategy::AtomicUpsert, WriteStrategy::OptimisticUpsert],
            abort_probability: 0.02,
            delay_mean_ms: 5.0,
            workers: 8,
            transactions_per_worker: 200,
            max_ops_per_transaction: 4,
            key_space: 100,
            read_ratio: 0.5,
            overwrite_ratio: 0.2,
            access_pattern: AccessPattern::Uniform,
            seed: 42,
        }
    }
}

/// Connection and statement deadlines.
///
/// Recovery gets its own, much larger pair: halting replication on a
/// struggling node can legitimately block for minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSection {
    /// Connect deadline for workload connections, in milliseconds.
    pub connect_ms: u64,

    /// Per-statement deadline for workload connections, in milliseconds.
    pub statement_ms: u64,

    /// Connect deadline for recovery connections, in milliseconds.
    pub recovery_connect_ms: u64,

    /// Per-statement deadline for recovery connections, in milliseconds.
    pub recovery_statement_ms: u64,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            connect_ms: 2_000,
            statement_ms: 5_000,
            recovery_connect_ms: 30_000,
            recovery_statement_ms: 300_000,
        }
    }
}

impl FaultlineConfig {
    /// Rejects configurations the harness cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cluster.nodes.is_empty() {
            return Err(ConfigError::Invalid("cluster.nodes must not be empty".into()));
        }
        if self.workload.tables == 0 {
            return Err(ConfigError::Invalid("workload.tables must be >= 1".into()));
        }
        if self.workload.workers == 0 {
            return Err(ConfigError::Invalid("workload.workers must be >= 1".into()));
        }
        if self.workload.max_ops_per_transaction == 0 {
            return Err(ConfigError::Invalid(
                "workload.max_ops_per_transaction must be >= 1".into(),
            ));
        }
        if self.workload.key_space == 0 {
            return Err(ConfigError::Invalid("workload.key_space must be >= 1".into()));
        }
        if self.workload.write_strategies.is_empty() {
            return Err(ConfigError::Invalid(
                "workload.write_strategies must enable at least one strategy".into(),
            ));
        }
        for (name, p) in [
            ("workload.secondary_read_probability", self.workload.secondary_read_probability),
            ("workload.abort_probability", self.workload.abort_probability),
            ("workload.read_ratio", self.workload.read_ratio),
            ("workload.overwrite_ratio", self.workload.overwrite_ratio),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::Invalid(format!("{name} must be within [0, 1]")));
            }
        }
        if self.workload.delay_mean_ms < 0.0 {
            return Err(ConfigError::Invalid("workload.delay_mean_ms must be >= 0".into()));
        }
        Ok(())
    }

    /// Reads a configuration directly from one TOML file.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes this configuration as pretty TOML.
    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        FaultlineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_empty_nodes() {
        let mut config = FaultlineConfig::default();
        config.cluster.nodes.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_probability_out_of_range() {
        let mut config = FaultlineConfig::default();
        config.workload.abort_probability = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_no_write_strategies() {
        let mut config = FaultlineConfig::default();
        config.workload.write_strategies.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_write_and_read_round_trip() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("faultline.toml");

        let mut config = FaultlineConfig::default();
        config.workload.tables = 9;
        config.workload.isolation = Isolation::Serializable;
        config.write(&path).unwrap();

        let loaded = FaultlineConfig::read(&path).unwrap();
        assert_eq!(loaded.workload.tables, 9);
        assert_eq!(loaded.workload.isolation, Isolation::Serializable);
    }
}
