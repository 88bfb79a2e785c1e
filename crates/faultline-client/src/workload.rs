//! Seeded workload generation.
//!
//! Transactions are generated up front from a seed, so a failing run can be
//! replayed exactly. The key space is split by flavor: register keys take
//! overwrite/read traffic, list keys take append/read traffic — mixing both
//! flavors on one key would corrupt the stored representation.

use faultline_types::{AccessPattern, MicroOp, Transaction};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Shape of the generated workload.
#[derive(Debug, Clone)]
pub struct WorkloadSpec {
    /// Micro-operations per transaction, uniform in `1..=max`.
    pub max_ops_per_transaction: u32,

    /// Distinct keys in play.
    pub key_space: u64,

    /// Fraction of micro-operations that are reads.
    pub read_ratio: f64,

    /// Fraction of the key space given to overwrite (register) keys; the
    /// rest take appends.
    pub overwrite_ratio: f64,

    /// How keys are spread over the key space.
    pub pattern: AccessPattern,
}

impl Default for WorkloadSpec {
    fn default() -> Self {
        Self {
            max_ops_per_transaction: 4,
            key_space: 100,
            read_ratio: 0.5,
            overwrite_ratio: 0.2,
            pattern: AccessPattern::Uniform,
        }
    }
}

/// Generates transactions from a seed.
#[derive(Debug)]
pub struct WorkloadGenerator {
    spec: WorkloadSpec,
    rng: StdRng,
    next_value: i64,
}

impl WorkloadGenerator {
    /// A generator seeded for reproducibility. `value_base` partitions the
    /// written values across generators so every write in a run is unique.
    pub fn new(spec: WorkloadSpec, seed: u64, value_base: i64) -> Self {
        Self { spec, rng: StdRng::seed_from_u64(seed), next_value: value_base }
    }

    /// The next transaction.
    pub fn next_transaction(&mut self) -> Transaction {
        let len = self.rng.gen_range(1..=self.spec.max_ops_per_transaction);
        (0..len).map(|_| self.next_op()).collect()
    }

    fn next_op(&mut self) -> MicroOp {
        let key = self.pick_key();
        if self.rng.r#gen::<f64>() < self.spec.read_ratio {
            return MicroOp::Read { key, value: None };
        }
        self.next_value += 1;
        let value = self.next_value;
        if key < self.register_boundary() {
            MicroOp::Write { key, value }
        } else {
            MicroOp::Append { key, value }
        }
    }

    /// Keys below the boundary are registers, keys above are lists.
    fn register_boundary(&self) -> u64 {
        (self.spec.key_space as f64 * self.spec.overwrite_ratio) as u64
    }

    fn pick_key(&mut self) -> u64 {
        match self.spec.pattern {
            AccessPattern::Uniform => self.rng.gen_range(0..self.spec.key_space),
            AccessPattern::Hotspot => {
                // 80% of traffic on the first 20% of the key space.
                let hot = (self.spec.key_space / 5).max(1);
                if self.rng.r#gen::<f64>() < 0.8 {
                    self.rng.gen_range(0..hot)
                } else {
                    self.rng.gen_range(0..self.spec.key_space)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(spec: WorkloadSpec, seed: u64, count: usize) -> Vec<Transaction> {
        let mut generator = WorkloadGenerator::new(spec, seed, 0);
        (0..count).map(|_| generator.next_transaction()).collect()
    }

    #[test]
    fn test_same_seed_same_workload() {
        let a = collect(WorkloadSpec::default(), 7, 50);
        let b = collect(WorkloadSpec::default(), 7, 50);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = collect(WorkloadSpec::default(), 7, 50);
        let b = collect(WorkloadSpec::default(), 8, 50);
        assert_ne!(a, b);
    }

    #[test]
    fn test_transaction_lengths_bounded() {
        for txn in collect(WorkloadSpec::default(), 3, 200) {
            assert!(!txn.is_empty());
            assert!(txn.len() <= 4);
        }
    }

    #[test]
    fn test_key_flavors_never_mix() {
        let spec = WorkloadSpec { overwrite_ratio: 0.5, ..WorkloadSpec::default() };
        let boundary = 50;
        for txn in collect(spec, 11, 300) {
            for op in txn {
                match op {
                    MicroOp::Write { key, .. } => assert!(key < boundary),
                    MicroOp::Append { key, .. } => assert!(key >= boundary),
                    MicroOp::Read { .. } => {}
                }
            }
        }
    }

    #[test]
    fn test_written_values_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for txn in collect(WorkloadSpec { read_ratio: 0.0, ..WorkloadSpec::default() }, 5, 200) {
            for op in txn {
                if let MicroOp::Append { value, .. } | MicroOp::Write { value, .. } = op {
                    assert!(seen.insert(value), "value {value} generated twice");
                }
            }
        }
    }

    #[test]
    fn test_hotspot_prefers_hot_keys() {
        let spec = WorkloadSpec {
            pattern: AccessPattern::Hotspot,
            key_space: 100,
            ..WorkloadSpec::default()
        };
        let ops: Vec<MicroOp> = collect(spec, 13, 500).into_iter().flatten().collect();
        let hot = ops.iter().filter(|op| op.key() < 20).count();
        // 80% of traffic targets the hot fifth; leave slack for variance.
        assert!(hot * 10 > ops.len() * 6, "hot keys got {hot} of {}", ops.len());
    }

    #[test]
    fn test_keys_stay_in_key_space() {
        let spec = WorkloadSpec { key_space: 10, ..WorkloadSpec::default() };
        for txn in collect(spec, 17, 200) {
            for op in txn {
                assert!(op.key() < 10);
            }
        }
    }
}
