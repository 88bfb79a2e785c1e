//! Exercise command - runs the configured workload against the built-in
//! cluster double.
//!
//! The self-check of the harness: every executor path, classifier row, and
//! runner behavior runs exactly as it would against a real cluster, minus
//! the cluster.

use anyhow::{Context, Result};
use faultline_client::{
    ExecOptions, RunPlan, RunReport, SimCluster, TimeoutPolicy, WorkloadSpec, run_workload,
};
use faultline_config::{ConfigLoader, FaultlineConfig};
use faultline_types::NodeId;

pub fn run(project: &str, seed: Option<u64>, json: bool) -> Result<()> {
    let mut config = ConfigLoader::new()
        .with_project_dir(project)
        .load()
        .context("Failed to load configuration")?;
    if let Some(seed) = seed {
        config.workload.seed = seed;
    }

    let plan = plan_from(&config);
    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    let report = runtime
        .block_on(run_workload(SimCluster::new().connector(), plan))
        .context("Workload run failed")?;

    if json {
        print_json(&report)?;
    } else {
        print_text(&report);
    }
    Ok(())
}

fn plan_from(config: &FaultlineConfig) -> RunPlan {
    let workload = &config.workload;
    RunPlan {
        nodes: config.cluster.nodes.iter().map(|node| NodeId::from(node.as_str())).collect(),
        workers: workload.workers,
        transactions_per_worker: workload.transactions_per_worker,
        seed: workload.seed,
        exec: ExecOptions {
            tables: workload.tables,
            isolation: workload.isolation,
            secondary_read_probability: workload.secondary_read_probability,
            lock_mode: workload.lock_mode,
            write_strategies: workload.write_strategies.clone(),
            abort_probability: workload.abort_probability,
            delay_mean_ms: workload.delay_mean_ms,
        },
        workload: WorkloadSpec {
            max_ops_per_transaction: workload.max_ops_per_transaction,
            key_space: workload.key_space,
            read_ratio: workload.read_ratio,
            overwrite_ratio: workload.overwrite_ratio,
            pattern: workload.access_pattern,
        },
        timeouts: TimeoutPolicy::from_millis(config.timeouts.connect_ms, config.timeouts.statement_ms),
    }
}

fn print_text(report: &RunReport) {
    println!("Completed {} transactions in {:?}", report.total(), report.duration);
    println!();
    println!("  ok:   {}", report.ok);
    println!("  fail: {}", report.fail);
    println!("  info: {}", report.info);
    if !report.reasons.is_empty() {
        println!();
        for (reason, count) in &report.reasons {
            println!("  {reason}: {count}");
        }
    }
}

fn print_json(report: &RunReport) -> Result<()> {
    let summary = serde_json::json!({
        "total": report.total(),
        "ok": report.ok,
        "fail": report.fail,
        "info": report.info,
        "reasons": report.reasons,
        "duration_ms": report.duration.as_millis() as u64,
    });
    println!("{}", serde_json::to_string_pretty(&summary).context("Failed to render JSON")?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_mirrors_configuration() {
        let mut config = FaultlineConfig::default();
        config.workload.seed = 99;
        config.workload.tables = 7;

        let plan = plan_from(&config);
        assert_eq!(plan.nodes.len(), 3);
        assert_eq!(plan.seed, 99);
        assert_eq!(plan.exec.tables, 7);
        assert_eq!(plan.workers, config.workload.workers);
        assert_eq!(
            plan.timeouts,
            TimeoutPolicy::from_millis(config.timeouts.connect_ms, config.timeouts.statement_ms)
        );
    }
}
