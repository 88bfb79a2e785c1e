//! Plan command - prints the run parameters a configuration derives to.

use anyhow::{Context, Result};
use faultline_cluster::{majority, restart_permit_capacity};
use faultline_config::ConfigLoader;

pub fn run(project: &str) -> Result<()> {
    let config = ConfigLoader::new()
        .with_project_dir(project)
        .load()
        .context("Failed to load configuration")?;

    let nodes = config.cluster.nodes.len();

    println!("Cluster:");
    println!("  Nodes:            {}", config.cluster.nodes.join(", "));
    println!("  Port:             {}", config.cluster.port);
    println!("  Majority:         {}", majority(nodes));
    println!("  Restart permits:  {}", restart_permit_capacity(nodes));
    println!();
    println!("Workload:");
    println!("  Workers:          {}", config.workload.workers);
    println!(
        "  Transactions:     {} per worker",
        config.workload.transactions_per_worker
    );
    println!("  Partition tables: {}", config.workload.tables);
    println!("  Isolation:        {}", config.workload.isolation.as_sql());
    println!("  Write strategies: {:?}", config.workload.write_strategies);
    println!("  Abort probability: {}", config.workload.abort_probability);
    println!("  Seed:             {}", config.workload.seed);
    println!();
    println!("Timeouts:");
    println!(
        "  Workload:         connect {}ms, statement {}ms",
        config.timeouts.connect_ms, config.timeouts.statement_ms
    );
    println!(
        "  Recovery:         connect {}ms, statement {}ms",
        config.timeouts.recovery_connect_ms, config.timeouts.recovery_statement_ms
    );

    Ok(())
}
