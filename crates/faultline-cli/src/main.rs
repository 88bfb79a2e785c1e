//! Faultline unified CLI.
//!
//! Fault-injection exercise harness for replicated SQL clusters.
//!
//! # Quick Start
//!
//! ```bash
//! # Inspect the derived run parameters
//! faultline plan
//!
//! # Drive the configured workload against the built-in cluster double
//! faultline exercise
//!
//! # Debug a progress set reported by a replica
//! faultline progress "src-a:1-40:42, src-b:1-17"
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Faultline - fault-injection exercise harness for replicated SQL clusters.
#[derive(Parser)]
#[command(name = "faultline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory holding faultline.toml.
    #[arg(short = 'C', long, default_value = ".", global = true)]
    project: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Load the configuration and print the derived run parameters.
    Plan,

    /// Parse, union, and measure progress-set wire text.
    ///
    /// Bare texts are unioned; `node=text` pairs additionally report which
    /// node a recovery would re-seed from.
    Progress {
        /// Progress-set texts, or `node=text` pairs.
        #[arg(required = true)]
        sets: Vec<String>,
    },

    /// Drive the configured workload against the built-in cluster double.
    Exercise {
        /// Override the configured seed.
        #[arg(long)]
        seed: Option<u64>,

        /// Emit the tally as JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Plan => commands::plan::run(&cli.project),
        Commands::Progress { sets } => commands::progress::run(&sets),
        Commands::Exercise { seed, json } => commands::exercise::run(&cli.project, seed, json),
    }
}
