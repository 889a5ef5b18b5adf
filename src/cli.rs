use clap::{Parser, Subcommand};

use crate::config::RunOverrides;

#[derive(Parser)]
#[command(
    name = "synthmon",
    about = "Scripted-browser synthetic monitoring with step timing and telemetry"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create .synthmon/config.toml with a sample test case
    Init {
        /// URL the sample test case opens
        #[arg(long, default_value = "https://example.com/")]
        url: String,
        /// Overwrite existing config and gitignore
        #[arg(long, short = 'f')]
        force: bool,
    },

    /// Load and validate the config, print the monitor plan
    Check,

    /// Execute the monitor and report results (exit 0/1)
    Run {
        /// Only run test cases whose name contains PATTERN (case-insensitive)
        #[arg(long, short = 'f')]
        filter: Option<String>,
        /// Print the per-step timing table
        #[arg(long)]
        timings: bool,
        /// Dump the local insights store after the run
        #[arg(long)]
        insights: bool,
        #[command(flatten)]
        overrides: RunOverrides,
    },
}
