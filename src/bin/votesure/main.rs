//! VoteSure CLI - reconcile a voter's ledger and backend records.
//!
//! # Usage
//!
//! ```bash
//! # Vote status for the active election
//! votesure status
//!
//! # Candidate roster with ledger tallies
//! votesure --json roster --election 1 | jq '.summary'
//!
//! # Cast a vote, giving up after two minutes
//! VOTESURE_PRIVATE_KEY=0x... votesure cast 665f1c01 --timeout-secs 120
//!
//! # Everything against seeded in-memory stores
//! votesure --demo roster
//! ```
//!
//! # Tiger Style
//!
//! - Explicit error handling with anyhow
//! - Fail-fast on invalid arguments

mod cli;
mod commands;
mod demo;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;

/// Initialize tracing subscriber with environment-based filtering.
///
/// - `quiet`: Suppress all logging output (for scripting)
/// - `verbose`: Enable debug-level logging
fn init_tracing(quiet: bool, verbose: bool) {
    let filter = if quiet {
        EnvFilter::new("off")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).compact().with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.global.is_quiet, cli.global.is_verbose);

    cli.run().await
}
