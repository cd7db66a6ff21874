//! CLI argument parsing and command dispatch.
//!
//! Uses clap derive macros for declarative argument definition with
//! support for environment variables and global options.

use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use votesure::Reconciler;
use votesure::ReconcilerConfig;

use crate::commands;
use crate::demo;

/// Command-line interface for VoteSure vote reconciliation.
#[derive(Parser)]
#[command(name = "votesure")]
#[command(version)]
#[command(about = "Reconcile ledger and backend vote records")]
#[command(long_about = "Non-interactive CLI that answers vote-status, roster, eligibility and \
    cast requests by reconciling the voting ledger with the off-chain backend.")]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Commands,
}

/// Global options available to all commands.
#[derive(Args, Clone)]
pub struct GlobalOptions {
    /// TOML configuration file.
    ///
    /// Falls back to VOTESURE_* environment variables when absent.
    #[arg(long, env = "VOTESURE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Backend API base URL (overrides the configuration).
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    /// Run against seeded in-memory stores instead of real services.
    #[arg(long, global = true)]
    pub demo: bool,

    /// Output JSON instead of human-readable format.
    #[arg(long = "json", global = true)]
    pub is_json: bool,

    /// Enable verbose logging.
    #[arg(short = 'v', long = "verbose", global = true)]
    pub is_verbose: bool,

    /// Suppress all logging output (warnings, debug messages).
    ///
    /// Useful for scripting and when parsing JSON output.
    #[arg(short = 'q', long = "quiet", global = true)]
    pub is_quiet: bool,
}

/// Election selector shared by every command.
#[derive(Args, Clone, Debug)]
pub struct ElectionArgs {
    /// Off-chain election id. Defaults to the active election.
    #[arg(long, short = 'e')]
    pub election: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct CastArgs {
    /// Off-chain candidate id.
    pub candidate: String,

    #[command(flatten)]
    pub election: ElectionArgs,

    /// Give up waiting for confirmation after this many seconds.
    ///
    /// Without it the command waits until the ledger answers or Ctrl-C.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Submit even when the eligibility check denies the vote.
    ///
    /// The ledger still enforces its own rules.
    #[arg(long)]
    pub force: bool,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Merged vote status for the current voter.
    Status(ElectionArgs),

    /// Backend candidates with their ledger tallies.
    Roster(ElectionArgs),

    /// Whether the current voter may cast a vote, and why not.
    Eligibility(ElectionArgs),

    /// Cast a vote on the ledger and wait for confirmation.
    Cast(CastArgs),

    /// Show the recorded vote and its ledger confirmation.
    Verify(ElectionArgs),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let reconciler = if self.global.demo {
            demo::reconciler()
        } else {
            let mut config = ReconcilerConfig::load_with_optional_file(self.global.config.as_ref())
                .context("failed to load configuration")?;
            if let Some(url) = &self.global.backend_url {
                config.backend.base_url = url.clone();
            }
            Reconciler::from_config(&config).context("failed to initialize reconciler")?
        };

        let json = self.global.is_json;
        match self.command {
            Commands::Status(args) => commands::status(&reconciler, args, json).await,
            Commands::Roster(args) => commands::roster(&reconciler, args, json).await,
            Commands::Eligibility(args) => commands::eligibility(&reconciler, args, json).await,
            Commands::Cast(args) => commands::cast(&reconciler, args, json).await,
            Commands::Verify(args) => commands::verify(&reconciler, args, json).await,
        }
    }
}
