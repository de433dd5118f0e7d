//! Command handlers behind the `run-tracker` binary
//!
//! Each handler drives the [`RunTracker`] and returns the text to print, so
//! the binary stays a thin shell around them.

pub mod insights;
pub mod records;
pub mod runs;

use clap::Subcommand;

use crate::error::Result;
use crate::models::UserId;
use crate::service::RunTracker;
use crate::store::RunStore;

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Log a run entered by hand
  Log(runs::LogArgs),

  /// Record a live run from stdin: "lat,lon" per line, plus "pause", "resume" and "stop"
  Track {
    /// Treat the run as a challenge over this many km
    #[arg(long)]
    challenge: Option<u32>,
  },

  /// Show run history, newest first
  History {
    /// Number of runs to show
    #[arg(long, default_value = "20")]
    limit: usize,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
  },

  /// Delete the whole run history
  Clear,

  /// Show training insights for the recent runs
  Insights {
    #[arg(long)]
    json: bool,
  },

  /// Show best times per challenge distance
  Records {
    #[arg(long)]
    json: bool,
  },

  /// Forget every best time
  ResetRecords,
}

pub async fn execute<S: RunStore>(
  command: Command,
  tracker: &RunTracker<S>,
  user: &UserId,
) -> Result<String> {
  match command {
    Command::Log(args) => runs::log_run(tracker, user, args).await,
    Command::Track { challenge } => {
      let stdin = tokio::io::BufReader::new(tokio::io::stdin());
      runs::track_run(tracker, user, stdin, challenge).await
    }
    Command::History { limit, json } => runs::history(tracker, user, limit, json).await,
    Command::Clear => runs::clear(tracker, user).await,
    Command::Insights { json } => insights::show_insights(tracker, user, json).await,
    Command::Records { json } => records::show_records(tracker, user, json).await,
    Command::ResetRecords => records::reset_records(tracker, user).await,
  }
}
