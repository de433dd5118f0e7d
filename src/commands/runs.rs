use chrono::Utc;
use clap::Args;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::analysis::format_hms;
use crate::error::{Result, TrackerError};
use crate::models::{Coordinate, Run, UserId};
use crate::recorder::{
  parse_distance_km, parse_duration_hms, parse_entry_date, ManualEntry, RecordingSession,
};
use crate::service::{FinishedRun, RunTracker};
use crate::store::RunStore;

#[derive(Debug, Args)]
pub struct LogArgs {
  /// Distance in km, "5.2" or "5,2"
  #[arg(long)]
  pub distance: String,

  /// Duration as HH:MM:SS
  #[arg(long)]
  pub duration: String,

  /// When the run happened, "YYYY-MM-DDTHH:MM" or RFC 3339 (defaults to now)
  #[arg(long)]
  pub date: Option<String>,

  /// kcal burned; estimated from distance when omitted
  #[arg(long)]
  pub calories: Option<i64>,

  /// Treat the run as a challenge over this many km
  #[arg(long)]
  pub challenge: Option<u32>,
}

/// ---------------------------------------------------------------------------
/// Logging Runs
/// ---------------------------------------------------------------------------

pub async fn log_run<S: RunStore>(
  tracker: &RunTracker<S>,
  user: &UserId,
  args: LogArgs,
) -> Result<String> {
  let date = match args.date.as_deref() {
    Some(raw) => parse_entry_date(raw)?,
    None => Utc::now(),
  };

  let entry = ManualEntry {
    date,
    distance_km: parse_distance_km(&args.distance)?,
    duration_ms: parse_duration_hms(&args.duration)?,
    calories: args.calories,
  };

  let finished = tracker.finish_run(user, entry.into_run()?, args.challenge).await?;
  Ok(render_finished(&finished))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackLine {
  Sample(Coordinate),
  Pause,
  Resume,
  Stop,
}

/// One line of tracking input. Blank lines yield `None`.
pub fn parse_track_line(line: &str) -> Result<Option<TrackLine>> {
  let line = line.trim();
  match line.to_ascii_lowercase().as_str() {
    "" => return Ok(None),
    "pause" => return Ok(Some(TrackLine::Pause)),
    "resume" => return Ok(Some(TrackLine::Resume)),
    "stop" => return Ok(Some(TrackLine::Stop)),
    _ => {}
  }

  let invalid = || TrackerError::InvalidInput(format!("expected \"lat,lon\", got {:?}", line));
  let (lat, lon) = line.split_once(',').ok_or_else(invalid)?;
  let lat = lat.trim().parse::<f64>().map_err(|_| invalid())?;
  let lon = lon.trim().parse::<f64>().map_err(|_| invalid())?;

  Ok(Some(TrackLine::Sample(Coordinate::new(lat, lon)?)))
}

/// Record a session from line-based input until "stop" or end of input.
/// Unreadable lines are skipped; if the input itself fails, the session is
/// stopped and saved with what it has.
pub async fn track_run<S, R>(
  tracker: &RunTracker<S>,
  user: &UserId,
  mut input: R,
  challenge: Option<u32>,
) -> Result<String>
where
  S: RunStore,
  R: AsyncBufRead + Unpin,
{
  let mut session = RecordingSession::start();
  let gps = session.samples();
  let mut raw = Vec::new();

  loop {
    raw.clear();
    match input.read_until(b'\n', &mut raw).await {
      Ok(0) => break,
      Ok(_) => {}
      Err(e) => {
        tracing::warn!(error = %e, "Tracking input failed, stopping session");
        break;
      }
    }

    match parse_track_line(&String::from_utf8_lossy(&raw)) {
      Ok(Some(TrackLine::Sample(coord))) => {
        gps.send(coord);
      }
      Ok(Some(TrackLine::Pause)) => session.pause()?,
      Ok(Some(TrackLine::Resume)) => session.resume()?,
      Ok(Some(TrackLine::Stop)) => break,
      Ok(None) => {}
      Err(e) => tracing::warn!(error = %e, "Skipping tracking input"),
    }
  }

  match session.stop().await? {
    Some(run) => {
      let finished = tracker.finish_run(user, run, challenge).await?;
      Ok(render_finished(&finished))
    }
    None => Ok("Nothing recorded".to_string()),
  }
}

/// ---------------------------------------------------------------------------
/// History
/// ---------------------------------------------------------------------------

pub async fn history<S: RunStore>(
  tracker: &RunTracker<S>,
  user: &UserId,
  limit: usize,
  json: bool,
) -> Result<String> {
  let runs = tracker.runs(user).await?;
  let shown = &runs[..runs.len().min(limit)];

  if json {
    return Ok(serde_json::to_string_pretty(shown)?);
  }
  if shown.is_empty() {
    return Ok("No runs yet".to_string());
  }

  Ok(shown.iter().map(render_run_line).collect::<Vec<_>>().join("\n"))
}

pub async fn clear<S: RunStore>(tracker: &RunTracker<S>, user: &UserId) -> Result<String> {
  tracker.clear_runs(user).await?;
  Ok("Run history cleared".to_string())
}

/// ---------------------------------------------------------------------------
/// Rendering
/// ---------------------------------------------------------------------------

pub fn render_run_line(run: &Run) -> String {
  format!(
    "{}  {:>6.2} km  {}  {} /km  {} kcal",
    run.date.format("%Y-%m-%d %H:%M"),
    run.distance_km(),
    format_hms(run.duration_ms),
    run.pace,
    run.calories
  )
}

pub fn render_finished(finished: &FinishedRun) -> String {
  let mut out = format!("Saved run {}: {}", finished.run.id, render_run_line(&finished.run));
  if let Some(outcome) = &finished.challenge {
    out.push('\n');
    out.push_str(&outcome.message());
  }
  out
}
