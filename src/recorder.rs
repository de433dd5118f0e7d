//! Run recording: live GPS sessions and manually entered runs
//!
//! A [`RecordingSession`] owns a collector task fed by an unbounded channel.
//! Location samples and pause/resume events share that channel, so the
//! collector sees them in the order they were sent. Nothing is persisted
//! while the session is live; [`RecordingSession::stop`] flushes the route
//! into a single [`Run`].

use chrono::{DateTime, NaiveDateTime, Utc};
use geo::{Distance as _, Haversine};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

use crate::error::{Result, TrackerError};
use crate::models::{Coordinate, Run, RunId};

/// ---------------------------------------------------------------------------
/// Route Collection
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
  Sample(Coordinate),
  Pause,
  Resume,
  Stop,
}

/// Append-only route with its running haversine length
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RouteBuffer {
  pub coords: Vec<Coordinate>,
  pub distance_m: f64,
  paused: bool,
}

impl RouteBuffer {
  /// Append a sample. Samples that arrive while paused are dropped.
  pub fn push(&mut self, coord: Coordinate) {
    if self.paused {
      return;
    }
    if let Some(prev) = self.coords.last() {
      self.distance_m += Haversine.distance(prev.to_point(), coord.to_point());
    }
    self.coords.push(coord);
  }

  /// Apply one event; returns false once the session is over
  fn apply(&mut self, event: SessionEvent) -> bool {
    match event {
      SessionEvent::Sample(coord) => self.push(coord),
      SessionEvent::Pause => self.paused = true,
      SessionEvent::Resume => self.paused = false,
      SessionEvent::Stop => return false,
    }
    true
  }
}

async fn collect(mut events: mpsc::UnboundedReceiver<SessionEvent>) -> RouteBuffer {
  let mut buffer = RouteBuffer::default();
  while let Some(event) = events.recv().await {
    if !buffer.apply(event) {
      break;
    }
  }
  tracing::debug!(samples = buffer.coords.len(), distance_m = buffer.distance_m, "Route collected");
  buffer
}

/// Handle given to the location source
#[derive(Debug, Clone)]
pub struct SampleSender(mpsc::UnboundedSender<SessionEvent>);

impl SampleSender {
  /// Returns false once the session has stopped; late samples are ignored
  pub fn send(&self, coord: Coordinate) -> bool {
    self.0.send(SessionEvent::Sample(coord)).is_ok()
  }
}

/// ---------------------------------------------------------------------------
/// Session Clock
/// ---------------------------------------------------------------------------

#[derive(Debug)]
struct SessionClock {
  running_since: Option<Instant>,
  accumulated: Duration,
}

impl SessionClock {
  fn started() -> Self {
    Self { running_since: Some(Instant::now()), accumulated: Duration::ZERO }
  }

  fn pause(&mut self) {
    if let Some(since) = self.running_since.take() {
      self.accumulated += since.elapsed();
    }
  }

  fn resume(&mut self) {
    if self.running_since.is_none() {
      self.running_since = Some(Instant::now());
    }
  }

  fn is_paused(&self) -> bool {
    self.running_since.is_none()
  }

  fn elapsed(&self) -> Duration {
    self.accumulated + self.running_since.map_or(Duration::ZERO, |since| since.elapsed())
  }
}

/// ---------------------------------------------------------------------------
/// Recording Session
/// ---------------------------------------------------------------------------

/// A live recording. Must be started inside a tokio runtime.
#[derive(Debug)]
pub struct RecordingSession {
  started_at: DateTime<Utc>,
  events: mpsc::UnboundedSender<SessionEvent>,
  collector: JoinHandle<RouteBuffer>,
  clock: SessionClock,
}

impl RecordingSession {
  pub fn start() -> Self {
    Self::start_at(Utc::now())
  }

  /// Start a session whose run will be dated `started_at`
  pub fn start_at(started_at: DateTime<Utc>) -> Self {
    let (events, rx) = mpsc::unbounded_channel();
    let collector = tokio::spawn(collect(rx));
    tracing::info!(%started_at, "Recording started");

    Self { started_at, events, collector, clock: SessionClock::started() }
  }

  pub fn samples(&self) -> SampleSender {
    SampleSender(self.events.clone())
  }

  pub fn started_at(&self) -> DateTime<Utc> {
    self.started_at
  }

  pub fn pause(&mut self) -> Result<()> {
    if self.clock.is_paused() {
      return Ok(());
    }
    self.send(SessionEvent::Pause)?;
    self.clock.pause();
    tracing::debug!("Recording paused");
    Ok(())
  }

  pub fn resume(&mut self) -> Result<()> {
    if !self.clock.is_paused() {
      return Ok(());
    }
    self.send(SessionEvent::Resume)?;
    self.clock.resume();
    tracing::debug!("Recording resumed");
    Ok(())
  }

  pub fn is_paused(&self) -> bool {
    self.clock.is_paused()
  }

  /// Time spent running, paused spans excluded
  pub fn elapsed(&self) -> Duration {
    self.clock.elapsed()
  }

  /// End the session and build its run. A session with no elapsed time
  /// yields `None`.
  pub async fn stop(self) -> Result<Option<Run>> {
    let elapsed = self.clock.elapsed();
    self.send(SessionEvent::Stop)?;

    let buffer = self
      .collector
      .await
      .map_err(|e| TrackerError::Recorder(format!("collector task failed: {}", e)))?;

    let duration_ms = i64::try_from(elapsed.as_millis())
      .map_err(|_| TrackerError::Recorder("session too long".to_string()))?;
    if duration_ms == 0 {
      tracing::info!("Recording stopped with no elapsed time, nothing to save");
      return Ok(None);
    }

    let run = Run::new(
      RunId::next(),
      self.started_at,
      duration_ms,
      buffer.distance_m,
      None,
      buffer.coords,
    )?;
    tracing::info!(run_id = %run.id, distance_m = run.distance_m, duration_ms, "Recording stopped");
    Ok(Some(run))
  }

  fn send(&self, event: SessionEvent) -> Result<()> {
    self
      .events
      .send(event)
      .map_err(|_| TrackerError::Recorder("collector is no longer running".to_string()))
  }
}

/// ---------------------------------------------------------------------------
/// Manual Entry
/// ---------------------------------------------------------------------------

/// A run typed in after the fact, e.g. from a treadmill
#[derive(Debug, Clone, PartialEq)]
pub struct ManualEntry {
  pub date: DateTime<Utc>,
  pub distance_km: f64,
  pub duration_ms: i64,
  pub calories: Option<i64>,
}

impl ManualEntry {
  pub fn into_run(self) -> Result<Run> {
    if !self.distance_km.is_finite() || self.distance_km <= 0.0 {
      return Err(TrackerError::InvalidInput(
        "distance must be greater than 0 km".to_string(),
      ));
    }
    if self.duration_ms <= 0 {
      return Err(TrackerError::InvalidInput("duration must be greater than 0".to_string()));
    }

    let distance_m = (self.distance_km * 1000.0).round();
    Run::new(RunId::next(), self.date, self.duration_ms, distance_m, self.calories, vec![])
  }
}

/// Parse a distance in km, accepting a comma as decimal separator
pub fn parse_distance_km(input: &str) -> Result<f64> {
  let normalized = input.trim().replacen(',', ".", 1);
  normalized
    .parse::<f64>()
    .map_err(|_| TrackerError::InvalidInput(format!("not a distance: {:?}", input)))
}

/// Parse "HH:MM:SS" (or "MM:SS") into milliseconds
pub fn parse_duration_hms(input: &str) -> Result<i64> {
  let invalid = || TrackerError::InvalidInput(format!("not a duration: {:?}", input));

  let parts: Vec<i64> = input
    .trim()
    .split(':')
    .map(|p| p.trim().parse::<i64>().map_err(|_| invalid()))
    .collect::<Result<_>>()?;

  let (h, m, s) = match parts.as_slice() {
    [h, m, s] => (*h, *m, *s),
    [m, s] => (0, *m, *s),
    _ => return Err(invalid()),
  };
  if h < 0 || !(0..60).contains(&m) || !(0..60).contains(&s) {
    return Err(invalid());
  }

  h.checked_mul(3600)
    .and_then(|secs| secs.checked_add(m * 60 + s))
    .and_then(|secs| secs.checked_mul(1000))
    .ok_or_else(invalid)
}

/// Parse an entry date: RFC 3339, or "YYYY-MM-DDTHH:MM" read as UTC
pub fn parse_entry_date(input: &str) -> Result<DateTime<Utc>> {
  let input = input.trim();
  if let Ok(date) = DateTime::parse_from_rfc3339(input) {
    return Ok(date.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M")
    .map(|naive| naive.and_utc())
    .map_err(|_| TrackerError::InvalidInput(format!("not a date: {:?}", input)))
}
