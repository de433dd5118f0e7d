use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::TrackerError;

/// kcal burned per km when the runner does not enter a value
pub const KCAL_PER_KM: f64 = 70.0;

static LAST_RUN_ID: AtomicI64 = AtomicI64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub i64);

impl RunId {
  /// Time-derived id (epoch millis), bumped when two runs share a millisecond
  pub fn next() -> Self {
    let now = Utc::now().timestamp_millis();
    let prev = LAST_RUN_ID
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
      .unwrap_or(now);
    Self(now.max(prev + 1))
  }
}

impl std::fmt::Display for RunId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
  pub latitude: f64,
  pub longitude: f64,
}

impl Coordinate {
  pub fn new(latitude: f64, longitude: f64) -> Result<Self, TrackerError> {
    let valid = latitude.is_finite()
      && longitude.is_finite()
      && (-90.0..=90.0).contains(&latitude)
      && (-180.0..=180.0).contains(&longitude);
    if !valid {
      return Err(TrackerError::InvalidRun(format!(
        "coordinate out of range: ({}, {})",
        latitude, longitude
      )));
    }
    Ok(Self { latitude, longitude })
  }

  pub fn to_point(self) -> geo::Point<f64> {
    geo::Point::new(self.longitude, self.latitude)
  }
}

/// One completed or logged running session.
///
/// Deserialization goes through [`RawRun`] so stored records are validated
/// at the persistence boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawRun")]
pub struct Run {
  pub id: RunId,
  pub date: DateTime<Utc>,
  pub duration_ms: i64,
  pub distance_m: f64,
  /// Display pace "M:SS" per km; analysis recomputes it from duration/distance
  pub pace: String,
  pub calories: i64,
  pub coords: Vec<Coordinate>,
}

impl Run {
  /// Build a run, deriving pace and (when not supplied) calories.
  ///
  /// Distance must be finite and >= 0. Duration is not checked here: a
  /// zero-length run can be stored, it just never reaches the analysis.
  pub fn new(
    id: RunId,
    date: DateTime<Utc>,
    duration_ms: i64,
    distance_m: f64,
    calories: Option<i64>,
    coords: Vec<Coordinate>,
  ) -> Result<Self, TrackerError> {
    if !distance_m.is_finite() || distance_m < 0.0 {
      return Err(TrackerError::InvalidRun(format!(
        "distance must be a non-negative number of metres, got {}",
        distance_m
      )));
    }

    let km = distance_m / 1000.0;
    Ok(Self {
      id,
      date,
      duration_ms,
      distance_m,
      pace: pace_string(duration_ms, distance_m),
      calories: calories.unwrap_or_else(|| estimate_calories(km)),
      coords,
    })
  }

  pub fn is_analyzable(&self) -> bool {
    self.duration_ms > 0 && self.distance_m >= 0.0
  }

  pub fn distance_km(&self) -> f64 {
    self.distance_m / 1000.0
  }

  pub fn duration_seconds(&self) -> f64 {
    self.duration_ms as f64 / 1000.0
  }

  /// Minutes per km, None when no distance was covered
  pub fn pace_min_per_km(&self) -> Option<f64> {
    let km = self.distance_km();
    if km > 0.0 {
      Some((self.duration_ms as f64 / 60_000.0) / km)
    } else {
      None
    }
  }
}

pub fn estimate_calories(km: f64) -> i64 {
  (km * KCAL_PER_KM).round() as i64
}

/// "M:SS" for a pace in min/km, rounded to the nearest second
pub fn pace_label(min_per_km: f64) -> String {
  let total_secs = (min_per_km * 60.0).round() as i64;
  format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

fn pace_string(duration_ms: i64, distance_m: f64) -> String {
  if distance_m > 0.0 {
    pace_label((duration_ms as f64 / 60_000.0) / (distance_m / 1000.0))
  } else {
    "0:00".to_string()
  }
}

/// ---------------------------------------------------------------------------
/// Stored Shape
/// ---------------------------------------------------------------------------

/// Lenient shape of a stored run. Every field is optional so that a record
/// written by an older client can be inspected before it is accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRun {
  pub id: Option<i64>,
  pub date: Option<String>,
  pub duration_ms: Option<f64>,
  pub distance_m: Option<f64>,
  pub pace: Option<String>,
  pub calories: Option<f64>,
  pub coords: Option<Vec<RawCoordinate>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCoordinate {
  pub latitude: Option<f64>,
  pub longitude: Option<f64>,
}

impl TryFrom<RawRun> for Run {
  type Error = TrackerError;

  fn try_from(raw: RawRun) -> Result<Self, Self::Error> {
    let id = raw
      .id
      .map(RunId)
      .ok_or_else(|| TrackerError::InvalidRun("missing id".to_string()))?;

    let date_str = raw
      .date
      .ok_or_else(|| TrackerError::InvalidRun(format!("run {} has no date", id)))?;
    let date = DateTime::parse_from_rfc3339(&date_str)
      .map(|dt| dt.with_timezone(&Utc))
      .map_err(|e| TrackerError::InvalidRun(format!("run {} has bad date {:?}: {}", id, date_str, e)))?;

    let duration_ms = match raw.duration_ms {
      Some(ms) if ms.is_finite() => ms.round() as i64,
      other => {
        return Err(TrackerError::InvalidRun(format!(
          "run {} has no usable duration ({:?})",
          id, other
        )))
      }
    };

    let distance_m = raw
      .distance_m
      .ok_or_else(|| TrackerError::InvalidRun(format!("run {} has no distance", id)))?;

    let coords = raw
      .coords
      .unwrap_or_default()
      .into_iter()
      .map(|c| match (c.latitude, c.longitude) {
        (Some(lat), Some(lon)) => Coordinate::new(lat, lon),
        _ => Err(TrackerError::InvalidRun(format!("run {} has an incomplete coordinate", id))),
      })
      .collect::<Result<Vec<_>, _>>()?;

    let calories = raw.calories.filter(|c| c.is_finite()).map(|c| c.round() as i64);

    let mut run = Run::new(id, date, duration_ms, distance_m, calories, coords)?;
    if let Some(pace) = raw.pace.filter(|p| !p.is_empty()) {
      run.pace = pace;
    }
    Ok(run)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 7, 30, 0).unwrap()
  }

  #[test]
  fn test_new_run_derives_pace_and_calories() {
    // 5 km in 27:30 → 5:30 /km
    let run = Run::new(RunId(1), date(), 1_650_000, 5000.0, None, vec![]).unwrap();
    assert_eq!(run.pace, "5:30");
    assert_eq!(run.calories, 350);
    assert_eq!(run.pace_min_per_km(), Some(5.5));
  }

  #[test]
  fn test_user_calories_win() {
    let run = Run::new(RunId(1), date(), 1_650_000, 5000.0, Some(410), vec![]).unwrap();
    assert_eq!(run.calories, 410);
  }

  #[test]
  fn test_pace_label_never_shows_sixty_seconds() {
    // 5.999 min/km would naively be "5:60"
    assert_eq!(pace_label(5.999), "6:00");
    assert_eq!(pace_label(4.5), "4:30");
  }

  #[test]
  fn test_zero_distance_has_no_pace() {
    let run = Run::new(RunId(1), date(), 600_000, 0.0, None, vec![]).unwrap();
    assert_eq!(run.pace_min_per_km(), None);
    assert_eq!(run.pace, "0:00");
    assert_eq!(run.calories, 0);
  }

  #[test]
  fn test_negative_distance_rejected() {
    assert!(Run::new(RunId(1), date(), 600_000, -1.0, None, vec![]).is_err());
    assert!(Run::new(RunId(1), date(), 600_000, f64::NAN, None, vec![]).is_err());
  }

  #[test]
  fn test_zero_duration_is_stored_but_not_analyzable() {
    let run = Run::new(RunId(1), date(), 0, 5000.0, None, vec![]).unwrap();
    assert!(!run.is_analyzable());
  }

  #[test]
  fn test_run_ids_increase() {
    let a = RunId::next();
    let b = RunId::next();
    assert!(b > a);
  }

  #[test]
  fn test_deserialize_stored_run() {
    let json = r#"{
      "id": 1704094200000,
      "date": "2024-01-01T07:30:00.000Z",
      "durationMs": 1650000,
      "distanceM": 5000,
      "pace": "5:30",
      "calories": 350,
      "coords": [{"latitude": 40.4168, "longitude": -3.7038}]
    }"#;
    let run: Run = serde_json::from_str(json).unwrap();
    assert_eq!(run.id, RunId(1704094200000));
    assert_eq!(run.date, date());
    assert_eq!(run.coords.len(), 1);
  }

  #[test]
  fn test_deserialize_fills_missing_derived_fields() {
    let json = r#"{"id": 7, "date": "2024-01-01T07:30:00Z", "durationMs": 1650000, "distanceM": 5000}"#;
    let run: Run = serde_json::from_str(json).unwrap();
    assert_eq!(run.pace, "5:30");
    assert_eq!(run.calories, 350);
    assert!(run.coords.is_empty());
  }

  #[test]
  fn test_deserialize_rejects_malformed() {
    let no_date = r#"{"id": 7, "durationMs": 1000, "distanceM": 5000}"#;
    let bad_date = r#"{"id": 7, "date": "yesterday", "durationMs": 1000, "distanceM": 5000}"#;
    let bad_coord =
      r#"{"id": 7, "date": "2024-01-01T07:30:00Z", "durationMs": 1000, "distanceM": 5, "coords": [{"latitude": 123.0, "longitude": 0.0}]}"#;
    assert!(serde_json::from_str::<Run>(no_date).is_err());
    assert!(serde_json::from_str::<Run>(bad_date).is_err());
    assert!(serde_json::from_str::<Run>(bad_coord).is_err());
  }

  #[test]
  fn test_serialize_uses_camel_case() {
    let run = Run::new(RunId(3), date(), 1_650_000, 5000.0, None, vec![]).unwrap();
    let value = serde_json::to_value(&run).unwrap();
    assert_eq!(value["durationMs"], 1_650_000);
    assert_eq!(value["distanceM"], 5000.0);
    assert!(value.get("duration_ms").is_none());
  }
}
