//! Deterministic analysis layer for run history
//!
//! Turns a raw list of runs into the recent-history view, aggregate pace
//! statistics, a skill level, the acute:chronic workload ratio and a list of
//! recommendations. Nothing here touches storage; missing data shows up as
//! `None` or a default level, never as an error.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::run::pace_label;
use crate::models::Run;

/// Number of most recent runs the summary is computed over
pub const RECENT_WINDOW: usize = 5;

const ACUTE_WINDOW_DAYS: i64 = 7;
const CHRONIC_WINDOW_DAYS: i64 = 28;
/// The 28-day sum is always divided by 4, however many of those weeks hold runs
const CHRONIC_WEEKS: f64 = 4.0;

const ACWR_SPIKE: f64 = 1.5;
const TIGHT_SPACING_DAYS: f64 = 1.5;
const LONG_GAP_DAYS: f64 = 3.0;
const HIGH_INTENSITY_FACTOR: f64 = 1.6;
const HIGH_INTENSITY_SHARE: f64 = 0.5;

const MS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

/// ---------------------------------------------------------------------------
/// Skill Level
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkillLevel {
  Beginner,
  Intermediate,
  Advanced,
  #[serde(rename = "No data")]
  NoData,
}

impl SkillLevel {
  pub fn from_pace(pace_min_per_km: Option<f64>) -> Self {
    match pace_min_per_km {
      None => SkillLevel::NoData,
      Some(p) if p < 5.0 => SkillLevel::Advanced,
      Some(p) if p <= 7.0 => SkillLevel::Intermediate,
      Some(_) => SkillLevel::Beginner,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      SkillLevel::Beginner => "Beginner",
      SkillLevel::Intermediate => "Intermediate",
      SkillLevel::Advanced => "Advanced",
      SkillLevel::NoData => "No data",
    }
  }

  /// (target, ceiling) paces in min/km used to place a runner within a level
  pub fn pace_band(&self) -> (f64, f64) {
    match self {
      SkillLevel::Advanced => (4.5, 5.0),
      SkillLevel::Intermediate => (5.0, 7.0),
      SkillLevel::Beginner | SkillLevel::NoData => (7.0, 9.0),
    }
  }
}

impl std::fmt::Display for SkillLevel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// ---------------------------------------------------------------------------
/// Intensity
/// ---------------------------------------------------------------------------

/// Display label for how hard a pace is (faster = harder)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityLabel {
  High,
  Medium,
  Low,
  VeryLow,
}

impl IntensityLabel {
  pub fn from_pace(pace_min_per_km: Option<f64>) -> Self {
    match pace_min_per_km {
      None => IntensityLabel::VeryLow,
      Some(p) if p < 5.15 => IntensityLabel::High,
      Some(p) if p < 6.3 => IntensityLabel::Medium,
      Some(_) => IntensityLabel::Low,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      IntensityLabel::High => "high",
      IntensityLabel::Medium => "medium",
      IntensityLabel::Low => "low",
      IntensityLabel::VeryLow => "very low",
    }
  }
}

/// Load multiplier for a run's pace. Runs without a pace count at baseline.
pub fn intensity_factor(pace_min_per_km: Option<f64>) -> f64 {
  match pace_min_per_km {
    Some(p) if p < 5.0 => 2.0,
    Some(p) if p < 5.75 => 1.6,
    Some(p) if p < 6.5 => 1.3,
    _ => 1.0,
  }
}

fn training_load(run: &Run) -> f64 {
  run.distance_km() * intensity_factor(run.pace_min_per_km())
}

/// ---------------------------------------------------------------------------
/// Recommendations
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
  /// Overtraining risk: take recovery days
  RecoveryDays,
  /// Load spike without the risk pattern: ramp volume slowly
  GradualVolume,
  /// Sessions too far apart
  IncreaseFrequency,
  /// Everything easy: add a quality session
  AddQualitySession,
}

impl Recommendation {
  pub fn message(&self) -> &'static str {
    match self {
      Recommendation::RecoveryDays => {
        "High overtraining risk: your load went up fast and you ran hard sessions back to back. Consider 1–2 days of active recovery."
      }
      Recommendation::GradualVolume => {
        "This week's load is above your monthly average. Increase volume gradually (≤10% per week)."
      }
      Recommendation::IncreaseFrequency => {
        "There are long gaps between sessions and you may lose consistency. Aim for 3–4 sessions per week."
      }
      Recommendation::AddQualitySession => {
        "Almost everything was easy. Add 1 quality session (intervals or tempo) to improve your pace."
      }
    }
  }
}

impl std::fmt::Display for Recommendation {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.message())
  }
}

impl Serialize for Recommendation {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(self.message())
  }
}

/// ---------------------------------------------------------------------------
/// Insight
/// ---------------------------------------------------------------------------

/// Aggregates over the recent window plus the training-load picture.
///
/// Optional fields are `None` when there is not enough data: `avg_pace5` and
/// `best_pace` when no recent run has a distance, `avg_gap` with fewer than
/// two recent runs. Render them as a placeholder, not as a failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightSummary {
  /// Distance of the recent runs in km
  pub total_km5: f64,

  /// Mean pace in min/km over recent runs that have one
  pub avg_pace5: Option<f64>,

  /// Fastest recent pace in min/km
  pub best_pace: Option<f64>,

  /// Mean days between consecutive recent runs
  pub avg_gap: Option<f64>,

  /// Level from the mean pace; Beginner when there is no pace at all
  pub level: SkillLevel,

  pub avg_intensity_label: IntensityLabel,

  /// 7-day sum of km × intensity factor
  pub acute_load: f64,

  /// 28-day sum of km × intensity factor, divided by 4
  pub chronic_load: f64,

  /// acute / chronic, 1.0 when there is no chronic load
  pub acwr: f64,

  pub overtraining_risk: bool,

  /// Share of recent runs with intensity factor >= 1.6
  pub high_intensity_share: f64,
}

impl InsightSummary {
  /// How far the mean pace has moved through the current level's band, 0..=1
  pub fn level_progress(&self) -> f64 {
    let pace = match self.avg_pace5 {
      Some(p) => p,
      None => return 0.0,
    };
    let (target, ceiling) = self.level.pace_band();
    let clamped = pace.max(target).min(ceiling);
    let range = ceiling - target;
    1.0 - (clamped - target) / if range != 0.0 { range } else { 1.0 }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
  /// Most recent analyzable runs, newest first
  pub last5: Vec<Run>,
  pub summary: InsightSummary,
  pub recommendations: Vec<Recommendation>,
}

/// Checklist for the current week, built from the recent window
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyChecklist {
  pub sessions: usize,
  pub km: f64,
  /// At least one run faster than 6:00 /km
  pub has_quality: bool,
  /// At least one run of 8 km or more
  pub has_long: bool,
}

impl Insight {
  pub fn weekly_checklist(&self, now: DateTime<Utc>) -> WeeklyChecklist {
    let cutoff = Duration::days(ACUTE_WINDOW_DAYS);
    let this_week: Vec<&Run> = self.last5.iter().filter(|r| now - r.date <= cutoff).collect();

    WeeklyChecklist {
      sessions: this_week.len(),
      km: this_week.iter().fold(0.0, |acc, r| acc + r.distance_km()),
      has_quality: this_week
        .iter()
        .any(|r| r.pace_min_per_km().map_or(false, |p| p < 6.0)),
      has_long: this_week.iter().any(|r| r.distance_km() >= 8.0),
    }
  }
}

/// Analyze runs as of the current wall clock
pub fn analyze(runs: &[Run]) -> Insight {
  analyze_at(runs, Utc::now())
}

/// Analyze runs as of `now`. Pure: the same input always gives the same output.
pub fn analyze_at(runs: &[Run], now: DateTime<Utc>) -> Insight {
  let mut history: Vec<&Run> = runs.iter().filter(|r| r.is_analyzable()).collect();
  history.sort_by(|a, b| b.date.cmp(&a.date));

  let last5: Vec<&Run> = history.iter().take(RECENT_WINDOW).copied().collect();
  let paces: Vec<Option<f64>> = last5.iter().map(|r| r.pace_min_per_km()).collect();

  // fold from +0.0: an empty f64 sum is -0.0
  let total_km5 = last5
    .iter()
    .map(|r| r.distance_km())
    .filter(|km| km.is_finite())
    .fold(0.0, |acc, km| acc + km);

  let finite_paces: Vec<f64> = paces.iter().flatten().copied().collect();
  let avg_pace5 = if finite_paces.is_empty() {
    None
  } else {
    Some(finite_paces.iter().sum::<f64>() / finite_paces.len() as f64)
  };
  let best_pace = finite_paces.iter().copied().reduce(f64::min);
  let avg_intensity_label = IntensityLabel::from_pace(avg_pace5);

  let gaps: Vec<f64> = last5
    .windows(2)
    .map(|pair| days_between(pair[0].date, pair[1].date))
    .collect();
  let avg_gap = if gaps.is_empty() {
    None
  } else {
    Some(gaps.iter().sum::<f64>() / gaps.len() as f64)
  };

  let level = if avg_pace5.is_some() {
    SkillLevel::from_pace(avg_pace5)
  } else {
    SkillLevel::Beginner
  };

  // ACWR over the whole history, not just the recent window
  let acute_cutoff = now - Duration::days(ACUTE_WINDOW_DAYS);
  let chronic_cutoff = now - Duration::days(CHRONIC_WINDOW_DAYS);

  let acute_load = history
    .iter()
    .filter(|r| r.date >= acute_cutoff)
    .fold(0.0, |acc, r| acc + training_load(r));
  let chronic_load = history
    .iter()
    .filter(|r| r.date >= chronic_cutoff)
    .fold(0.0, |acc, r| acc + training_load(r))
    / CHRONIC_WEEKS;
  let acwr = if chronic_load > 0.0 {
    acute_load / chronic_load
  } else {
    1.0
  };

  let high_intensity_runs = paces
    .iter()
    .filter(|p| intensity_factor(**p) >= HIGH_INTENSITY_FACTOR)
    .count();
  let high_intensity_share = high_intensity_runs as f64 / last5.len().max(1) as f64;

  let tight_spacing = avg_gap.map_or(false, |g| g < TIGHT_SPACING_DAYS);
  let load_spike = acwr > ACWR_SPIKE;
  let overtraining_risk = tight_spacing && (load_spike || high_intensity_share >= HIGH_INTENSITY_SHARE);

  let mut recommendations = Vec::new();
  if overtraining_risk {
    recommendations.push(Recommendation::RecoveryDays);
  } else if load_spike {
    recommendations.push(Recommendation::GradualVolume);
  }
  if avg_gap.map_or(false, |g| g > LONG_GAP_DAYS) {
    recommendations.push(Recommendation::IncreaseFrequency);
  }
  if avg_intensity_label == IntensityLabel::Low && total_km5 > 0.0 {
    recommendations.push(Recommendation::AddQualitySession);
  }

  tracing::debug!(
    analyzable = history.len(),
    recent = last5.len(),
    acwr,
    overtraining_risk,
    "Analyzed run history"
  );

  Insight {
    last5: last5.into_iter().cloned().collect(),
    summary: InsightSummary {
      total_km5,
      avg_pace5,
      best_pace,
      avg_gap,
      level,
      avg_intensity_label,
      acute_load,
      chronic_load,
      acwr,
      overtraining_risk,
      high_intensity_share,
    },
    recommendations,
  }
}

fn days_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
  (a - b).num_milliseconds().abs() as f64 / MS_PER_DAY
}

/// ---------------------------------------------------------------------------
/// Formatting
/// ---------------------------------------------------------------------------

const NO_DATA: &str = "—";

/// "M:SS" for a pace, or a dash when there is none
pub fn format_pace(pace_min_per_km: Option<f64>) -> String {
  match pace_min_per_km {
    Some(p) if p.is_finite() => pace_label(p),
    _ => NO_DATA.to_string(),
  }
}

/// Days between sessions with one decimal, or a dash
pub fn format_gap(avg_gap: Option<f64>) -> String {
  match avg_gap {
    Some(g) => format!("{:.1}", g),
    None => NO_DATA.to_string(),
  }
}

/// "HH:MM:SS" for an elapsed time
pub fn format_hms(duration_ms: i64) -> String {
  let total_secs = duration_ms.max(0) / 1000;
  let h = total_secs / 3600;
  let m = (total_secs % 3600) / 60;
  let s = total_secs % 60;
  format!("{:02}:{:02}:{:02}", h, m, s)
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
