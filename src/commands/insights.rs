use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analysis::{format_gap, format_pace, Insight, WeeklyChecklist};
use crate::error::Result;
use crate::models::UserId;
use crate::service::RunTracker;
use crate::store::RunStore;

use super::runs::render_run_line;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsightReport<'a> {
  #[serde(flatten)]
  insight: &'a Insight,
  level_progress: f64,
  weekly_checklist: WeeklyChecklist,
}

pub async fn show_insights<S: RunStore>(
  tracker: &RunTracker<S>,
  user: &UserId,
  json: bool,
) -> Result<String> {
  let now = Utc::now();
  let insight = tracker.insights_at(user, now).await?;

  if json {
    let report = InsightReport {
      insight: &insight,
      level_progress: insight.summary.level_progress(),
      weekly_checklist: insight.weekly_checklist(now),
    };
    return Ok(serde_json::to_string_pretty(&report)?);
  }

  Ok(render_insights(&insight, now))
}

fn check(done: bool) -> &'static str {
  if done {
    "[x]"
  } else {
    "[ ]"
  }
}

pub fn render_insights(insight: &Insight, now: DateTime<Utc>) -> String {
  let summary = &insight.summary;
  let week = insight.weekly_checklist(now);

  let mut lines = vec![
    format!("Last {} runs: {:.2} km", insight.last5.len(), summary.total_km5),
    format!("Average pace: {} /km", format_pace(summary.avg_pace5)),
    format!("Best pace: {} /km", format_pace(summary.best_pace)),
    format!("Average gap: {} days", format_gap(summary.avg_gap)),
    format!(
      "Level: {} ({:.0}% through band)",
      summary.level,
      summary.level_progress() * 100.0
    ),
    format!("Intensity: {}", summary.avg_intensity_label.as_str()),
    format!(
      "Load: acute {:.1}, chronic {:.1}, ACWR {:.2}",
      summary.acute_load, summary.chronic_load, summary.acwr
    ),
    format!(
      "Overtraining risk: {}",
      if summary.overtraining_risk { "yes" } else { "no" }
    ),
    String::new(),
    format!("This week: {} sessions, {:.2} km", week.sessions, week.km),
    format!("  {} 3 sessions", check(week.sessions >= 3)),
    format!("  {} quality session", check(week.has_quality)),
    format!("  {} long run (8 km+)", check(week.has_long)),
  ];

  if !insight.recommendations.is_empty() {
    lines.push(String::new());
    lines.push("Recommendations:".to_string());
    lines.extend(insight.recommendations.iter().map(|r| format!("- {}", r)));
  }

  if !insight.last5.is_empty() {
    lines.push(String::new());
    lines.push("Recent runs:".to_string());
    lines.extend(insight.last5.iter().map(|r| format!("  {}", render_run_line(r))));
  }

  lines.join("\n")
}
