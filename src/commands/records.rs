use std::collections::BTreeMap;

use crate::analysis::format_hms;
use crate::challenge::CHALLENGE_DISTANCES_KM;
use crate::error::Result;
use crate::models::UserId;
use crate::service::RunTracker;
use crate::store::RunStore;

pub async fn show_records<S: RunStore>(
  tracker: &RunTracker<S>,
  user: &UserId,
  json: bool,
) -> Result<String> {
  let records = tracker.ledger(user).get_all().await?;

  if json {
    return Ok(serde_json::to_string_pretty(&records)?);
  }
  Ok(render_records(&records))
}

pub async fn reset_records<S: RunStore>(tracker: &RunTracker<S>, user: &UserId) -> Result<String> {
  tracker.reset_records(user).await?;
  Ok("Best times reset".to_string())
}

/// One line per challenge distance, then any other distance with a record
pub fn render_records(records: &BTreeMap<u32, f64>) -> String {
  let extra = records.keys().filter(|km| !CHALLENGE_DISTANCES_KM.contains(*km));

  CHALLENGE_DISTANCES_KM
    .iter()
    .chain(extra)
    .map(|km| match records.get(km) {
      Some(seconds) => format!(
        "{:>3} km  {}  ({:.1} s)",
        km,
        format_hms((seconds * 1000.0).round() as i64),
        seconds
      ),
      None => format!("{:>3} km  —", km),
    })
    .collect::<Vec<_>>()
    .join("\n")
}
