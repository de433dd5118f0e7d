//! Per-user persistence for run history and best times
//!
//! Run lists are kept as one JSON document per user under a namespaced key.
//! Records are validated on the way out: anything that does not parse into a
//! [`Run`] is logged and dropped, so the analysis only ever sees well-formed
//! runs.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::{Run, UserId};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Key that held every run before user accounts existed
pub const RUNS_BASE: &str = "runs_v1";

/// Namespaced key for a user's run list
pub fn runs_key(user: &UserId) -> String {
  format!("{}:{}", RUNS_BASE, user)
}

/// Storage contract consumed by the tracker.
///
/// Implementations are not expected to be transactional across calls; the
/// tracker serializes writes per user.
#[async_trait]
pub trait RunStore: Send + Sync {
  /// Most-recent-first run list, empty if the user has none. Legacy
  /// un-namespaced data is copied over on first read.
  async fn read_run_list(&self, user: &UserId) -> Result<Vec<Run>>;

  /// Replace the user's run list
  async fn write_run_list(&self, user: &UserId, runs: &[Run]) -> Result<()>;

  async fn read_ledger(&self, user: &UserId) -> Result<BTreeMap<String, f64>>;

  /// Replace the user's whole ledger
  async fn write_ledger(&self, user: &UserId, ledger: &BTreeMap<String, f64>) -> Result<()>;

  /// Store `seconds` under `key` iff there is no entry yet or it is strictly
  /// lower than the current one. Returns whether a write happened.
  async fn try_set_best_time(&self, user: &UserId, key: &str, seconds: f64) -> Result<bool> {
    let mut ledger = self.read_ledger(user).await?;
    if let Some(prev) = ledger.get(key) {
      if seconds >= *prev {
        return Ok(false);
      }
    }
    ledger.insert(key.to_string(), seconds);
    self.write_ledger(user, &ledger).await?;
    Ok(true)
  }
}

/// Parse a stored run list, quarantining records that fail validation
pub(crate) fn parse_run_list(user: &UserId, raw: &str) -> Result<Vec<Run>> {
  let records: Vec<serde_json::Value> = serde_json::from_str(raw)?;
  let total = records.len();

  let runs: Vec<Run> = records
    .into_iter()
    .enumerate()
    .filter_map(|(index, record)| match serde_json::from_value::<Run>(record) {
      Ok(run) => Some(run),
      Err(e) => {
        tracing::warn!(user = %user, index, error = %e, "Skipping malformed stored run");
        None
      }
    })
    .collect();

  if runs.len() < total {
    tracing::warn!(user = %user, kept = runs.len(), total, "Quarantined malformed runs");
  }

  Ok(runs)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::test_user;

  #[test]
  fn test_runs_key_is_namespaced() {
    assert_eq!(runs_key(&test_user()), "runs_v1:runner-1");
  }

  #[test]
  fn test_parse_run_list_quarantines_bad_records() {
    let raw = r#"[
      {"id": 2, "date": "2024-01-02T07:00:00Z", "durationMs": 1800000, "distanceM": 5000},
      {"id": 3, "durationMs": 1800000, "distanceM": 5000},
      {"id": 4, "date": "2024-01-01T07:00:00Z", "durationMs": 1800000, "distanceM": -20},
      "not a run",
      {"id": 1, "date": "2024-01-01T07:00:00Z", "durationMs": 0, "distanceM": 5000}
    ]"#;

    let runs = parse_run_list(&test_user(), raw).unwrap();

    let ids: Vec<i64> = runs.iter().map(|r| r.id.0).collect();
    // zero-duration run is well-formed, it stays
    assert_eq!(ids, vec![2, 1]);
  }

  #[test]
  fn test_parse_run_list_rejects_non_list() {
    assert!(parse_run_list(&test_user(), "{\"id\": 1}").is_err());
  }
}
