//! Test utilities and helpers for integration and unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - Mock run factories
//! - Helper assertions

use crate::models::{Run, RunId, UserId};
use crate::store::{RunStore, SqliteStore};
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::SqlitePool;

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// Store `count` runs for `user`, one per day going back from `test_now()`.
/// Returns the stored list, newest first.
pub async fn seed_test_runs(store: &SqliteStore, user: &UserId, count: i64) -> Vec<Run> {
  let runs: Vec<Run> = (1..=count)
    .map(|days_ago| mock_run(days_ago, 5000.0 + days_ago as f64 * 100.0, 1_800_000))
    .collect();

  store
    .write_run_list(user, &runs)
    .await
    .expect("Failed to seed test runs");

  runs
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

/// Fixed reference instant so window-based metrics are reproducible
pub fn test_now() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// A manually logged run `days_ago` days before `test_now()`
pub fn mock_run(days_ago: i64, distance_m: f64, duration_ms: i64) -> Run {
  mock_run_at(test_now() - Duration::days(days_ago), distance_m, duration_ms)
}

pub fn mock_run_at(date: DateTime<Utc>, distance_m: f64, duration_ms: i64) -> Run {
  Run::new(RunId::next(), date, duration_ms, distance_m, None, vec![]).expect("valid mock run")
}

pub fn test_user() -> UserId {
  UserId::new("runner-1").unwrap()
}

/// ---------------------------------------------------------------------------
/// Test Macros
/// ---------------------------------------------------------------------------

/// Assert two floats are approximately equal within a tolerance
#[macro_export]
macro_rules! assert_approx_eq {
  ($left:expr, $right:expr, $tolerance:expr) => {
    let diff = ($left - $right).abs();
    assert!(
      diff < $tolerance,
      "Values not approximately equal: {} vs {} (diff: {}, tolerance: {})",
      $left,
      $right,
      diff,
      $tolerance
    );
  };
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> = sqlx::query_as(
      "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('kv_records', 'best_times')",
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query tables");

    assert_eq!(tables.len(), 2, "Expected 2 tables, got {}", tables.len());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_seed_runs_returns_correct_count() {
    let pool = setup_test_db().await;
    let store = SqliteStore::new(pool.clone());
    let user = test_user();

    let seeded = seed_test_runs(&store, &user, 4).await;
    assert_eq!(seeded.len(), 4);

    let stored = store.read_run_list(&user).await.unwrap();
    assert_eq!(stored, seeded);

    teardown_test_db(pool).await;
  }

  #[test]
  fn test_mock_run_dates() {
    let run = mock_run(7, 5000.0, 1_800_000);
    assert_eq!((test_now() - run.date).num_days(), 7);
    assert!(run.coords.is_empty());
  }
}
