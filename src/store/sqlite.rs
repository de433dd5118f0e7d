use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::BTreeMap;

use super::{parse_run_list, runs_key, RunStore, RUNS_BASE};
use crate::error::Result;
use crate::models::{Run, UserId};

/// SQLite-backed store: run lists in `kv_records`, best times in `best_times`
#[derive(Debug, Clone)]
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  pub fn pool(&self) -> &SqlitePool {
    &self.pool
  }

  /// Copy the legacy run list into the user's key if the user has none yet.
  /// The legacy row is left in place.
  async fn migrate_legacy(&self, user: &UserId) -> Result<()> {
    let result = sqlx::query(
      r#"
      INSERT OR IGNORE INTO kv_records (key, value, updated_at)
      SELECT ?1, value, ?2 FROM kv_records
      WHERE key = ?3 AND value != ''
      "#,
    )
    .bind(runs_key(user))
    .bind(Utc::now().to_rfc3339())
    .bind(RUNS_BASE)
    .execute(&self.pool)
    .await?;

    if result.rows_affected() > 0 {
      tracing::info!(user = %user, "Copied legacy run list into user namespace");
    }
    Ok(())
  }
}

#[async_trait]
impl RunStore for SqliteStore {
  async fn read_run_list(&self, user: &UserId) -> Result<Vec<Run>> {
    self.migrate_legacy(user).await?;

    let raw: Option<String> = sqlx::query_scalar("SELECT value FROM kv_records WHERE key = ?1")
      .bind(runs_key(user))
      .fetch_optional(&self.pool)
      .await?;

    match raw {
      Some(raw) => parse_run_list(user, &raw),
      None => Ok(Vec::new()),
    }
  }

  async fn write_run_list(&self, user: &UserId, runs: &[Run]) -> Result<()> {
    let raw = serde_json::to_string(runs)?;

    sqlx::query(
      r#"
      INSERT INTO kv_records (key, value, updated_at)
      VALUES (?1, ?2, ?3)
      ON CONFLICT(key) DO UPDATE SET
        value = excluded.value,
        updated_at = excluded.updated_at
      "#,
    )
    .bind(runs_key(user))
    .bind(&raw)
    .bind(Utc::now().to_rfc3339())
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn read_ledger(&self, user: &UserId) -> Result<BTreeMap<String, f64>> {
    let rows: Vec<(String, f64)> =
      sqlx::query_as("SELECT distance_key, seconds FROM best_times WHERE user_id = ?1")
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;

    Ok(rows.into_iter().collect())
  }

  async fn write_ledger(&self, user: &UserId, ledger: &BTreeMap<String, f64>) -> Result<()> {
    let mut tx = self.pool.begin().await?;
    let updated_at = Utc::now().to_rfc3339();

    sqlx::query("DELETE FROM best_times WHERE user_id = ?1")
      .bind(user.as_str())
      .execute(&mut *tx)
      .await?;

    for (key, seconds) in ledger {
      sqlx::query(
        "INSERT INTO best_times (user_id, distance_key, seconds, updated_at) VALUES (?1, ?2, ?3, ?4)",
      )
      .bind(user.as_str())
      .bind(key)
      .bind(*seconds)
      .bind(&updated_at)
      .execute(&mut *tx)
      .await?;
    }

    tx.commit().await?;
    Ok(())
  }

  /// Single conditional upsert, so two writers cannot both "win"
  async fn try_set_best_time(&self, user: &UserId, key: &str, seconds: f64) -> Result<bool> {
    let result = sqlx::query(
      r#"
      INSERT INTO best_times (user_id, distance_key, seconds, updated_at)
      VALUES (?1, ?2, ?3, ?4)
      ON CONFLICT(user_id, distance_key) DO UPDATE SET
        seconds = excluded.seconds,
        updated_at = excluded.updated_at
      WHERE excluded.seconds < best_times.seconds
      "#,
    )
    .bind(user.as_str())
    .bind(key)
    .bind(seconds)
    .bind(Utc::now().to_rfc3339())
    .execute(&self.pool)
    .await?;

    Ok(result.rows_affected() > 0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::{mock_run, seed_test_runs, setup_test_db, teardown_test_db, test_user};

  #[tokio::test]
  async fn test_read_empty_run_list() {
    let pool = setup_test_db().await;
    let store = SqliteStore::new(pool.clone());

    assert!(store.read_run_list(&test_user()).await.unwrap().is_empty());

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_write_replaces_run_list() {
    let pool = setup_test_db().await;
    let store = SqliteStore::new(pool.clone());
    let user = test_user();

    seed_test_runs(&store, &user, 3).await;
    let replacement = vec![mock_run(1, 10_000.0, 3_000_000)];
    store.write_run_list(&user, &replacement).await.unwrap();

    assert_eq!(store.read_run_list(&user).await.unwrap(), replacement);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_legacy_rows_migrate_once_and_stay() {
    let pool = setup_test_db().await;
    let store = SqliteStore::new(pool.clone());
    let legacy = serde_json::to_string(&[mock_run(2, 5000.0, 1_800_000)]).unwrap();

    sqlx::query("INSERT INTO kv_records (key, value) VALUES (?1, ?2)")
      .bind(RUNS_BASE)
      .bind(&legacy)
      .execute(&pool)
      .await
      .unwrap();

    let user = test_user();
    assert_eq!(store.read_run_list(&user).await.unwrap().len(), 1);

    // clearing the user's list must not bring the legacy runs back
    store.write_run_list(&user, &[]).await.unwrap();
    assert!(store.read_run_list(&user).await.unwrap().is_empty());

    let still_there: Option<String> =
      sqlx::query_scalar("SELECT value FROM kv_records WHERE key = ?1")
        .bind(RUNS_BASE)
        .fetch_optional(&pool)
        .await
        .unwrap();
    assert_eq!(still_there, Some(legacy));

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_malformed_rows_are_quarantined() {
    let pool = setup_test_db().await;
    let store = SqliteStore::new(pool.clone());
    let user = test_user();

    sqlx::query("INSERT INTO kv_records (key, value) VALUES (?1, ?2)")
      .bind(runs_key(&user))
      .bind(r#"[{"id": 1, "date": "2024-01-01T07:00:00Z", "durationMs": 1800000, "distanceM": 5000}, {"id": 2}]"#)
      .execute(&pool)
      .await
      .unwrap();

    let runs = store.read_run_list(&user).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id.0, 1);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_conditional_best_time_upsert() {
    let pool = setup_test_db().await;
    let store = SqliteStore::new(pool.clone());
    let user = test_user();

    assert!(store.try_set_best_time(&user, "5", 1400.0).await.unwrap());
    assert!(!store.try_set_best_time(&user, "5", 1500.0).await.unwrap());
    assert!(!store.try_set_best_time(&user, "5", 1400.0).await.unwrap());
    assert!(store.try_set_best_time(&user, "5", 1300.0).await.unwrap());

    let ledger = store.read_ledger(&user).await.unwrap();
    assert_eq!(ledger.get("5"), Some(&1300.0));

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_write_ledger_replaces_entries() {
    let pool = setup_test_db().await;
    let store = SqliteStore::new(pool.clone());
    let user = test_user();
    let other = UserId::new("someone-else").unwrap();

    store.try_set_best_time(&user, "5", 1400.0).await.unwrap();
    store.try_set_best_time(&other, "5", 1600.0).await.unwrap();

    let mut ledger = BTreeMap::new();
    ledger.insert("10".to_string(), 3100.0);
    store.write_ledger(&user, &ledger).await.unwrap();

    assert_eq!(store.read_ledger(&user).await.unwrap(), ledger);
    assert_eq!(store.read_ledger(&other).await.unwrap().get("5"), Some(&1600.0));

    store.write_ledger(&user, &BTreeMap::new()).await.unwrap();
    assert!(store.read_ledger(&user).await.unwrap().is_empty());

    teardown_test_db(pool).await;
  }
}
