use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{parse_run_list, runs_key, RunStore, RUNS_BASE};
use crate::error::Result;
use crate::models::{Run, UserId};

/// In-process store. Run lists are kept as serialized JSON, the same way
/// they sit on disk, so validation and legacy migration behave identically.
#[derive(Debug, Default)]
pub struct MemoryStore {
  records: RwLock<HashMap<String, String>>,
  best_times: RwLock<HashMap<UserId, BTreeMap<String, f64>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Put a raw JSON value under `key`, e.g. legacy data from an older client
  pub async fn insert_raw(&self, key: &str, value: &str) {
    self.records.write().await.insert(key.to_string(), value.to_string());
  }

  pub async fn raw(&self, key: &str) -> Option<String> {
    self.records.read().await.get(key).cloned()
  }

  async fn migrate_legacy(&self, user: &UserId) {
    let key = runs_key(user);
    let mut records = self.records.write().await;
    if records.contains_key(&key) {
      return;
    }
    if let Some(legacy) = records.get(RUNS_BASE).filter(|v| !v.is_empty()).cloned() {
      tracing::info!(user = %user, "Copied legacy run list into user namespace");
      records.insert(key, legacy);
    }
  }
}

#[async_trait]
impl RunStore for MemoryStore {
  async fn read_run_list(&self, user: &UserId) -> Result<Vec<Run>> {
    self.migrate_legacy(user).await;
    match self.records.read().await.get(&runs_key(user)) {
      Some(raw) => parse_run_list(user, raw),
      None => Ok(Vec::new()),
    }
  }

  async fn write_run_list(&self, user: &UserId, runs: &[Run]) -> Result<()> {
    let raw = serde_json::to_string(runs)?;
    self.records.write().await.insert(runs_key(user), raw);
    Ok(())
  }

  async fn read_ledger(&self, user: &UserId) -> Result<BTreeMap<String, f64>> {
    Ok(self.best_times.read().await.get(user).cloned().unwrap_or_default())
  }

  async fn write_ledger(&self, user: &UserId, ledger: &BTreeMap<String, f64>) -> Result<()> {
    self.best_times.write().await.insert(user.clone(), ledger.clone());
    Ok(())
  }
}
