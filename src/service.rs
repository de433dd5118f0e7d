//! Tracker service: run history, insights and challenges on top of a store
//!
//! Writes for one user go through that user's lock, so two saves racing on
//! the same history cannot drop each other's run. Different users never
//! contend.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::analysis::{analyze_at, Insight};
use crate::challenge::{resolve_challenge, ChallengeOutcome};
use crate::error::{Result, SaveFailure};
use crate::ledger::BestTimeLedger;
use crate::models::{Run, UserId};
use crate::store::RunStore;

/// Per-user write locks
pub type UserLocks = DashMap<UserId, Arc<Mutex<()>>>;

/// A saved run and, when it was a challenge attempt, how it went
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinishedRun {
  pub run: Run,
  pub challenge: Option<ChallengeOutcome>,
}

pub struct RunTracker<S: RunStore> {
  store: S,
  locks: UserLocks,
}

impl<S: RunStore> RunTracker<S> {
  pub fn new(store: S) -> Self {
    Self { store, locks: DashMap::new() }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  fn user_lock(&self, user: &UserId) -> Arc<Mutex<()>> {
    self
      .locks
      .entry(user.clone())
      .or_insert_with(|| Arc::new(Mutex::new(())))
      .clone()
  }

  /// Run history, newest first
  pub async fn runs(&self, user: &UserId) -> Result<Vec<Run>> {
    self.store.read_run_list(user).await
  }

  /// Prepend `run` to the user's history. On failure the run comes back
  /// inside the error.
  pub async fn save_run(&self, user: &UserId, run: Run) -> std::result::Result<(), SaveFailure> {
    let lock = self.user_lock(user);
    let _guard = lock.lock().await;

    self.save_locked(user, run).await.map(|_| ())
  }

  /// Caller holds the user's lock
  async fn save_locked(&self, user: &UserId, run: Run) -> std::result::Result<Run, SaveFailure> {
    let mut runs = match self.store.read_run_list(user).await {
      Ok(runs) => runs,
      Err(source) => return Err(SaveFailure { run, source }),
    };

    runs.insert(0, run);
    if let Err(source) = self.store.write_run_list(user, &runs).await {
      return Err(SaveFailure { run: runs.swap_remove(0), source });
    }

    tracing::info!(user = %user, run_id = %runs[0].id, total = runs.len(), "Run saved");
    Ok(runs.swap_remove(0))
  }

  pub async fn clear_runs(&self, user: &UserId) -> Result<()> {
    let lock = self.user_lock(user);
    let _guard = lock.lock().await;

    self.store.write_run_list(user, &[]).await?;
    tracing::info!(user = %user, "Run history cleared");
    Ok(())
  }

  pub async fn insights(&self, user: &UserId) -> Result<Insight> {
    self.insights_at(user, Utc::now()).await
  }

  pub async fn insights_at(&self, user: &UserId, now: DateTime<Utc>) -> Result<Insight> {
    let runs = self.store.read_run_list(user).await?;
    Ok(analyze_at(&runs, now))
  }

  pub fn ledger<'a>(&'a self, user: &'a UserId) -> BestTimeLedger<'a, S> {
    BestTimeLedger::new(&self.store, user)
  }

  pub async fn reset_records(&self, user: &UserId) -> Result<()> {
    let lock = self.user_lock(user);
    let _guard = lock.lock().await;

    self.ledger(user).reset_all().await
  }

  /// Save a finished run, then check it against `target_km` if it was a
  /// challenge. The run is in the history before the ledger is consulted,
  /// so an out-of-tolerance attempt is still kept.
  pub async fn finish_run(
    &self,
    user: &UserId,
    run: Run,
    target_km: Option<u32>,
  ) -> Result<FinishedRun> {
    let lock = self.user_lock(user);
    let _guard = lock.lock().await;

    let run = self.save_locked(user, run).await.map_err(Box::new)?;

    let challenge = match target_km {
      Some(target_km) => Some(
        resolve_challenge(
          &self.ledger(user),
          target_km,
          run.distance_km(),
          run.duration_seconds(),
        )
        .await?,
      ),
      None => None,
    };

    Ok(FinishedRun { run, challenge })
  }
}
