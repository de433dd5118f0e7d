//! Best-time ledger: fastest completed time per challenge distance
//!
//! Entries only ever improve. A time replaces the stored one when it is
//! strictly lower; ties are not records. The whole ledger can be reset.

use std::collections::BTreeMap;

use crate::error::{Result, TrackerError};
use crate::models::UserId;
use crate::store::RunStore;

/// One user's view of the ledger over a store
pub struct BestTimeLedger<'a, S: RunStore + ?Sized> {
  store: &'a S,
  user: &'a UserId,
}

impl<'a, S: RunStore + ?Sized> BestTimeLedger<'a, S> {
  pub fn new(store: &'a S, user: &'a UserId) -> Self {
    Self { store, user }
  }

  /// All records by target km; entries that cannot be read back are skipped
  pub async fn get_all(&self) -> Result<BTreeMap<u32, f64>> {
    let stored = self.store.read_ledger(self.user).await?;

    let mut records = BTreeMap::new();
    for (key, seconds) in stored {
      match key.parse::<u32>() {
        Ok(km) if seconds.is_finite() && seconds > 0.0 => {
          records.insert(km, seconds);
        }
        _ => {
          tracing::warn!(user = %self.user, key = %key, seconds, "Ignoring unreadable best time");
        }
      }
    }
    Ok(records)
  }

  pub async fn get(&self, target_km: u32) -> Result<Option<f64>> {
    Ok(self.get_all().await?.get(&target_km).copied())
  }

  /// Record `seconds` for `target_km` if it beats the standing time.
  /// Returns true iff a new record was written.
  pub async fn try_set(&self, target_km: u32, seconds: f64) -> Result<bool> {
    if !seconds.is_finite() || seconds <= 0.0 {
      return Err(TrackerError::InvalidInput(format!(
        "best time must be a positive number of seconds, got {}",
        seconds
      )));
    }

    let written = self
      .store
      .try_set_best_time(self.user, &target_km.to_string(), seconds)
      .await?;

    if written {
      tracing::info!(user = %self.user, target_km, seconds, "New best time");
    }
    Ok(written)
  }

  pub async fn reset_all(&self) -> Result<()> {
    self.store.write_ledger(self.user, &BTreeMap::new()).await?;
    tracing::info!(user = %self.user, "Best times reset");
    Ok(())
  }
}
