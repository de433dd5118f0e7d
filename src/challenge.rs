//! Distance challenges: run a target distance and try to beat the stored time

use serde::Serialize;

use crate::error::Result;
use crate::ledger::BestTimeLedger;
use crate::store::RunStore;

/// How far off the target distance a run may land and still count
pub const CHALLENGE_TOLERANCE_KM: f64 = 0.3;

/// Distances offered as challenges
pub const CHALLENGE_DISTANCES_KM: [u32; 3] = [5, 10, 21];

/// Result of checking a finished run against a challenge target
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChallengeOutcome {
  /// Distance outside the tolerance; the ledger was not touched
  Invalid { target_km: u32, actual_km: f64 },
  FirstAttempt { target_km: u32, seconds: f64 },
  NewRecord { target_km: u32, previous: f64, seconds: f64 },
  FellShort { target_km: u32, seconds: f64, record: f64 },
}

impl ChallengeOutcome {
  pub fn target_km(&self) -> u32 {
    match self {
      Self::Invalid { target_km, .. }
      | Self::FirstAttempt { target_km, .. }
      | Self::NewRecord { target_km, .. }
      | Self::FellShort { target_km, .. } => *target_km,
    }
  }

  pub fn is_record(&self) -> bool {
    matches!(self, Self::FirstAttempt { .. } | Self::NewRecord { .. })
  }

  pub fn message(&self) -> String {
    match self {
      Self::Invalid { target_km, actual_km } => format!(
        "Invalid challenge: you ran {:.2} km, the challenge was {} km ±{} km",
        actual_km, target_km, CHALLENGE_TOLERANCE_KM
      ),
      Self::FirstAttempt { target_km, seconds } => {
        format!("First attempt saved for {} km: {:.1} s", target_km, seconds)
      }
      Self::NewRecord { target_km, previous, seconds } => format!(
        "New record for {} km: {:.1} s (previous: {:.1} s)",
        target_km, seconds, previous
      ),
      Self::FellShort { target_km, seconds, record } => format!(
        "Your time was {:.1} s. Your current record for {} km is {:.1} s",
        seconds, target_km, record
      ),
    }
  }
}

impl std::fmt::Display for ChallengeOutcome {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.message())
  }
}

pub fn within_tolerance(target_km: u32, actual_km: f64) -> bool {
  (actual_km - target_km as f64).abs() <= CHALLENGE_TOLERANCE_KM
}

/// Check a finished run against `target_km` and update the ledger when the
/// distance counts. The run itself is expected to be saved already.
pub async fn resolve_challenge<S: RunStore + ?Sized>(
  ledger: &BestTimeLedger<'_, S>,
  target_km: u32,
  actual_km: f64,
  seconds: f64,
) -> Result<ChallengeOutcome> {
  if !within_tolerance(target_km, actual_km) {
    tracing::info!(target_km, actual_km, "Challenge distance out of tolerance");
    return Ok(ChallengeOutcome::Invalid { target_km, actual_km });
  }

  let prior = ledger.get(target_km).await?;
  let written = ledger.try_set(target_km, seconds).await?;

  let outcome = match (prior, written) {
    (None, _) => ChallengeOutcome::FirstAttempt { target_km, seconds },
    (Some(previous), true) => ChallengeOutcome::NewRecord { target_km, previous, seconds },
    (Some(record), false) => ChallengeOutcome::FellShort { target_km, seconds, record },
  };

  tracing::debug!(?outcome, "Challenge resolved");
  Ok(outcome)
}
