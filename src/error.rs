use serde::Serialize;

use crate::models::Run;

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("Migration error: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),

  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Invalid run: {0}")]
  InvalidRun(String),

  #[error("Invalid user id: {0}")]
  InvalidUser(String),

  #[error("Invalid input: {0}")]
  InvalidInput(String),

  #[error("Recorder error: {0}")]
  Recorder(String),

  #[error(transparent)]
  Save(#[from] Box<SaveFailure>),
}

impl Serialize for TrackerError {
  fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

pub type Result<T> = std::result::Result<T, TrackerError>;

/// A save that failed after the run was built. The run is handed back so the
/// caller can retry or tell the user without losing the session.
#[derive(Debug, thiserror::Error)]
#[error("Failed to save run {}: {source}", .run.id)]
pub struct SaveFailure {
  pub run: Run,
  #[source]
  pub source: TrackerError,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_error_serializes_as_message() {
    let err = TrackerError::InvalidInput("seconds must be positive".to_string());
    let json = serde_json::to_string(&err).unwrap();
    assert_eq!(json, "\"Invalid input: seconds must be positive\"");
  }

  #[test]
  fn test_save_failure_keeps_run() {
    let run = crate::test_utils::mock_run(1, 5000.0, 1_800_000);
    let id = run.id;
    let failure = SaveFailure { run, source: TrackerError::Recorder("disk full".to_string()) };

    let err: TrackerError = Box::new(failure).into();

    assert_eq!(err.to_string(), format!("Failed to save run {}: Recorder error: disk full", id));
    match err {
      TrackerError::Save(failure) => assert_eq!(failure.run.id, id),
      other => panic!("unexpected error: {}", other),
    }
  }
}
