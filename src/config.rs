use std::env;

use crate::models::UserId;

pub const DATABASE_URL_VAR: &str = "RUN_TRACKER_DATABASE_URL";
pub const USER_VAR: &str = "RUN_TRACKER_USER";
pub const LOG_VAR: &str = "RUN_TRACKER_LOG";

const DEFAULT_DATABASE_URL: &str = "sqlite://run-tracker.db?mode=rwc";
const DEFAULT_LOG_FILTER: &str = "info";

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Invalid value for {var}: {reason}")]
  Invalid { var: &'static str, reason: String },
}

/// ---------------------------------------------------------------------------
/// Configuration
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
  pub database_url: String,
  pub user: UserId,
  /// Fallback `tracing` filter when `RUST_LOG` is unset
  pub log_filter: String,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      database_url: DEFAULT_DATABASE_URL.to_string(),
      user: UserId::anonymous(),
      log_filter: DEFAULT_LOG_FILTER.to_string(),
    }
  }
}

impl Config {
  /// Load `.env` if present, then read the process environment
  pub fn from_env() -> Result<Self, ConfigError> {
    dotenvy::dotenv().ok();
    Self::from_process_env()
  }

  pub fn from_process_env() -> Result<Self, ConfigError> {
    let defaults = Self::default();

    let user = match non_empty_var(USER_VAR) {
      Some(raw) => UserId::new(raw).map_err(|e| ConfigError::Invalid {
        var: USER_VAR,
        reason: e.to_string(),
      })?,
      None => defaults.user,
    };

    Ok(Self {
      database_url: non_empty_var(DATABASE_URL_VAR).unwrap_or(defaults.database_url),
      user,
      log_filter: non_empty_var(LOG_VAR).unwrap_or(defaults.log_filter),
    })
  }
}

fn non_empty_var(name: &str) -> Option<String> {
  env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn test_defaults_when_unset() {
    temp_env::with_vars_unset([DATABASE_URL_VAR, USER_VAR, LOG_VAR], || {
      let config = Config::from_process_env().unwrap();
      assert_eq!(config, Config::default());
      assert_eq!(config.user.as_str(), "anon");
    });
  }

  #[test]
  #[serial]
  fn test_reads_environment() {
    temp_env::with_vars(
      [
        (DATABASE_URL_VAR, Some("sqlite::memory:")),
        (USER_VAR, Some("maria")),
        (LOG_VAR, Some("run_tracker_lib=debug")),
      ],
      || {
        let config = Config::from_process_env().unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.user.as_str(), "maria");
        assert_eq!(config.log_filter, "run_tracker_lib=debug");
      },
    );
  }

  #[test]
  #[serial]
  fn test_blank_values_fall_back_to_defaults() {
    temp_env::with_vars([(DATABASE_URL_VAR, Some("  ")), (USER_VAR, Some(""))], || {
      let config = Config::from_process_env().unwrap();
      assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
      assert_eq!(config.user, UserId::anonymous());
    });
  }

  #[test]
  #[serial]
  fn test_invalid_user_is_rejected() {
    temp_env::with_var(USER_VAR, Some("team:a"), || {
      let err = Config::from_process_env().unwrap_err();
      assert!(err.to_string().starts_with("Invalid value for RUN_TRACKER_USER"));
    });
  }
}
