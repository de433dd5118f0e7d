use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

const ANONYMOUS_USER: &str = "anon";

/// Identifier that namespaces every stored record of one account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
  /// Trims the input; rejects empty ids and ids containing `:` (the key separator)
  pub fn new(id: impl Into<String>) -> Result<Self, TrackerError> {
    let id = id.into();
    let trimmed = id.trim();
    if trimmed.is_empty() {
      return Err(TrackerError::InvalidUser("user id is empty".to_string()));
    }
    if trimmed.contains(':') {
      return Err(TrackerError::InvalidUser(format!(
        "user id must not contain ':' ({})",
        trimmed
      )));
    }
    Ok(Self(trimmed.to_string()))
  }

  /// The account used when nobody is signed in
  pub fn anonymous() -> Self {
    Self(ANONYMOUS_USER.to_string())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for UserId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

impl std::str::FromStr for UserId {
  type Err = TrackerError;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::new(s)
  }
}

impl TryFrom<String> for UserId {
  type Error = TrackerError;
  fn try_from(value: String) -> Result<Self, Self::Error> {
    Self::new(value)
  }
}

impl From<UserId> for String {
  fn from(id: UserId) -> Self {
    id.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_user_id_is_trimmed() {
    let id = UserId::new("  runner@example.com ").unwrap();
    assert_eq!(id.as_str(), "runner@example.com");
  }

  #[test]
  fn test_user_id_rejects_empty_and_separator() {
    assert!(UserId::new("   ").is_err());
    assert!(UserId::new("runs_v1:alice").is_err());
  }

  #[test]
  fn test_anonymous_user() {
    assert_eq!(UserId::anonymous().to_string(), "anon");
    assert_eq!("anon".parse::<UserId>().unwrap(), UserId::anonymous());
  }
}
