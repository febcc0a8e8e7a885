use serde::{Deserialize, Serialize};

use super::text_column;

/// What a user is allowed to do on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Student,
  Teacher,
  Admin,
}

impl Role {
  pub fn as_str(&self) -> &'static str {
    match self {
      Role::Student => "student",
      Role::Teacher => "teacher",
      Role::Admin => "admin",
    }
  }

  /// Teachers and admins manage groups, grades and materials
  pub fn is_staff(&self) -> bool {
    matches!(self, Role::Teacher | Role::Admin)
  }
}

impl std::str::FromStr for Role {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "student" => Ok(Role::Student),
      "teacher" => Ok(Role::Teacher),
      "admin" => Ok(Role::Admin),
      _ => Err(format!("Invalid role: {}", s)),
    }
  }
}

text_column!(Role);

/// Account approval state. New registrations wait for an admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
  Pending,
  Approved,
  Rejected,
}

impl AccountStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      AccountStatus::Pending => "pending",
      AccountStatus::Approved => "approved",
      AccountStatus::Rejected => "rejected",
    }
  }
}

impl std::str::FromStr for AccountStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "pending" => Ok(AccountStatus::Pending),
      "approved" => Ok(AccountStatus::Approved),
      "rejected" => Ok(AccountStatus::Rejected),
      _ => Err(format!("Invalid account status: {}", s)),
    }
  }
}

text_column!(AccountStatus);
