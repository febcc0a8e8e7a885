//! Workflow states for certificates, submissions and complaints.

use serde::{Deserialize, Serialize};

use super::text_column;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
  Pending,
  Approved,
  Rejected,
}

impl CertificateStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      CertificateStatus::Pending => "pending",
      CertificateStatus::Approved => "approved",
      CertificateStatus::Rejected => "rejected",
    }
  }
}

impl std::str::FromStr for CertificateStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "pending" => Ok(CertificateStatus::Pending),
      "approved" => Ok(CertificateStatus::Approved),
      "rejected" => Ok(CertificateStatus::Rejected),
      _ => Err(format!("Invalid certificate status: {}", s)),
    }
  }
}

text_column!(CertificateStatus);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
  Submitted,
  /// Graded submissions can no longer be replaced
  Graded,
}

impl SubmissionStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      SubmissionStatus::Submitted => "submitted",
      SubmissionStatus::Graded => "graded",
    }
  }
}

impl std::str::FromStr for SubmissionStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "submitted" => Ok(SubmissionStatus::Submitted),
      "graded" => Ok(SubmissionStatus::Graded),
      _ => Err(format!("Invalid submission status: {}", s)),
    }
  }
}

text_column!(SubmissionStatus);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplaintStatus {
  Open,
  Resolved,
}

impl ComplaintStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      ComplaintStatus::Open => "open",
      ComplaintStatus::Resolved => "resolved",
    }
  }
}

impl std::str::FromStr for ComplaintStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "open" => Ok(ComplaintStatus::Open),
      "resolved" => Ok(ComplaintStatus::Resolved),
      _ => Err(format!("Invalid complaint status: {}", s)),
    }
  }
}

text_column!(ComplaintStatus);
