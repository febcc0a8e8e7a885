use serde::{Deserialize, Serialize};

use super::text_column;

/// Evaluation grade a teacher gives for a day's recitation or a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
  Excellent,
  VeryGood,
  Good,
  Acceptable,
  Weak,
  /// Student did not attend; no page is recorded
  Absent,
}

impl Grade {
  /// All grades, best first (report column order)
  pub const ALL: [Grade; 6] = [
    Grade::Excellent,
    Grade::VeryGood,
    Grade::Good,
    Grade::Acceptable,
    Grade::Weak,
    Grade::Absent,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Grade::Excellent => "excellent",
      Grade::VeryGood => "very_good",
      Grade::Good => "good",
      Grade::Acceptable => "acceptable",
      Grade::Weak => "weak",
      Grade::Absent => "absent",
    }
  }

  /// Label printed on reports
  pub fn arabic_label(&self) -> &'static str {
    match self {
      Grade::Excellent => "ممتاز",
      Grade::VeryGood => "جيد جدا",
      Grade::Good => "جيد",
      Grade::Acceptable => "مقبول",
      Grade::Weak => "ضعيف",
      Grade::Absent => "غائب",
    }
  }

  /// Numeric score (5 = excellent .. 1 = weak, 0 = absent)
  pub fn score(&self) -> u8 {
    match self {
      Grade::Excellent => 5,
      Grade::VeryGood => 4,
      Grade::Good => 3,
      Grade::Acceptable => 2,
      Grade::Weak => 1,
      Grade::Absent => 0,
    }
  }

  pub fn is_absent(&self) -> bool {
    matches!(self, Grade::Absent)
  }
}

impl std::str::FromStr for Grade {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "excellent" => Ok(Grade::Excellent),
      "very_good" => Ok(Grade::VeryGood),
      "good" => Ok(Grade::Good),
      "acceptable" => Ok(Grade::Acceptable),
      "weak" => Ok(Grade::Weak),
      "absent" => Ok(Grade::Absent),
      _ => Err(format!("Invalid grade: {}", s)),
    }
  }
}

text_column!(Grade);
