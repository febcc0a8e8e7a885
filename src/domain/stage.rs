use serde::{Deserialize, Serialize};

/// First page of the Madani mushaf
pub const FIRST_PAGE: i64 = 1;

/// Last page of the Madani mushaf
pub const LAST_PAGE: i64 = 604;

/// A curriculum level covering a contiguous page range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
  pub id: i64,
  pub name: String,
  pub start_page: i64,
  pub end_page: i64,
  pub sort_order: i64,
}

impl Stage {
  /// Check a page range before it is stored
  pub fn validate_range(start_page: i64, end_page: i64) -> Result<(), String> {
    if start_page < FIRST_PAGE || end_page > LAST_PAGE {
      return Err(format!("Pages must be between {} and {}", FIRST_PAGE, LAST_PAGE));
    }
    if start_page > end_page {
      return Err("start_page must not exceed end_page".to_string());
    }
    Ok(())
  }

  pub fn page_count(&self) -> i64 {
    self.end_page - self.start_page + 1
  }

  pub fn contains(&self, page: i64) -> bool {
    (self.start_page..=self.end_page).contains(&page)
  }

  /// Pages of this stage covered once the student has reached `current_page`
  pub fn covered_pages(&self, current_page: Option<i64>) -> i64 {
    match current_page {
      Some(page) => (page - self.start_page + 1).clamp(0, self.page_count()),
      None => 0,
    }
  }

  /// Completion percentage (0..=100), rounded down
  pub fn completion(&self, current_page: Option<i64>) -> u8 {
    (self.covered_pages(current_page) * 100 / self.page_count()) as u8
  }

  pub fn is_completed(&self, current_page: Option<i64>) -> bool {
    current_page.is_some_and(|p| p >= self.end_page)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn juz_amma() -> Stage {
    Stage {
      id: 1,
      name: "Juz 30".to_string(),
      start_page: 582,
      end_page: 604,
      sort_order: 1,
    }
  }

  #[test]
  fn test_page_count_is_inclusive() {
    assert_eq!(juz_amma().page_count(), 23);
  }

  #[test]
  fn test_completion_before_and_after_range() {
    let stage = juz_amma();
    assert_eq!(stage.completion(None), 0);
    assert_eq!(stage.completion(Some(10)), 0);
    assert_eq!(stage.completion(Some(582)), 4); // 1/23
    assert_eq!(stage.completion(Some(604)), 100);
  }

  #[test]
  fn test_is_completed_at_end_page() {
    let stage = juz_amma();
    assert!(!stage.is_completed(Some(603)));
    assert!(stage.is_completed(Some(604)));
    assert!(!stage.is_completed(None));
  }

  #[test]
  fn test_validate_range() {
    assert!(Stage::validate_range(1, 604).is_ok());
    assert!(Stage::validate_range(0, 10).is_err());
    assert!(Stage::validate_range(10, 605).is_err());
    assert!(Stage::validate_range(20, 10).is_err());
  }

  #[test]
  fn test_contains() {
    let stage = juz_amma();
    assert!(stage.contains(582));
    assert!(stage.contains(604));
    assert!(!stage.contains(581));
  }
}
