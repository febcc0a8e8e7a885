//! Input normalization for user-entered text.
//!
//! Arabic text can arrive in composed or decomposed form depending on the
//! keyboard, so names and free text are NFC-normalized before they are
//! stored or compared.

use unicode_normalization::UnicodeNormalization;

/// Longest accepted full name, in characters
pub const MAX_NAME_LEN: usize = 100;
/// Longest accepted title (assignments, materials, meetings, complaints)
pub const MAX_TITLE_LEN: usize = 200;
/// Longest accepted free text body
pub const MAX_BODY_LEN: usize = 10_000;

/// NFC-normalize, trim, and collapse internal whitespace runs to one space
pub fn normalize_line(input: &str) -> String {
  input
    .nfc()
    .collect::<String>()
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
}

/// NFC-normalize and trim a multi-line body, keeping line breaks
pub fn normalize_body(input: &str) -> String {
  input.nfc().collect::<String>().trim().to_string()
}

/// Normalized single-line field, or an error naming the field
pub fn required_line(field: &str, input: &str, max_len: usize) -> Result<String, String> {
  let value = normalize_line(input);
  if value.is_empty() {
    return Err(format!("{} is required", field));
  }
  if value.chars().count() > max_len {
    return Err(format!("{} must be at most {} characters", field, max_len));
  }
  Ok(value)
}

/// Normalized optional text; blank input becomes None
pub fn optional_body(field: &str, input: Option<&str>, max_len: usize) -> Result<Option<String>, String> {
  let Some(value) = input.map(normalize_body).filter(|v| !v.is_empty()) else {
    return Ok(None);
  };
  if value.chars().count() > max_len {
    return Err(format!("{} must be at most {} characters", field, max_len));
  }
  Ok(Some(value))
}

/// 3-32 chars, ASCII alphanumeric or underscore
pub fn is_valid_username(username: &str) -> bool {
  username.len() >= 3
    && username.len() <= 32
    && username
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Only http(s) links are stored for materials and meetings
pub fn is_valid_link(url: &str) -> bool {
  let url = url.trim();
  (url.starts_with("https://") || url.starts_with("http://"))
    && url.len() > "https://".len()
    && !url.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_valid_usernames() {
    assert!(is_valid_username("abc"));
    assert!(is_valid_username("user123"));
    assert!(is_valid_username("my_user"));
    assert!(is_valid_username("a".repeat(32).as_str()));
  }

  #[test]
  fn test_invalid_usernames() {
    assert!(!is_valid_username("ab")); // too short
    assert!(!is_valid_username(&"a".repeat(33))); // too long
    assert!(!is_valid_username("user name"));
    assert!(!is_valid_username("user-name"));
    assert!(!is_valid_username("محمد"));
    assert!(!is_valid_username(""));
  }

  #[test]
  fn test_normalize_line_composes_and_collapses() {
    // Alef followed by a combining hamza above composes to U+0623
    let decomposed = "  \u{0627}\u{0654}حمد   علي ";
    assert_eq!(normalize_line(decomposed), "\u{0623}حمد علي");
  }

  #[test]
  fn test_required_line() {
    assert_eq!(required_line("Name", "  Zaid ", MAX_NAME_LEN).unwrap(), "Zaid");
    assert!(required_line("Name", "   ", MAX_NAME_LEN).is_err());
    let err = required_line("Title", &"x".repeat(201), MAX_TITLE_LEN).unwrap_err();
    assert!(err.contains("200"));
  }

  #[test]
  fn test_optional_body() {
    assert_eq!(optional_body("Notes", None, 10).unwrap(), None);
    assert_eq!(optional_body("Notes", Some("  "), 10).unwrap(), None);
    assert_eq!(
      optional_body("Notes", Some(" line one\nline two "), 100).unwrap().as_deref(),
      Some("line one\nline two")
    );
    assert!(optional_body("Notes", Some("abcdefghijk"), 10).is_err());
  }

  #[test]
  fn test_links() {
    assert!(is_valid_link("https://meet.example.org/abc"));
    assert!(is_valid_link("http://example.org"));
    assert!(!is_valid_link("javascript:alert(1)"));
    assert!(!is_valid_link("https://"));
    assert!(!is_valid_link("https://exa mple.org"));
  }
}
