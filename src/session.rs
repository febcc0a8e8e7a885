//! Session identifiers and the cookie that carries them.

use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::config;

pub const SESSION_COOKIE_NAME: &str = "yaqeen_session";

/// Length of generated session ids
const SESSION_ID_LEN: usize = 32;

/// Generate a new session ID
pub fn generate_session_id() -> String {
  use rand::Rng;
  let mut rng = rand::rng();
  (0..SESSION_ID_LEN)
    .map(|_| {
      let idx = rng.random_range(0..36);
      if idx < 10 {
        (b'0' + idx) as char
      } else {
        (b'a' + idx - 10) as char
      }
    })
    .collect()
}

/// HttpOnly cookie carrying the session id
pub fn session_cookie(session_id: String) -> Cookie<'static> {
  Cookie::build((SESSION_COOKIE_NAME, session_id))
    .path("/")
    .http_only(true)
    .same_site(SameSite::Lax)
    .max_age(time::Duration::hours(config::SESSION_DURATION_HOURS))
    .build()
}

/// Expired cookie that clears the session on the client
pub fn removal_cookie() -> Cookie<'static> {
  Cookie::build((SESSION_COOKIE_NAME, ""))
    .path("/")
    .max_age(time::Duration::seconds(0))
    .build()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_session_ids_are_lowercase_alphanumeric() {
    let id = generate_session_id();
    assert_eq!(id.len(), SESSION_ID_LEN);
    assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    assert_ne!(id, generate_session_id());
  }

  #[test]
  fn test_session_cookie_attributes() {
    let cookie = session_cookie("abc".to_string());
    assert_eq!(cookie.name(), SESSION_COOKIE_NAME);
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.path(), Some("/"));
  }
}
