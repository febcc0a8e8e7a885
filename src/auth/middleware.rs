//! Authentication extractor and role checks.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;

use super::db as auth_db;
use crate::config;
use crate::db::{try_lock, LogOnError};
use crate::domain::Role;
use crate::error::ApiError;
use crate::session::SESSION_COOKIE_NAME;
use crate::state::AppState;

/// Authenticated request context.
/// Add this as a handler parameter to require an approved, logged-in user.
/// Responds 401 when the cookie is missing, expired or unknown.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub session_id: String,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Teachers and admins
    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn require_role(&self, role: Role) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!("Only a {} can do this", role)))
        }
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin access required"))
        }
    }

    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Teacher or admin access required"))
        }
    }
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Unauthorized("Not logged in".to_string()))?;

        let session_id = jar
            .get(SESSION_COOKIE_NAME)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Not logged in".to_string()))?;

        let conn = try_lock(&state.db)?;

        // Clean up expired sessions occasionally (~10% chance)
        if rand::random::<u8>() < config::SESSION_CLEANUP_THRESHOLD {
            auth_db::cleanup_expired_sessions(&conn).log_warn("Failed to clean up expired sessions");
        }

        let user = auth_db::get_session_user(&conn, &session_id)?
            .ok_or_else(|| ApiError::Unauthorized("Session expired, please log in again".to_string()))?;

        Ok(AuthContext {
            user_id: user.id,
            username: user.username,
            full_name: user.full_name,
            role: user.role,
            session_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(role: Role) -> AuthContext {
        AuthContext {
            user_id: 1,
            username: "user".to_string(),
            full_name: "User".to_string(),
            role,
            session_id: "s".to_string(),
        }
    }

    #[test]
    fn test_role_checks() {
        assert!(context(Role::Admin).require_admin().is_ok());
        assert!(context(Role::Teacher).require_admin().is_err());
        assert!(context(Role::Teacher).require_staff().is_ok());
        assert!(context(Role::Student).require_staff().is_err());
        assert!(context(Role::Student).require_role(Role::Student).is_ok());
        assert!(matches!(
            context(Role::Teacher).require_role(Role::Student),
            Err(ApiError::Forbidden(_))
        ));
    }
}
