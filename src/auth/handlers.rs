//! Authentication handlers for register, login, logout and password change.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use super::db as auth_db;
use super::middleware::AuthContext;
use super::password;
use crate::config;
use crate::db::{try_lock, LogOnError};
use crate::domain::{AccountStatus, Role};
use crate::error::{ApiError, ApiResult};
use crate::session::{generate_session_id, removal_cookie, session_cookie, SESSION_COOKIE_NAME};
use crate::state::AppState;
use crate::validation;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}

fn hashing_failed(e: argon2::password_hash::Error) -> ApiError {
    ApiError::Internal(format!("Failed to hash password: {}", e))
}

/// POST /api/auth/register - Create a pending account
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<auth_db::UserInfo>)> {
    if req.role == Role::Admin {
        return Err(ApiError::forbidden("Admin accounts cannot be self-registered"));
    }
    if !validation::is_valid_username(&req.username) {
        return Err(ApiError::bad_request(
            "Username must be 3-32 alphanumeric characters or underscores",
        ));
    }
    if !password::is_valid_password(&req.password) {
        return Err(ApiError::bad_request(format!(
            "Password must be {}-{} characters",
            password::MIN_PASSWORD_LEN,
            password::MAX_PASSWORD_LEN
        )));
    }
    let full_name = validation::required_line("Full name", &req.full_name, validation::MAX_NAME_LEN)
        .map_err(ApiError::BadRequest)?;

    {
        let conn = try_lock(&state.db)?;
        if !auth_db::is_registration_open(&conn)? {
            return Err(ApiError::forbidden("Registration is currently closed"));
        }
        if auth_db::username_exists(&conn, &req.username)? {
            return Err(ApiError::conflict("Username already exists"));
        }
    }

    // Hash outside the lock
    let hash = password::hash_password(&req.password).map_err(hashing_failed)?;

    let conn = try_lock(&state.db)?;
    let user_id = auth_db::create_user(
        &conn,
        &req.username,
        &hash,
        &full_name,
        req.role,
        AccountStatus::Pending,
    )?;
    let user = auth_db::get_user_by_id(&conn, user_id)?.ok_or_else(|| ApiError::not_found("User"))?;

    tracing::info!("Registered {} account '{}' awaiting approval", user.role, user.username);
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/auth/login - Verify credentials and start a session
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<auth_db::UserInfo>)> {
    let invalid = || ApiError::Unauthorized("Invalid username or password".to_string());

    let credentials = {
        let conn = try_lock(&state.db)?;
        auth_db::get_credentials(&conn, req.username.trim())?
    };
    let (user_id, stored_hash, status) = credentials.ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &stored_hash) {
        tracing::debug!("Failed login for '{}'", req.username);
        return Err(invalid());
    }
    match status {
        AccountStatus::Approved => {}
        AccountStatus::Pending => {
            return Err(ApiError::forbidden("Your account is awaiting approval"));
        }
        AccountStatus::Rejected => {
            return Err(ApiError::forbidden("Your account registration was rejected"));
        }
    }

    let session_id = generate_session_id();
    let conn = try_lock(&state.db)?;
    auth_db::update_last_login(&conn, user_id).log_warn("Failed to update last login");
    auth_db::create_session(&conn, user_id, &session_id, config::SESSION_DURATION_HOURS)?;
    let user = auth_db::get_user_by_id(&conn, user_id)?.ok_or_else(|| ApiError::not_found("User"))?;

    Ok((jar.add(session_cookie(session_id)), Json(user)))
}

/// POST /api/auth/logout - End the current session
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> ApiResult<(CookieJar, StatusCode)> {
    if let Some(cookie) = jar.get(SESSION_COOKIE_NAME) {
        let conn = try_lock(&state.db)?;
        auth_db::delete_session(&conn, cookie.value()).log_warn("Failed to delete session during logout");
    }
    Ok((jar.remove(removal_cookie()), StatusCode::NO_CONTENT))
}

/// GET /api/auth/me - The logged-in user
pub async fn me(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<auth_db::UserInfo>> {
    let conn = try_lock(&state.db)?;
    let user = auth_db::get_user_by_id(&conn, auth.user_id)?.ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(user))
}

/// POST /api/auth/password - Change own password and sign out other sessions
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<PasswordChangeRequest>,
) -> ApiResult<StatusCode> {
    if !password::is_valid_password(&req.new_password) {
        return Err(ApiError::bad_request(format!(
            "Password must be {}-{} characters",
            password::MIN_PASSWORD_LEN,
            password::MAX_PASSWORD_LEN
        )));
    }

    let stored_hash = {
        let conn = try_lock(&state.db)?;
        auth_db::get_password_hash(&conn, auth.user_id)?
    };
    if !password::verify_password(&req.current_password, &stored_hash) {
        return Err(ApiError::forbidden("Current password is incorrect"));
    }
    let new_hash = password::hash_password(&req.new_password).map_err(hashing_failed)?;

    let conn = try_lock(&state.db)?;
    auth_db::set_password_hash(&conn, auth.user_id, &new_hash)?;
    let dropped = auth_db::delete_other_sessions(&conn, auth.user_id, &auth.session_id)?;
    tracing::info!("User {} changed password, {} other sessions ended", auth.user_id, dropped);
    Ok(StatusCode::NO_CONTENT)
}

/// Create the configured admin account when no admin exists yet.
/// Returns the new admin's id.
pub fn bootstrap_admin(
    conn: &rusqlite::Connection,
    admin: &config::AdminBootstrap,
) -> ApiResult<Option<i64>> {
    if auth_db::admin_exists(conn)? {
        return Ok(None);
    }
    if !validation::is_valid_username(&admin.username) || !password::is_valid_password(&admin.password) {
        return Err(ApiError::bad_request(
            "Configured admin username or password is invalid",
        ));
    }
    let hash = password::hash_password(&admin.password).map_err(hashing_failed)?;
    let id = auth_db::create_user(
        conn,
        &admin.username,
        &hash,
        "Administrator",
        Role::Admin,
        AccountStatus::Approved,
    )?;
    tracing::info!("Created bootstrap admin '{}'", admin.username);
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestEnv;

    fn admin(username: &str) -> config::AdminBootstrap {
        config::AdminBootstrap {
            username: username.to_string(),
            password: "change-me-now".to_string(),
        }
    }

    #[test]
    fn test_bootstrap_skipped_when_admin_exists() {
        // TestEnv already seeds an admin
        let env = TestEnv::new().unwrap();
        assert_eq!(bootstrap_admin(&env.conn, &admin("root_admin")).unwrap(), None);
    }

    #[test]
    fn test_bootstrap_creates_admin() {
        let env = TestEnv::new().unwrap();
        auth_db::delete_user(&env.conn, env.admin_id()).unwrap();

        let id = bootstrap_admin(&env.conn, &admin("root_admin")).unwrap().unwrap();
        let user = auth_db::get_user_by_id(&env.conn, id).unwrap().unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.status, AccountStatus::Approved);

        let hash = auth_db::get_password_hash(&env.conn, id).unwrap();
        assert!(password::verify_password("change-me-now", &hash));
    }

    #[test]
    fn test_bootstrap_rejects_invalid_username() {
        let env = TestEnv::new().unwrap();
        auth_db::delete_user(&env.conn, env.admin_id()).unwrap();
        assert!(bootstrap_admin(&env.conn, &admin("no spaces allowed")).is_err());
    }
}
