//! Account database operations (users, sessions, app_settings tables).

use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::Serialize;

use crate::domain::{AccountStatus, Role};

/// Public view of a user row
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub status: AccountStatus,
    pub created_at: String,
    pub last_login_at: Option<String>,
}

const USER_COLUMNS: &str =
    "id, username, full_name, role, status, created_at, last_login_at";

fn user_from_row(row: &Row<'_>) -> Result<UserInfo> {
    Ok(UserInfo {
        id: row.get(0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        role: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        last_login_at: row.get(6)?,
    })
}

// ==================== Users ====================

/// Create a new user, returns the user ID
pub fn create_user(
    conn: &Connection,
    username: &str,
    password_hash: &str,
    full_name: &str,
    role: Role,
    status: AccountStatus,
) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        r#"INSERT INTO users (username, password_hash, full_name, role, status, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
        params![username, password_hash, full_name, role, status, now],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Credentials needed at login: (user_id, password_hash, status)
pub fn get_credentials(
    conn: &Connection,
    username: &str,
) -> Result<Option<(i64, String, AccountStatus)>> {
    conn.query_row(
        "SELECT id, password_hash, status FROM users WHERE username = ?1",
        params![username],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )
    .optional()
}

/// Stored password hash for a user
pub fn get_password_hash(conn: &Connection, user_id: i64) -> Result<String> {
    conn.query_row(
        "SELECT password_hash FROM users WHERE id = ?1",
        params![user_id],
        |row| row.get(0),
    )
}

pub fn set_password_hash(conn: &Connection, user_id: i64, password_hash: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![password_hash, user_id],
    )?;
    Ok(())
}

/// Check if a username already exists (case-insensitive)
pub fn username_exists(conn: &Connection, username: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Get a user by ID
pub fn get_user_by_id(conn: &Connection, user_id: i64) -> Result<Option<UserInfo>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        params![user_id],
        user_from_row,
    )
    .optional()
}

/// List users, optionally filtered by status and role
pub fn list_users(
    conn: &Connection,
    status: Option<AccountStatus>,
    role: Option<Role>,
) -> Result<Vec<UserInfo>> {
    let mut stmt = conn.prepare(&format!(
        r#"SELECT {} FROM users
           WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR role = ?2)
           ORDER BY created_at DESC, id DESC"#,
        USER_COLUMNS
    ))?;
    let users = stmt
        .query_map(params![status, role], user_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(users)
}

/// Set approval status. Returns false if the user does not exist.
pub fn set_user_status(
    conn: &Connection,
    user_id: i64,
    status: AccountStatus,
    reviewed_by: i64,
) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let changed = conn.execute(
        "UPDATE users SET status = ?1, reviewed_by = ?2, reviewed_at = ?3 WHERE id = ?4",
        params![status, reviewed_by, now, user_id],
    )?;
    if changed > 0 && status != AccountStatus::Approved {
        delete_user_sessions(conn, user_id)?;
    }
    Ok(changed > 0)
}

/// Change a user's role. Returns false if the user does not exist.
pub fn set_user_role(conn: &Connection, user_id: i64, role: Role) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET role = ?1 WHERE id = ?2",
        params![role, user_id],
    )?;
    Ok(changed > 0)
}

/// Delete a user by ID (sessions and memberships cascade)
pub fn delete_user(conn: &Connection, user_id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
    Ok(changed > 0)
}

/// Whether any approved admin exists
pub fn admin_exists(conn: &Connection) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE role = 'admin' AND status = 'approved')",
        [],
        |row| row.get(0),
    )
}

/// Update user's last login timestamp
pub fn update_last_login(conn: &Connection, user_id: i64) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
        params![now, user_id],
    )?;
    Ok(())
}

/// Count users by role among approved accounts
pub fn count_approved(conn: &Connection, role: Role) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = ?1 AND status = 'approved'",
        params![role],
        |row| row.get(0),
    )
}

pub fn count_pending(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM users WHERE status = 'pending'",
        [],
        |row| row.get(0),
    )
}

// ==================== Sessions ====================

/// Create a new session
pub fn create_session(
    conn: &Connection,
    user_id: i64,
    session_id: &str,
    duration_hours: i64,
) -> Result<()> {
    let now = Utc::now();
    let expires = now + Duration::hours(duration_hours);
    conn.execute(
        "INSERT INTO sessions (id, user_id, created_at, expires_at, last_access_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            session_id,
            user_id,
            now.to_rfc3339(),
            expires.to_rfc3339(),
            now.to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Validate a session and load its approved user
pub fn get_session_user(conn: &Connection, session_id: &str) -> Result<Option<UserInfo>> {
    let now = Utc::now().to_rfc3339();
    let user = conn
        .query_row(
            r#"
            SELECT u.id, u.username, u.full_name, u.role, u.status, u.created_at, u.last_login_at
            FROM sessions s
            JOIN users u ON s.user_id = u.id
            WHERE s.id = ?1 AND s.expires_at > ?2 AND u.status = 'approved'
            "#,
            params![session_id, now],
            user_from_row,
        )
        .optional()?;

    if user.is_some() {
        conn.execute(
            "UPDATE sessions SET last_access_at = ?1 WHERE id = ?2",
            params![now, session_id],
        )?;
    }
    Ok(user)
}

/// Delete a session (logout)
pub fn delete_session(conn: &Connection, session_id: &str) -> Result<()> {
    conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
    Ok(())
}

/// Delete all sessions for a user
pub fn delete_user_sessions(conn: &Connection, user_id: i64) -> Result<usize> {
    conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])
}

/// Delete all sessions for a user except the given one
pub fn delete_other_sessions(conn: &Connection, user_id: i64, keep: &str) -> Result<usize> {
    conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1 AND id != ?2",
        params![user_id, keep],
    )
}

/// Cleanup expired sessions, returns count of deleted sessions
pub fn cleanup_expired_sessions(conn: &Connection) -> Result<usize> {
    let now = Utc::now().to_rfc3339();
    conn.execute("DELETE FROM sessions WHERE expires_at < ?1", params![now])
}

// ==================== App Settings ====================

pub const REGISTRATION_OPEN_KEY: &str = "registration_open";

/// Get an app setting value
pub fn get_app_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM app_settings WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map(Option::flatten)
}

/// Set an app setting value
pub fn set_app_setting(conn: &Connection, key: &str, value: Option<&str>) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO app_settings (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

/// Whether self-registration is accepted (default true)
pub fn is_registration_open(conn: &Connection) -> Result<bool> {
    Ok(get_app_setting(conn, REGISTRATION_OPEN_KEY)?
        .map(|v| v != "false")
        .unwrap_or(true))
}
