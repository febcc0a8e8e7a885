//! Account administration and student profiles.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::db::{self as auth_db, UserInfo};
use crate::auth::AuthContext;
use crate::db::progress::{self, StudentProgress};
use crate::db::{stages, try_lock};
use crate::domain::{AccountStatus, Role};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserFilter {
  pub status: Option<AccountStatus>,
  pub role: Option<Role>,
}

#[derive(Deserialize)]
pub struct RoleChange {
  pub role: Role,
}

#[derive(Deserialize)]
pub struct StageChange {
  pub stage_id: i64,
}

#[derive(Serialize)]
pub struct StudentProfile {
  #[serde(flatten)]
  pub user: UserInfo,
  #[serde(flatten)]
  pub progress: StudentProgress,
}

fn load_user(conn: &rusqlite::Connection, user_id: i64) -> ApiResult<UserInfo> {
  auth_db::get_user_by_id(conn, user_id)?.ok_or_else(|| ApiError::not_found("User"))
}

/// GET /api/users
pub async fn list_users(
  State(state): State<AppState>,
  auth: AuthContext,
  Query(filter): Query<UserFilter>,
) -> ApiResult<Json<Vec<UserInfo>>> {
  auth.require_admin()?;
  let conn = try_lock(&state.db)?;
  Ok(Json(auth_db::list_users(&conn, filter.status, filter.role)?))
}

/// POST /api/users/{id}/approve
pub async fn approve_user(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(user_id): Path<i64>,
) -> ApiResult<Json<UserInfo>> {
  auth.require_admin()?;
  let conn = try_lock(&state.db)?;
  let user = load_user(&conn, user_id)?;

  auth_db::set_user_status(&conn, user_id, AccountStatus::Approved, auth.user_id)?;
  if user.role == Role::Student {
    stages::ensure_student_profile(&conn, user_id)?;
  }
  tracing::info!("Admin {} approved {} '{}'", auth.user_id, user.role, user.username);
  Ok(Json(load_user(&conn, user_id)?))
}

/// POST /api/users/{id}/reject
pub async fn reject_user(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(user_id): Path<i64>,
) -> ApiResult<Json<UserInfo>> {
  auth.require_admin()?;
  if user_id == auth.user_id {
    return Err(ApiError::bad_request("You cannot reject your own account"));
  }
  let conn = try_lock(&state.db)?;
  if !auth_db::set_user_status(&conn, user_id, AccountStatus::Rejected, auth.user_id)? {
    return Err(ApiError::not_found("User"));
  }
  Ok(Json(load_user(&conn, user_id)?))
}

/// PUT /api/users/{id}/role
pub async fn change_role(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(user_id): Path<i64>,
  Json(req): Json<RoleChange>,
) -> ApiResult<Json<UserInfo>> {
  auth.require_admin()?;
  if user_id == auth.user_id && req.role != Role::Admin {
    return Err(ApiError::bad_request("You cannot demote yourself"));
  }
  let conn = try_lock(&state.db)?;
  if !auth_db::set_user_role(&conn, user_id, req.role)? {
    return Err(ApiError::not_found("User"));
  }
  let user = load_user(&conn, user_id)?;
  if req.role == Role::Student && user.status == AccountStatus::Approved {
    stages::ensure_student_profile(&conn, user_id)?;
  }
  tracing::info!("Admin {} set role of '{}' to {}", auth.user_id, user.username, req.role);
  Ok(Json(user))
}

/// DELETE /api/users/{id}
pub async fn delete_user(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(user_id): Path<i64>,
) -> ApiResult<StatusCode> {
  auth.require_admin()?;
  if user_id == auth.user_id {
    return Err(ApiError::bad_request("You cannot delete your own account"));
  }
  let conn = try_lock(&state.db)?;
  if !auth_db::delete_user(&conn, user_id)? {
    return Err(ApiError::not_found("User"));
  }
  tracing::info!("Admin {} deleted user {}", auth.user_id, user_id);
  Ok(StatusCode::NO_CONTENT)
}

/// GET /api/students/{id} - Stage, current page and completion
pub async fn student_profile(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(student_id): Path<i64>,
) -> ApiResult<Json<StudentProfile>> {
  if !auth.is_staff() && auth.user_id != student_id {
    return Err(ApiError::forbidden("You can only view your own profile"));
  }
  let conn = try_lock(&state.db)?;
  let user = load_user(&conn, student_id)?;
  if user.role != Role::Student {
    return Err(ApiError::not_found("Student"));
  }
  let progress = progress::student_progress(&conn, student_id)?;
  Ok(Json(StudentProfile { user, progress }))
}

/// PUT /api/students/{id}/stage
pub async fn set_stage(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(student_id): Path<i64>,
  Json(req): Json<StageChange>,
) -> ApiResult<Json<StudentProfile>> {
  auth.require_admin()?;
  let conn = try_lock(&state.db)?;
  let user = load_user(&conn, student_id)?;
  if user.role != Role::Student {
    return Err(ApiError::bad_request("Only students have a stage"));
  }
  stages::get_stage(&conn, req.stage_id)?.ok_or_else(|| ApiError::not_found("Stage"))?;
  stages::set_student_stage(&conn, student_id, req.stage_id)?;

  let progress = progress::student_progress(&conn, student_id)?;
  Ok(Json(StudentProfile { user, progress }))
}
