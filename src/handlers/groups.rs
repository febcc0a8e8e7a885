//! Study circles (halaqat) and their membership.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rusqlite::Connection;
use serde::Deserialize;

use super::{load_group, require_group_access, require_group_teacher};
use crate::auth::db as auth_db;
use crate::auth::AuthContext;
use crate::db::groups::{self as groups_db, Group, GroupMember, GroupScope};
use crate::db::try_lock;
use crate::domain::{AccountStatus, Role};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::validation;

#[derive(Deserialize)]
pub struct GroupRequest {
  pub name: String,
  pub description: Option<String>,
  pub teacher_id: i64,
}

#[derive(Deserialize)]
pub struct MemberRequest {
  pub student_id: i64,
}

/// Normalized (name, description) after checking the teacher
fn validate_group(conn: &Connection, req: &GroupRequest) -> ApiResult<(String, Option<String>)> {
  let name = validation::required_line("Group name", &req.name, validation::MAX_NAME_LEN).map_err(ApiError::BadRequest)?;
  let description = validation::optional_body("Description", req.description.as_deref(), validation::MAX_BODY_LEN)
    .map_err(ApiError::BadRequest)?;

  let teacher = auth_db::get_user_by_id(conn, req.teacher_id)?.ok_or_else(|| ApiError::not_found("Teacher"))?;
  if teacher.role != Role::Teacher || teacher.status != AccountStatus::Approved {
    return Err(ApiError::bad_request("The group teacher must be an approved teacher"));
  }
  Ok((name, description))
}

/// GET /api/groups - Scoped to the caller's role
pub async fn list_groups(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<Vec<Group>>> {
  let scope = match auth.role {
    Role::Admin => GroupScope::All,
    Role::Teacher => GroupScope::Teacher(auth.user_id),
    Role::Student => GroupScope::Student(auth.user_id),
  };
  let conn = try_lock(&state.db)?;
  Ok(Json(groups_db::list_groups(&conn, scope)?))
}

/// GET /api/groups/{id}
pub async fn get_group(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(group_id): Path<i64>,
) -> ApiResult<Json<Group>> {
  let conn = try_lock(&state.db)?;
  let group = load_group(&conn, group_id)?;
  require_group_access(&conn, &auth, &group)?;
  Ok(Json(group))
}

/// POST /api/groups
pub async fn create_group(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(req): Json<GroupRequest>,
) -> ApiResult<(StatusCode, Json<Group>)> {
  auth.require_admin()?;
  let conn = try_lock(&state.db)?;
  let (name, description) = validate_group(&conn, &req)?;

  let id = groups_db::create_group(&conn, &name, description.as_deref(), req.teacher_id)?;
  tracing::info!("Created group '{}' led by user {}", name, req.teacher_id);
  Ok((StatusCode::CREATED, Json(load_group(&conn, id)?)))
}

/// PUT /api/groups/{id}
pub async fn update_group(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(group_id): Path<i64>,
  Json(req): Json<GroupRequest>,
) -> ApiResult<Json<Group>> {
  auth.require_admin()?;
  let conn = try_lock(&state.db)?;
  let (name, description) = validate_group(&conn, &req)?;

  if !groups_db::update_group(&conn, group_id, &name, description.as_deref(), req.teacher_id)? {
    return Err(ApiError::not_found("Group"));
  }
  Ok(Json(load_group(&conn, group_id)?))
}

/// DELETE /api/groups/{id} - Members, assignments, materials and meetings go with it
pub async fn delete_group(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(group_id): Path<i64>,
) -> ApiResult<StatusCode> {
  auth.require_admin()?;
  let conn = try_lock(&state.db)?;
  if !groups_db::delete_group(&conn, group_id)? {
    return Err(ApiError::not_found("Group"));
  }
  tracing::info!("Admin {} deleted group {}", auth.user_id, group_id);
  Ok(StatusCode::NO_CONTENT)
}

/// GET /api/groups/{id}/members
pub async fn list_members(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(group_id): Path<i64>,
) -> ApiResult<Json<Vec<GroupMember>>> {
  let conn = try_lock(&state.db)?;
  let group = load_group(&conn, group_id)?;
  require_group_teacher(&auth, &group)?;
  Ok(Json(groups_db::list_members(&conn, group_id)?))
}

/// POST /api/groups/{id}/members
pub async fn add_member(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(group_id): Path<i64>,
  Json(req): Json<MemberRequest>,
) -> ApiResult<(StatusCode, Json<Vec<GroupMember>>)> {
  auth.require_admin()?;
  let conn = try_lock(&state.db)?;
  load_group(&conn, group_id)?;

  let student = auth_db::get_user_by_id(&conn, req.student_id)?.ok_or_else(|| ApiError::not_found("Student"))?;
  if student.role != Role::Student || student.status != AccountStatus::Approved {
    return Err(ApiError::bad_request("Only approved students can join a group"));
  }
  if groups_db::is_member(&conn, group_id, req.student_id)? {
    return Err(ApiError::conflict("Student is already in this group"));
  }
  groups_db::add_member(&conn, group_id, req.student_id)?;
  Ok((StatusCode::CREATED, Json(groups_db::list_members(&conn, group_id)?)))
}

/// DELETE /api/groups/{id}/members/{student_id}
pub async fn remove_member(
  State(state): State<AppState>,
  auth: AuthContext,
  Path((group_id, student_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
  auth.require_admin()?;
  let conn = try_lock(&state.db)?;
  if !groups_db::remove_member(&conn, group_id, student_id)? {
    return Err(ApiError::not_found("Group member"));
  }
  Ok(StatusCode::NO_CONTENT)
}
