use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::auth::AuthContext;
use crate::db::complaints::{self as complaints_db, Complaint};
use crate::db::try_lock;
use crate::domain::ComplaintStatus;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::validation;

#[derive(Deserialize)]
pub struct ComplaintRequest {
  pub subject: String,
  pub body: String,
}

#[derive(Deserialize)]
pub struct ComplaintFilter {
  pub status: Option<ComplaintStatus>,
}

#[derive(Deserialize)]
pub struct ResponseRequest {
  pub response: String,
}

/// POST /api/complaints
pub async fn create_complaint(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(req): Json<ComplaintRequest>,
) -> ApiResult<(StatusCode, Json<Complaint>)> {
  let subject =
    validation::required_line("Subject", &req.subject, validation::MAX_TITLE_LEN).map_err(ApiError::BadRequest)?;
  let body = validation::optional_body("Body", Some(&req.body), validation::MAX_BODY_LEN)
    .map_err(ApiError::BadRequest)?
    .ok_or_else(|| ApiError::bad_request("Body is required"))?;

  let conn = try_lock(&state.db)?;
  let id = complaints_db::create_complaint(&conn, auth.user_id, &subject, &body)?;
  let complaint = complaints_db::get_complaint(&conn, id)?.ok_or_else(|| ApiError::not_found("Complaint"))?;
  Ok((StatusCode::CREATED, Json(complaint)))
}

/// GET /api/complaints?status= - Admins see all, others their own
pub async fn list_complaints(
  State(state): State<AppState>,
  auth: AuthContext,
  Query(filter): Query<ComplaintFilter>,
) -> ApiResult<Json<Vec<Complaint>>> {
  let owner = (!auth.is_admin()).then_some(auth.user_id);
  let conn = try_lock(&state.db)?;
  Ok(Json(complaints_db::list_complaints(&conn, owner, filter.status)?))
}

/// POST /api/complaints/{id}/respond
pub async fn respond(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(complaint_id): Path<i64>,
  Json(req): Json<ResponseRequest>,
) -> ApiResult<Json<Complaint>> {
  auth.require_admin()?;
  let response = validation::optional_body("Response", Some(&req.response), validation::MAX_BODY_LEN)
    .map_err(ApiError::BadRequest)?
    .ok_or_else(|| ApiError::bad_request("Response is required"))?;

  let conn = try_lock(&state.db)?;
  if !complaints_db::respond(&conn, complaint_id, auth.user_id, &response)? {
    return Err(ApiError::not_found("Complaint"));
  }
  let complaint =
    complaints_db::get_complaint(&conn, complaint_id)?.ok_or_else(|| ApiError::not_found("Complaint"))?;
  Ok(Json(complaint))
}
