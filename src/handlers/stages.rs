use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::auth::AuthContext;
use crate::db::{stages, try_lock};
use crate::domain::Stage;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::validation;

#[derive(Deserialize)]
pub struct StageRequest {
  pub name: String,
  pub start_page: i64,
  pub end_page: i64,
  pub sort_order: i64,
}

impl StageRequest {
  /// Normalized name after range checks
  fn validated_name(&self) -> ApiResult<String> {
    Stage::validate_range(self.start_page, self.end_page).map_err(ApiError::BadRequest)?;
    validation::required_line("Stage name", &self.name, validation::MAX_NAME_LEN).map_err(ApiError::BadRequest)
  }
}

/// GET /api/stages
pub async fn list_stages(State(state): State<AppState>, _auth: AuthContext) -> ApiResult<Json<Vec<Stage>>> {
  let conn = try_lock(&state.db)?;
  Ok(Json(stages::list_stages(&conn)?))
}

/// POST /api/stages
pub async fn create_stage(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(req): Json<StageRequest>,
) -> ApiResult<(StatusCode, Json<Stage>)> {
  auth.require_admin()?;
  let name = req.validated_name()?;

  let conn = try_lock(&state.db)?;
  let id = stages::create_stage(&conn, &name, req.start_page, req.end_page, req.sort_order)?;
  let stage = stages::get_stage(&conn, id)?.ok_or_else(|| ApiError::not_found("Stage"))?;
  tracing::info!("Created stage '{}' ({}-{})", stage.name, stage.start_page, stage.end_page);
  Ok((StatusCode::CREATED, Json(stage)))
}

/// PUT /api/stages/{id}
pub async fn update_stage(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(stage_id): Path<i64>,
  Json(req): Json<StageRequest>,
) -> ApiResult<Json<Stage>> {
  auth.require_admin()?;
  let name = req.validated_name()?;

  let conn = try_lock(&state.db)?;
  if !stages::update_stage(&conn, stage_id, &name, req.start_page, req.end_page, req.sort_order)? {
    return Err(ApiError::not_found("Stage"));
  }
  let stage = stages::get_stage(&conn, stage_id)?.ok_or_else(|| ApiError::not_found("Stage"))?;
  Ok(Json(stage))
}

/// DELETE /api/stages/{id}
pub async fn delete_stage(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(stage_id): Path<i64>,
) -> ApiResult<StatusCode> {
  auth.require_admin()?;
  let conn = try_lock(&state.db)?;
  if stages::stage_in_use(&conn, stage_id)? {
    return Err(ApiError::conflict("Stage has enrolled students or certificates"));
  }
  if !stages::delete_stage(&conn, stage_id)? {
    return Err(ApiError::not_found("Stage"));
  }
  Ok(StatusCode::NO_CONTENT)
}
