//! Platform-wide settings (admin only).

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::db as auth_db;
use crate::auth::AuthContext;
use crate::db::try_lock;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Serialize)]
pub struct Settings {
  pub registration_open: bool,
}

#[derive(Deserialize)]
pub struct SettingsUpdate {
  pub registration_open: Option<bool>,
}

/// GET /api/settings
pub async fn get_settings(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<Settings>> {
  auth.require_admin()?;
  let conn = try_lock(&state.db)?;
  Ok(Json(Settings {
    registration_open: auth_db::is_registration_open(&conn)?,
  }))
}

/// PUT /api/settings
pub async fn update_settings(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(update): Json<SettingsUpdate>,
) -> ApiResult<Json<Settings>> {
  auth.require_admin()?;
  let conn = try_lock(&state.db)?;
  if let Some(open) = update.registration_open {
    let value = if open { "true" } else { "false" };
    auth_db::set_app_setting(&conn, auth_db::REGISTRATION_OPEN_KEY, Some(value))?;
    tracing::info!("Admin {} set registration_open = {}", auth.user_id, open);
  }
  Ok(Json(Settings {
    registration_open: auth_db::is_registration_open(&conn)?,
  }))
}
