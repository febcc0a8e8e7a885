use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::auth::AuthContext;
use crate::db::stats::{self, AdminSummary, StudentSummary, TeacherSummary};
use crate::db::try_lock;
use crate::domain::Role;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Dashboard {
  Admin(AdminSummary),
  Teacher(TeacherSummary),
  Student(StudentSummary),
}

/// GET /api/dashboard - Summary for the caller's role
pub async fn dashboard(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<Dashboard>> {
  let now = Utc::now();
  let conn = try_lock(&state.db)?;
  let dashboard = match auth.role {
    Role::Admin => Dashboard::Admin(stats::admin_summary(&conn)?),
    Role::Teacher => Dashboard::Teacher(stats::teacher_summary(&conn, auth.user_id, now.date_naive(), now)?),
    Role::Student => Dashboard::Student(stats::student_summary(&conn, auth.user_id, now)?),
  };
  Ok(Json(dashboard))
}
