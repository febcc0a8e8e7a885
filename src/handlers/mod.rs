pub mod assignments;
pub mod certificates;
pub mod complaints;
pub mod dashboard;
pub mod groups;
pub mod materials;
pub mod meetings;
pub mod progress;
pub mod reports;
pub mod settings;
pub mod stages;
pub mod users;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use rusqlite::Connection;
use serde::Serialize;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::{self, db as auth_db, AuthContext};
use crate::db::groups::{self as groups_db, Group};
use crate::domain::{AccountStatus, Role};
use crate::error::{ApiError, ApiResult};
use crate::paths;
use crate::state::AppState;

/// Room for text fields around the largest accepted file
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Serialize)]
pub struct Health {
  pub status: &'static str,
}

/// GET /health
pub async fn health() -> Json<Health> {
  Json(Health { status: "ok" })
}

/// Build the full application router
pub fn router(state: AppState) -> Router {
  let body_limit = state.config.max_audio_bytes.max(state.config.max_material_bytes) + FORM_OVERHEAD_BYTES;

  let api = Router::new()
    // Auth
    .route("/auth/register", post(auth::register))
    .route("/auth/login", post(auth::login))
    .route("/auth/logout", post(auth::logout))
    .route("/auth/me", get(auth::me))
    .route("/auth/password", post(auth::change_password))
    // Users & students
    .route("/users", get(users::list_users))
    .route("/users/{id}", delete(users::delete_user))
    .route("/users/{id}/approve", post(users::approve_user))
    .route("/users/{id}/reject", post(users::reject_user))
    .route("/users/{id}/role", put(users::change_role))
    .route("/students/{id}", get(users::student_profile))
    .route("/students/{id}/stage", put(users::set_stage))
    // Stages
    .route("/stages", get(stages::list_stages).post(stages::create_stage))
    .route("/stages/{id}", put(stages::update_stage).delete(stages::delete_stage))
    // Groups
    .route("/groups", get(groups::list_groups).post(groups::create_group))
    .route(
      "/groups/{id}",
      get(groups::get_group).put(groups::update_group).delete(groups::delete_group),
    )
    .route("/groups/{id}/members", get(groups::list_members).post(groups::add_member))
    .route("/groups/{id}/members/{student_id}", delete(groups::remove_member))
    // Progress
    .route("/progress/records", put(progress::upsert_record))
    .route("/progress/records/{student_id}/{date}", delete(progress::delete_record))
    .route("/progress/timetable", get(progress::timetable))
    .route("/progress/students/{id}", get(progress::student_records))
    // Certificates
    .route(
      "/certificates",
      get(certificates::list_certificates).post(certificates::request_certificate),
    )
    .route("/certificates/{id}/approve", post(certificates::approve_certificate))
    .route("/certificates/{id}/reject", post(certificates::reject_certificate))
    .route("/certificates/{id}/render", get(certificates::render_certificate))
    // Assignments & submissions
    .route(
      "/assignments",
      get(assignments::list_assignments).post(assignments::create_assignment),
    )
    .route(
      "/assignments/{id}",
      get(assignments::get_assignment)
        .put(assignments::update_assignment)
        .delete(assignments::delete_assignment),
    )
    .route(
      "/assignments/{id}/submissions",
      get(assignments::list_submissions).post(assignments::submit),
    )
    .route("/assignments/{id}/submissions/archive", get(assignments::archive))
    .route("/submissions/{id}/grade", post(assignments::grade_submission))
    .route("/submissions/{id}/audio", get(assignments::submission_audio))
    // Materials
    .route("/materials", get(materials::list_materials).post(materials::create_material))
    .route("/materials/{id}", delete(materials::delete_material))
    .route("/materials/{id}/file", get(materials::download_file))
    // Meetings
    .route("/meetings", get(meetings::list_meetings).post(meetings::create_meeting))
    .route("/meetings/{id}", delete(meetings::delete_meeting))
    // Complaints
    .route("/complaints", get(complaints::list_complaints).post(complaints::create_complaint))
    .route("/complaints/{id}/respond", post(complaints::respond))
    // Reports
    .route("/reports/students/{id}", get(reports::student_report))
    .route("/reports/groups/{id}/weekly", get(reports::group_weekly_report))
    // Dashboard & settings
    .route("/dashboard", get(dashboard::dashboard))
    .route("/settings", get(settings::get_settings).put(settings::update_settings));

  Router::new()
    .route("/health", get(health))
    .nest("/api", api)
    .nest_service("/static", ServeDir::new(paths::STATIC_DIR))
    .layer(DefaultBodyLimit::max(body_limit))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ==================== Access helpers ====================

pub(crate) fn load_group(conn: &Connection, group_id: i64) -> ApiResult<Group> {
  groups_db::get_group(conn, group_id)?.ok_or_else(|| ApiError::not_found("Group"))
}

/// The group's own teacher, or any admin
pub(crate) fn require_group_teacher(auth: &AuthContext, group: &Group) -> ApiResult<()> {
  if auth.is_admin() || (auth.is_staff() && group.teacher_id == Some(auth.user_id)) {
    Ok(())
  } else {
    Err(ApiError::forbidden("You do not teach this group"))
  }
}

/// The account must be an approved student
pub(crate) fn require_enrolled_student(conn: &Connection, student_id: i64) -> ApiResult<()> {
  let user = auth_db::get_user_by_id(conn, student_id)?.ok_or_else(|| ApiError::not_found("Student"))?;
  if user.role != Role::Student || user.status != AccountStatus::Approved {
    return Err(ApiError::bad_request(format!("{} is not an approved student", user.username)));
  }
  Ok(())
}

/// Admins, or a teacher of one of the student's groups
pub(crate) fn require_student_teacher(conn: &Connection, auth: &AuthContext, student_id: i64) -> ApiResult<()> {
  require_enrolled_student(conn, student_id)?;
  if auth.is_admin() || (auth.is_staff() && groups_db::teaches_student(conn, auth.user_id, student_id)?) {
    Ok(())
  } else {
    Err(ApiError::forbidden("You do not teach this student"))
  }
}

/// The student themself, one of their teachers, or an admin
pub(crate) fn require_student_access(conn: &Connection, auth: &AuthContext, student_id: i64) -> ApiResult<()> {
  if auth.user_id == student_id {
    return require_enrolled_student(conn, student_id);
  }
  require_student_teacher(conn, auth, student_id)
}

/// Members and the teacher of a group, or an admin
pub(crate) fn require_group_access(conn: &Connection, auth: &AuthContext, group: &Group) -> ApiResult<()> {
  if require_group_teacher(auth, group).is_ok() || groups_db::is_member(conn, group.id, auth.user_id)? {
    Ok(())
  } else {
    Err(ApiError::forbidden("You are not part of this group"))
  }
}
