//! Assignments, student submissions with recitation audio, and grading.

use std::io::Write;
use std::path::Path as FsPath;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use zip::write::SimpleFileOptions;

use super::{load_group, require_group_access, require_group_teacher};
use crate::auth::AuthContext;
use crate::db::assignments::{
  self as assignments_db, Assignment, AssignmentFields, AssignmentScope, StoredAudio, StudentAssignment, Submission,
};
use crate::db::groups::{self as groups_db, Group};
use crate::db::try_lock;
use crate::domain::{Grade, Role, SubmissionStatus};
use crate::error::{ApiError, ApiResult};
use crate::paths;
use crate::state::AppState;
use crate::uploads;
use crate::validation;

#[derive(Deserialize)]
pub struct AssignmentFilter {
  pub group_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct AssignmentRequest {
  pub group_id: i64,
  pub title: String,
  pub description: Option<String>,
  pub due_date: Option<NaiveDate>,
  #[serde(default)]
  pub requires_audio: bool,
}

#[derive(Deserialize)]
pub struct GradeRequest {
  pub grade: Grade,
  pub feedback: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum AssignmentListing {
  Staff(Vec<Assignment>),
  Student(Vec<StudentAssignment>),
}

#[derive(Serialize)]
pub struct AssignmentDetail {
  #[serde(flatten)]
  pub assignment: Assignment,
  /// The caller's own submission, for students
  pub own_submission: Option<Submission>,
}

fn load_assignment(conn: &Connection, assignment_id: i64) -> ApiResult<Assignment> {
  assignments_db::get_assignment(conn, assignment_id)?.ok_or_else(|| ApiError::not_found("Assignment"))
}

fn load_submission(conn: &Connection, submission_id: i64) -> ApiResult<Submission> {
  assignments_db::get_submission(conn, submission_id)?.ok_or_else(|| ApiError::not_found("Submission"))
}

/// Load the assignment's group and require its teacher or an admin
fn require_owner(conn: &Connection, auth: &AuthContext, assignment: &Assignment) -> ApiResult<Group> {
  let group = load_group(conn, assignment.group_id)?;
  require_group_teacher(auth, &group)?;
  Ok(group)
}

struct ValidAssignment {
  title: String,
  description: Option<String>,
}

fn validate(req: &AssignmentRequest) -> ApiResult<ValidAssignment> {
  Ok(ValidAssignment {
    title: validation::required_line("Title", &req.title, validation::MAX_TITLE_LEN).map_err(ApiError::BadRequest)?,
    description: validation::optional_body("Description", req.description.as_deref(), validation::MAX_BODY_LEN)
      .map_err(ApiError::BadRequest)?,
  })
}

/// POST /api/assignments
pub async fn create_assignment(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(req): Json<AssignmentRequest>,
) -> ApiResult<(StatusCode, Json<Assignment>)> {
  auth.require_staff()?;
  let valid = validate(&req)?;

  let conn = try_lock(&state.db)?;
  let group = load_group(&conn, req.group_id)?;
  require_group_teacher(&auth, &group)?;

  let fields = AssignmentFields {
    group_id: group.id,
    title: &valid.title,
    description: valid.description.as_deref(),
    due_date: req.due_date,
    requires_audio: req.requires_audio,
  };
  let id = assignments_db::create_assignment(&conn, auth.user_id, &fields)?;
  tracing::info!("Assignment {} '{}' posted to group {}", id, valid.title, group.id);
  Ok((StatusCode::CREATED, Json(load_assignment(&conn, id)?)))
}

/// GET /api/assignments?group_id=
pub async fn list_assignments(
  State(state): State<AppState>,
  auth: AuthContext,
  Query(filter): Query<AssignmentFilter>,
) -> ApiResult<Json<AssignmentListing>> {
  let conn = try_lock(&state.db)?;
  let listing = match auth.role {
    Role::Student => AssignmentListing::Student(assignments_db::list_for_student(
      &conn,
      auth.user_id,
      filter.group_id,
    )?),
    Role::Teacher => AssignmentListing::Staff(assignments_db::list_assignments(
      &conn,
      AssignmentScope::Teacher(auth.user_id),
      filter.group_id,
    )?),
    Role::Admin => AssignmentListing::Staff(assignments_db::list_assignments(
      &conn,
      AssignmentScope::All,
      filter.group_id,
    )?),
  };
  Ok(Json(listing))
}

/// GET /api/assignments/{id}
pub async fn get_assignment(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(assignment_id): Path<i64>,
) -> ApiResult<Json<AssignmentDetail>> {
  let conn = try_lock(&state.db)?;
  let assignment = load_assignment(&conn, assignment_id)?;
  let group = load_group(&conn, assignment.group_id)?;
  require_group_access(&conn, &auth, &group)?;

  let own_submission = if auth.role == Role::Student {
    assignments_db::get_student_submission(&conn, assignment_id, auth.user_id)?
  } else {
    None
  };
  Ok(Json(AssignmentDetail {
    assignment,
    own_submission,
  }))
}

/// PUT /api/assignments/{id}
pub async fn update_assignment(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(assignment_id): Path<i64>,
  Json(req): Json<AssignmentRequest>,
) -> ApiResult<Json<Assignment>> {
  auth.require_staff()?;
  let valid = validate(&req)?;

  let conn = try_lock(&state.db)?;
  let assignment = load_assignment(&conn, assignment_id)?;
  require_owner(&conn, &auth, &assignment)?;
  if req.group_id != assignment.group_id {
    let target = load_group(&conn, req.group_id)?;
    require_group_teacher(&auth, &target)?;
  }

  let fields = AssignmentFields {
    group_id: req.group_id,
    title: &valid.title,
    description: valid.description.as_deref(),
    due_date: req.due_date,
    requires_audio: req.requires_audio,
  };
  assignments_db::update_assignment(&conn, assignment_id, &fields)?;
  Ok(Json(load_assignment(&conn, assignment_id)?))
}

/// DELETE /api/assignments/{id} - Also removes audio no longer referenced
pub async fn delete_assignment(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(assignment_id): Path<i64>,
) -> ApiResult<StatusCode> {
  auth.require_staff()?;
  let conn = try_lock(&state.db)?;
  let assignment = load_assignment(&conn, assignment_id)?;
  require_owner(&conn, &auth, &assignment)?;

  let audio_paths = assignments_db::delete_assignment(&conn, assignment_id)?;
  for path in &audio_paths {
    let in_use = assignments_db::audio_in_use(&conn, path)?;
    uploads::remove_if_unused(state.uploads_dir(), path, in_use);
  }
  tracing::info!("Deleted assignment {} ({} audio files released)", assignment_id, audio_paths.len());
  Ok(StatusCode::NO_CONTENT)
}

// ==================== Submissions ====================

/// POST /api/assignments/{id}/submissions - multipart `content` and optional `audio`
pub async fn submit(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(assignment_id): Path<i64>,
  mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Submission>)> {
  auth.require_role(Role::Student)?;
  let mut form = uploads::read_form(&mut multipart, state.config.max_audio_bytes).await?;
  let content = validation::optional_body("Content", form.text("content"), validation::MAX_BODY_LEN)
    .map_err(ApiError::BadRequest)?;
  let audio = form.take_file("audio");

  // Store and record under one lock; shared files are cleaned up under it too
  let conn = try_lock(&state.db)?;
  let assignment = load_assignment(&conn, assignment_id)?;
  if !groups_db::is_member(&conn, assignment.group_id, auth.user_id)? {
    return Err(ApiError::forbidden("This assignment is not for your group"));
  }
  let existing = assignments_db::get_student_submission(&conn, assignment_id, auth.user_id)?;
  if existing.is_some_and(|s| s.status == SubmissionStatus::Graded) {
    return Err(ApiError::conflict("Your submission has already been graded"));
  }
  if assignment.requires_audio && audio.is_none() {
    return Err(ApiError::bad_request("This assignment requires an audio recitation"));
  }
  if content.is_none() && audio.is_none() {
    return Err(ApiError::bad_request("Submission is empty"));
  }
  let audio_format = audio.as_ref().map(uploads::audio_format).transpose()?;

  let stored = match (&audio, audio_format) {
    (Some(file), Some((ext, mime))) => {
      let path = uploads::store(state.uploads_dir(), paths::AUDIO_SUBDIR, &file.bytes, ext)?;
      Some(StoredAudio {
        path,
        mime: mime.to_string(),
      })
    }
    _ => None,
  };

  let late = assignment.is_late_on(Utc::now().date_naive());
  let saved = assignments_db::save_submission(
    &conn,
    assignment_id,
    auth.user_id,
    content.as_deref(),
    stored.as_ref(),
    late,
  )?;

  let Some((submission_id, replaced)) = saved else {
    if let Some(audio) = &stored {
      let in_use = assignments_db::audio_in_use(&conn, &audio.path)?;
      uploads::remove_if_unused(state.uploads_dir(), &audio.path, in_use);
    }
    return Err(ApiError::conflict("Your submission has already been graded"));
  };
  if let Some(old) = replaced {
    let in_use = assignments_db::audio_in_use(&conn, &old)?;
    uploads::remove_if_unused(state.uploads_dir(), &old, in_use);
  }

  tracing::info!(
    "Student {} submitted assignment {}{}",
    auth.user_id,
    assignment_id,
    if late { " (late)" } else { "" }
  );
  Ok((StatusCode::CREATED, Json(load_submission(&conn, submission_id)?)))
}

/// GET /api/assignments/{id}/submissions
pub async fn list_submissions(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(assignment_id): Path<i64>,
) -> ApiResult<Json<Vec<Submission>>> {
  let conn = try_lock(&state.db)?;
  let assignment = load_assignment(&conn, assignment_id)?;
  require_owner(&conn, &auth, &assignment)?;
  Ok(Json(assignments_db::list_submissions(&conn, assignment_id)?))
}

/// POST /api/submissions/{id}/grade
pub async fn grade_submission(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(submission_id): Path<i64>,
  Json(req): Json<GradeRequest>,
) -> ApiResult<Json<Submission>> {
  auth.require_staff()?;
  if req.grade.is_absent() {
    return Err(ApiError::bad_request("'absent' is not a submission grade"));
  }
  let feedback = validation::optional_body("Feedback", req.feedback.as_deref(), validation::MAX_BODY_LEN)
    .map_err(ApiError::BadRequest)?;

  let conn = try_lock(&state.db)?;
  let submission = load_submission(&conn, submission_id)?;
  let assignment = load_assignment(&conn, submission.assignment_id)?;
  require_owner(&conn, &auth, &assignment)?;

  assignments_db::grade_submission(&conn, submission_id, req.grade, feedback.as_deref(), auth.user_id)?;
  Ok(Json(load_submission(&conn, submission_id)?))
}

/// GET /api/submissions/{id}/audio
pub async fn submission_audio(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(submission_id): Path<i64>,
) -> ApiResult<Response> {
  let conn = try_lock(&state.db)?;
  let submission = load_submission(&conn, submission_id)?;
  if submission.student_id != auth.user_id {
    let assignment = load_assignment(&conn, submission.assignment_id)?;
    require_owner(&conn, &auth, &assignment)?;
  }
  drop(conn);

  let path = submission.audio_path.ok_or_else(|| ApiError::not_found("Audio"))?;
  let mime = submission.audio_mime.unwrap_or_else(|| "application/octet-stream".to_string());
  let name = format!("submission-{}.{}", submission_id, extension(&path));
  uploads::file_response(state.uploads_dir(), &path, &mime, "inline", &name)
}

/// GET /api/assignments/{id}/submissions/archive - ZIP of audio plus a CSV index
pub async fn archive(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(assignment_id): Path<i64>,
) -> ApiResult<Response> {
  let submissions = {
    let conn = try_lock(&state.db)?;
    let assignment = load_assignment(&conn, assignment_id)?;
    require_owner(&conn, &auth, &assignment)?;
    assignments_db::list_submissions(&conn, assignment_id)?
  };

  let bytes = build_archive(state.uploads_dir(), &submissions)?;
  tracing::debug!("Built archive for assignment {} ({} bytes)", assignment_id, bytes.len());

  let headers = [
    (header::CONTENT_TYPE, "application/zip".to_string()),
    (
      header::CONTENT_DISPOSITION,
      uploads::content_disposition("attachment", &format!("assignment-{}-submissions.zip", assignment_id)),
    ),
  ];
  Ok((headers, bytes).into_response())
}

fn extension(path: &str) -> &str {
  path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("bin")
}

fn csv_quote(s: &str) -> String {
  if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
    format!("\"{}\"", s.replace('"', "\"\""))
  } else {
    s.to_string()
  }
}

fn zip_error(e: zip::result::ZipError) -> ApiError {
  ApiError::Internal(format!("Failed to build archive: {}", e))
}

/// Zip each submission's audio as `audio/<id>-<name>.<ext>` with a
/// `submissions.csv` index. Missing files are listed without audio.
pub fn build_archive(uploads_root: &FsPath, submissions: &[Submission]) -> ApiResult<Vec<u8>> {
  let mut index = String::from("submission_id,student,status,late,grade,submitted_at,audio_file,content\n");
  let mut buffer = Vec::new();
  {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buffer));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for submission in submissions {
      let mut entry_name = String::new();
      if let Some(path) = &submission.audio_path {
        let bytes = uploads::resolve(uploads_root, path).and_then(|p| std::fs::read(p).ok());
        match bytes {
          Some(bytes) => {
            entry_name = format!(
              "audio/{}-{}.{}",
              submission.id,
              uploads::sanitize_file_name(&submission.student_name).replace(' ', "_"),
              extension(path)
            );
            zip.start_file(entry_name.as_str(), options).map_err(zip_error)?;
            zip.write_all(&bytes)?;
          }
          None => tracing::warn!("Audio {} of submission {} is missing", path, submission.id),
        }
      }

      index.push_str(&format!(
        "{},{},{},{},{},{},{},{}\n",
        submission.id,
        csv_quote(&submission.student_name),
        submission.status,
        submission.late,
        submission.grade.map(|g| g.as_str()).unwrap_or(""),
        submission.submitted_at,
        csv_quote(&entry_name),
        csv_quote(submission.content.as_deref().unwrap_or(""))
      ));
    }

    zip.start_file("submissions.csv", options).map_err(zip_error)?;
    zip.write_all(index.as_bytes())?;
    zip.finish().map_err(zip_error)?;
  }
  Ok(buffer)
}
