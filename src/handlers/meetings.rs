//! Scheduled online sessions for a group.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{load_group, require_group_teacher};
use crate::auth::AuthContext;
use crate::db::meetings::{self as meetings_db, Meeting, MeetingScope, NewMeeting, MAX_DURATION_MINUTES};
use crate::db::try_lock;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::validation;

#[derive(Deserialize)]
pub struct MeetingRequest {
  pub group_id: i64,
  pub title: String,
  pub starts_at: String,
  pub duration_minutes: i64,
  pub link: Option<String>,
}

#[derive(Deserialize)]
pub struct MeetingFilter {
  #[serde(default)]
  pub upcoming: bool,
}

fn parse_start(raw: &str) -> ApiResult<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(raw.trim())
    .map(|ts| ts.with_timezone(&Utc))
    .map_err(|_| ApiError::bad_request("starts_at must be an RFC 3339 timestamp"))
}

/// POST /api/meetings
pub async fn create_meeting(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(req): Json<MeetingRequest>,
) -> ApiResult<(StatusCode, Json<Meeting>)> {
  auth.require_staff()?;
  let title = validation::required_line("Title", &req.title, validation::MAX_TITLE_LEN).map_err(ApiError::BadRequest)?;
  let starts_at = parse_start(&req.starts_at)?;
  if !(1..=MAX_DURATION_MINUTES).contains(&req.duration_minutes) {
    return Err(ApiError::bad_request(format!(
      "Duration must be between 1 and {} minutes",
      MAX_DURATION_MINUTES
    )));
  }
  let link = req.link.as_deref().map(str::trim).filter(|l| !l.is_empty());
  if link.is_some_and(|l| !validation::is_valid_link(l)) {
    return Err(ApiError::bad_request("Link must be an http or https URL"));
  }

  let conn = try_lock(&state.db)?;
  let group = load_group(&conn, req.group_id)?;
  require_group_teacher(&auth, &group)?;

  let meeting = NewMeeting {
    group_id: group.id,
    title: &title,
    starts_at,
    duration_minutes: req.duration_minutes,
    link,
  };
  let id = meetings_db::create_meeting(&conn, auth.user_id, &meeting)?;
  let created = meetings_db::get_meeting(&conn, id)?.ok_or_else(|| ApiError::not_found("Meeting"))?;
  Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/meetings?upcoming=true
pub async fn list_meetings(
  State(state): State<AppState>,
  auth: AuthContext,
  Query(filter): Query<MeetingFilter>,
) -> ApiResult<Json<Vec<Meeting>>> {
  let scope = if auth.is_admin() {
    MeetingScope::All
  } else {
    MeetingScope::Member(auth.user_id)
  };
  let after = filter.upcoming.then(Utc::now);
  let conn = try_lock(&state.db)?;
  Ok(Json(meetings_db::list_meetings(&conn, scope, after)?))
}

/// DELETE /api/meetings/{id} - Creator or admin
pub async fn delete_meeting(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(meeting_id): Path<i64>,
) -> ApiResult<StatusCode> {
  let conn = try_lock(&state.db)?;
  let meeting = meetings_db::get_meeting(&conn, meeting_id)?.ok_or_else(|| ApiError::not_found("Meeting"))?;
  if !auth.is_admin() && meeting.created_by != Some(auth.user_id) {
    return Err(ApiError::forbidden("Only the creator or an admin can cancel this meeting"));
  }
  meetings_db::delete_meeting(&conn, meeting_id)?;
  Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_start_normalizes_offset() {
    let ts = parse_start("2025-03-15T20:00:00+03:00").unwrap();
    assert_eq!(ts.to_rfc3339(), "2025-03-15T17:00:00+00:00");
    assert!(parse_start("next tuesday").is_err());
  }
}
