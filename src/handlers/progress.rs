//! Daily evaluation records and the weekly timetable grid.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{load_group, require_group_teacher, require_student_access, require_student_teacher};
use crate::auth::AuthContext;
use crate::db::progress::{self, DailyRecord, RecordInput, RecordSummary, UpsertOutcome, WeekGrid};
use crate::db::try_lock;
use crate::domain::{Grade, LAST_PAGE};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::validation;

/// Default span of the per-student record listing
const DEFAULT_RANGE_DAYS: i64 = 30;

#[derive(Deserialize)]
pub struct RecordRequest {
  pub student_id: i64,
  pub date: NaiveDate,
  pub grade: Grade,
  pub page_number: Option<i64>,
  pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct TimetableQuery {
  pub group_id: i64,
  pub week: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct RangeQuery {
  pub from: Option<NaiveDate>,
  pub to: Option<NaiveDate>,
}

impl RangeQuery {
  /// Inclusive (from, to), defaulting to the last 30 days
  pub fn resolve(&self, today: NaiveDate) -> ApiResult<(NaiveDate, NaiveDate)> {
    let to = self.to.unwrap_or(today);
    let from = self.from.unwrap_or(to - Duration::days(DEFAULT_RANGE_DAYS));
    if from > to {
      return Err(ApiError::bad_request("'from' must not be after 'to'"));
    }
    Ok((from, to))
  }
}

#[derive(Serialize)]
pub struct StudentRecords {
  pub student_id: i64,
  pub from: NaiveDate,
  pub to: NaiveDate,
  pub records: Vec<DailyRecord>,
  pub summary: RecordSummary,
}

/// PUT /api/progress/records - Insert or replace the (student, date) record
pub async fn upsert_record(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(req): Json<RecordRequest>,
) -> ApiResult<Json<UpsertOutcome>> {
  auth.require_staff()?;
  if let Some(page) = req.page_number {
    if !(1..=LAST_PAGE).contains(&page) {
      return Err(ApiError::bad_request(format!("Page must be between 1 and {}", LAST_PAGE)));
    }
  }
  let notes = validation::optional_body("Notes", req.notes.as_deref(), validation::MAX_BODY_LEN)
    .map_err(ApiError::BadRequest)?;

  let conn = try_lock(&state.db)?;
  require_student_teacher(&conn, &auth, req.student_id)?;

  let input = RecordInput {
    student_id: req.student_id,
    teacher_id: auth.user_id,
    date: req.date,
    grade: req.grade,
    page_number: req.page_number,
    notes: notes.as_deref(),
  };
  let outcome = progress::upsert_record(&conn, &input, Utc::now().date_naive())?;
  tracing::debug!(
    "Recorded {} for student {} on {} (page {:?})",
    req.grade,
    req.student_id,
    req.date,
    req.page_number
  );
  Ok(Json(outcome))
}

/// DELETE /api/progress/records/{student_id}/{date}
pub async fn delete_record(
  State(state): State<AppState>,
  auth: AuthContext,
  Path((student_id, date)): Path<(i64, NaiveDate)>,
) -> ApiResult<StatusCode> {
  auth.require_staff()?;
  let conn = try_lock(&state.db)?;
  require_student_teacher(&conn, &auth, student_id)?;
  if !progress::delete_record(&conn, student_id, date)? {
    return Err(ApiError::not_found("Record"));
  }
  Ok(StatusCode::NO_CONTENT)
}

/// GET /api/progress/timetable?group_id=&week=
pub async fn timetable(
  State(state): State<AppState>,
  auth: AuthContext,
  Query(query): Query<TimetableQuery>,
) -> ApiResult<Json<WeekGrid>> {
  let conn = try_lock(&state.db)?;
  let group = load_group(&conn, query.group_id)?;
  require_group_teacher(&auth, &group)?;

  let anchor = query.week.unwrap_or_else(|| Utc::now().date_naive());
  let week_start = progress::week_start_for(anchor, state.config.week_start);
  Ok(Json(progress::week_grid(&conn, group.id, week_start)?))
}

/// GET /api/progress/students/{id}?from=&to=
pub async fn student_records(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(student_id): Path<i64>,
  Query(range): Query<RangeQuery>,
) -> ApiResult<Json<StudentRecords>> {
  let (from, to) = range.resolve(Utc::now().date_naive())?;
  let conn = try_lock(&state.db)?;
  require_student_access(&conn, &auth, student_id)?;

  let records = progress::student_records(&conn, student_id, from, to)?;
  let summary = progress::summarize(&records);
  Ok(Json(StudentRecords {
    student_id,
    from,
    to,
    records,
    summary,
  }))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
  }

  #[test]
  fn test_range_defaults_to_last_thirty_days() {
    let range = RangeQuery { from: None, to: None };
    let (from, to) = range.resolve(day("2025-03-31")).unwrap();
    assert_eq!(to, day("2025-03-31"));
    assert_eq!(from, day("2025-03-01"));
  }

  #[test]
  fn test_range_rejects_inverted_bounds() {
    let range = RangeQuery {
      from: Some(day("2025-04-01")),
      to: Some(day("2025-03-01")),
    };
    assert!(range.resolve(day("2025-04-10")).is_err());
  }
}
