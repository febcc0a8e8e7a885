//! Printable student and group reports, as HTML or PDF.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use super::progress::RangeQuery;
use super::{load_group, require_group_teacher, require_student_access};
use crate::auth::AuthContext;
use crate::db::{progress, try_lock};
use crate::error::ApiResult;
use crate::reports::{self, PdfRenderer, ReportFormat};
use crate::state::AppState;
use crate::uploads;

#[derive(Deserialize)]
pub struct StudentReportQuery {
  pub from: Option<NaiveDate>,
  pub to: Option<NaiveDate>,
  #[serde(default)]
  pub format: ReportFormat,
}

#[derive(Deserialize)]
pub struct WeeklyReportQuery {
  pub week: Option<NaiveDate>,
  #[serde(default)]
  pub format: ReportFormat,
}

/// Return rendered HTML as-is, or print it to PDF first.
/// Must be called without the database lock held.
pub(crate) async fn document_response(
  state: &AppState,
  html: String,
  format: ReportFormat,
  file_stem: &str,
) -> ApiResult<Response> {
  match format {
    ReportFormat::Html => Ok(Html(html).into_response()),
    ReportFormat::Pdf => {
      let renderer = PdfRenderer::from_config(&state.config, state.render_dir());
      let pdf = renderer.render(&html).await?;
      let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
          header::CONTENT_DISPOSITION,
          uploads::content_disposition("inline", &format!("{}.pdf", file_stem)),
        ),
      ];
      Ok((headers, pdf).into_response())
    }
  }
}

/// GET /api/reports/students/{id}?from=&to=&format=
pub async fn student_report(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(student_id): Path<i64>,
  Query(query): Query<StudentReportQuery>,
) -> ApiResult<Response> {
  let range = RangeQuery {
    from: query.from,
    to: query.to,
  };
  let (from, to) = range.resolve(Utc::now().date_naive())?;

  let html = {
    let conn = try_lock(&state.db)?;
    require_student_access(&conn, &auth, student_id)?;
    let report = reports::student_report(&conn, student_id, from, to)?;
    reports::render_html(&report)?
  };
  document_response(&state, html, query.format, &format!("student-{}-{}", student_id, to)).await
}

/// GET /api/reports/groups/{id}/weekly?week=&format=
pub async fn group_weekly_report(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(group_id): Path<i64>,
  Query(query): Query<WeeklyReportQuery>,
) -> ApiResult<Response> {
  let anchor = query.week.unwrap_or_else(|| Utc::now().date_naive());
  let week_start = progress::week_start_for(anchor, state.config.week_start);

  let html = {
    let conn = try_lock(&state.db)?;
    let group = load_group(&conn, group_id)?;
    require_group_teacher(&auth, &group)?;
    let grid = progress::week_grid(&conn, group_id, week_start)?;
    reports::render_html(&reports::group_weekly_report(&group, &grid))?
  };
  document_response(&state, html, query.format, &format!("group-{}-{}", group_id, week_start)).await
}
