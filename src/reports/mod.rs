//! Printable reports and certificates.
//!
//! Each document is an askama template under `templates/reports/` with
//! inline CSS and right-to-left layout. The builders here collect the data
//! under the database lock and return a template ready to render; PDF
//! conversion happens afterwards without holding the lock.

pub mod pdf;

use askama::Template;
use chrono::{Datelike, NaiveDate, Utc, Weekday};
use rusqlite::Connection;
use serde::Deserialize;

use crate::auth::db as auth_db;
use crate::db::assignments;
use crate::db::certificates::Certificate;
use crate::db::groups::Group;
use crate::db::progress::{self, WeekGrid};
use crate::db::stages;
use crate::domain::{Grade, SubmissionStatus};
use crate::error::{ApiError, ApiResult};
use crate::filters;

pub use pdf::PdfRenderer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
  #[default]
  Html,
  Pdf,
}

pub fn arabic_weekday(day: Weekday) -> &'static str {
  match day {
    Weekday::Sat => "السبت",
    Weekday::Sun => "الأحد",
    Weekday::Mon => "الاثنين",
    Weekday::Tue => "الثلاثاء",
    Weekday::Wed => "الأربعاء",
    Weekday::Thu => "الخميس",
    Weekday::Fri => "الجمعة",
  }
}

fn page_text(page: Option<i64>) -> String {
  page.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string())
}

fn grade_text(grade: Option<Grade>) -> String {
  grade.map(|g| g.arabic_label().to_string()).unwrap_or_else(|| "-".to_string())
}

// ==================== Student Report ====================

pub struct RecordRow {
  pub date: String,
  pub weekday: &'static str,
  pub grade: String,
  pub page: String,
  pub notes: String,
}

pub struct DistributionRow {
  pub label: &'static str,
  pub count: usize,
}

pub struct AssignmentRow {
  pub title: String,
  pub group: String,
  pub status: String,
  pub grade: String,
}

#[derive(Template)]
#[template(path = "reports/student_report.html")]
pub struct StudentReport {
  pub full_name: String,
  pub username: String,
  pub stage_name: String,
  pub stage_range: String,
  pub current_page: String,
  pub completion: u8,
  pub from: String,
  pub to: String,
  pub generated_at: String,
  pub records: Vec<RecordRow>,
  pub distribution: Vec<DistributionRow>,
  pub total: usize,
  pub attended: usize,
  pub attendance_rate: String,
  pub average_score: String,
  pub assignments: Vec<AssignmentRow>,
}

pub fn student_report(
  conn: &Connection,
  student_id: i64,
  from: NaiveDate,
  to: NaiveDate,
) -> ApiResult<StudentReport> {
  let student = auth_db::get_user_by_id(conn, student_id)?.ok_or_else(|| ApiError::not_found("Student"))?;
  let progress = progress::student_progress(conn, student_id)?;
  let records = progress::student_records(conn, student_id, from, to)?;
  let summary = progress::summarize(&records);

  let assignments = assignments::list_for_student(conn, student_id, None)?
    .into_iter()
    .map(|a| AssignmentRow {
      title: a.assignment.title,
      group: a.assignment.group_name,
      status: match a.submission_status {
        Some(SubmissionStatus::Graded) => "مصحح".to_string(),
        Some(SubmissionStatus::Submitted) => "مسلّم".to_string(),
        None => "لم يسلّم".to_string(),
      },
      grade: grade_text(a.submission_grade),
    })
    .collect();

  let (stage_name, stage_range) = match &progress.stage {
    Some(stage) => (stage.name.clone(), format!("{} - {}", stage.start_page, stage.end_page)),
    None => ("-".to_string(), "-".to_string()),
  };

  Ok(StudentReport {
    full_name: student.full_name,
    username: student.username,
    stage_name,
    stage_range,
    current_page: page_text(progress.current_page),
    completion: progress.completion,
    from: from.to_string(),
    to: to.to_string(),
    generated_at: Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
    records: records
      .iter()
      .map(|r| RecordRow {
        date: r.record_date.to_string(),
        weekday: arabic_weekday(r.record_date.weekday()),
        grade: r.grade.arabic_label().to_string(),
        page: page_text(r.page_number),
        notes: r.notes.clone().unwrap_or_default(),
      })
      .collect(),
    distribution: summary
      .distribution
      .iter()
      .map(|d| DistributionRow {
        label: d.label,
        count: d.count,
      })
      .collect(),
    total: summary.total,
    attended: summary.attended,
    attendance_rate: format!("{:.1}", summary.attendance_rate),
    average_score: format!("{:.2}", summary.average_score),
    assignments,
  })
}

// ==================== Weekly Group Report ====================

pub struct DayHeader {
  pub weekday: &'static str,
  pub date: String,
}

pub struct WeeklyRow {
  pub full_name: String,
  pub stage_name: String,
  pub cells: Vec<String>,
  pub current_page: String,
  pub completion: u8,
}

#[derive(Template)]
#[template(path = "reports/group_weekly.html")]
pub struct GroupWeeklyReport {
  pub group_name: String,
  pub teacher_name: String,
  pub week_start: String,
  pub week_end: String,
  pub days: Vec<DayHeader>,
  pub rows: Vec<WeeklyRow>,
  pub generated_at: String,
}

pub fn group_weekly_report(group: &Group, grid: &WeekGrid) -> GroupWeeklyReport {
  GroupWeeklyReport {
    group_name: group.name.clone(),
    teacher_name: group.teacher_name.clone().unwrap_or_else(|| "-".to_string()),
    week_start: grid.week_start.to_string(),
    week_end: grid.dates.last().map(|d| d.to_string()).unwrap_or_default(),
    days: grid
      .dates
      .iter()
      .map(|d| DayHeader {
        weekday: arabic_weekday(d.weekday()),
        date: d.format("%m-%d").to_string(),
      })
      .collect(),
    rows: grid
      .rows
      .iter()
      .map(|row| WeeklyRow {
        full_name: row.full_name.clone(),
        stage_name: row.stage_name.clone().unwrap_or_else(|| "-".to_string()),
        cells: row
          .cells
          .iter()
          .map(|cell| match cell {
            Some(c) if c.grade.is_absent() => c.grade.arabic_label().to_string(),
            Some(c) => format!("{} ({})", c.grade.arabic_label(), page_text(c.page_number)),
            None => String::new(),
          })
          .collect(),
        current_page: page_text(row.current_page),
        completion: row.completion,
      })
      .collect(),
    generated_at: Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
  }
}

// ==================== Certificate ====================

#[derive(Template)]
#[template(path = "reports/certificate.html")]
pub struct CertificateDocument {
  pub serial: String,
  pub student_name: String,
  pub stage_name: String,
  pub start_page: i64,
  pub end_page: i64,
  pub issued_on: String,
}

pub fn certificate_document(conn: &Connection, certificate: &Certificate) -> ApiResult<CertificateDocument> {
  let stage = stages::get_stage(conn, certificate.stage_id)?.ok_or_else(|| ApiError::not_found("Stage"))?;
  let issued_on = certificate
    .reviewed_at
    .as_deref()
    .and_then(|ts| chrono::DateTime::parse_from_rfc3339(ts).ok())
    .map(|ts| ts.format("%Y-%m-%d").to_string())
    .unwrap_or_default();

  Ok(CertificateDocument {
    serial: format!("YQ-{:06}", certificate.id),
    student_name: certificate.student_name.clone(),
    stage_name: certificate.stage_name.clone(),
    start_page: stage.start_page,
    end_page: stage.end_page,
    issued_on,
  })
}

/// Render a template to an HTML string
pub fn render_html<T: Template>(template: &T) -> ApiResult<String> {
  template
    .render()
    .map_err(|e| ApiError::Internal(format!("Template rendering failed: {}", e)))
}
