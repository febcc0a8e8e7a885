//! Daily evaluation records, the weekly timetable grid and page tracking.
//!
//! Every (student, date) pair holds at most one record. Pages recorded
//! within the student's current stage never go backwards in date order.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use thiserror::Error;

use super::certificates::{self, Certificate};
use super::{groups, now_rfc3339, stages};
use crate::domain::{Grade, Stage};

#[derive(Debug, Clone, Serialize)]
pub struct DailyRecord {
  pub id: i64,
  pub student_id: i64,
  pub teacher_id: Option<i64>,
  pub record_date: NaiveDate,
  pub grade: Grade,
  pub page_number: Option<i64>,
  pub notes: Option<String>,
  pub updated_at: String,
}

/// A record to store for (student, date)
#[derive(Debug, Clone)]
pub struct RecordInput<'a> {
  pub student_id: i64,
  pub teacher_id: i64,
  pub date: NaiveDate,
  pub grade: Grade,
  pub page_number: Option<i64>,
  pub notes: Option<&'a str>,
}

/// Reasons a record is refused before it reaches the table
#[derive(Debug, Error)]
pub enum RecordError {
  #[error("Student is not enrolled on any stage")]
  NotEnrolled,

  #[error("Cannot record a date in the future ({0})")]
  FutureDate(NaiveDate),

  #[error("A page number is required unless the student is absent")]
  MissingPage,

  #[error("Absent records carry no page number")]
  PageOnAbsent,

  #[error("Page {page} is outside the current stage ({start}-{end})")]
  OutsideStage { page: i64, start: i64, end: i64 },

  #[error("Page {page} is behind page {recorded} recorded on {date}")]
  BehindEarlier { page: i64, recorded: i64, date: NaiveDate },

  #[error("Page {page} is ahead of page {recorded} recorded on {date}")]
  AheadOfLater { page: i64, recorded: i64, date: NaiveDate },

  #[error(transparent)]
  Database(#[from] rusqlite::Error),
}

/// Result of a successful upsert
#[derive(Debug, Serialize)]
pub struct UpsertOutcome {
  pub record: DailyRecord,
  pub current_page: Option<i64>,
  pub completion: u8,
  /// Certificate generated because the stage was just completed
  pub certificate: Option<Certificate>,
}

/// Where a student stands on their current stage
#[derive(Debug, Clone, Serialize)]
pub struct StudentProgress {
  pub stage: Option<Stage>,
  pub current_page: Option<i64>,
  pub completion: u8,
  pub completed: bool,
}

const RECORD_COLUMNS: &str =
  "id, student_id, teacher_id, record_date, grade, page_number, notes, updated_at";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<DailyRecord> {
  Ok(DailyRecord {
    id: row.get(0)?,
    student_id: row.get(1)?,
    teacher_id: row.get(2)?,
    record_date: row.get(3)?,
    grade: row.get(4)?,
    page_number: row.get(5)?,
    notes: row.get(6)?,
    updated_at: row.get(7)?,
  })
}

/// Insert or replace the record for (student, date).
///
/// `today` bounds the accepted dates. On success the student's stage
/// completion is recomputed and a pending certificate is generated when
/// the stage end has been reached for the first time.
pub fn upsert_record(
  conn: &Connection,
  input: &RecordInput<'_>,
  today: NaiveDate,
) -> Result<UpsertOutcome, RecordError> {
  if input.date > today {
    return Err(RecordError::FutureDate(input.date));
  }
  let page = match (input.grade.is_absent(), input.page_number) {
    (true, Some(_)) => return Err(RecordError::PageOnAbsent),
    (true, None) => None,
    (false, None) => return Err(RecordError::MissingPage),
    (false, Some(page)) => Some(page),
  };

  let tx = conn.unchecked_transaction()?;
  let stage = stages::ensure_student_profile(&tx, input.student_id)?.ok_or(RecordError::NotEnrolled)?;

  if let Some(page) = page {
    check_page(&tx, input.student_id, input.date, page, &stage)?;
  }

  let now = now_rfc3339();
  tx.execute(
    r#"INSERT INTO daily_records
         (student_id, teacher_id, record_date, grade, page_number, notes, created_at, updated_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
       ON CONFLICT(student_id, record_date) DO UPDATE SET
         teacher_id = excluded.teacher_id,
         grade = excluded.grade,
         page_number = excluded.page_number,
         notes = excluded.notes,
         updated_at = excluded.updated_at"#,
    params![
      input.student_id,
      input.teacher_id,
      input.date,
      input.grade,
      page,
      input.notes,
      now
    ],
  )?;

  let record = get_record(&tx, input.student_id, input.date)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
  let current = current_page(&tx, input.student_id, &stage)?;
  let certificate = certificates::generate_if_completed(&tx, input.student_id, &stage, current)?;
  tx.commit()?;

  if let Some(cert) = &certificate {
    tracing::info!(
      "Student {} completed stage {}, certificate {} pending approval",
      input.student_id,
      stage.id,
      cert.id
    );
  }

  Ok(UpsertOutcome {
    record,
    current_page: current,
    completion: stage.completion(current),
    certificate,
  })
}

/// Enforce the stage range and non-decreasing pages around `date`
fn check_page(
  conn: &Connection,
  student_id: i64,
  date: NaiveDate,
  page: i64,
  stage: &Stage,
) -> Result<(), RecordError> {
  if !stage.contains(page) {
    return Err(RecordError::OutsideStage {
      page,
      start: stage.start_page,
      end: stage.end_page,
    });
  }

  let earlier: Option<(i64, NaiveDate)> = conn
    .query_row(
      r#"SELECT page_number, record_date FROM daily_records
         WHERE student_id = ?1 AND record_date < ?2
           AND page_number BETWEEN ?3 AND ?4
         ORDER BY page_number DESC LIMIT 1"#,
      params![student_id, date, stage.start_page, stage.end_page],
      |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?;
  if let Some((recorded, on)) = earlier {
    if page < recorded {
      return Err(RecordError::BehindEarlier { page, recorded, date: on });
    }
  }

  let later: Option<(i64, NaiveDate)> = conn
    .query_row(
      r#"SELECT page_number, record_date FROM daily_records
         WHERE student_id = ?1 AND record_date > ?2
           AND page_number BETWEEN ?3 AND ?4
         ORDER BY page_number ASC LIMIT 1"#,
      params![student_id, date, stage.start_page, stage.end_page],
      |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?;
  if let Some((recorded, on)) = later {
    if page > recorded {
      return Err(RecordError::AheadOfLater { page, recorded, date: on });
    }
  }

  Ok(())
}

pub fn get_record(
  conn: &Connection,
  student_id: i64,
  date: NaiveDate,
) -> rusqlite::Result<Option<DailyRecord>> {
  conn
    .query_row(
      &format!(
        "SELECT {} FROM daily_records WHERE student_id = ?1 AND record_date = ?2",
        RECORD_COLUMNS
      ),
      params![student_id, date],
      record_from_row,
    )
    .optional()
}

pub fn delete_record(conn: &Connection, student_id: i64, date: NaiveDate) -> rusqlite::Result<bool> {
  let changed = conn.execute(
    "DELETE FROM daily_records WHERE student_id = ?1 AND record_date = ?2",
    params![student_id, date],
  )?;
  Ok(changed > 0)
}

/// Highest page recorded within the stage range
pub fn current_page(conn: &Connection, student_id: i64, stage: &Stage) -> rusqlite::Result<Option<i64>> {
  conn.query_row(
    r#"SELECT MAX(page_number) FROM daily_records
       WHERE student_id = ?1 AND page_number BETWEEN ?2 AND ?3"#,
    params![student_id, stage.start_page, stage.end_page],
    |row| row.get(0),
  )
}

pub fn student_progress(conn: &Connection, student_id: i64) -> rusqlite::Result<StudentProgress> {
  let Some(stage) = stages::get_student_stage(conn, student_id)? else {
    return Ok(StudentProgress {
      stage: None,
      current_page: None,
      completion: 0,
      completed: false,
    });
  };
  let current = current_page(conn, student_id, &stage)?;
  Ok(StudentProgress {
    completion: stage.completion(current),
    completed: stage.is_completed(current),
    current_page: current,
    stage: Some(stage),
  })
}

/// Records for a student between `from` and `to` inclusive, oldest first
pub fn student_records(
  conn: &Connection,
  student_id: i64,
  from: NaiveDate,
  to: NaiveDate,
) -> rusqlite::Result<Vec<DailyRecord>> {
  let mut stmt = conn.prepare(&format!(
    r#"SELECT {} FROM daily_records
       WHERE student_id = ?1 AND record_date BETWEEN ?2 AND ?3
       ORDER BY record_date"#,
    RECORD_COLUMNS
  ))?;
  let records = stmt
    .query_map(params![student_id, from, to], record_from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(records)
}

/// Most recent records for a student, newest first
pub fn recent_records(conn: &Connection, student_id: i64, limit: u32) -> rusqlite::Result<Vec<DailyRecord>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM daily_records WHERE student_id = ?1 ORDER BY record_date DESC LIMIT ?2",
    RECORD_COLUMNS
  ))?;
  let records = stmt
    .query_map(params![student_id, limit], record_from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(records)
}

pub fn count_records_entered_by(conn: &Connection, teacher_id: i64, date: NaiveDate) -> rusqlite::Result<i64> {
  conn.query_row(
    "SELECT COUNT(*) FROM daily_records WHERE teacher_id = ?1 AND record_date = ?2",
    params![teacher_id, date],
    |row| row.get(0),
  )
}

// ==================== Summaries ====================

#[derive(Debug, Clone, Serialize)]
pub struct GradeCount {
  pub grade: Grade,
  pub label: &'static str,
  pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordSummary {
  pub total: usize,
  pub attended: usize,
  /// Percentage of records that are not absences
  pub attendance_rate: f64,
  pub average_score: f64,
  pub distribution: Vec<GradeCount>,
}

pub fn summarize(records: &[DailyRecord]) -> RecordSummary {
  let mut counts: HashMap<Grade, usize> = HashMap::new();
  for record in records {
    *counts.entry(record.grade).or_default() += 1;
  }

  let total = records.len();
  let attended = records.iter().filter(|r| !r.grade.is_absent()).count();
  let score_sum: u32 = records.iter().map(|r| r.grade.score() as u32).sum();

  RecordSummary {
    total,
    attended,
    attendance_rate: if total > 0 {
      attended as f64 * 100.0 / total as f64
    } else {
      0.0
    },
    average_score: if total > 0 { score_sum as f64 / total as f64 } else { 0.0 },
    distribution: Grade::ALL
      .iter()
      .map(|grade| GradeCount {
        grade: *grade,
        label: grade.arabic_label(),
        count: counts.get(grade).copied().unwrap_or(0),
      })
      .collect(),
  }
}

// ==================== Timetable Grid ====================

/// First day of the week containing `date`
pub fn week_start_for(date: NaiveDate, first_day: Weekday) -> NaiveDate {
  let offset = (date.weekday().num_days_from_monday() + 7 - first_day.num_days_from_monday()) % 7;
  date - Duration::days(offset as i64)
}

#[derive(Debug, Clone, Serialize)]
pub struct GridCell {
  pub grade: Grade,
  pub page_number: Option<i64>,
  pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridRow {
  pub student_id: i64,
  pub full_name: String,
  pub stage_name: Option<String>,
  pub current_page: Option<i64>,
  pub completion: u8,
  /// One entry per day of the week, None where nothing was recorded
  pub cells: Vec<Option<GridCell>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeekGrid {
  pub group_id: i64,
  pub week_start: NaiveDate,
  pub dates: Vec<NaiveDate>,
  pub rows: Vec<GridRow>,
}

/// Student x day grid for the group's week beginning at `week_start`
pub fn week_grid(conn: &Connection, group_id: i64, week_start: NaiveDate) -> rusqlite::Result<WeekGrid> {
  let dates: Vec<NaiveDate> = (0..7).map(|d| week_start + Duration::days(d)).collect();
  let week_end = dates[6];

  let mut stmt = conn.prepare(
    r#"SELECT r.student_id, r.record_date, r.grade, r.page_number, r.notes
       FROM daily_records r
       JOIN group_members m ON m.student_id = r.student_id
       WHERE m.group_id = ?1 AND r.record_date BETWEEN ?2 AND ?3"#,
  )?;
  let mut cells: HashMap<(i64, NaiveDate), GridCell> = HashMap::new();
  let rows = stmt.query_map(params![group_id, week_start, week_end], |row| {
    Ok((
      row.get::<_, i64>(0)?,
      row.get::<_, NaiveDate>(1)?,
      GridCell {
        grade: row.get(2)?,
        page_number: row.get(3)?,
        notes: row.get(4)?,
      },
    ))
  })?;
  for row in rows {
    let (student_id, date, cell) = row?;
    cells.insert((student_id, date), cell);
  }

  let mut grid_rows = Vec::new();
  for member in groups::list_members(conn, group_id)? {
    let progress = student_progress(conn, member.student_id)?;
    grid_rows.push(GridRow {
      student_id: member.student_id,
      full_name: member.full_name,
      stage_name: progress.stage.map(|s| s.name),
      current_page: progress.current_page,
      completion: progress.completion,
      cells: dates
        .iter()
        .map(|date| cells.remove(&(member.student_id, *date)))
        .collect(),
    });
  }

  Ok(WeekGrid {
    group_id,
    week_start,
    dates,
    rows: grid_rows,
  })
}
