//! Assignments posted to groups and the students' submissions.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::Serialize;

use super::now_rfc3339;
use crate::domain::{Grade, SubmissionStatus};

#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
  pub id: i64,
  pub group_id: i64,
  pub group_name: String,
  pub teacher_id: Option<i64>,
  pub title: String,
  pub description: Option<String>,
  pub due_date: Option<NaiveDate>,
  pub requires_audio: bool,
  pub created_at: String,
  pub submission_count: i64,
  pub graded_count: i64,
}

impl Assignment {
  /// Submissions made after the due date are flagged late
  pub fn is_late_on(&self, date: NaiveDate) -> bool {
    self.due_date.is_some_and(|due| date > due)
  }
}

/// Fields a teacher sets when posting or editing an assignment
#[derive(Debug, Clone)]
pub struct AssignmentFields<'a> {
  pub group_id: i64,
  pub title: &'a str,
  pub description: Option<&'a str>,
  pub due_date: Option<NaiveDate>,
  pub requires_audio: bool,
}

/// An assignment as seen by one student
#[derive(Debug, Clone, Serialize)]
pub struct StudentAssignment {
  #[serde(flatten)]
  pub assignment: Assignment,
  pub submission_id: Option<i64>,
  pub submission_status: Option<SubmissionStatus>,
  pub submission_grade: Option<Grade>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentScope {
  All,
  Teacher(i64),
}

const ASSIGNMENT_SELECT: &str = r#"
  SELECT a.id, a.group_id, g.name, a.teacher_id, a.title, a.description,
         a.due_date, a.requires_audio, a.created_at,
         (SELECT COUNT(*) FROM submissions s WHERE s.assignment_id = a.id),
         (SELECT COUNT(*) FROM submissions s WHERE s.assignment_id = a.id AND s.status = 'graded')
  FROM assignments a
  JOIN study_groups g ON g.id = a.group_id
"#;

fn assignment_from_row(row: &Row<'_>) -> Result<Assignment> {
  Ok(Assignment {
    id: row.get(0)?,
    group_id: row.get(1)?,
    group_name: row.get(2)?,
    teacher_id: row.get(3)?,
    title: row.get(4)?,
    description: row.get(5)?,
    due_date: row.get(6)?,
    requires_audio: row.get(7)?,
    created_at: row.get(8)?,
    submission_count: row.get(9)?,
    graded_count: row.get(10)?,
  })
}

pub fn create_assignment(conn: &Connection, teacher_id: i64, fields: &AssignmentFields<'_>) -> Result<i64> {
  conn.execute(
    r#"INSERT INTO assignments (group_id, teacher_id, title, description, due_date, requires_audio, created_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
    params![
      fields.group_id,
      teacher_id,
      fields.title,
      fields.description,
      fields.due_date,
      fields.requires_audio,
      now_rfc3339()
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

pub fn update_assignment(conn: &Connection, assignment_id: i64, fields: &AssignmentFields<'_>) -> Result<bool> {
  let changed = conn.execute(
    r#"UPDATE assignments
       SET group_id = ?1, title = ?2, description = ?3, due_date = ?4, requires_audio = ?5
       WHERE id = ?6"#,
    params![
      fields.group_id,
      fields.title,
      fields.description,
      fields.due_date,
      fields.requires_audio,
      assignment_id
    ],
  )?;
  Ok(changed > 0)
}

/// Delete an assignment and its submissions.
/// Returns the audio paths the deleted submissions referenced.
pub fn delete_assignment(conn: &Connection, assignment_id: i64) -> Result<Vec<String>> {
  let tx = conn.unchecked_transaction()?;
  let paths = {
    let mut stmt =
      tx.prepare("SELECT audio_path FROM submissions WHERE assignment_id = ?1 AND audio_path IS NOT NULL")?;
    stmt
      .query_map(params![assignment_id], |row| row.get(0))?
      .collect::<Result<Vec<String>>>()?
  };
  tx.execute("DELETE FROM assignments WHERE id = ?1", params![assignment_id])?;
  tx.commit()?;
  Ok(paths)
}

pub fn get_assignment(conn: &Connection, assignment_id: i64) -> Result<Option<Assignment>> {
  conn
    .query_row(
      &format!("{} WHERE a.id = ?1", ASSIGNMENT_SELECT),
      params![assignment_id],
      assignment_from_row,
    )
    .optional()
}

/// Assignments visible to staff, optionally narrowed to one group
pub fn list_assignments(
  conn: &Connection,
  scope: AssignmentScope,
  group_id: Option<i64>,
) -> Result<Vec<Assignment>> {
  let teacher_id = match scope {
    AssignmentScope::All => None,
    AssignmentScope::Teacher(id) => Some(id),
  };
  let mut stmt = conn.prepare(&format!(
    r#"{} WHERE (?1 IS NULL OR g.teacher_id = ?1) AND (?2 IS NULL OR a.group_id = ?2)
       ORDER BY a.created_at DESC, a.id DESC"#,
    ASSIGNMENT_SELECT
  ))?;
  let assignments = stmt
    .query_map(params![teacher_id, group_id], assignment_from_row)?
    .collect::<Result<Vec<_>>>()?;
  Ok(assignments)
}

/// Assignments of the student's groups with the student's own submission
pub fn list_for_student(
  conn: &Connection,
  student_id: i64,
  group_id: Option<i64>,
) -> Result<Vec<StudentAssignment>> {
  let mut stmt = conn.prepare(&format!(
    r#"{} WHERE a.group_id IN (SELECT group_id FROM group_members WHERE student_id = ?1)
         AND (?2 IS NULL OR a.group_id = ?2)
       ORDER BY a.created_at DESC, a.id DESC"#,
    ASSIGNMENT_SELECT
  ))?;
  let assignments = stmt
    .query_map(params![student_id, group_id], assignment_from_row)?
    .collect::<Result<Vec<_>>>()?;

  let mut result = Vec::with_capacity(assignments.len());
  for assignment in assignments {
    let own = get_student_submission(conn, assignment.id, student_id)?;
    result.push(StudentAssignment {
      submission_id: own.as_ref().map(|s| s.id),
      submission_status: own.as_ref().map(|s| s.status),
      submission_grade: own.and_then(|s| s.grade),
      assignment,
    });
  }
  Ok(result)
}

/// Assignments in the student's groups with no submission yet
pub fn pending_for_student(conn: &Connection, student_id: i64) -> Result<Vec<Assignment>> {
  let mut stmt = conn.prepare(&format!(
    r#"{} WHERE a.group_id IN (SELECT group_id FROM group_members WHERE student_id = ?1)
         AND NOT EXISTS (SELECT 1 FROM submissions s WHERE s.assignment_id = a.id AND s.student_id = ?1)
       ORDER BY a.due_date IS NULL, a.due_date, a.id"#,
    ASSIGNMENT_SELECT
  ))?;
  let assignments = stmt
    .query_map(params![student_id], assignment_from_row)?
    .collect::<Result<Vec<_>>>()?;
  Ok(assignments)
}

// ==================== Submissions ====================

#[derive(Debug, Clone, Serialize)]
pub struct Submission {
  pub id: i64,
  pub assignment_id: i64,
  pub student_id: i64,
  pub student_name: String,
  pub content: Option<String>,
  #[serde(skip)]
  pub audio_path: Option<String>,
  pub audio_mime: Option<String>,
  pub has_audio: bool,
  pub status: SubmissionStatus,
  pub late: bool,
  pub grade: Option<Grade>,
  pub feedback: Option<String>,
  pub submitted_at: String,
  pub graded_at: Option<String>,
  pub graded_by: Option<i64>,
}

/// Stored audio file for a submission
#[derive(Debug, Clone)]
pub struct StoredAudio {
  pub path: String,
  pub mime: String,
}

const SUBMISSION_SELECT: &str = r#"
  SELECT s.id, s.assignment_id, s.student_id, u.full_name, s.content, s.audio_path,
         s.audio_mime, s.status, s.late, s.grade, s.feedback, s.submitted_at,
         s.graded_at, s.graded_by
  FROM submissions s
  JOIN users u ON u.id = s.student_id
"#;

fn submission_from_row(row: &Row<'_>) -> Result<Submission> {
  let audio_path: Option<String> = row.get(5)?;
  Ok(Submission {
    id: row.get(0)?,
    assignment_id: row.get(1)?,
    student_id: row.get(2)?,
    student_name: row.get(3)?,
    content: row.get(4)?,
    has_audio: audio_path.is_some(),
    audio_path,
    audio_mime: row.get(6)?,
    status: row.get(7)?,
    late: row.get(8)?,
    grade: row.get(9)?,
    feedback: row.get(10)?,
    submitted_at: row.get(11)?,
    graded_at: row.get(12)?,
    graded_by: row.get(13)?,
  })
}

/// Store or replace the student's submission while it is ungraded.
///
/// Returns None if a graded submission already exists; otherwise the
/// submission id and the audio path it replaced, if any.
pub fn save_submission(
  conn: &Connection,
  assignment_id: i64,
  student_id: i64,
  content: Option<&str>,
  audio: Option<&StoredAudio>,
  late: bool,
) -> Result<Option<(i64, Option<String>)>> {
  let tx = conn.unchecked_transaction()?;
  let existing = get_student_submission(&tx, assignment_id, student_id)?;
  if existing.as_ref().is_some_and(|s| s.status == SubmissionStatus::Graded) {
    return Ok(None);
  }

  tx.execute(
    r#"INSERT INTO submissions
         (assignment_id, student_id, content, audio_path, audio_mime, status, late, submitted_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
       ON CONFLICT(assignment_id, student_id) DO UPDATE SET
         content = excluded.content,
         audio_path = excluded.audio_path,
         audio_mime = excluded.audio_mime,
         late = excluded.late,
         submitted_at = excluded.submitted_at"#,
    params![
      assignment_id,
      student_id,
      content,
      audio.map(|a| a.path.as_str()),
      audio.map(|a| a.mime.as_str()),
      SubmissionStatus::Submitted,
      late,
      now_rfc3339()
    ],
  )?;
  let id: i64 = tx.query_row(
    "SELECT id FROM submissions WHERE assignment_id = ?1 AND student_id = ?2",
    params![assignment_id, student_id],
    |row| row.get(0),
  )?;
  tx.commit()?;

  let replaced = existing
    .and_then(|s| s.audio_path)
    .filter(|old| audio.map(|a| &a.path) != Some(old));
  Ok(Some((id, replaced)))
}

pub fn get_submission(conn: &Connection, submission_id: i64) -> Result<Option<Submission>> {
  conn
    .query_row(
      &format!("{} WHERE s.id = ?1", SUBMISSION_SELECT),
      params![submission_id],
      submission_from_row,
    )
    .optional()
}

pub fn get_student_submission(conn: &Connection, assignment_id: i64, student_id: i64) -> Result<Option<Submission>> {
  conn
    .query_row(
      &format!("{} WHERE s.assignment_id = ?1 AND s.student_id = ?2", SUBMISSION_SELECT),
      params![assignment_id, student_id],
      submission_from_row,
    )
    .optional()
}

pub fn list_submissions(conn: &Connection, assignment_id: i64) -> Result<Vec<Submission>> {
  let mut stmt = conn.prepare(&format!(
    "{} WHERE s.assignment_id = ?1 ORDER BY u.full_name, s.id",
    SUBMISSION_SELECT
  ))?;
  let submissions = stmt
    .query_map(params![assignment_id], submission_from_row)?
    .collect::<Result<Vec<_>>>()?;
  Ok(submissions)
}

pub fn grade_submission(
  conn: &Connection,
  submission_id: i64,
  grade: Grade,
  feedback: Option<&str>,
  grader_id: i64,
) -> Result<bool> {
  let changed = conn.execute(
    r#"UPDATE submissions SET status = ?1, grade = ?2, feedback = ?3, graded_at = ?4, graded_by = ?5
       WHERE id = ?6"#,
    params![
      SubmissionStatus::Graded,
      grade,
      feedback,
      now_rfc3339(),
      grader_id,
      submission_id
    ],
  )?;
  Ok(changed > 0)
}

/// Ungraded submissions across the teacher's groups
pub fn count_ungraded_for_teacher(conn: &Connection, teacher_id: i64) -> Result<i64> {
  conn.query_row(
    r#"SELECT COUNT(*) FROM submissions s
       JOIN assignments a ON a.id = s.assignment_id
       JOIN study_groups g ON g.id = a.group_id
       WHERE g.teacher_id = ?1 AND s.status = ?2"#,
    params![teacher_id, SubmissionStatus::Submitted],
    |row| row.get(0),
  )
}

/// Whether any submission still points at the stored file
pub fn audio_in_use(conn: &Connection, audio_path: &str) -> Result<bool> {
  conn.query_row(
    "SELECT EXISTS(SELECT 1 FROM submissions WHERE audio_path = ?1)",
    params![audio_path],
    |row| row.get(0),
  )
}
