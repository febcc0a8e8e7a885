//! Role-specific dashboard summaries

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, Result};
use serde::Serialize;

use super::assignments::{self, Assignment};
use super::groups::{self, Group, GroupScope};
use super::meetings::{self, Meeting, MeetingScope};
use super::progress::{self, DailyRecord, StudentProgress};
use super::{certificates, complaints};
use crate::auth::db as auth_db;
use crate::domain::Role;

/// Upcoming meetings shown on a dashboard
const DASHBOARD_MEETINGS: usize = 5;
/// Latest daily records shown to a student
const RECENT_GRADES: u32 = 7;

#[derive(Debug, Clone, Serialize)]
pub struct AdminSummary {
  pub pending_users: i64,
  pub pending_certificates: i64,
  pub open_complaints: i64,
  pub students: i64,
  pub teachers: i64,
  pub groups: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeacherSummary {
  pub groups: Vec<Group>,
  pub ungraded_submissions: i64,
  pub upcoming_meetings: Vec<Meeting>,
  pub records_today: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentSummary {
  pub progress: StudentProgress,
  pub pending_assignments: Vec<Assignment>,
  pub recent_grades: Vec<DailyRecord>,
  pub upcoming_meetings: Vec<Meeting>,
}

pub fn admin_summary(conn: &Connection) -> Result<AdminSummary> {
  let groups: i64 = conn.query_row("SELECT COUNT(*) FROM study_groups", [], |row| row.get(0))?;
  Ok(AdminSummary {
    pending_users: auth_db::count_pending(conn)?,
    pending_certificates: certificates::count_pending(conn)?,
    open_complaints: complaints::count_open(conn)?,
    students: auth_db::count_approved(conn, Role::Student)?,
    teachers: auth_db::count_approved(conn, Role::Teacher)?,
    groups,
  })
}

pub fn teacher_summary(
  conn: &Connection,
  teacher_id: i64,
  today: NaiveDate,
  now: DateTime<Utc>,
) -> Result<TeacherSummary> {
  Ok(TeacherSummary {
    groups: groups::list_groups(conn, GroupScope::Teacher(teacher_id))?,
    ungraded_submissions: assignments::count_ungraded_for_teacher(conn, teacher_id)?,
    upcoming_meetings: upcoming(conn, teacher_id, now)?,
    records_today: progress::count_records_entered_by(conn, teacher_id, today)?,
  })
}

pub fn student_summary(conn: &Connection, student_id: i64, now: DateTime<Utc>) -> Result<StudentSummary> {
  Ok(StudentSummary {
    progress: progress::student_progress(conn, student_id)?,
    pending_assignments: assignments::pending_for_student(conn, student_id)?,
    recent_grades: progress::recent_records(conn, student_id, RECENT_GRADES)?,
    upcoming_meetings: upcoming(conn, student_id, now)?,
  })
}

fn upcoming(conn: &Connection, user_id: i64, now: DateTime<Utc>) -> Result<Vec<Meeting>> {
  let mut list = meetings::list_meetings(conn, MeetingScope::Member(user_id), Some(now))?;
  list.truncate(DASHBOARD_MEETINGS);
  Ok(list)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::db::progress::{upsert_record, RecordInput};
  use crate::domain::Grade;
  use crate::testing::TestEnv;

  #[test]
  fn test_admin_summary_counts() {
    let env = TestEnv::new().unwrap();
    let teacher = env.approved_user("teacher", Role::Teacher);
    let student = env.approved_user("student", Role::Student);
    env.group_with("Halaqa", teacher, &[student]);
    complaints::create_complaint(&env.conn, student, "Hello", "World").unwrap();

    let summary = admin_summary(&env.conn).unwrap();
    assert_eq!(summary.students, 1);
    assert_eq!(summary.teachers, 1);
    assert_eq!(summary.groups, 1);
    assert_eq!(summary.open_complaints, 1);
    assert_eq!(summary.pending_users, 0);
    assert_eq!(summary.pending_certificates, 0);
  }

  #[test]
  fn test_teacher_and_student_summaries() {
    let env = TestEnv::new().unwrap();
    let teacher = env.approved_user("teacher", Role::Teacher);
    let student = env.approved_user("student", Role::Student);
    env.group_with("Halaqa", teacher, &[student]);
    let today = Utc::now().date_naive();

    let input = RecordInput {
      student_id: student,
      teacher_id: teacher,
      date: today,
      grade: Grade::Excellent,
      page_number: Some(12),
      notes: None,
    };
    upsert_record(&env.conn, &input, today).unwrap();

    let teacher_view = teacher_summary(&env.conn, teacher, today, Utc::now()).unwrap();
    assert_eq!(teacher_view.groups.len(), 1);
    assert_eq!(teacher_view.records_today, 1);
    assert_eq!(teacher_view.ungraded_submissions, 0);

    let student_view = student_summary(&env.conn, student, Utc::now()).unwrap();
    assert_eq!(student_view.progress.current_page, Some(12));
    assert_eq!(student_view.recent_grades.len(), 1);
    assert!(student_view.pending_assignments.is_empty());
  }
}
