//! Complaints and suggestions raised by users, answered by admins.

use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::Serialize;

use super::now_rfc3339;
use crate::domain::ComplaintStatus;

#[derive(Debug, Clone, Serialize)]
pub struct Complaint {
  pub id: i64,
  pub user_id: i64,
  pub user_name: String,
  pub subject: String,
  pub body: String,
  pub status: ComplaintStatus,
  pub response: Option<String>,
  pub responded_by: Option<i64>,
  pub created_at: String,
  pub resolved_at: Option<String>,
}

const COMPLAINT_SELECT: &str = r#"
  SELECT c.id, c.user_id, u.full_name, c.subject, c.body, c.status,
         c.response, c.responded_by, c.created_at, c.resolved_at
  FROM complaints c
  JOIN users u ON u.id = c.user_id
"#;

fn complaint_from_row(row: &Row<'_>) -> Result<Complaint> {
  Ok(Complaint {
    id: row.get(0)?,
    user_id: row.get(1)?,
    user_name: row.get(2)?,
    subject: row.get(3)?,
    body: row.get(4)?,
    status: row.get(5)?,
    response: row.get(6)?,
    responded_by: row.get(7)?,
    created_at: row.get(8)?,
    resolved_at: row.get(9)?,
  })
}

pub fn create_complaint(conn: &Connection, user_id: i64, subject: &str, body: &str) -> Result<i64> {
  conn.execute(
    "INSERT INTO complaints (user_id, subject, body, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
    params![user_id, subject, body, ComplaintStatus::Open, now_rfc3339()],
  )?;
  Ok(conn.last_insert_rowid())
}

pub fn get_complaint(conn: &Connection, complaint_id: i64) -> Result<Option<Complaint>> {
  conn
    .query_row(
      &format!("{} WHERE c.id = ?1", COMPLAINT_SELECT),
      params![complaint_id],
      complaint_from_row,
    )
    .optional()
}

/// `user_id` of None lists everyone's complaints
pub fn list_complaints(
  conn: &Connection,
  user_id: Option<i64>,
  status: Option<ComplaintStatus>,
) -> Result<Vec<Complaint>> {
  let mut stmt = conn.prepare(&format!(
    r#"{} WHERE (?1 IS NULL OR c.user_id = ?1) AND (?2 IS NULL OR c.status = ?2)
       ORDER BY c.created_at DESC, c.id DESC"#,
    COMPLAINT_SELECT
  ))?;
  let complaints = stmt
    .query_map(params![user_id, status], complaint_from_row)?
    .collect::<Result<Vec<_>>>()?;
  Ok(complaints)
}

/// Store the admin's answer and resolve the complaint
pub fn respond(conn: &Connection, complaint_id: i64, admin_id: i64, response: &str) -> Result<bool> {
  let changed = conn.execute(
    r#"UPDATE complaints SET response = ?1, responded_by = ?2, status = ?3, resolved_at = ?4
       WHERE id = ?5"#,
    params![response, admin_id, ComplaintStatus::Resolved, now_rfc3339(), complaint_id],
  )?;
  Ok(changed > 0)
}

pub fn count_open(conn: &Connection) -> Result<i64> {
  conn.query_row(
    "SELECT COUNT(*) FROM complaints WHERE status = ?1",
    params![ComplaintStatus::Open],
    |row| row.get(0),
  )
}
