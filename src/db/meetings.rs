//! Scheduled online meetings for groups.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::Serialize;

use super::now_rfc3339;

/// Longest meeting accepted, in minutes
pub const MAX_DURATION_MINUTES: i64 = 480;

#[derive(Debug, Clone, Serialize)]
pub struct Meeting {
    pub id: i64,
    pub group_id: i64,
    pub group_name: String,
    pub created_by: Option<i64>,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub link: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewMeeting<'a> {
    pub group_id: i64,
    pub title: &'a str,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub link: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingScope {
    All,
    /// Meetings of groups the user teaches or belongs to
    Member(i64),
}

const MEETING_SELECT: &str = r#"
    SELECT m.id, m.group_id, g.name, m.created_by, m.title, m.starts_at,
           m.duration_minutes, m.link, m.created_at
    FROM meetings m
    JOIN study_groups g ON g.id = m.group_id
"#;

fn meeting_from_row(row: &Row<'_>) -> Result<Meeting> {
    Ok(Meeting {
        id: row.get(0)?,
        group_id: row.get(1)?,
        group_name: row.get(2)?,
        created_by: row.get(3)?,
        title: row.get(4)?,
        starts_at: row.get(5)?,
        duration_minutes: row.get(6)?,
        link: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub fn create_meeting(conn: &Connection, created_by: i64, meeting: &NewMeeting<'_>) -> Result<i64> {
    conn.execute(
        r#"INSERT INTO meetings (group_id, created_by, title, starts_at, duration_minutes, link, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
        params![
            meeting.group_id,
            created_by,
            meeting.title,
            meeting.starts_at,
            meeting.duration_minutes,
            meeting.link,
            now_rfc3339()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_meeting(conn: &Connection, meeting_id: i64) -> Result<Option<Meeting>> {
    conn.query_row(
        &format!("{} WHERE m.id = ?1", MEETING_SELECT),
        params![meeting_id],
        meeting_from_row,
    )
    .optional()
}

/// Meetings ordered by start time. With `after`, only those still running
/// or starting later are returned.
pub fn list_meetings(
    conn: &Connection,
    scope: MeetingScope,
    after: Option<DateTime<Utc>>,
) -> Result<Vec<Meeting>> {
    let user_id = match scope {
        MeetingScope::All => None,
        MeetingScope::Member(id) => Some(id),
    };
    let mut stmt = conn.prepare(&format!(
        r#"{} WHERE (?1 IS NULL
                     OR m.group_id IN (SELECT group_id FROM group_members WHERE student_id = ?1)
                     OR g.teacher_id = ?1)
           ORDER BY m.starts_at, m.id"#,
        MEETING_SELECT
    ))?;
    let meetings = stmt
        .query_map(params![user_id], meeting_from_row)?
        .collect::<Result<Vec<_>>>()?;

    Ok(match after {
        Some(now) => meetings
            .into_iter()
            .filter(|m| m.starts_at + chrono::Duration::minutes(m.duration_minutes) > now)
            .collect(),
        None => meetings,
    })
}

pub fn delete_meeting(conn: &Connection, meeting_id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM meetings WHERE id = ?1", params![meeting_id])?;
    Ok(changed > 0)
}
