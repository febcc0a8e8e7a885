//! Study groups (halaqat) and their membership.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub teacher_id: Option<i64>,
    pub teacher_name: Option<String>,
    pub student_count: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupMember {
    pub student_id: i64,
    pub username: String,
    pub full_name: String,
    pub added_at: String,
}

/// Which groups a listing should return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupScope {
    All,
    /// Groups led by this teacher
    Teacher(i64),
    /// Groups this student belongs to
    Student(i64),
}

const GROUP_SELECT: &str = r#"
    SELECT g.id, g.name, g.description, g.teacher_id, t.full_name,
           (SELECT COUNT(*) FROM group_members m WHERE m.group_id = g.id),
           g.created_at
    FROM study_groups g
    LEFT JOIN users t ON t.id = g.teacher_id
"#;

fn group_from_row(row: &Row<'_>) -> Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        teacher_id: row.get(3)?,
        teacher_name: row.get(4)?,
        student_count: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn create_group(
    conn: &Connection,
    name: &str,
    description: Option<&str>,
    teacher_id: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO study_groups (name, description, teacher_id, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![name, description, teacher_id, Utc::now().to_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_group(
    conn: &Connection,
    group_id: i64,
    name: &str,
    description: Option<&str>,
    teacher_id: i64,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE study_groups SET name = ?1, description = ?2, teacher_id = ?3 WHERE id = ?4",
        params![name, description, teacher_id, group_id],
    )?;
    Ok(changed > 0)
}

pub fn delete_group(conn: &Connection, group_id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM study_groups WHERE id = ?1", params![group_id])?;
    Ok(changed > 0)
}

pub fn get_group(conn: &Connection, group_id: i64) -> Result<Option<Group>> {
    conn.query_row(
        &format!("{} WHERE g.id = ?1", GROUP_SELECT),
        params![group_id],
        group_from_row,
    )
    .optional()
}

pub fn list_groups(conn: &Connection, scope: GroupScope) -> Result<Vec<Group>> {
    let (filter, id) = match scope {
        GroupScope::All => ("?1 IS NULL", None),
        GroupScope::Teacher(id) => ("g.teacher_id = ?1", Some(id)),
        GroupScope::Student(id) => (
            "g.id IN (SELECT group_id FROM group_members WHERE student_id = ?1)",
            Some(id),
        ),
    };
    let mut stmt = conn.prepare(&format!(
        "{} WHERE {} ORDER BY g.name, g.id",
        GROUP_SELECT, filter
    ))?;
    let groups = stmt
        .query_map(params![id], group_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(groups)
}

// ==================== Membership ====================

pub fn add_member(conn: &Connection, group_id: i64, student_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO group_members (group_id, student_id, added_at) VALUES (?1, ?2, ?3)",
        params![group_id, student_id, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

pub fn remove_member(conn: &Connection, group_id: i64, student_id: i64) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM group_members WHERE group_id = ?1 AND student_id = ?2",
        params![group_id, student_id],
    )?;
    Ok(changed > 0)
}

pub fn list_members(conn: &Connection, group_id: i64) -> Result<Vec<GroupMember>> {
    let mut stmt = conn.prepare(
        r#"SELECT u.id, u.username, u.full_name, m.added_at
           FROM group_members m
           JOIN users u ON u.id = m.student_id
           WHERE m.group_id = ?1
           ORDER BY u.full_name, u.id"#,
    )?;
    let members = stmt
        .query_map(params![group_id], |row| {
            Ok(GroupMember {
                student_id: row.get(0)?,
                username: row.get(1)?,
                full_name: row.get(2)?,
                added_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>>>()?;
    Ok(members)
}

pub fn is_member(conn: &Connection, group_id: i64, student_id: i64) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM group_members WHERE group_id = ?1 AND student_id = ?2)",
        params![group_id, student_id],
        |row| row.get(0),
    )
}

/// Whether the teacher leads a group the student belongs to
pub fn teaches_student(conn: &Connection, teacher_id: i64, student_id: i64) -> Result<bool> {
    conn.query_row(
        r#"SELECT EXISTS(
             SELECT 1 FROM group_members m
             JOIN study_groups g ON g.id = m.group_id
             WHERE g.teacher_id = ?1 AND m.student_id = ?2)"#,
        params![teacher_id, student_id],
        |row| row.get(0),
    )
}
