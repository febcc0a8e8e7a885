//! Curriculum stages and student enrollment.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use crate::domain::Stage;

/// Default curriculum: six stages of five juz each, in mushaf order.
const DEFAULT_STAGES: [(&str, i64, i64); 6] = [
  ("المرحلة الأولى: الأجزاء 1-5", 1, 101),
  ("المرحلة الثانية: الأجزاء 6-10", 102, 200),
  ("المرحلة الثالثة: الأجزاء 11-15", 201, 301),
  ("المرحلة الرابعة: الأجزاء 16-20", 302, 401),
  ("المرحلة الخامسة: الأجزاء 21-25", 402, 501),
  ("المرحلة السادسة: الأجزاء 26-30", 502, 604),
];

const STAGE_COLUMNS: &str = "id, name, start_page, end_page, sort_order";

fn stage_from_row(row: &Row<'_>) -> Result<Stage> {
  Ok(Stage {
    id: row.get(0)?,
    name: row.get(1)?,
    start_page: row.get(2)?,
    end_page: row.get(3)?,
    sort_order: row.get(4)?,
  })
}

/// Seed the default stages if the table is empty (idempotent)
pub fn seed_default_stages(conn: &Connection) -> Result<()> {
  let count: i64 = conn.query_row("SELECT COUNT(*) FROM stages", [], |row| row.get(0))?;
  if count > 0 {
    return Ok(());
  }

  let now = Utc::now().to_rfc3339();
  for (order, (name, start, end)) in DEFAULT_STAGES.iter().enumerate() {
    conn.execute(
      "INSERT INTO stages (name, start_page, end_page, sort_order, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
      params![name, start, end, order as i64 + 1, now],
    )?;
  }
  tracing::info!("Seeded {} default stages", DEFAULT_STAGES.len());
  Ok(())
}

pub fn list_stages(conn: &Connection) -> Result<Vec<Stage>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM stages ORDER BY sort_order, id",
    STAGE_COLUMNS
  ))?;
  let stages = stmt
    .query_map([], stage_from_row)?
    .collect::<Result<Vec<_>>>()?;
  Ok(stages)
}

pub fn get_stage(conn: &Connection, stage_id: i64) -> Result<Option<Stage>> {
  conn
    .query_row(
      &format!("SELECT {} FROM stages WHERE id = ?1", STAGE_COLUMNS),
      params![stage_id],
      stage_from_row,
    )
    .optional()
}

pub fn create_stage(
  conn: &Connection,
  name: &str,
  start_page: i64,
  end_page: i64,
  sort_order: i64,
) -> Result<i64> {
  conn.execute(
    "INSERT INTO stages (name, start_page, end_page, sort_order, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
    params![name, start_page, end_page, sort_order, Utc::now().to_rfc3339()],
  )?;
  Ok(conn.last_insert_rowid())
}

/// Returns false if the stage does not exist
pub fn update_stage(
  conn: &Connection,
  stage_id: i64,
  name: &str,
  start_page: i64,
  end_page: i64,
  sort_order: i64,
) -> Result<bool> {
  let changed = conn.execute(
    "UPDATE stages SET name = ?1, start_page = ?2, end_page = ?3, sort_order = ?4 WHERE id = ?5",
    params![name, start_page, end_page, sort_order, stage_id],
  )?;
  Ok(changed > 0)
}

/// Whether any student profile or certificate references the stage
pub fn stage_in_use(conn: &Connection, stage_id: i64) -> Result<bool> {
  conn.query_row(
    r#"SELECT EXISTS(SELECT 1 FROM student_profiles WHERE stage_id = ?1)
           OR EXISTS(SELECT 1 FROM certificates WHERE stage_id = ?1)"#,
    params![stage_id],
    |row| row.get(0),
  )
}

pub fn delete_stage(conn: &Connection, stage_id: i64) -> Result<bool> {
  let changed = conn.execute("DELETE FROM stages WHERE id = ?1", params![stage_id])?;
  Ok(changed > 0)
}

pub fn first_stage(conn: &Connection) -> Result<Option<Stage>> {
  conn
    .query_row(
      &format!("SELECT {} FROM stages ORDER BY sort_order, id LIMIT 1", STAGE_COLUMNS),
      [],
      stage_from_row,
    )
    .optional()
}

/// The stage following `stage` in curriculum order
pub fn next_stage(conn: &Connection, stage: &Stage) -> Result<Option<Stage>> {
  conn
    .query_row(
      &format!(
        r#"SELECT {} FROM stages
           WHERE sort_order > ?1 OR (sort_order = ?1 AND id > ?2)
           ORDER BY sort_order, id LIMIT 1"#,
        STAGE_COLUMNS
      ),
      params![stage.sort_order, stage.id],
      stage_from_row,
    )
    .optional()
}

// ==================== Student Profiles ====================

/// Enroll a student on the first stage if they have no profile yet.
/// Returns the student's stage, or None when no stages exist.
pub fn ensure_student_profile(conn: &Connection, student_id: i64) -> Result<Option<Stage>> {
  if let Some(stage) = get_student_stage(conn, student_id)? {
    return Ok(Some(stage));
  }
  let Some(first) = first_stage(conn)? else {
    return Ok(None);
  };
  conn.execute(
    "INSERT INTO student_profiles (user_id, stage_id, enrolled_at) VALUES (?1, ?2, ?3)",
    params![student_id, first.id, Utc::now().to_rfc3339()],
  )?;
  Ok(Some(first))
}

pub fn get_student_stage(conn: &Connection, student_id: i64) -> Result<Option<Stage>> {
  conn
    .query_row(
      r#"SELECT s.id, s.name, s.start_page, s.end_page, s.sort_order
         FROM student_profiles p
         JOIN stages s ON s.id = p.stage_id
         WHERE p.user_id = ?1"#,
      params![student_id],
      stage_from_row,
    )
    .optional()
}

/// Move a student to a stage (creates the profile if missing)
pub fn set_student_stage(conn: &Connection, student_id: i64, stage_id: i64) -> Result<()> {
  conn.execute(
    r#"INSERT INTO student_profiles (user_id, stage_id, enrolled_at) VALUES (?1, ?2, ?3)
       ON CONFLICT(user_id) DO UPDATE SET stage_id = excluded.stage_id, enrolled_at = excluded.enrolled_at"#,
    params![student_id, stage_id, Utc::now().to_rfc3339()],
  )?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Role;
  use crate::testing::TestEnv;

  #[test]
  fn test_default_stages_cover_mushaf_in_order() {
    let env = TestEnv::new().unwrap();
    let stages = list_stages(&env.conn).unwrap();
    assert_eq!(stages.len(), 6);
    assert_eq!(stages[0].start_page, 1);
    assert_eq!(stages.last().unwrap().end_page, 604);
    for pair in stages.windows(2) {
      assert_eq!(pair[0].end_page + 1, pair[1].start_page);
    }
  }

  #[test]
  fn test_seed_is_idempotent() {
    let env = TestEnv::new().unwrap();
    seed_default_stages(&env.conn).unwrap();
    assert_eq!(list_stages(&env.conn).unwrap().len(), 6);
  }

  #[test]
  fn test_next_stage_follows_sort_order() {
    let env = TestEnv::new().unwrap();
    let stages = list_stages(&env.conn).unwrap();
    let next = next_stage(&env.conn, &stages[0]).unwrap().unwrap();
    assert_eq!(next.id, stages[1].id);
    assert!(next_stage(&env.conn, stages.last().unwrap()).unwrap().is_none());
  }

  #[test]
  fn test_student_profile_enrolls_on_first_stage() {
    let env = TestEnv::new().unwrap();
    let student = env.approved_user("student_a", Role::Student);
    let stage = get_student_stage(&env.conn, student).unwrap().unwrap();
    assert_eq!(stage.sort_order, 1);

    let third = &list_stages(&env.conn).unwrap()[2];
    set_student_stage(&env.conn, student, third.id).unwrap();
    assert_eq!(get_student_stage(&env.conn, student).unwrap().unwrap().id, third.id);
    // Existing profile is kept
    assert_eq!(ensure_student_profile(&env.conn, student).unwrap().unwrap().id, third.id);
  }

  #[test]
  fn test_stage_in_use_blocks_delete() {
    let env = TestEnv::new().unwrap();
    let first = first_stage(&env.conn).unwrap().unwrap();
    assert!(!stage_in_use(&env.conn, first.id).unwrap());
    env.approved_user("student_b", Role::Student);
    assert!(stage_in_use(&env.conn, first.id).unwrap());

    let id = create_stage(&env.conn, "Extra", 10, 20, 99).unwrap();
    assert!(delete_stage(&env.conn, id).unwrap());
    assert!(get_stage(&env.conn, id).unwrap().is_none());
  }
}
