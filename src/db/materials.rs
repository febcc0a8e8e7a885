//! Learning materials: links or uploaded files, global or per group.

use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::Serialize;

use super::now_rfc3339;

#[derive(Debug, Clone, Serialize)]
pub struct Material {
    pub id: i64,
    pub group_id: Option<i64>,
    pub uploaded_by: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    #[serde(skip)]
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub file_mime: Option<String>,
    pub created_at: String,
}

/// An uploaded file backing a material
#[derive(Debug, Clone)]
pub struct MaterialFile {
    pub path: String,
    pub name: String,
    pub mime: String,
}

#[derive(Debug, Clone)]
pub struct NewMaterial<'a> {
    pub group_id: Option<i64>,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub url: Option<&'a str>,
    pub file: Option<MaterialFile>,
}

const MATERIAL_COLUMNS: &str =
    "id, group_id, uploaded_by, title, description, url, file_path, file_name, file_mime, created_at";

fn material_from_row(row: &Row<'_>) -> Result<Material> {
    Ok(Material {
        id: row.get(0)?,
        group_id: row.get(1)?,
        uploaded_by: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        url: row.get(5)?,
        file_path: row.get(6)?,
        file_name: row.get(7)?,
        file_mime: row.get(8)?,
        created_at: row.get(9)?,
    })
}

pub fn create_material(conn: &Connection, uploaded_by: i64, material: &NewMaterial<'_>) -> Result<i64> {
    let file = material.file.as_ref();
    conn.execute(
        r#"INSERT INTO materials
             (group_id, uploaded_by, title, description, url, file_path, file_name, file_mime, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
        params![
            material.group_id,
            uploaded_by,
            material.title,
            material.description,
            material.url,
            file.map(|f| f.path.as_str()),
            file.map(|f| f.name.as_str()),
            file.map(|f| f.mime.as_str()),
            now_rfc3339()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_material(conn: &Connection, material_id: i64) -> Result<Option<Material>> {
    conn.query_row(
        &format!("SELECT {} FROM materials WHERE id = ?1", MATERIAL_COLUMNS),
        params![material_id],
        material_from_row,
    )
    .optional()
}

/// All materials, optionally narrowed to one group
pub fn list_all(conn: &Connection, group_id: Option<i64>) -> Result<Vec<Material>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM materials WHERE (?1 IS NULL OR group_id = ?1) ORDER BY created_at DESC, id DESC",
        MATERIAL_COLUMNS
    ))?;
    let materials = stmt
        .query_map(params![group_id], material_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(materials)
}

/// Global materials plus those of groups the user teaches or belongs to
pub fn list_visible(conn: &Connection, user_id: i64, group_id: Option<i64>) -> Result<Vec<Material>> {
    let mut stmt = conn.prepare(&format!(
        r#"SELECT {} FROM materials
           WHERE (group_id IS NULL
                  OR group_id IN (SELECT group_id FROM group_members WHERE student_id = ?1)
                  OR group_id IN (SELECT id FROM study_groups WHERE teacher_id = ?1))
             AND (?2 IS NULL OR group_id = ?2)
           ORDER BY created_at DESC, id DESC"#,
        MATERIAL_COLUMNS
    ))?;
    let materials = stmt
        .query_map(params![user_id, group_id], material_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(materials)
}

pub fn delete_material(conn: &Connection, material_id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM materials WHERE id = ?1", params![material_id])?;
    Ok(changed > 0)
}

/// Whether any material still points at the stored file
pub fn file_in_use(conn: &Connection, file_path: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM materials WHERE file_path = ?1)",
        params![file_path],
        |row| row.get(0),
    )
}
