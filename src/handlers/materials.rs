//! Study materials: links and uploaded files, global or per group.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use rusqlite::Connection;
use serde::Deserialize;

use super::{load_group, require_group_access, require_group_teacher};
use crate::auth::AuthContext;
use crate::db::materials::{self as materials_db, Material, MaterialFile, NewMaterial};
use crate::db::try_lock;
use crate::error::{ApiError, ApiResult};
use crate::paths;
use crate::state::AppState;
use crate::uploads;
use crate::validation;

#[derive(Deserialize)]
pub struct MaterialFilter {
  pub group_id: Option<i64>,
}

fn load_material(conn: &Connection, material_id: i64) -> ApiResult<Material> {
  materials_db::get_material(conn, material_id)?.ok_or_else(|| ApiError::not_found("Material"))
}

/// Materials without a group are visible to every user
fn require_material_access(conn: &Connection, auth: &AuthContext, material: &Material) -> ApiResult<()> {
  match material.group_id {
    Some(group_id) => {
      let group = load_group(conn, group_id)?;
      require_group_access(conn, auth, &group)
    }
    None => Ok(()),
  }
}

/// POST /api/materials - multipart `group_id`, `title`, `description`, `url`, `file`
pub async fn create_material(
  State(state): State<AppState>,
  auth: AuthContext,
  mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Material>)> {
  auth.require_staff()?;
  let mut form = uploads::read_form(&mut multipart, state.config.max_material_bytes).await?;

  let group_id = match form.text("group_id").map(str::trim).filter(|s| !s.is_empty()) {
    Some(raw) => Some(
      raw
        .parse::<i64>()
        .map_err(|_| ApiError::bad_request("group_id must be a number"))?,
    ),
    None => None,
  };
  let title = validation::required_line("Title", form.text("title").unwrap_or_default(), validation::MAX_TITLE_LEN)
    .map_err(ApiError::BadRequest)?;
  let description = validation::optional_body("Description", form.text("description"), validation::MAX_BODY_LEN)
    .map_err(ApiError::BadRequest)?;
  let url = form
    .text("url")
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_string);
  if url.as_deref().is_some_and(|u| !validation::is_valid_link(u)) {
    return Err(ApiError::bad_request("Link must be an http or https URL"));
  }
  let file = form.take_file("file");
  if url.is_none() && file.is_none() {
    return Err(ApiError::bad_request("Provide a link or a file"));
  }

  // Store and record under one lock; shared files are cleaned up under it too
  let conn = try_lock(&state.db)?;
  if let Some(group_id) = group_id {
    let group = load_group(&conn, group_id)?;
    require_group_teacher(&auth, &group)?;
  }

  let stored = match file {
    Some(file) => {
      let path = uploads::store_with_name(state.uploads_dir(), paths::MATERIALS_SUBDIR, &file)?;
      Some(MaterialFile {
        path,
        name: uploads::sanitize_file_name(&file.file_name),
        mime: file
          .content_type
          .clone()
          .unwrap_or_else(|| "application/octet-stream".to_string()),
      })
    }
    None => None,
  };

  let material = NewMaterial {
    group_id,
    title: &title,
    description: description.as_deref(),
    url: url.as_deref(),
    file: stored,
  };
  let id = materials_db::create_material(&conn, auth.user_id, &material)?;
  tracing::info!("User {} added material {} '{}'", auth.user_id, id, title);
  Ok((StatusCode::CREATED, Json(load_material(&conn, id)?)))
}

/// GET /api/materials?group_id=
pub async fn list_materials(
  State(state): State<AppState>,
  auth: AuthContext,
  Query(filter): Query<MaterialFilter>,
) -> ApiResult<Json<Vec<Material>>> {
  let conn = try_lock(&state.db)?;
  let materials = if auth.is_admin() {
    materials_db::list_all(&conn, filter.group_id)?
  } else {
    materials_db::list_visible(&conn, auth.user_id, filter.group_id)?
  };
  Ok(Json(materials))
}

/// GET /api/materials/{id}/file
pub async fn download_file(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(material_id): Path<i64>,
) -> ApiResult<Response> {
  let material = {
    let conn = try_lock(&state.db)?;
    let material = load_material(&conn, material_id)?;
    require_material_access(&conn, &auth, &material)?;
    material
  };

  let path = material.file_path.ok_or_else(|| ApiError::not_found("File"))?;
  let mime = material
    .file_mime
    .unwrap_or_else(|| "application/octet-stream".to_string());
  let name = material.file_name.unwrap_or_else(|| "file".to_string());
  uploads::file_response(state.uploads_dir(), &path, &mime, "attachment", &name)
}

/// DELETE /api/materials/{id} - Uploader or admin
pub async fn delete_material(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(material_id): Path<i64>,
) -> ApiResult<StatusCode> {
  let conn = try_lock(&state.db)?;
  let material = load_material(&conn, material_id)?;
  if !auth.is_admin() && material.uploaded_by != Some(auth.user_id) {
    return Err(ApiError::forbidden("Only the uploader or an admin can delete this material"));
  }

  materials_db::delete_material(&conn, material_id)?;
  if let Some(path) = &material.file_path {
    let in_use = materials_db::file_in_use(&conn, path)?;
    uploads::remove_if_unused(state.uploads_dir(), path, in_use);
  }
  Ok(StatusCode::NO_CONTENT)
}
