//! Stage completion certificates: listing, manual requests, review and rendering.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::reports::document_response;
use super::require_student_teacher;
use crate::auth::AuthContext;
use crate::db::certificates::{self as certificates_db, Certificate, CertificateScope};
use crate::db::{progress, stages, try_lock};
use crate::domain::{CertificateStatus, Role, Stage};
use crate::error::{ApiError, ApiResult};
use crate::reports::{self, ReportFormat};
use crate::state::AppState;
use crate::validation;

#[derive(Deserialize)]
pub struct CertificateFilter {
  pub status: Option<CertificateStatus>,
}

#[derive(Deserialize)]
pub struct CertificateRequest {
  pub student_id: i64,
  pub stage_id: i64,
}

#[derive(Deserialize)]
pub struct RejectRequest {
  pub reason: Option<String>,
}

#[derive(Deserialize)]
pub struct RenderQuery {
  #[serde(default)]
  pub format: ReportFormat,
}

#[derive(Serialize)]
pub struct ApprovalOutcome {
  pub certificate: Certificate,
  /// Stage the student was moved on to
  pub advanced_to: Option<Stage>,
}

fn load_certificate(conn: &Connection, certificate_id: i64) -> ApiResult<Certificate> {
  certificates_db::get_certificate(conn, certificate_id)?.ok_or_else(|| ApiError::not_found("Certificate"))
}

/// GET /api/certificates?status=
pub async fn list_certificates(
  State(state): State<AppState>,
  auth: AuthContext,
  Query(filter): Query<CertificateFilter>,
) -> ApiResult<Json<Vec<Certificate>>> {
  let scope = match auth.role {
    Role::Admin => CertificateScope::All,
    Role::Teacher => CertificateScope::Teacher(auth.user_id),
    Role::Student => CertificateScope::Student(auth.user_id),
  };
  let conn = try_lock(&state.db)?;
  Ok(Json(certificates_db::list_certificates(&conn, scope, filter.status)?))
}

/// POST /api/certificates - Request a certificate for a completed stage
pub async fn request_certificate(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(req): Json<CertificateRequest>,
) -> ApiResult<(StatusCode, Json<Certificate>)> {
  auth.require_staff()?;
  let conn = try_lock(&state.db)?;
  require_student_teacher(&conn, &auth, req.student_id)?;

  let stage = stages::get_stage(&conn, req.stage_id)?.ok_or_else(|| ApiError::not_found("Stage"))?;
  let current = progress::current_page(&conn, req.student_id, &stage)?;
  let Some(reached) = current.filter(|_| stage.is_completed(current)) else {
    return Err(ApiError::bad_request(format!(
      "Student has not reached the end of {} (page {})",
      stage.name, stage.end_page
    )));
  };

  let id = certificates_db::create_certificate(&conn, req.student_id, stage.id, reached, Some(auth.user_id))?;
  tracing::info!("User {} requested certificate {} for student {}", auth.user_id, id, req.student_id);
  Ok((StatusCode::CREATED, Json(load_certificate(&conn, id)?)))
}

/// POST /api/certificates/{id}/approve
pub async fn approve_certificate(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(certificate_id): Path<i64>,
) -> ApiResult<Json<ApprovalOutcome>> {
  auth.require_admin()?;
  let conn = try_lock(&state.db)?;
  let certificate = load_certificate(&conn, certificate_id)?;

  let (approved, advanced_to) = certificates_db::approve_certificate(&conn, &certificate, auth.user_id)?;
  if !approved {
    return Err(ApiError::conflict(format!("Certificate is already {}", certificate.status)));
  }
  if let Some(next) = &advanced_to {
    tracing::info!("Student {} advanced to stage '{}'", certificate.student_id, next.name);
  }
  Ok(Json(ApprovalOutcome {
    certificate: load_certificate(&conn, certificate_id)?,
    advanced_to,
  }))
}

/// POST /api/certificates/{id}/reject
pub async fn reject_certificate(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(certificate_id): Path<i64>,
  Json(req): Json<RejectRequest>,
) -> ApiResult<Json<Certificate>> {
  auth.require_admin()?;
  let reason = validation::optional_body("Reason", req.reason.as_deref(), validation::MAX_BODY_LEN)
    .map_err(ApiError::BadRequest)?;

  let conn = try_lock(&state.db)?;
  let certificate = load_certificate(&conn, certificate_id)?;
  if !certificates_db::reject_certificate(&conn, certificate_id, auth.user_id, reason.as_deref())? {
    return Err(ApiError::conflict(format!("Certificate is already {}", certificate.status)));
  }
  Ok(Json(load_certificate(&conn, certificate_id)?))
}

/// GET /api/certificates/{id}/render?format=pdf|html
pub async fn render_certificate(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(certificate_id): Path<i64>,
  Query(query): Query<RenderQuery>,
) -> ApiResult<Response> {
  let html = {
    let conn = try_lock(&state.db)?;
    let certificate = load_certificate(&conn, certificate_id)?;
    if !auth.is_staff() && auth.user_id != certificate.student_id {
      return Err(ApiError::forbidden("This certificate belongs to another student"));
    }
    if certificate.status != CertificateStatus::Approved {
      return Err(ApiError::bad_request("Only approved certificates can be rendered"));
    }
    let document = reports::certificate_document(&conn, &certificate)?;
    reports::render_html(&document)?
  };
  document_response(&state, html, query.format, &format!("certificate-{}", certificate_id)).await
}
