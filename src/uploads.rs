//! Multipart form reading and content-addressed file storage.
//!
//! Uploaded files are stored as `<sha256>.<ext>` under a subdirectory of the
//! uploads root, and the database keeps the path relative to that root
//! (e.g. `audio/3fa2....mp3`). Identical uploads share one file.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};

use crate::db::LogOnError;
use crate::error::{ApiError, ApiResult};

/// Accepted recitation formats: (extension, MIME type)
pub const AUDIO_FORMATS: [(&str, &str); 5] = [
  ("mp3", "audio/mpeg"),
  ("m4a", "audio/mp4"),
  ("wav", "audio/wav"),
  ("ogg", "audio/ogg"),
  ("webm", "audio/webm"),
];

/// Longest text field accepted in a multipart form
const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct UploadedFile {
  pub file_name: String,
  pub content_type: Option<String>,
  pub bytes: Vec<u8>,
}

/// Text fields and files of a multipart form
#[derive(Debug, Default)]
pub struct FormData {
  fields: HashMap<String, String>,
  files: HashMap<String, UploadedFile>,
}

impl FormData {
  pub fn text(&self, name: &str) -> Option<&str> {
    self.fields.get(name).map(String::as_str)
  }

  pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
    self.files.remove(name)
  }
}

fn multipart_error(e: MultipartError) -> ApiError {
  if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
    ApiError::PayloadTooLarge("Upload is too large".to_string())
  } else {
    ApiError::bad_request(format!("Invalid form data: {}", e.body_text()))
  }
}

/// Read every field of a multipart form. Files larger than `max_file_bytes`
/// are rejected with 413; empty file inputs are skipped.
pub async fn read_form(multipart: &mut Multipart, max_file_bytes: usize) -> ApiResult<FormData> {
  let mut form = FormData::default();

  while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
    let name = field.name().unwrap_or_default().to_string();
    let file_name = field.file_name().map(str::to_string);
    let content_type = field.content_type().map(str::to_string);
    let limit = if file_name.is_some() { max_file_bytes } else { MAX_TEXT_FIELD_BYTES };

    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
      if bytes.len() + chunk.len() > limit {
        return Err(ApiError::PayloadTooLarge(format!(
          "Field '{}' exceeds the {} byte limit",
          name, limit
        )));
      }
      bytes.extend_from_slice(&chunk);
    }

    match file_name {
      Some(file_name) => {
        if file_name.is_empty() && bytes.is_empty() {
          continue;
        }
        form.files.insert(
          name,
          UploadedFile {
            file_name,
            content_type,
            bytes,
          },
        );
      }
      None => {
        let text = String::from_utf8(bytes)
          .map_err(|_| ApiError::bad_request(format!("Field '{}' is not valid UTF-8", name)))?;
        form.fields.insert(name, text);
      }
    }
  }

  Ok(form)
}

/// Extension of a file name, lowercased
fn extension_of(file_name: &str) -> Option<String> {
  Path::new(file_name)
    .extension()
    .and_then(|e| e.to_str())
    .map(str::to_ascii_lowercase)
}

/// Resolve the stored format of an audio upload from its extension or MIME type
pub fn audio_format(file: &UploadedFile) -> ApiResult<(&'static str, &'static str)> {
  let by_extension = extension_of(&file.file_name)
    .and_then(|ext| AUDIO_FORMATS.iter().find(|(e, _)| *e == ext));
  let by_mime = file.content_type.as_deref().and_then(|mime| {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    AUDIO_FORMATS.iter().find(|(_, m)| *m == essence)
  });

  by_extension
    .or(by_mime)
    .copied()
    .ok_or_else(|| ApiError::bad_request("Audio must be one of: mp3, m4a, wav, ogg, webm"))
}

/// Strip directories and control characters from a client-supplied file name
pub fn sanitize_file_name(file_name: &str) -> String {
  let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
  let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
  let cleaned = cleaned.trim();
  if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
    "file".to_string()
  } else {
    cleaned.to_string()
  }
}

/// Write `bytes` as `<subdir>/<sha256>.<ext>` under `uploads`, returning the
/// relative path. An identical existing file is reused.
///
/// Call with the database lock held; shared files are removed under the
/// same lock once no row references them.
pub fn store(uploads: &Path, subdir: &str, bytes: &[u8], ext: &str) -> std::io::Result<String> {
  let digest = hex::encode(Sha256::digest(bytes));
  let relative = if ext.is_empty() {
    format!("{}/{}", subdir, digest)
  } else {
    format!("{}/{}.{}", subdir, digest, ext)
  };

  let dir = uploads.join(subdir);
  std::fs::create_dir_all(&dir)?;
  let path = uploads.join(&relative);
  if !path.exists() {
    // Write then rename so readers never see a partial file
    let tmp = dir.join(format!(".{}.{:016x}.tmp", digest, rand::random::<u64>()));
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, &path)?;
    tracing::debug!("Stored upload {} ({} bytes)", relative, bytes.len());
  }
  Ok(relative)
}

/// Store a material file keeping an extension derived from its name
pub fn store_with_name(uploads: &Path, subdir: &str, file: &UploadedFile) -> std::io::Result<String> {
  let ext = extension_of(&file.file_name)
    .filter(|e| e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()))
    .unwrap_or_default();
  store(uploads, subdir, &file.bytes, &ext)
}

/// Absolute path of a stored relative path; None if it escapes the root
pub fn resolve(uploads: &Path, relative: &str) -> Option<PathBuf> {
  let rel = Path::new(relative);
  let safe = rel
    .components()
    .all(|c| matches!(c, Component::Normal(_)));
  safe.then(|| uploads.join(rel))
}

/// Delete a stored file unless something still references it
pub fn remove_if_unused(uploads: &Path, relative: &str, still_used: bool) {
  if still_used {
    return;
  }
  if let Some(path) = resolve(uploads, relative) {
    std::fs::remove_file(&path).log_warn(&format!("Failed to remove stored file {}", relative));
  }
}

/// `Content-Disposition` value with an ASCII fallback and an RFC 5987
/// encoded UTF-8 name
pub fn content_disposition(kind: &str, file_name: &str) -> String {
  let fallback: String = file_name
    .chars()
    .map(|c| {
      if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
        c
      } else {
        '_'
      }
    })
    .collect();
  format!(
    "{}; filename=\"{}\"; filename*=UTF-8''{}",
    kind,
    fallback,
    urlencoding::encode(file_name)
  )
}

/// Read a stored file and return it with download headers
pub fn file_response(
  uploads: &Path,
  relative: &str,
  mime: &str,
  disposition: &str,
  download_name: &str,
) -> ApiResult<Response> {
  let path = resolve(uploads, relative).ok_or_else(|| ApiError::not_found("File"))?;
  let bytes = match std::fs::read(&path) {
    Ok(bytes) => bytes,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      tracing::warn!("Stored file {} is missing from disk", relative);
      return Err(ApiError::not_found("File"));
    }
    Err(e) => return Err(e.into()),
  };

  let headers = [
    (header::CONTENT_TYPE, mime.to_string()),
    (header::CONTENT_DISPOSITION, content_disposition(disposition, download_name)),
  ];
  Ok((headers, bytes).into_response())
}
