//! Project path functions - single source of truth for all file paths.
//!
//! ## Environment Variables
//!
//! - `DATA_DIR`: Override the base data directory (default: "data")
//!
//! This allows running multiple isolated server instances side by side:
//! ```bash
//! DATA_DIR=data/test/a PORT=3001 cargo run
//! DATA_DIR=data/test/b PORT=3002 cargo run
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Lazily initialized data directory from DATA_DIR env var
static DATA_DIR_VALUE: OnceLock<String> = OnceLock::new();

/// Get the base data directory (from DATA_DIR env var or default "data")
pub fn data_dir() -> &'static str {
    DATA_DIR_VALUE.get_or_init(|| env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()))
}

/// SQLite database path
pub fn db_path() -> String {
    format!("{}/yaqeen.db", data_dir())
}

/// Root directory for uploaded files
pub fn uploads_dir() -> String {
    format!("{}/uploads", data_dir())
}

/// Public static assets (logos, fonts used by reports)
pub const STATIC_DIR: &str = "static";

// ==================== Upload Subdirectories ====================

pub const AUDIO_SUBDIR: &str = "audio";
pub const MATERIALS_SUBDIR: &str = "materials";
pub const RENDER_SUBDIR: &str = "render";

/// Recitation audio attached to submissions
pub fn audio_dir(uploads: &Path) -> PathBuf {
    uploads.join(AUDIO_SUBDIR)
}

/// Files attached to learning materials
pub fn materials_dir(uploads: &Path) -> PathBuf {
    uploads.join(MATERIALS_SUBDIR)
}

/// Scratch space for HTML -> PDF rendering
pub fn render_dir(uploads: &Path) -> PathBuf {
    uploads.join(RENDER_SUBDIR)
}

// ==================== Tests ====================
