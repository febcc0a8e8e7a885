//! Application configuration.
//!
//! Values are resolved once at startup with priority:
//! `config.toml` > environment (`.env` supported) > built-in defaults.

use chrono::Weekday;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::paths;

// ==================== Constants ====================

/// Default server address to bind to
pub const SERVER_ADDR: &str = "0.0.0.0";

/// Default server port
pub const SERVER_PORT: u16 = 3000;

/// Login session lifetime in hours (1 week)
pub const SESSION_DURATION_HOURS: i64 = 24 * 7;

/// Probability threshold for expired session cleanup (0-255, lower = rarer)
/// 25 means ~10% chance (25/256) on each session lookup
pub const SESSION_CLEANUP_THRESHOLD: u8 = 25;

/// Default maximum size of an uploaded recitation (20 MiB)
pub const DEFAULT_MAX_AUDIO_BYTES: usize = 20 * 1024 * 1024;

/// Default maximum size of an uploaded material file (50 MiB)
pub const DEFAULT_MAX_MATERIAL_BYTES: usize = 50 * 1024 * 1024;

/// Default headless browser used for PDF printing
pub const DEFAULT_PDF_BROWSER: &str = "chromium";

/// Default PDF render timeout in seconds
pub const DEFAULT_PDF_TIMEOUT_SECS: u64 = 30;

// ==================== File Format ====================

/// Structure of config.toml (every key optional)
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    server: Option<ServerSection>,
    database: Option<DatabaseSection>,
    uploads: Option<UploadsSection>,
    pdf: Option<PdfSection>,
    admin: Option<AdminSection>,
    timetable: Option<TimetableSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    addr: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabaseSection {
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UploadsSection {
    dir: Option<String>,
    max_audio_bytes: Option<usize>,
    max_material_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct PdfSection {
    browser: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AdminSection {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TimetableSection {
    week_start: Option<String>,
}

// ==================== Resolved Config ====================

/// Bootstrap admin credentials (only used when no admin exists yet)
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub username: String,
    pub password: String,
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: String,
    pub server_port: u16,
    pub database_path: PathBuf,
    pub uploads_dir: PathBuf,
    pub max_audio_bytes: usize,
    pub max_material_bytes: usize,
    pub pdf_browser: String,
    pub pdf_timeout_secs: u64,
    pub admin: Option<AdminBootstrap>,
    pub week_start: Weekday,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SERVER_ADDR.to_string(),
            server_port: SERVER_PORT,
            database_path: PathBuf::from(paths::db_path()),
            uploads_dir: PathBuf::from(paths::uploads_dir()),
            max_audio_bytes: DEFAULT_MAX_AUDIO_BYTES,
            max_material_bytes: DEFAULT_MAX_MATERIAL_BYTES,
            pdf_browser: DEFAULT_PDF_BROWSER.to_string(),
            pdf_timeout_secs: DEFAULT_PDF_TIMEOUT_SECS,
            admin: None,
            week_start: Weekday::Sat,
        }
    }
}

impl Config {
    /// Load configuration: config.toml > env > defaults
    pub fn load() -> Self {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let file = read_config_file(Path::new("config.toml"));
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();
        let server = file.server.unwrap_or_default();
        let database = file.database.unwrap_or_default();
        let uploads = file.uploads.unwrap_or_default();
        let pdf = file.pdf.unwrap_or_default();
        let admin = file.admin.unwrap_or_default();
        let timetable = file.timetable.unwrap_or_default();

        let server_port = server
            .port
            .or_else(|| env("PORT").and_then(|p| p.parse().ok()))
            .unwrap_or(defaults.server_port);

        let database_path = database
            .path
            .or_else(|| env("DATABASE_PATH"))
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);
        tracing::info!("Using database at {}", database_path.display());

        let uploads_dir = uploads
            .dir
            .or_else(|| env("UPLOADS_DIR"))
            .map(PathBuf::from)
            .unwrap_or(defaults.uploads_dir);

        let admin = match (
            admin.username.or_else(|| env("ADMIN_USERNAME")),
            admin.password.or_else(|| env("ADMIN_PASSWORD")),
        ) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(AdminBootstrap { username, password })
            }
            _ => None,
        };

        let week_start = timetable
            .week_start
            .or_else(|| env("WEEK_START"))
            .map(|s| {
                parse_week_start(&s).unwrap_or_else(|| {
                    tracing::warn!("Unknown week_start '{}', using saturday", s);
                    Weekday::Sat
                })
            })
            .unwrap_or(defaults.week_start);

        Self {
            server_addr: server.addr.unwrap_or(defaults.server_addr),
            server_port,
            database_path,
            uploads_dir,
            max_audio_bytes: uploads.max_audio_bytes.unwrap_or(defaults.max_audio_bytes),
            max_material_bytes: uploads
                .max_material_bytes
                .unwrap_or(defaults.max_material_bytes),
            pdf_browser: pdf
                .browser
                .or_else(|| env("PDF_BROWSER"))
                .unwrap_or(defaults.pdf_browser),
            pdf_timeout_secs: pdf.timeout_secs.unwrap_or(defaults.pdf_timeout_secs),
            admin,
            week_start,
        }
    }

    /// Get the full server bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_addr, self.server_port)
    }
}

fn read_config_file(path: &Path) -> FileConfig {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return FileConfig::default();
    };
    match toml::from_str::<FileConfig>(&contents) {
        Ok(config) => {
            tracing::info!("Loaded configuration from {}", path.display());
            config
        }
        Err(e) => {
            tracing::warn!("Ignoring invalid {}: {}", path.display(), e);
            FileConfig::default()
        }
    }
}

/// Parse the first day of the timetable week
pub fn parse_week_start(s: &str) -> Option<Weekday> {
    match s.trim().to_ascii_lowercase().as_str() {
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        "monday" | "mon" => Some(Weekday::Mon),
        _ => None,
    }
}
