//! Application state shared by all handlers.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::db::DbPool;
use crate::paths;

/// Application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    /// Shared database (accounts, curriculum, coursework)
    pub db: DbPool,

    /// Resolved configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    /// Root of uploaded files; stored paths are relative to it
    pub fn uploads_dir(&self) -> &PathBuf {
        &self.config.uploads_dir
    }

    pub fn render_dir(&self) -> PathBuf {
        paths::render_dir(&self.config.uploads_dir)
    }
}
