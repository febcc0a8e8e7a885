use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yaqeen::auth::{self, db as auth_db};
use yaqeen::config::Config;
use yaqeen::db::{self, LogOnError};
use yaqeen::handlers;
use yaqeen::paths;
use yaqeen::state::AppState;

#[tokio::main]
async fn main() {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "yaqeen=debug,tower_http=debug".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = Config::load();
  let pool = db::init_db(&config.database_path).expect("Failed to initialize database");

  {
    let conn = pool.lock().expect("Database lock failed during startup");

    if let Some(admin) = &config.admin {
      auth::bootstrap_admin(&conn, admin).expect("Failed to create bootstrap admin");
    } else if !auth_db::admin_exists(&conn).unwrap_or(false) {
      tracing::warn!("No admin account exists; set ADMIN_USERNAME and ADMIN_PASSWORD to create one");
    }

    if let Some(removed) = auth_db::cleanup_expired_sessions(&conn).log_warn("Failed to clean up sessions") {
      tracing::debug!("Removed {} expired sessions", removed);
    }
  }

  for dir in [
    paths::audio_dir(&config.uploads_dir),
    paths::materials_dir(&config.uploads_dir),
    paths::render_dir(&config.uploads_dir),
  ] {
    std::fs::create_dir_all(&dir).unwrap_or_else(|e| panic!("Failed to create {}: {}", dir.display(), e));
  }

  let bind_addr = config.bind_addr();
  let app = handlers::router(AppState::new(pool, config));

  let listener = tokio::net::TcpListener::bind(&bind_addr)
    .await
    .unwrap_or_else(|_| panic!("Failed to bind to {}", bind_addr));

  tracing::info!("Server running on http://{}", bind_addr);

  axum::serve(listener, app)
    .await
    .expect("Server failed to start");
}
