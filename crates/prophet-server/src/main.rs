//! Prophet API server binary.
//!
//! Reads `prophet.toml` (or the path given with `--config`) layered under
//! `PROPHET_*` environment variables, opens the SQLite store and serves the
//! JSON API over HTTP.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use axum::http::header;
use clap::Parser;
use prophet_api::{AppState, ServerConfig};
use prophet_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Prophet survey API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "prophet.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // File first, environment on top. `admin_scopes` is space-separated in env.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("PROPHET")
        .try_parsing(true)
        .list_separator(" ")
        .with_list_parse_key("admin_scopes"),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  tracing::debug!(config = ?server_cfg, "loaded configuration");

  let db_path = expand_tilde(Path::new(&server_cfg.database_uri));
  let store = SqliteStore::open(&db_path)
    .await
    .with_context(|| format!("failed to open store at {db_path:?}"))?;

  let state = AppState::from_config(Arc::new(store), &server_cfg)
    .context("failed to build HTTP client for signing keys")?;

  let cors = CorsLayer::new()
    .allow_origin(Any)
    .allow_methods(Any)
    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

  let app = prophet_api::router(state)
    .layer(cors)
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
