use std::{net::SocketAddr, sync::Arc, time::Duration, time::Instant};

use axum::{
  http::StatusCode, response::IntoResponse, routing::get, BoxError, Json,
  Router,
};
use serde_json::json;
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod download;
mod error;
mod format;
mod info;
mod library;
#[cfg(test)]
mod mock;
mod source;
mod video_id;

pub use error::{Error, Result};

use config::Config;
use library::{PlayerLibrary, Ytdlp};
use source::Resolver;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const ENDPOINTS: [&str; 5] = [
  "GET /",
  "GET /health",
  "GET /api/ytdl?link=YOUTUBE_URL_OR_ID",
  "GET /api/xdown-yt?link=YOUTUBE_URL_OR_ID",
  "GET /api/download/:videoId?quality=QUALITY&itag=ITAG&format=FORMAT",
];

/// Shared, read-only handles for all requests.
#[derive(Clone)]
pub struct AppState {
  pub resolver: Arc<Resolver>,
  pub library: Arc<dyn PlayerLibrary>,
  /// Client for proxied downloads; its timeout bounds a whole transfer.
  pub download_http: reqwest::Client,
  pub cache_max_age: u64,
  pub started_at: Instant,
}

impl AppState {
  pub fn from_config(config: &Config) -> Result<Self> {
    let library: Arc<dyn PlayerLibrary> = Arc::new(Ytdlp::new(&config.ytdlp));
    let upstream_http = http_client(config, config.upstream_timeout)?;
    let resolver = Resolver::from_config(config, upstream_http, library.clone());

    Ok(Self {
      resolver: Arc::new(resolver),
      library,
      download_http: http_client(config, config.download_timeout)?,
      cache_max_age: config.cache_max_age,
      started_at: Instant::now(),
    })
  }
}

fn http_client(config: &Config, timeout: Duration) -> Result<reqwest::Client> {
  let client = reqwest::Client::builder()
    .user_agent(&config.user_agent)
    .connect_timeout(Duration::from_secs(10))
    .timeout(timeout)
    .build()?;
  Ok(client)
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .init();

  let config = Config::from_env()?;
  error::expose_details(config.expose_error_details);
  let state = AppState::from_config(&config)?;
  let addr = config.bind_addr;

  Toplevel::new(move |s| async move {
    s.start(SubsystemBuilder::new("http", move |subsys| {
      serve(subsys, addr, state)
    }));
  })
  .catch_signals()
  .handle_shutdown_requests(Duration::from_secs(5))
  .await?;

  Ok(())
}

async fn serve(
  subsys: SubsystemHandle,
  addr: SocketAddr,
  state: AppState,
) -> Result<(), BoxError> {
  info!("Listening on {}", addr);

  axum::Server::bind(&addr)
    .serve(app(state).into_make_service())
    .with_graceful_shutdown(subsys.on_shutdown_requested())
    .await?;

  Ok(())
}

pub fn app(state: AppState) -> Router {
  Router::new()
    .route("/", get(homepage))
    .route("/health", get(health))
    .route("/api/ytdl", get(info::video_info))
    .route("/api/xdown-yt", get(info::video_info))
    .route("/api/download/:video_id", get(download::download))
    .fallback(not_found)
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
    .with_state(state)
}

async fn homepage() -> impl IntoResponse {
  Json(json!({
    "status": "online",
    "message": "YouTube video info and download API",
    "version": VERSION,
    "endpoints": {
      "documentation": "GET /",
      "health": "GET /health",
      "download_info": "GET /api/ytdl?link=YOUTUBE_URL_OR_ID",
      "direct_download": "GET /api/download/:videoId?quality=QUALITY&itag=ITAG",
    },
    "usage": {
      "example": error::EXAMPLE_INFO_REQUEST,
      "parameters": {
        "link": "YouTube URL or Video ID (required)",
      },
    },
    "features": [
      "Multiple source fallback",
      "Audio/video formats",
      "File size estimation",
      "CORS enabled",
    ],
  }))
}

async fn health(
  axum::extract::State(state): axum::extract::State<AppState>,
) -> impl IntoResponse {
  Json(json!({
    "status": "healthy",
    "timestamp": chrono::Utc::now().to_rfc3339(),
    "uptime": state.started_at.elapsed().as_secs_f64(),
  }))
}

async fn not_found() -> impl IntoResponse {
  (
    StatusCode::NOT_FOUND,
    Json(json!({
      "status": "error",
      "message": "Endpoint not found",
      "available_endpoints": ENDPOINTS,
    })),
  )
}
