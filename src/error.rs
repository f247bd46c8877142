use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use tracing::{error, warn};

// attach the debug representation of server errors to the response body.
// set once at startup from `Config::expose_error_details`.
static EXPOSE_DETAILS: OnceCell<bool> = OnceCell::new();

pub fn expose_details(enabled: bool) {
  if EXPOSE_DETAILS.set(enabled).is_err() {
    warn!("error detail exposure was already configured");
  }
}

pub const EXAMPLE_INFO_REQUEST: &str =
  "/api/ytdl?link=https://youtu.be/dQw4w9WgXcQ";

#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("Missing '{0}' parameter")]
  MissingParameter(&'static str),
  #[error("Invalid YouTube URL or ID")]
  InvalidReference(String),
  #[error("Invalid video ID")]
  InvalidVideoId(String),
  #[error("Video not found or cannot be accessed")]
  NoSourceAvailable(String),
  #[error("Requested format not available")]
  FormatUnavailable,
  #[error("invalid configuration: {0}")]
  Config(String),
  #[error("extraction failed: {0}")]
  Extraction(String),
  #[error("Download failed: {0}")]
  Download(Box<Error>),
  #[error(transparent)]
  Http(#[from] reqwest::Error),
  #[error(transparent)]
  Json(#[from] serde_json::Error),
  #[error(transparent)]
  IO(#[from] std::io::Error),
  #[error(transparent)]
  Response(#[from] http::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub fn status(&self) -> StatusCode {
    match self {
      Error::MissingParameter(_)
      | Error::InvalidReference(_)
      | Error::InvalidVideoId(_) => StatusCode::BAD_REQUEST,
      Error::NoSourceAvailable(_) | Error::FormatUnavailable => {
        StatusCode::NOT_FOUND
      }
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  // client errors keep their own message, everything else is reported as
  // a failed download.
  pub fn into_download_error(self) -> Error {
    if self.status().is_server_error() {
      Error::Download(Box::new(self))
    } else {
      self
    }
  }
}

impl Error {
  fn body(&self, expose_details: bool) -> Value {
    let mut body = json!({
      "status": "error",
      "message": self.to_string(),
    });

    match self {
      Error::MissingParameter(_) => {
        body["example"] = json!(EXAMPLE_INFO_REQUEST);
      }
      Error::NoSourceAvailable(video_id) => {
        body["videoId"] = json!(video_id);
      }
      _ => (),
    }

    if expose_details && self.status().is_server_error() {
      body["detail"] = json!(format!("{:?}", self));
    }

    body
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!("request failed: {:?}", self);
    }

    let body = self.body(EXPOSE_DETAILS.get().copied().unwrap_or(false));
    (status, Json(body)).into_response()
  }
}
