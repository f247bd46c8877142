use axum::{
  body::{self, StreamBody},
  extract::{Path, Query, State},
  http::{header, StatusCode},
  response::Response,
};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

use crate::{
  library::{Extraction, FormatSelector},
  video_id::VideoRef,
  AppState, Error, Result,
};

// keep word characters, spaces and dashes
static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"[^A-Za-z0-9_ -]").unwrap());

#[axum::debug_handler]
pub async fn download(
  State(state): State<AppState>,
  Path(video_id): Path<String>,
  Query(selector): Query<FormatSelector>,
) -> Result<Response> {
  let video = VideoRef::parse(&video_id)?;

  stream_format(&state, &video, &selector)
    .await
    .map_err(Error::into_download_error)
}

async fn stream_format(
  state: &AppState,
  video: &VideoRef,
  selector: &FormatSelector,
) -> Result<Response> {
  // looked up again on purpose: upstream urls expire
  let info = state.library.get_info(video).await?;
  let format = state.library.choose_format(&info, selector)?;
  let container = format.container();
  info!("streaming {} format {} ({})", video, format.format_id, container);

  let content_type = mime_guess::from_ext(container)
    .first_raw()
    .unwrap_or("video/mp4");
  let filename = attachment_name(info.title.as_deref(), video);

  let mut builder = Response::builder()
    .status(StatusCode::OK)
    .header(header::CONTENT_TYPE, content_type)
    .header(
      header::CONTENT_DISPOSITION,
      format!("attachment; filename=\"{filename}.{container}\""),
    );

  let body = match state.library.stream(video, format).await? {
    Extraction::Proxy { url, headers } => {
      let mut request = state.download_http.get(url);
      for (name, value) in headers {
        request = request.header(name, value);
      }

      let upstream = request.send().await?.error_for_status()?;
      if let Some(len) = upstream.content_length() {
        builder = builder.header(header::CONTENT_LENGTH, len);
      }

      body::boxed(StreamBody::new(upstream.bytes_stream()))
    }
    Extraction::Stream { stream } => body::boxed(StreamBody::new(stream)),
  };

  Ok(builder.body(body)?)
}

fn attachment_name(title: Option<&str>, video: &VideoRef) -> String {
  let name = UNSAFE_FILENAME_CHARS.replace_all(title.unwrap_or_default(), "");
  let name = name.trim();

  if name.is_empty() {
    video.to_string()
  } else {
    name.to_owned()
  }
}
