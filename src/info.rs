use axum::{
  extract::{Query, State},
  http::header,
  response::IntoResponse,
  Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  format::{dedupe_and_rank, CanonicalVideo, FormatVariant},
  video_id::VideoRef,
  AppState, Error, Result,
};

#[derive(Deserialize)]
pub struct VideoInfoReq {
  link: Option<String>,
}

#[derive(Serialize)]
struct VideoInfoResp {
  status: &'static str,
  data: VideoData,
}

#[derive(Serialize)]
struct VideoData {
  video: CanonicalVideo,
  formats: Vec<FormatVariant>,
}

pub async fn video_info(
  State(state): State<AppState>,
  Query(req): Query<VideoInfoReq>,
) -> Result<impl IntoResponse> {
  let link = req
    .link
    .as_deref()
    .map(str::trim)
    .filter(|link| !link.is_empty())
    .ok_or(Error::MissingParameter("link"))?;

  let video = VideoRef::extract(link)?;
  let resolved = state.resolver.resolve(&video).await?;
  let (details, formats) = resolved.info.normalize(&video);
  debug!("{} formats for {} from {}", formats.len(), video, resolved.source);

  let resp = VideoInfoResp {
    status: "success",
    data: VideoData {
      video: details,
      formats: dedupe_and_rank(formats),
    },
  };
  let cache_control = format!("public, max-age={}", state.cache_max_age);

  Ok(([(header::CACHE_CONTROL, cache_control)], Json(resp)))
}
