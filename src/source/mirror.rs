use async_trait::async_trait;
use chrono::Utc;
use reqwest::header;
use serde::Deserialize;
use serde_aux::prelude::*;
use tracing::debug;

use crate::{
  config::MirrorConfig,
  format::{
    download_url, human_size, iso_date, kbps, CanonicalVideo, FormatVariant,
    AUDIO,
  },
  video_id::VideoRef,
  Result,
};

use super::{Source, UpstreamVideoInfo};

/// A third-party mirror that hands out a session token before answering
/// video lookups.
pub struct Mirror {
  base_url: String,
  init_query: Option<String>,
  http: reqwest::Client,
}

impl Mirror {
  pub fn new(config: &MirrorConfig, http: reqwest::Client) -> Self {
    Self {
      base_url: config.base_url.clone(),
      init_query: config.init_query.clone(),
      http,
    }
  }

  fn init_url(&self) -> String {
    match &self.init_query {
      Some(query) => format!("{}/api/v1/init?{}", self.base_url, query),
      None => format!("{}/api/v1/init", self.base_url),
    }
  }

  fn get(&self, url: String) -> reqwest::RequestBuilder {
    self
      .http
      .get(url)
      .header(header::ACCEPT, "application/json")
      .header(header::REFERER, format!("{}/", self.base_url))
  }

  async fn init_token(&self) -> Result<Option<String>> {
    #[derive(Deserialize)]
    struct InitResp {
      token: Option<String>,
    }

    let resp: InitResp = self
      .get(self.init_url())
      .query(&[("_", Utc::now().timestamp_millis())])
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    Ok(resp.token.filter(|token| !token.is_empty()))
  }
}

#[async_trait]
impl Source for Mirror {
  fn name(&self) -> &str {
    "mirror"
  }

  async fn fetch(&self, video: &VideoRef) -> Result<Option<UpstreamVideoInfo>> {
    let Some(token) = self.init_token().await? else {
      debug!("mirror handed out no token for {}", video);
      return Ok(None);
    };

    let info: MirrorInfo = self
      .get(format!("{}/api/v1/video", self.base_url))
      .query(&[("url", video.watch_url()), ("token", token)])
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    if info.formats.is_empty() && info.title.is_none() {
      return Ok(None);
    }

    Ok(Some(UpstreamVideoInfo::Mirror(info)))
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MirrorInfo {
  pub title: Option<String>,
  pub description: Option<String>,
  #[serde(deserialize_with = "deserialize_option_number_from_string")]
  #[serde(default)]
  pub duration: Option<f64>,
  pub upload_date: Option<String>,
  pub thumbnail: Option<String>,
  pub channel: Option<String>,
  pub uploader: Option<String>,
  pub channel_id: Option<String>,
  pub channel_url: Option<String>,
  #[serde(default)]
  pub formats: Vec<MirrorFormat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MirrorFormat {
  pub format_id: Option<String>,
  pub format_note: Option<String>,
  pub ext: Option<String>,
  pub url: Option<String>,
  pub height: Option<u32>,
  pub fps: Option<f64>,
  pub abr: Option<f64>,
  pub filesize: Option<u64>,
}

pub(super) fn normalize(
  info: MirrorInfo,
  video: &VideoRef,
) -> (CanonicalVideo, Vec<FormatVariant>) {
  let mut details = CanonicalVideo::placeholder(video);

  if let Some(title) = info.title {
    details.title = title;
  }
  details.description = info.description.unwrap_or_default();
  details.duration = info.duration.unwrap_or_default().max(0.0) as u64;
  details.upload_date = info.upload_date.as_deref().and_then(iso_date);
  if let Some(thumbnail) = info.thumbnail {
    details.thumbnail = thumbnail;
  }
  if let Some(name) = info.channel.or(info.uploader) {
    details.author.name = name;
  }
  details.author.channel_id = info.channel_id.unwrap_or_default();
  details.author.profile_url = info.channel_url.unwrap_or_default();

  let formats = info
    .formats
    .into_iter()
    .filter(|f| f.url.is_some())
    .map(|f| {
      let quality = f
        .format_note
        .clone()
        .or_else(|| f.height.map(|h| format!("{h}p")))
        .unwrap_or_else(|| AUDIO.to_owned());
      let download_url = match &f.format_id {
        Some(id) => download_url(video, "format", id),
        None => download_url(video, "quality", &quality),
      };

      FormatVariant {
        format: f.ext.clone().unwrap_or_else(|| "mp4".to_owned()),
        fps: f.fps.map(|fps| fps.round() as u32),
        bitrate: f.abr.map(kbps),
        size: human_size(f.filesize),
        download_url,
        quality,
      }
    })
    .collect();

  (details, formats)
}
