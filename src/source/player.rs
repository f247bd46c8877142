use async_trait::async_trait;
use reqwest::header;
use serde::Deserialize;
use serde_aux::prelude::*;
use tracing::debug;

use crate::{
  config::PlayerApiConfig,
  format::{
    download_url, human_size, iso_date, kbps, CanonicalVideo, FormatVariant,
    AUDIO,
  },
  video_id::VideoRef,
  Result,
};

use super::{Source, UpstreamVideoInfo};

/// The innertube client a player request claims to be.
#[derive(Debug, Clone)]
pub struct ClientProfile {
  pub client_name: &'static str,
  pub client_version: String,
  pub hl: Option<&'static str>,
  pub gl: Option<&'static str>,
  pub android_sdk_version: Option<u32>,
}

impl ClientProfile {
  pub fn web(version: &str) -> Self {
    Self {
      client_name: "WEB",
      client_version: version.to_owned(),
      hl: Some("en"),
      gl: Some("US"),
      android_sdk_version: None,
    }
  }

  pub fn android(version: &str) -> Self {
    Self {
      client_name: "ANDROID",
      client_version: version.to_owned(),
      hl: None,
      gl: None,
      android_sdk_version: Some(33),
    }
  }
}

mod request {
  use serde::Serialize;

  #[derive(Serialize)]
  #[serde(rename_all = "camelCase")]
  pub struct Player<'a> {
    pub context: Context<'a>,
    pub video_id: &'a str,
  }

  #[derive(Serialize)]
  pub struct Context<'a> {
    pub client: Client<'a>,
  }

  #[derive(Serialize)]
  #[serde(rename_all = "camelCase")]
  pub struct Client<'a> {
    pub client_name: &'a str,
    pub client_version: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hl: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gl: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android_sdk_version: Option<u32>,
  }
}

/// YouTube's internal player endpoint.
pub struct PlayerApi {
  name: String,
  endpoint: String,
  api_key: Option<String>,
  profile: ClientProfile,
  http: reqwest::Client,
}

impl PlayerApi {
  pub fn new(
    name: &str,
    config: &PlayerApiConfig,
    profile: ClientProfile,
    http: reqwest::Client,
  ) -> Self {
    Self {
      name: name.to_owned(),
      endpoint: config.endpoint.clone(),
      api_key: config.api_key.clone(),
      profile,
      http,
    }
  }

  fn body<'a>(&'a self, video: &'a VideoRef) -> request::Player<'a> {
    request::Player {
      context: request::Context {
        client: request::Client {
          client_name: self.profile.client_name,
          client_version: &self.profile.client_version,
          hl: self.profile.hl,
          gl: self.profile.gl,
          android_sdk_version: self.profile.android_sdk_version,
        },
      },
      video_id: video.as_str(),
    }
  }
}

#[async_trait]
impl Source for PlayerApi {
  fn name(&self) -> &str {
    &self.name
  }

  async fn fetch(&self, video: &VideoRef) -> Result<Option<UpstreamVideoInfo>> {
    let mut request = self
      .http
      .post(&self.endpoint)
      .header(header::ACCEPT, "application/json")
      .json(&self.body(video));

    if let Some(key) = &self.api_key {
      request = request.query(&[("key", key)]);
    }

    let resp: PlayerResponse = request
      .send()
      .await?
      .error_for_status()?
      .json()
      .await?;

    if resp.is_empty() {
      if let Some(status) = &resp.playability_status {
        debug!(
          "{} playability for {}: {} {}",
          self.name,
          video,
          status.status,
          status.reason.as_deref().unwrap_or_default()
        );
      }
      return Ok(None);
    }

    Ok(Some(UpstreamVideoInfo::Player(resp)))
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResponse {
  pub playability_status: Option<PlayabilityStatus>,
  pub video_details: Option<VideoDetails>,
  pub streaming_data: Option<StreamingData>,
  pub microformat: Option<Microformat>,
}

impl PlayerResponse {
  fn is_empty(&self) -> bool {
    let unplayable = self
      .playability_status
      .as_ref()
      .map(|s| s.status != "OK")
      .unwrap_or(false);

    unplayable || (self.video_details.is_none() && self.streaming_data.is_none())
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayabilityStatus {
  pub status: String,
  pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
  pub title: Option<String>,
  pub author: Option<String>,
  pub channel_id: Option<String>,
  pub short_description: Option<String>,
  #[serde(deserialize_with = "deserialize_option_number_from_string")]
  #[serde(default)]
  pub length_seconds: Option<u64>,
  pub thumbnail: Option<ThumbnailList>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThumbnailList {
  #[serde(default)]
  pub thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnail {
  pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingData {
  #[serde(default)]
  pub formats: Vec<Format>,
  #[serde(default)]
  pub adaptive_formats: Vec<Format>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Format {
  pub itag: u32,
  pub url: Option<String>,
  pub signature_cipher: Option<String>,
  pub cipher: Option<String>,
  pub mime_type: Option<String>,
  pub quality_label: Option<String>,
  pub height: Option<u32>,
  pub fps: Option<u32>,
  pub bitrate: Option<u64>,
  #[serde(deserialize_with = "deserialize_option_number_from_string")]
  #[serde(default)]
  pub content_length: Option<u64>,
}

impl Format {
  // "video/mp4; codecs=\"avc1.4d401f\"" -> "mp4"
  fn container(&self) -> String {
    self
      .mime_type
      .as_deref()
      .and_then(|mime| mime.split('/').nth(1))
      .and_then(|subtype| subtype.split(';').next())
      .map(str::trim)
      .filter(|subtype| !subtype.is_empty())
      .unwrap_or("mp4")
      .to_owned()
  }

  fn has_location(&self) -> bool {
    self.url.is_some() || self.signature_cipher.is_some() || self.cipher.is_some()
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Microformat {
  pub player_microformat_renderer: Option<MicroformatRenderer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroformatRenderer {
  /// ISO 8601 date
  pub publish_date: Option<String>,
  /// ISO 8601 date
  pub upload_date: Option<String>,
}

pub(super) fn normalize(
  resp: PlayerResponse,
  video: &VideoRef,
) -> (CanonicalVideo, Vec<FormatVariant>) {
  let mut details = CanonicalVideo::placeholder(video);

  details.upload_date = resp
    .microformat
    .and_then(|m| m.player_microformat_renderer)
    .and_then(|r| r.publish_date.or(r.upload_date))
    .as_deref()
    .and_then(iso_date);

  let video_details = resp.video_details.unwrap_or_default();
  if let Some(title) = video_details.title {
    details.title = title;
  }
  details.description = video_details.short_description.unwrap_or_default();
  details.duration = video_details.length_seconds.unwrap_or_default();
  if let Some(thumbnail) = video_details
    .thumbnail
    .and_then(|list| list.thumbnails.into_iter().last())
  {
    details.thumbnail = thumbnail.url;
  }
  if let Some(author) = video_details.author {
    details.author.name = author;
  }
  details.author.channel_id = video_details.channel_id.unwrap_or_default();
  details.author.profile_url = format!(
    "https://www.youtube.com/channel/{}",
    details.author.channel_id
  );

  let streaming_data = resp.streaming_data.unwrap_or_default();
  let formats = streaming_data
    .formats
    .into_iter()
    .chain(streaming_data.adaptive_formats)
    .filter(Format::has_location)
    .map(|f| FormatVariant {
      quality: f
        .quality_label
        .clone()
        .or_else(|| f.height.map(|h| format!("{h}p")))
        .unwrap_or_else(|| AUDIO.to_owned()),
      format: f.container(),
      fps: f.fps,
      bitrate: f.bitrate.map(|bps| kbps(bps as f64 / 1000.0)),
      size: human_size(f.content_length),
      download_url: download_url(video, "itag", &f.itag.to_string()),
    })
    .collect();

  (details, formats)
}
