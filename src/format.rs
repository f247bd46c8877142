use std::cmp::Reverse;

use chrono::NaiveDate;
use itertools::Itertools;
use serde::Serialize;

use crate::video_id::VideoRef;

/// Quality label of formats without a video track.
pub const AUDIO: &str = "audio";

pub const MAX_FORMATS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalVideo {
  pub id: String,
  pub title: String,
  pub description: String,
  pub duration: u64,
  pub upload_date: Option<String>,
  pub thumbnail: String,
  pub author: Author,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
  pub name: String,
  pub channel_id: String,
  pub profile_url: String,
}

impl CanonicalVideo {
  /// A record with every field set to its default, to be overwritten by
  /// whatever the source provides.
  pub fn placeholder(video: &VideoRef) -> Self {
    Self {
      id: video.to_string(),
      title: "Unknown Title".to_owned(),
      description: String::new(),
      duration: 0,
      upload_date: None,
      thumbnail: video.default_thumbnail(),
      author: Author {
        name: "Unknown".to_owned(),
        channel_id: String::new(),
        profile_url: String::new(),
      },
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatVariant {
  pub quality: String,
  pub format: String,
  pub fps: Option<u32>,
  pub bitrate: Option<String>,
  pub size: String,
  pub download_url: String,
}

impl FormatVariant {
  fn key(&self) -> (String, String) {
    (self.quality.clone(), self.format.clone())
  }
}

/// Drop repeated (quality, container) pairs keeping the first one, order
/// by quality with audio last and keep the best [`MAX_FORMATS`].
pub fn dedupe_and_rank(formats: Vec<FormatVariant>) -> Vec<FormatVariant> {
  let mut formats = formats
    .into_iter()
    .unique_by(FormatVariant::key)
    .collect::<Vec<_>>();

  // stable: equal keys keep their discovery order
  formats.sort_by_key(|f| rank_key(&f.quality));
  formats.truncate(MAX_FORMATS);
  formats
}

fn rank_key(quality: &str) -> (bool, Reverse<u32>) {
  (quality == AUDIO, Reverse(leading_number(quality)))
}

// "1080p60" -> 1080, "medium" -> 0
fn leading_number(quality: &str) -> u32 {
  let digits: String = quality
    .trim_start()
    .chars()
    .take_while(|c| c.is_ascii_digit())
    .collect();
  digits.parse().unwrap_or(0)
}

/// Served when a source answered without any usable format.
pub fn placeholder_formats(video: &VideoRef) -> Vec<FormatVariant> {
  let by_quality = |quality: &str| download_url(video, "quality", quality);

  vec![
    FormatVariant {
      quality: "1080p".to_owned(),
      format: "mp4".to_owned(),
      fps: Some(30),
      bitrate: None,
      size: "45MB".to_owned(),
      download_url: by_quality("1080p"),
    },
    FormatVariant {
      quality: "720p".to_owned(),
      format: "mp4".to_owned(),
      fps: Some(30),
      bitrate: None,
      size: "25MB".to_owned(),
      download_url: by_quality("720p"),
    },
    FormatVariant {
      quality: AUDIO.to_owned(),
      format: "mp3".to_owned(),
      fps: None,
      bitrate: Some("128kbps".to_owned()),
      size: "4MB".to_owned(),
      download_url: by_quality(AUDIO),
    },
  ]
}

pub fn download_url(video: &VideoRef, key: &str, value: &str) -> String {
  format!("/api/download/{video}?{key}={value}")
}

pub fn human_size(bytes: Option<u64>) -> String {
  const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

  let bytes = match bytes {
    None | Some(0) => return "Unknown".to_owned(),
    Some(bytes) => bytes,
  };

  let mut value = bytes as f64;
  let mut unit = 0;
  while value >= 1024.0 && unit < UNITS.len() - 1 {
    value /= 1024.0;
    unit += 1;
  }

  let value = format!("{value:.2}");
  let value = value.trim_end_matches('0').trim_end_matches('.');
  format!("{} {}", value, UNITS[unit])
}

pub fn kbps(kbits: f64) -> String {
  format!("{}kbps", kbits.round() as u64)
}

/// Normalize `YYYYMMDD` and ISO 8601 dates (with or without time) to
/// `YYYY-MM-DD`.
pub fn iso_date(raw: &str) -> Option<String> {
  let raw = raw.trim();
  let date = NaiveDate::parse_from_str(raw, "%Y%m%d")
    .ok()
    .or_else(|| NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok())?;
  Some(date.format("%Y-%m-%d").to_string())
}
