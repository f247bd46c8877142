mod ytdlp;

use std::{cmp::Ordering, collections::HashMap};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::Deserialize;

use crate::{format::AUDIO, video_id::VideoRef, Error, Result};

pub use ytdlp::Ytdlp;

/// How the bytes of a chosen format reach the caller.
pub enum Extraction {
  /// Fetch the url with the given headers and pipe the body through.
  Proxy {
    url: String,
    headers: Vec<(String, String)>,
  },
  /// Bytes produced locally.
  Stream {
    stream: BoxStream<'static, Result<Bytes>>,
  },
}

/// The embedded player-info capability: look a video up, pick one of its
/// formats and stream it.
#[async_trait]
pub trait PlayerLibrary: Send + Sync {
  async fn get_info(&self, video: &VideoRef) -> Result<LibraryInfo>;

  async fn stream(
    &self,
    video: &VideoRef,
    format: &LibraryFormat,
  ) -> Result<Extraction>;

  fn choose_format<'a>(
    &self,
    info: &'a LibraryInfo,
    selector: &FormatSelector,
  ) -> Result<&'a LibraryFormat> {
    select_format(&info.formats, selector)
  }
}

// the subset of `yt-dlp -j` output we care about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryInfo {
  #[serde(default)]
  pub id: String,
  pub title: Option<String>,
  pub description: Option<String>,
  pub duration: Option<f64>,
  pub upload_date: Option<String>,
  pub thumbnail: Option<String>,
  pub channel: Option<String>,
  pub channel_id: Option<String>,
  pub channel_url: Option<String>,
  pub uploader: Option<String>,
  pub uploader_url: Option<String>,
  #[serde(default)]
  pub formats: Vec<LibraryFormat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryFormat {
  pub format_id: String,
  pub format_note: Option<String>,
  pub ext: Option<String>,
  pub url: Option<String>,
  pub protocol: Option<String>,
  pub height: Option<u32>,
  pub fps: Option<f64>,
  pub abr: Option<f64>,
  pub tbr: Option<f64>,
  pub filesize: Option<u64>,
  pub filesize_approx: Option<u64>,
  pub vcodec: Option<String>,
  pub acodec: Option<String>,
  #[serde(default)]
  pub http_headers: HashMap<String, String>,
}

impl LibraryFormat {
  pub fn has_video(&self) -> bool {
    codec_present(&self.vcodec)
  }

  pub fn has_audio(&self) -> bool {
    codec_present(&self.acodec)
  }

  pub fn container(&self) -> &str {
    self.ext.as_deref().unwrap_or("mp4")
  }

  /// `<height>p` for formats with video, [`AUDIO`] for audio-only ones and
  /// nothing for storyboards and the like.
  pub fn quality_label(&self) -> Option<String> {
    if self.has_video() {
      self.height.map(|h| format!("{h}p"))
    } else if self.has_audio() {
      Some(AUDIO.to_owned())
    } else {
      None
    }
  }

  pub fn size(&self) -> Option<u64> {
    self.filesize.or(self.filesize_approx)
  }

  fn rank(&self) -> (u32, f64) {
    let bitrate = self.tbr.or(self.abr).unwrap_or_default();
    (self.height.unwrap_or_default(), bitrate)
  }

  fn matches_quality(&self, quality: &str) -> bool {
    match quality {
      "audio" => self.has_audio() && !self.has_video(),
      "video" => self.has_video() && !self.has_audio(),
      label => {
        self.quality_label().as_deref() == Some(label)
          || self.format_note.as_deref() == Some(label)
      }
    }
  }
}

fn codec_present(codec: &Option<String>) -> bool {
  matches!(codec.as_deref(), Some(codec) if codec != "none")
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormatSelector {
  pub itag: Option<String>,
  pub quality: Option<String>,
  pub format: Option<String>,
}

impl FormatSelector {
  fn field(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
  }
}

/// Pick a format: exact itag, else quality label, else format id or
/// container, else the best format carrying both audio and video.
pub fn select_format<'a>(
  formats: &'a [LibraryFormat],
  selector: &FormatSelector,
) -> Result<&'a LibraryFormat> {
  let mut playable = formats.iter().filter(|f| f.has_audio() || f.has_video());

  let chosen = if let Some(itag) = FormatSelector::field(&selector.itag) {
    playable.find(|f| f.format_id == itag)
  } else if let Some(quality) = FormatSelector::field(&selector.quality) {
    best(playable.filter(|f| f.matches_quality(quality)))
  } else if let Some(format) = FormatSelector::field(&selector.format) {
    best(playable.filter(|f| f.format_id == format || f.container() == format))
  } else {
    best(playable.filter(|f| f.has_audio() && f.has_video()))
  };

  chosen.ok_or(Error::FormatUnavailable)
}

fn best<'a>(
  formats: impl Iterator<Item = &'a LibraryFormat>,
) -> Option<&'a LibraryFormat> {
  formats.max_by(|a, b| {
    a.rank().partial_cmp(&b.rank()).unwrap_or(Ordering::Equal)
  })
}

#[cfg(test)]
mod test {
  use super::*;

  fn format(
    id: &str,
    ext: &str,
    height: Option<u32>,
    vcodec: &str,
    acodec: &str,
    tbr: f64,
  ) -> LibraryFormat {
    LibraryFormat {
      format_id: id.to_owned(),
      ext: Some(ext.to_owned()),
      height,
      vcodec: Some(vcodec.to_owned()),
      acodec: Some(acodec.to_owned()),
      tbr: Some(tbr),
      url: Some(format!("https://example.invalid/{id}")),
      ..Default::default()
    }
  }

  fn formats() -> Vec<LibraryFormat> {
    vec![
      format("sb0", "mhtml", None, "none", "none", 0.0),
      format("18", "mp4", Some(360), "avc1.42001E", "mp4a.40.2", 500.0),
      format("22", "mp4", Some(720), "avc1.64001F", "mp4a.40.2", 1200.0),
      format("137", "mp4", Some(1080), "avc1.640028", "none", 4000.0),
      format("248", "webm", Some(1080), "vp9", "none", 2500.0),
      format("140", "m4a", None, "none", "mp4a.40.2", 129.0),
      format("251", "webm", None, "none", "opus", 140.0),
    ]
  }

  fn select(selector: FormatSelector) -> Result<String> {
    let formats = formats();
    select_format(&formats, &selector).map(|f| f.format_id.clone())
  }

  #[test]
  fn test_select_by_itag() {
    let selector = FormatSelector {
      itag: Some("140".into()),
      quality: Some("1080p".into()),
      ..Default::default()
    };
    assert_eq!(select(selector).unwrap(), "140");

    let selector = FormatSelector {
      itag: Some("999".into()),
      ..Default::default()
    };
    assert!(matches!(select(selector), Err(Error::FormatUnavailable)));

    // storyboards are never served
    let selector = FormatSelector {
      itag: Some("sb0".into()),
      ..Default::default()
    };
    assert!(select(selector).is_err());
  }

  #[test]
  fn test_select_by_quality() {
    let by_quality = |q: &str| {
      select(FormatSelector {
        quality: Some(q.into()),
        ..Default::default()
      })
    };

    assert_eq!(by_quality("1080p").unwrap(), "137");
    assert_eq!(by_quality("720p").unwrap(), "22");
    assert_eq!(by_quality("audio").unwrap(), "251");
    assert_eq!(by_quality("video").unwrap(), "137");
    assert!(matches!(by_quality("4320p"), Err(Error::FormatUnavailable)));
  }

  #[test]
  fn test_select_by_format() {
    let by_format = |f: &str| {
      select(FormatSelector {
        format: Some(f.into()),
        ..Default::default()
      })
    };

    assert_eq!(by_format("248").unwrap(), "248");
    assert_eq!(by_format("m4a").unwrap(), "140");
    assert_eq!(by_format("mp4").unwrap(), "137");
    assert!(by_format("flv").is_err());
  }

  #[test]
  fn test_select_default_has_audio_and_video() {
    assert_eq!(select(FormatSelector::default()).unwrap(), "22");

    let blank = FormatSelector {
      itag: Some(" ".into()),
      ..Default::default()
    };
    assert_eq!(select(blank).unwrap(), "22");

    let adaptive_only: Vec<_> = formats()
      .into_iter()
      .filter(|f| !(f.has_audio() && f.has_video()))
      .collect();
    assert!(matches!(
      select_format(&adaptive_only, &FormatSelector::default()),
      Err(Error::FormatUnavailable)
    ));
  }

  #[test]
  fn test_quality_label() {
    let formats = formats();
    let labels: Vec<_> =
      formats.iter().map(LibraryFormat::quality_label).collect();
    assert_eq!(labels[0], None);
    assert_eq!(labels[1].as_deref(), Some("360p"));
    assert_eq!(labels[5].as_deref(), Some("audio"));
  }
}
