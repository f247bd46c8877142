use std::sync::Arc;

use async_trait::async_trait;

use crate::{
  format::{
    download_url, human_size, iso_date, kbps, CanonicalVideo, FormatVariant,
  },
  library::{LibraryInfo, PlayerLibrary},
  video_id::VideoRef,
  Result,
};

use super::{Source, UpstreamVideoInfo};

pub struct LibrarySource(Arc<dyn PlayerLibrary>);

impl LibrarySource {
  pub fn new(library: Arc<dyn PlayerLibrary>) -> Self {
    Self(library)
  }
}

#[async_trait]
impl Source for LibrarySource {
  fn name(&self) -> &str {
    "library"
  }

  async fn fetch(&self, video: &VideoRef) -> Result<Option<UpstreamVideoInfo>> {
    let info = self.0.get_info(video).await?;

    if info.formats.is_empty() && info.title.is_none() {
      return Ok(None);
    }

    Ok(Some(UpstreamVideoInfo::Library(info)))
  }
}

pub(super) fn normalize(
  info: LibraryInfo,
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
  details.author.profile_url =
    info.channel_url.or(info.uploader_url).unwrap_or_else(|| {
      let handle: String = details
        .author
        .name
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
      format!("https://www.youtube.com/@{handle}")
    });

  let formats = info
    .formats
    .iter()
    .filter(|f| f.url.is_some())
    .filter_map(|f| {
      let quality = f.quality_label()?;
      Some(FormatVariant {
        quality,
        format: f.container().to_owned(),
        fps: f.fps.map(|fps| fps.round() as u32),
        bitrate: f.abr.map(kbps),
        size: human_size(f.size()),
        download_url: download_url(video, "itag", &f.format_id),
      })
    })
    .collect();

  (details, formats)
}
