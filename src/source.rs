mod library;
mod mirror;
mod player;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
  config::Config,
  format::{placeholder_formats, CanonicalVideo, FormatVariant},
  library::{LibraryInfo, PlayerLibrary},
  video_id::VideoRef,
  Error, Result,
};

pub use self::library::LibrarySource;
pub use mirror::{Mirror, MirrorInfo};
pub use player::{ClientProfile, PlayerApi, PlayerResponse};

/// Raw answer of whichever source responded, tagged by its shape.
#[derive(Debug, Clone)]
pub enum UpstreamVideoInfo {
  Library(LibraryInfo),
  Player(PlayerResponse),
  Mirror(MirrorInfo),
}

impl UpstreamVideoInfo {
  /// Map the payload to the canonical record and its raw format list.
  /// A payload without usable formats gets the placeholder set.
  pub fn normalize(
    self,
    video: &VideoRef,
  ) -> (CanonicalVideo, Vec<FormatVariant>) {
    let (details, formats) = match self {
      UpstreamVideoInfo::Library(info) => library::normalize(info, video),
      UpstreamVideoInfo::Player(resp) => player::normalize(resp, video),
      UpstreamVideoInfo::Mirror(info) => mirror::normalize(info, video),
    };

    if formats.is_empty() {
      warn!("no usable formats for {}, serving placeholders", video);
      return (details, placeholder_formats(video));
    }

    (details, formats)
  }
}

#[async_trait]
pub trait Source: Send + Sync {
  fn name(&self) -> &str;

  /// `Ok(None)` means the source answered with nothing usable.
  async fn fetch(&self, video: &VideoRef) -> Result<Option<UpstreamVideoInfo>>;
}

pub struct Resolved {
  pub source: String,
  pub info: UpstreamVideoInfo,
}

pub struct Resolver {
  sources: Vec<Box<dyn Source>>,
}

impl Resolver {
  pub fn new(sources: Vec<Box<dyn Source>>) -> Self {
    Self { sources }
  }

  /// Build the registry named by `config.sources`, in that order.
  pub fn from_config(
    config: &Config,
    http: reqwest::Client,
    library: Arc<dyn PlayerLibrary>,
  ) -> Self {
    let mut sources: Vec<Box<dyn Source>> = vec![];

    for name in &config.sources {
      match name.as_str() {
        "library" => {
          sources.push(Box::new(LibrarySource::new(library.clone())))
        }
        "player-web" => sources.push(Box::new(PlayerApi::new(
          name,
          &config.player_web,
          ClientProfile::web(&config.player_web.client_version),
          http.clone(),
        ))),
        "player-android" => sources.push(Box::new(PlayerApi::new(
          name,
          &config.player_android,
          ClientProfile::android(&config.player_android.client_version),
          http.clone(),
        ))),
        "mirror" => match &config.mirror {
          Some(mirror) => {
            sources.push(Box::new(Mirror::new(mirror, http.clone())))
          }
          None => info!("mirror source skipped: MIRROR_BASE_URL not set"),
        },
        unknown => warn!("ignoring unknown source {:?}", unknown),
      }
    }

    let resolver = Self::new(sources);
    info!("sources: {}", resolver.source_names().join(", "));
    resolver
  }

  pub fn source_names(&self) -> Vec<&str> {
    self.sources.iter().map(|s| s.name()).collect()
  }

  /// Ask each source in turn. The first non-empty answer wins and later
  /// sources are not contacted.
  pub async fn resolve(&self, video: &VideoRef) -> Result<Resolved> {
    for source in &self.sources {
      match source.fetch(video).await {
        Ok(Some(info)) => {
          info!("resolved {} via {}", video, source.name());
          return Ok(Resolved {
            source: source.name().to_owned(),
            info,
          });
        }
        Ok(None) => warn!("source {} had nothing for {}", source.name(), video),
        Err(e) => warn!("source {} failed for {}: {}", source.name(), video, e),
      }
    }

    Err(Error::NoSourceAvailable(video.to_string()))
  }
}
