use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::{json, Value};

use crate::{
  library::{Extraction, LibraryFormat, LibraryInfo, PlayerLibrary},
  source::{Source, UpstreamVideoInfo},
  video_id::VideoRef,
  Error, Result,
};

pub const STREAM_CHUNKS: [&[u8]; 2] = [b"chunk-1", b"chunk-2"];

pub enum SourceBehavior {
  Answer,
  Empty,
  Fail,
}

pub struct MockSource {
  name: String,
  behavior: SourceBehavior,
  calls: Arc<AtomicUsize>,
}

impl MockSource {
  pub fn new(name: &str, behavior: SourceBehavior) -> Self {
    Self {
      name: name.to_owned(),
      behavior,
      calls: Arc::default(),
    }
  }

  pub fn calls(&self) -> Arc<AtomicUsize> {
    self.calls.clone()
  }
}

#[async_trait]
impl Source for MockSource {
  fn name(&self) -> &str {
    &self.name
  }

  async fn fetch(&self, _video: &VideoRef) -> Result<Option<UpstreamVideoInfo>> {
    self.calls.fetch_add(1, Ordering::SeqCst);

    match self.behavior {
      SourceBehavior::Answer => {
        Ok(Some(UpstreamVideoInfo::Library(library_fixture())))
      }
      SourceBehavior::Empty => Ok(None),
      SourceBehavior::Fail => Err(Error::Extraction("connection reset".into())),
    }
  }
}

/// Header the proxying library asks the download client to send upstream.
pub const UPSTREAM_HEADER: (&str, &str) = ("x-upstream-token", "secret");

pub struct MockLibrary {
  info: Option<LibraryInfo>,
  // when set, formats are served through this url instead of locally
  proxy_url: Option<String>,
  info_calls: Arc<AtomicUsize>,
}

impl MockLibrary {
  pub fn new(info: LibraryInfo) -> Self {
    Self {
      info: Some(info),
      proxy_url: None,
      info_calls: Arc::default(),
    }
  }

  pub fn proxying(info: LibraryInfo, url: String) -> Self {
    Self {
      proxy_url: Some(url),
      ..Self::new(info)
    }
  }

  pub fn unavailable() -> Self {
    Self {
      info: None,
      proxy_url: None,
      info_calls: Arc::default(),
    }
  }

  pub fn info_calls(&self) -> Arc<AtomicUsize> {
    self.info_calls.clone()
  }
}

#[async_trait]
impl PlayerLibrary for MockLibrary {
  async fn get_info(&self, _video: &VideoRef) -> Result<LibraryInfo> {
    self.info_calls.fetch_add(1, Ordering::SeqCst);

    self.info.clone().ok_or_else(|| {
      Error::Extraction("ERROR: [youtube] Video unavailable".into())
    })
  }

  async fn stream(
    &self,
    _video: &VideoRef,
    _format: &LibraryFormat,
  ) -> Result<Extraction> {
    if let Some(url) = &self.proxy_url {
      let (name, value) = UPSTREAM_HEADER;
      return Ok(Extraction::Proxy {
        url: url.clone(),
        headers: vec![(name.to_owned(), value.to_owned())],
      });
    }

    let chunks =
      STREAM_CHUNKS.map(|chunk| Ok::<_, Error>(Bytes::from_static(chunk)));
    let stream = futures::stream::iter(chunks).boxed();
    Ok(Extraction::Stream { stream })
  }
}

/// Run `router` on an ephemeral local port and return its base url.
pub async fn serve(router: Router) -> String {
  let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
  let addr = listener.local_addr().unwrap();
  let server = axum::Server::from_tcp(listener)
    .unwrap()
    .serve(router.into_make_service());
  tokio::spawn(server);

  format!("http://{addr}")
}

fn media_format(
  id: &str,
  ext: &str,
  height: Option<u32>,
  vcodec: &str,
  acodec: &str,
) -> Value {
  json!({
    "format_id": id,
    "ext": ext,
    "height": height,
    "vcodec": vcodec,
    "acodec": acodec,
    "protocol": "https",
    "url": format!("https://rr3.googlevideo.com/videoplayback?itag={id}"),
  })
}

/// Trimmed `yt-dlp -j` output.
pub fn library_fixture() -> LibraryInfo {
  let mut formats = vec![
    json!({
      "format_id": "sb0", "ext": "mhtml", "vcodec": "none", "acodec": "none",
      "protocol": "mhtml", "url": "https://i.ytimg.com/sb/dQw4w9WgXcQ/M0.jpg"
    }),
    json!({
      "format_id": "140", "ext": "m4a", "vcodec": "none",
      "acodec": "mp4a.40.2", "abr": 129.5, "tbr": 129.5,
      "filesize": 3433514, "protocol": "https",
      "url": "https://rr3.googlevideo.com/videoplayback?itag=140"
    }),
    json!({
      "format_id": "251", "ext": "webm", "vcodec": "none", "acodec": "opus",
      "abr": 135.2, "protocol": "https",
      "url": "https://rr3.googlevideo.com/videoplayback?itag=251"
    }),
    json!({
      "format_id": "401", "ext": "mp4", "height": 2160, "vcodec": "av01",
      "acodec": "none"
    }),
  ];

  for (id, ext, height, vcodec, acodec) in [
    ("160", "mp4", 144, "avc1.4d400c", "none"),
    ("278", "webm", 144, "vp9", "none"),
    ("133", "mp4", 240, "avc1.4d4015", "none"),
    ("18", "mp4", 360, "avc1.42001E", "mp4a.40.2"),
    ("134", "mp4", 360, "avc1.4d401e", "none"),
    ("243", "webm", 360, "vp9", "none"),
    ("135", "mp4", 480, "avc1.4d401f", "none"),
    ("244", "webm", 480, "vp9", "none"),
    ("22", "mp4", 720, "avc1.64001F", "mp4a.40.2"),
    ("136", "mp4", 720, "avc1.4d401f", "none"),
    ("247", "webm", 720, "vp9", "none"),
    ("137", "mp4", 1080, "avc1.640028", "none"),
    ("248", "webm", 1080, "vp9", "none"),
  ] {
    formats.push(media_format(id, ext, Some(height), vcodec, acodec));
  }

  serde_json::from_value(json!({
    "id": "dQw4w9WgXcQ",
    "title": "Rick Astley - Never Gonna Give You Up (Official Music Video)",
    "description": "The official video for “Never Gonna Give You Up”",
    "duration": 212.0,
    "upload_date": "20091025",
    "thumbnail": "https://i.ytimg.com/vi_webp/dQw4w9WgXcQ/maxresdefault.webp",
    "channel": "Rick Astley",
    "channel_id": "UCuAXFkgsw1L7xaCfnd5JJOw",
    "channel_url": "https://www.youtube.com/channel/UCuAXFkgsw1L7xaCfnd5JJOw",
    "uploader": "Rick Astley",
    "formats": formats,
  }))
  .unwrap()
}

/// Trimmed innertube player response.
pub fn player_fixture() -> Value {
  json!({
    "playabilityStatus": {"status": "OK"},
    "videoDetails": {
      "videoId": "dQw4w9WgXcQ",
      "title": "Never Gonna Give You Up",
      "lengthSeconds": "212",
      "channelId": "UCuAXFkgsw1L7xaCfnd5JJOw",
      "shortDescription": "The official video",
      "author": "Rick Astley",
      "thumbnail": {"thumbnails": [
        {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/default.jpg", "width": 120},
        {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/sddefault.jpg", "width": 640}
      ]}
    },
    "streamingData": {
      "formats": [{
        "itag": 18,
        "url": "https://rr3.googlevideo.com/videoplayback?itag=18",
        "mimeType": "video/mp4; codecs=\"avc1.42001E, mp4a.40.2\"",
        "qualityLabel": "360p", "height": 360, "fps": 25,
        "bitrate": 503000, "contentLength": "9000000"
      }],
      "adaptiveFormats": [
        {
          "itag": 137,
          "signatureCipher": "s=AOq0QJ8wRAIg&sp=sig&url=https%3A%2F%2Frr3",
          "mimeType": "video/mp4; codecs=\"avc1.640028\"",
          "qualityLabel": "1080p", "height": 1080, "fps": 25,
          "bitrate": 4400000, "contentLength": "80183447"
        },
        {
          "itag": 247,
          "url": "https://rr3.googlevideo.com/videoplayback?itag=247",
          "mimeType": "video/webm; codecs=\"vp9\"",
          "height": 720, "fps": 25, "bitrate": 1500000
        },
        {
          "itag": 999,
          "mimeType": "video/mp4; codecs=\"av01.0.12M.08\"",
          "qualityLabel": "2160p", "height": 2160
        },
        {
          "itag": 140,
          "url": "https://rr3.googlevideo.com/videoplayback?itag=140",
          "mimeType": "audio/mp4; codecs=\"mp4a.40.2\"",
          "bitrate": 130685, "contentLength": "3433514",
          "audioQuality": "AUDIO_QUALITY_MEDIUM"
        }
      ]
    },
    "microformat": {
      "playerMicroformatRenderer": {
        "publishDate": "2009-10-24T23:57:33-07:00",
        "uploadDate": "2009-10-24T23:57:33-07:00"
      }
    }
  })
}
