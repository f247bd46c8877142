use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{Error, Result};

static BARE_ID: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap());

// watch?v=, watch?...&v=, embed/, v/, shorts/, live/ and youtu.be/ urls.
// the id must not be followed by another id character.
static URL_ID: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r"(?:youtube(?:-nocookie)?\.com/(?:watch\?(?:[^#\s]*&)?v=|embed/|v/|shorts/|live/)|youtu\.be/)([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
  )
  .unwrap()
});

/// A validated 11 character YouTube video id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoRef(String);

impl VideoRef {
  /// Find the video id in a free-form reference: a bare id or any of the
  /// known url shapes.
  pub fn extract(input: &str) -> Result<Self> {
    let input = input.trim();

    if BARE_ID.is_match(input) && !looks_like_slug(input) {
      return Ok(Self(input.to_owned()));
    }

    URL_ID
      .captures(input)
      .and_then(|caps| caps.get(1))
      .map(|id| Self(id.as_str().to_owned()))
      .ok_or_else(|| Error::InvalidReference(input.to_owned()))
  }

  /// Accept only a bare id, as found in a download path.
  pub fn parse(id: &str) -> Result<Self> {
    if BARE_ID.is_match(id) {
      Ok(Self(id.to_owned()))
    } else {
      Err(Error::InvalidVideoId(id.to_owned()))
    }
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn watch_url(&self) -> String {
    format!("https://www.youtube.com/watch?v={}", self.0)
  }

  pub fn default_thumbnail(&self) -> String {
    format!("https://i.ytimg.com/vi/{}/maxresdefault.jpg", self.0)
  }
}

// free text such as "not-a-video" fits the id alphabet. ids without any
// digit or uppercase letter are rare enough to be treated as words.
fn looks_like_slug(token: &str) -> bool {
  token
    .chars()
    .all(|c| c.is_ascii_lowercase() || c == '-' || c == '_')
}

impl fmt::Display for VideoRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}
