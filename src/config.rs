use std::{net::SocketAddr, time::Duration};

use crate::{Error, Result};

pub const DEFAULT_SOURCES: &str = "library,player-web,player-android,mirror";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
  AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
  pub bind_addr: SocketAddr,
  /// Source registry keys in fallback order.
  pub sources: Vec<String>,
  pub player_web: PlayerApiConfig,
  pub player_android: PlayerApiConfig,
  pub mirror: Option<MirrorConfig>,
  pub user_agent: String,
  pub upstream_timeout: Duration,
  pub download_timeout: Duration,
  pub cache_max_age: u64,
  /// Attach debug details of server errors to error responses.
  pub expose_error_details: bool,
  pub ytdlp: YtdlpConfig,
}

#[derive(Debug, Clone)]
pub struct PlayerApiConfig {
  pub endpoint: String,
  pub api_key: Option<String>,
  pub client_version: String,
}

#[derive(Debug, Clone)]
pub struct MirrorConfig {
  pub base_url: String,
  pub init_query: Option<String>,
}

#[derive(Debug, Clone)]
pub struct YtdlpConfig {
  pub program: String,
  pub proxy: Option<String>,
  pub concurrency: usize,
}

impl Config {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    // unset and blank variables are the same thing
    let var = |key: &str| {
      lookup(key)
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
    };
    let string = |key: &str, default: &str| {
      var(key).unwrap_or_else(|| default.to_owned())
    };
    let number = |key: &str, default: u64| -> Result<u64> {
      match var(key) {
        None => Ok(default),
        Some(v) => v
          .parse()
          .map_err(|_| Error::Config(format!("{key} must be a number: {v}"))),
      }
    };

    let flag = |key: &str| {
      var(key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
    };

    let host = string("BIND_ADDR", "0.0.0.0");
    let port = number("PORT", 3000)?;
    let bind_addr = format!("{host}:{port}")
      .parse()
      .map_err(|_| Error::Config(format!("invalid bind address {host}:{port}")))?;

    let sources = string("SOURCES", DEFAULT_SOURCES)
      .split(',')
      .map(|s| s.trim().to_ascii_lowercase())
      .filter(|s| !s.is_empty())
      .collect();

    let player_web = PlayerApiConfig {
      endpoint: string(
        "PLAYER_WEB_ENDPOINT",
        "https://www.youtube.com/youtubei/v1/player",
      ),
      api_key: var("PLAYER_WEB_KEY"),
      client_version: string("PLAYER_WEB_CLIENT_VERSION", "2.20231219.06.00"),
    };

    let player_android = PlayerApiConfig {
      endpoint: string(
        "PLAYER_ANDROID_ENDPOINT",
        "https://youtubei.googleapis.com/youtubei/v1/player",
      ),
      api_key: var("PLAYER_ANDROID_KEY"),
      client_version: string("PLAYER_ANDROID_CLIENT_VERSION", "19.05.36"),
    };

    let mirror = var("MIRROR_BASE_URL").map(|base_url| MirrorConfig {
      base_url: base_url.trim_end_matches('/').to_owned(),
      init_query: var("MIRROR_INIT_QUERY"),
    });

    let ytdlp = YtdlpConfig {
      program: string("YTDLP_PATH", "yt-dlp"),
      proxy: var("YTDLP_PROXY"),
      concurrency: number("YTDLP_CONCURRENCY", 1)? as usize,
    };

    Ok(Self {
      bind_addr,
      sources,
      player_web,
      player_android,
      mirror,
      user_agent: string("USER_AGENT", DEFAULT_USER_AGENT),
      upstream_timeout: Duration::from_secs(number("UPSTREAM_TIMEOUT_SECS", 15)?),
      download_timeout: Duration::from_secs(number(
        "DOWNLOAD_TIMEOUT_SECS",
        3600,
      )?),
      cache_max_age: number("CACHE_MAX_AGE", 3600)?,
      expose_error_details: flag("EXPOSE_ERROR_DETAILS"),
      ytdlp,
    })
  }
}
