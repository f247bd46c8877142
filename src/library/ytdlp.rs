use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::{
  io::{AsyncBufReadExt, BufReader},
  process::{Child, ChildStderr, ChildStdout, Command},
  sync::Semaphore,
  task::JoinHandle,
};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::{config::YtdlpConfig, video_id::VideoRef, Error, Result};

use super::{Extraction, LibraryFormat, LibraryInfo, PlayerLibrary};

// run yt-dlp command line for video info and, when a format has no plain
// http url, for the bytes themselves.
pub struct Ytdlp {
  program: String,
  proxy: Option<String>,
  // limits concurrent `yt-dlp -j` invocations
  permits: Semaphore,
}

impl Ytdlp {
  pub fn new(config: &YtdlpConfig) -> Self {
    if let Some(proxy) = &config.proxy {
      info!("yt-dlp using proxy: {}", redact_proxy(proxy));
    }

    Self {
      program: config.program.clone(),
      proxy: config.proxy.clone(),
      permits: Semaphore::new(config.concurrency.max(1)),
    }
  }

  fn command(&self) -> Command {
    let mut cmd = Command::new(&self.program);
    cmd.arg("--no-playlist").arg("--no-warnings");

    if let Some(proxy) = &self.proxy {
      cmd.arg("--proxy").arg(proxy);
    }

    cmd.kill_on_drop(true);
    cmd
  }

  // yt-dlp -f <format_id> -o - 'https://www.youtube.com/watch?v=XXXXXXX'
  async fn spawn_stream(
    &self,
    video: &VideoRef,
    format: &LibraryFormat,
  ) -> Result<Extraction> {
    let mut child = self
      .command()
      .arg("-f")
      .arg(&format.format_id)
      .arg("--no-progress")
      .arg("-o")
      .arg("-")
      .arg(video.watch_url())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()?;

    let stdout = child
      .stdout
      .take()
      .ok_or_else(|| Error::Extraction("yt-dlp stdout not opened".into()))?;
    let stderr = child
      .stderr
      .take()
      .ok_or_else(|| Error::Extraction("yt-dlp stderr not opened".into()))?;

    // drain stderr while stdout is read, otherwise a chatty child blocks
    let video_id = video.to_string();
    let stderr = tokio::spawn(collect_stderr(stderr, video_id.clone()));

    let output = ChildOutput {
      child,
      stdout: ReaderStream::new(stdout),
      stderr,
      video_id,
      finished: false,
    };
    let mut stream = futures::stream::unfold(output, |mut output| async move {
      let item = output.next_chunk().await?;
      Some((item, output))
    })
    .boxed();

    // an immediate failure is reported before any response header is sent
    match stream.next().await {
      Some(Ok(first)) => {
        let stream = futures::stream::once(async move { Ok(first) })
          .chain(stream)
          .boxed();
        Ok(Extraction::Stream { stream })
      }
      Some(Err(e)) => Err(e),
      None => Err(Error::Extraction("yt-dlp produced no output".into())),
    }
  }
}

// stdout of a running `yt-dlp -o -`. the child lives as long as the body
// stream does, so a dropped response kills it.
struct ChildOutput {
  child: Child,
  stdout: ReaderStream<ChildStdout>,
  stderr: JoinHandle<String>,
  video_id: String,
  finished: bool,
}

impl ChildOutput {
  async fn next_chunk(&mut self) -> Option<Result<Bytes>> {
    if self.finished {
      return None;
    }

    match self.stdout.next().await {
      Some(Ok(chunk)) => Some(Ok(chunk)),
      Some(Err(e)) => {
        self.finished = true;
        Some(Err(e.into()))
      }
      None => {
        self.finished = true;
        self.exit_error().await.map(Err)
      }
    }
  }

  // a non-zero exit or an `ERROR:` line after stdout closed ends the body
  // with an error instead of a clean end of stream.
  async fn exit_error(&mut self) -> Option<Error> {
    let status = match self.child.wait().await {
      Ok(status) => status,
      Err(e) => return Some(e.into()),
    };
    let stderr = (&mut self.stderr).await.unwrap_or_default();

    if status.success() && !stderr.contains("ERROR:") {
      debug!("yt-dlp stream {} finished", self.video_id);
      return None;
    }

    warn!("yt-dlp stream {} exited with {}", self.video_id, status);
    Some(Error::Extraction(error_message(stderr.as_bytes())))
  }
}

async fn collect_stderr(stderr: ChildStderr, video_id: String) -> String {
  let mut collected = String::new();
  let mut lines = BufReader::new(stderr).lines();

  while let Ok(Some(line)) = lines.next_line().await {
    if line.contains("ERROR:") {
      warn!("yt-dlp stream {}: {}", video_id, line);
    }
    collected.push_str(&line);
    collected.push('\n');
  }

  collected
}

#[async_trait]
impl PlayerLibrary for Ytdlp {
  async fn get_info(&self, video: &VideoRef) -> Result<LibraryInfo> {
    let mut cmd = self.command();
    cmd.arg("-j").arg(video.watch_url());

    let permit = self
      .permits
      .acquire()
      .await
      .map_err(|_| Error::Extraction("yt-dlp permits closed".into()))?;
    let output = cmd.output().await?;
    drop(permit);

    if !output.status.success() {
      return Err(Error::Extraction(error_message(&output.stderr)));
    }

    let info: LibraryInfo = serde_json::from_slice(&output.stdout)?;
    Ok(info)
  }

  async fn stream(
    &self,
    video: &VideoRef,
    format: &LibraryFormat,
  ) -> Result<Extraction> {
    match (&format.url, format.protocol.as_deref()) {
      (Some(url), None | Some("http") | Some("https")) => {
        let headers = format
          .http_headers
          .iter()
          .map(|(k, v)| (k.clone(), v.clone()))
          .collect();
        Ok(Extraction::Proxy {
          url: url.clone(),
          headers,
        })
      }
      // fragmented and manifest based formats are assembled by yt-dlp
      _ => self.spawn_stream(video, format).await,
    }
  }
}

fn error_message(stderr: &[u8]) -> String {
  let stderr = String::from_utf8_lossy(stderr);
  let mut lines = stderr.lines().map(str::trim).filter(|l| !l.is_empty());

  lines
    .clone()
    .rev()
    .find(|line| line.contains("ERROR:"))
    .or_else(|| lines.next_back())
    .unwrap_or("yt-dlp exited without output")
    .to_owned()
}

// used to remove cred info from proxy url before printing
fn redact_proxy(proxy: &str) -> String {
  static AUTH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"//[^:/@]+(:[^@]+)?@").unwrap());
  AUTH_REGEX.replace(proxy, "//<REDACTED>@").into_owned()
}
