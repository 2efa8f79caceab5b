//! Command-bridge collaborator: drives the engagement surface through
//! configured shell commands.
//!
//! Each command runs under `sh -c` with its context in the environment:
//!
//! | command       | env                                             | stdout               |
//! |---------------|-------------------------------------------------|----------------------|
//! | `list_videos` | `ENGAGE_CHANNEL`, `ENGAGE_LIMIT` (if bounded)   | JSON `VideoRef` lines |
//! | `discover`    | `ENGAGE_CHANNEL`, `ENGAGE_VIDEO`, `ENGAGE_WINDOW_SECS` | JSON item lines |
//! | `perform`     | `ENGAGE_CHANNEL`, `ENGAGE_VIDEO`, `ENGAGE_ITEM_ID`, `ENGAGE_PARENT_ID`, `ENGAGE_ACTION` | ignored |
//!
//! `perform` exits 0 on success and 75 (`EX_TEMPFAIL`) on a transient failure;
//! any other status is fatal. Discovered items are streamed as soon as their
//! line is printed.

use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engage_core::config::BridgeConfig;
use engage_core::orchestrator::{EngagementSurface, ItemStream, PerformFailure};
use engage_core::recency::{self, RecencyWindow};
use engage_core::types::{ActionKind, EngagementItem, ItemKind, VideoRef};
use engage_core::{EngageError, Result};
use futures::StreamExt;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub const ENV_CHANNEL: &str = "ENGAGE_CHANNEL";
pub const ENV_LIMIT: &str = "ENGAGE_LIMIT";
pub const ENV_VIDEO: &str = "ENGAGE_VIDEO";
pub const ENV_WINDOW_SECS: &str = "ENGAGE_WINDOW_SECS";
pub const ENV_ITEM_ID: &str = "ENGAGE_ITEM_ID";
pub const ENV_PARENT_ID: &str = "ENGAGE_PARENT_ID";
pub const ENV_ACTION: &str = "ENGAGE_ACTION";

/// `EX_TEMPFAIL` from sysexits.h.
pub const TRANSIENT_EXIT: i32 = 75;

/// One discovered comment as printed by the `discover` command.
///
/// `posted_at` (RFC 3339) wins over `posted` (display text such as
/// "3 days ago"); with neither, the item counts as posted when discovered.
#[derive(Debug, Deserialize)]
struct BridgeItem {
    id: String,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    posted: Option<String>,
    #[serde(default)]
    posted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    author: String,
    #[serde(default)]
    text: String,
}

impl BridgeItem {
    fn into_item(self, video: &str, discovered_at: DateTime<Utc>) -> Result<EngagementItem> {
        let posted_at = match (self.posted_at, self.posted.as_deref()) {
            (Some(at), _) => at,
            (None, Some(text)) if !text.trim().is_empty() => recency::resolve(text, discovered_at)?,
            _ => discovered_at,
        };
        Ok(EngagementItem {
            id: self.id,
            parent_id: self.parent_id.unwrap_or_else(|| video.to_string()),
            discovered_at,
            posted_at,
            kind: ItemKind::Comment,
            author: self.author,
            text: self.text,
        })
    }
}

pub struct CommandBridge {
    config: BridgeConfig,
    channel: String,
}

impl CommandBridge {
    pub fn new(config: BridgeConfig, channel: impl Into<String>) -> Self {
        Self {
            config,
            channel: channel.into(),
        }
    }

    fn timeout(&self) -> Option<Duration> {
        self.config.timeout_secs.map(Duration::from_secs)
    }

    fn command(&self, script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(script)
            .env(ENV_CHANNEL, &self.channel)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run to completion. `Ok(None)` means the bridge timeout elapsed and the
    /// child was killed.
    async fn run_to_end(&self, mut cmd: Command) -> std::io::Result<Option<Output>> {
        match self.timeout() {
            Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
                Ok(out) => out.map(Some),
                Err(_) => Ok(None),
            },
            None => cmd.output().await.map(Some),
        }
    }
}

fn required<'a>(script: &'a str, name: &str) -> Result<&'a str> {
    if script.trim().is_empty() {
        return Err(EngageError::Configuration(format!(
            "bridge.{name} is not set in config.yaml"
        )));
    }
    Ok(script)
}

fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

async fn drain(mut stderr: ChildStderr) -> String {
    let mut buf = String::new();
    let _ = stderr.read_to_string(&mut buf).await;
    buf
}

#[async_trait]
impl EngagementSurface for CommandBridge {
    async fn list_videos(&self, channel: &str, limit: Option<usize>) -> Result<Vec<VideoRef>> {
        let script = required(&self.config.list_videos, "list_videos")?;
        let mut cmd = self.command(script);
        cmd.env(ENV_CHANNEL, channel);
        if let Some(n) = limit {
            cmd.env(ENV_LIMIT, n.to_string());
        }

        let surface_err = |reason: String| EngageError::Surface {
            video: channel.to_string(),
            reason,
        };
        let output = self
            .run_to_end(cmd)
            .await
            .map_err(|e| surface_err(format!("could not start list_videos: {e}")))?
            .ok_or_else(|| surface_err("list_videos timed out".into()))?;
        if !output.status.success() {
            return Err(surface_err(format!(
                "list_videos exited with {}: {}",
                output.status,
                stderr_text(&output)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut videos = Vec::new();
        for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match serde_json::from_str::<VideoRef>(line) {
                Ok(v) => videos.push(v),
                Err(e) => warn!(error = %e, line, "ignoring malformed video line"),
            }
        }
        if let Some(n) = limit {
            videos.truncate(n);
        }
        debug!(channel, count = videos.len(), "bridge listed videos");
        Ok(videos)
    }

    async fn discover(&self, video: &VideoRef, window: Option<RecencyWindow>) -> Result<ItemStream> {
        let script = required(&self.config.discover, "discover")?;
        let mut cmd = self.command(script);
        cmd.env(ENV_VIDEO, &video.url);
        if let Some(w) = window {
            cmd.env(ENV_WINDOW_SECS, w.max_age_secs.to_string());
        }

        let video_url = video.url.clone();
        let mut child = cmd.spawn().map_err(|e| EngageError::Surface {
            video: video_url.clone(),
            reason: format!("could not start discover: {e}"),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| EngageError::Surface {
            video: video_url.clone(),
            reason: "discover stdout not captured".into(),
        })?;
        let stderr = child.stderr.take().map(|s| tokio::spawn(drain(s)));

        let (tx, rx) = mpsc::channel::<Result<EngagementItem>>(32);
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        let item = match serde_json::from_str::<BridgeItem>(line) {
                            Ok(raw) => raw.into_item(&video_url, Utc::now()),
                            Err(e) => {
                                warn!(video = %video_url, error = %e, line, "ignoring malformed item line");
                                continue;
                            }
                        };
                        if tx.send(item).await.is_err() {
                            // consumer stopped early
                            let _ = child.kill().await;
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = tx
                            .send(Err(EngageError::Surface {
                                video: video_url.clone(),
                                reason: format!("reading discover output: {e}"),
                            }))
                            .await;
                        let _ = child.kill().await;
                        return;
                    }
                }
            }

            let status = child.wait().await;
            let stderr = match stderr {
                Some(handle) => handle.await.unwrap_or_default(),
                None => String::new(),
            };
            let failure = match status {
                Ok(s) if s.success() => None,
                Ok(s) => Some(format!("discover exited with {s}: {}", stderr.trim())),
                Err(e) => Some(format!("waiting for discover: {e}")),
            };
            if let Some(reason) = failure {
                let _ = tx
                    .send(Err(EngageError::Surface {
                        video: video_url,
                        reason,
                    }))
                    .await;
            }
        });

        Ok(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed())
    }

    async fn perform(
        &self,
        item: &EngagementItem,
        action: ActionKind,
    ) -> std::result::Result<(), PerformFailure> {
        let script = required(&self.config.perform, "perform")
            .map_err(|e| PerformFailure::Fatal(e.to_string()))?;
        let mut cmd = self.command(script);
        cmd.env(ENV_VIDEO, &item.parent_id)
            .env(ENV_ITEM_ID, &item.id)
            .env(ENV_PARENT_ID, &item.parent_id)
            .env(ENV_ACTION, action.as_str());

        let output = match self.run_to_end(cmd).await {
            Ok(Some(output)) => output,
            Ok(None) => return Err(PerformFailure::Transient("perform timed out".into())),
            Err(e) => return Err(PerformFailure::Fatal(format!("could not start perform: {e}"))),
        };
        match output.status.code() {
            Some(0) => Ok(()),
            Some(TRANSIENT_EXIT) => Err(PerformFailure::Transient(stderr_text(&output))),
            _ => Err(PerformFailure::Fatal(format!(
                "perform exited with {}: {}",
                output.status,
                stderr_text(&output)
            ))),
        }
    }
}
