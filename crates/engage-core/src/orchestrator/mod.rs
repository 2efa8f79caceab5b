//! Engagement orchestrator.
//!
//! Drives every discovered item through
//!
//! ```text
//! Discovered → FilteredOut
//!            → Eligible → SkippedDuplicate
//!                       → Paced → ActedSuccess | ActedFailed
//! ```
//!
//! Items of one video are processed in order by a single flow. Videos run as
//! independent flows (bounded by `video_concurrency`) that share one
//! [`Ledger`] and one [`PacingGovernor`].
//!
//! A stop request (the cancellation token) abandons pending pacing waits and
//! discovery, lets an in-flight `perform` finish and get recorded, and then
//! issues no further actions. The run timeout drops everything that is still
//! suspended. Ledger writes are synchronous, so neither path can interrupt
//! one halfway.

pub mod report;
pub mod surface;

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{EngageError, Result};
use crate::filter::{ItemFilter, Verdict};
use crate::ledger::Ledger;
use crate::pacing::PacingGovernor;
use crate::selection::Discovery;
use crate::types::{record_key, ActionKind, ActionResult, EngagementItem, VideoRef};

pub use report::{ItemEvent, ItemOutcome, RunReport, RunSummary, VideoReport};
pub use surface::{EngagementSurface, ItemStream, PerformFailure};

// ---------------------------------------------------------------------------
// EngageSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EngageSettings {
    /// Actions attempted on every eligible item, in order.
    pub actions: Vec<ActionKind>,
    pub filter: ItemFilter,
    pub dry_run: bool,
    /// Extra attempts after a transient perform failure.
    pub max_action_retries: u32,
    pub action_retry_delay: Duration,
    pub max_items_per_video: Option<usize>,
    pub video_concurrency: usize,
    pub run_timeout: Option<Duration>,
}

impl Default for EngageSettings {
    fn default() -> Self {
        Self {
            actions: vec![ActionKind::Heart],
            filter: ItemFilter::default(),
            dry_run: false,
            max_action_retries: 2,
            action_retry_delay: Duration::from_secs(2),
            max_items_per_video: None,
            video_concurrency: 1,
            run_timeout: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    surface: Arc<dyn EngagementSurface>,
    ledger: Arc<Ledger>,
    governor: Arc<PacingGovernor>,
    settings: EngageSettings,
    cancel: CancellationToken,
    last_recorded: Mutex<Option<String>>,
}

impl Orchestrator {
    pub fn new(
        surface: Arc<dyn EngagementSurface>,
        ledger: Arc<Ledger>,
        governor: Arc<PacingGovernor>,
        settings: EngageSettings,
    ) -> Self {
        Self {
            surface,
            ledger,
            governor,
            settings,
            cancel: CancellationToken::new(),
            last_recorded: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &EngageSettings {
        &self.settings
    }

    /// Token that stops the run when cancelled. Clone it into a signal handler.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Key of the most recent success written by this orchestrator.
    pub fn last_recorded(&self) -> Option<String> {
        self.last_recorded
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// List a channel's videos, select them per `discovery`, and run them.
    pub async fn run_channel(&self, channel: &str, discovery: &Discovery) -> Result<RunReport> {
        let listed = self
            .until_cancelled(self.surface.list_videos(channel, discovery.listing_limit()))
            .await??;
        info!(channel, listed = listed.len(), "channel videos listed");
        let selected = discovery.select(listed, chrono::Utc::now());
        self.run(selected).await
    }

    /// Process `videos` and return what happened to every item.
    ///
    /// Per-item and per-video failures are reported, not returned. A fatal
    /// perform failure, a ledger failure, cancellation or the run timeout end
    /// the run with an error. The ledger is flushed on every exit path.
    pub async fn run(&self, videos: Vec<VideoRef>) -> Result<RunReport> {
        info!(
            videos = videos.len(),
            dry_run = self.settings.dry_run,
            actions = ?self.settings.actions,
            "engagement run starting"
        );

        let result = match self.settings.run_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.run_videos(videos)).await {
                Ok(r) => r,
                Err(_) => Err(EngageError::RunTimedOut(limit.as_secs())),
            },
            None => self.run_videos(videos).await,
        };

        if let Err(e) = self.ledger.flush() {
            warn!(error = %e, "ledger flush failed at end of run");
        }

        match &result {
            Ok(report) => {
                let s = report.summary();
                info!(
                    videos = s.videos,
                    discovered = s.discovered,
                    filtered = s.filtered,
                    duplicates = s.duplicates,
                    would_act = s.would_act,
                    succeeded = s.succeeded,
                    failed = s.failed,
                    "engagement run finished"
                );
            }
            Err(e) => error!(
                error = %e,
                last_recorded = self.last_recorded().as_deref().unwrap_or("none"),
                "engagement run aborted"
            ),
        }
        result
    }

    async fn run_videos(&self, videos: Vec<VideoRef>) -> Result<RunReport> {
        let concurrency = self.settings.video_concurrency.max(1);
        let mut reports: Vec<(usize, VideoReport)> = futures::stream::iter(videos.iter().enumerate())
            .map(|(idx, video)| async move { self.run_video(video).await.map(|r| (idx, r)) })
            .buffer_unordered(concurrency)
            .try_collect()
            .await?;
        reports.sort_by_key(|(idx, _)| *idx);
        Ok(RunReport {
            dry_run: self.settings.dry_run,
            videos: reports.into_iter().map(|(_, r)| r).collect(),
        })
    }

    async fn run_video(&self, video: &VideoRef) -> Result<VideoReport> {
        info!(video = %video.url, title = %video.title, "processing video");
        let mut report = VideoReport::new(&video.url);

        let discovered = self
            .until_cancelled(self.surface.discover(video, self.settings.filter.window()))
            .await?;
        let stream = match discovered {
            Ok(s) => s,
            Err(e) if !e.is_fatal() => {
                warn!(video = %video.url, error = %e, "discovery failed, skipping video");
                report.error = Some(e.to_string());
                return Ok(report);
            }
            Err(e) => return Err(e),
        };
        let mut stream = match self.settings.max_items_per_video {
            Some(n) => stream.take(n).boxed(),
            None => stream,
        };

        while let Some(next) = self.until_cancelled(stream.next()).await? {
            let item = match next {
                Ok(item) => item,
                Err(EngageError::Parse(text)) => {
                    warn!(video = %video.url, %text, "skipping item with unreadable timestamp");
                    report.discovered += 1;
                    report.unreadable += 1;
                    continue;
                }
                Err(e) if !e.is_fatal() => {
                    warn!(video = %video.url, error = %e, "discovery interrupted");
                    report.error = Some(e.to_string());
                    break;
                }
                Err(e) => return Err(e),
            };
            report.discovered += 1;
            self.process_item(&item, &mut report).await?;
        }

        debug!(video = %video.url, discovered = report.discovered, "video done");
        Ok(report)
    }

    async fn process_item(&self, item: &EngagementItem, report: &mut VideoReport) -> Result<()> {
        // Relative timestamps were resolved at discovery time, so that is "now"
        if let Verdict::Filtered(reason) = self.settings.filter.evaluate(item, item.discovered_at) {
            debug!(item = %item.id, %reason, "filtered out");
            report.push(item, None, ItemOutcome::FilteredOut { reason });
            return Ok(());
        }

        for &action in &self.settings.actions {
            if self.ledger.has(&item.id, action) {
                debug!(item = %item.id, %action, "already done, skipping");
                report.push(item, Some(action), ItemOutcome::SkippedDuplicate);
                continue;
            }

            if self.cancel.is_cancelled() {
                return Err(EngageError::Cancelled);
            }
            let waited = self.until_cancelled(self.governor.wait_slot()).await?;
            debug!(item = %item.id, %action, waited_ms = waited.as_millis() as u64, "slot granted");

            if self.settings.dry_run {
                info!(
                    item = %item.id,
                    author = %item.author,
                    %action,
                    preview = %preview(&item.text),
                    "[dry-run] would act"
                );
                report.push(item, Some(action), ItemOutcome::WouldAct);
                continue;
            }

            let outcome = self.perform_with_retry(item, action).await?;
            report.push(item, Some(action), outcome);
        }
        Ok(())
    }

    async fn perform_with_retry(&self, item: &EngagementItem, action: ActionKind) -> Result<ItemOutcome> {
        let allowed = self.settings.max_action_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.surface.perform(item, action).await {
                Ok(()) => {
                    self.ledger.record(&item.id, action, ActionResult::Success)?;
                    *self.last_recorded.lock().unwrap_or_else(|p| p.into_inner()) =
                        Some(record_key(&item.id, action));
                    info!(item = %item.id, author = %item.author, %action, "action done");
                    return Ok(ItemOutcome::ActedSuccess);
                }
                Err(PerformFailure::Transient(reason)) if attempt < allowed => {
                    warn!(
                        item = %item.id,
                        %action,
                        attempt,
                        allowed,
                        %reason,
                        "transient failure, retrying"
                    );
                    self.until_cancelled(tokio::time::sleep(self.settings.action_retry_delay))
                        .await?;
                }
                Err(PerformFailure::Transient(reason)) => {
                    let failure = EngageError::RetryableActionFailure {
                        item_id: item.id.clone(),
                        action,
                        attempts: attempt,
                        reason: reason.clone(),
                    };
                    warn!(error = %failure, "giving up on item, continuing");
                    self.ledger.record(&item.id, action, ActionResult::Failed)?;
                    return Ok(ItemOutcome::ActedFailed {
                        attempts: attempt,
                        reason,
                    });
                }
                Err(PerformFailure::Fatal(reason)) => {
                    return Err(EngageError::FatalActionFailure {
                        item_id: item.id.clone(),
                        action,
                        reason,
                        last_recorded: self.last_recorded(),
                    });
                }
            }
        }
    }

    /// Race `fut` against the stop token.
    async fn until_cancelled<F: Future>(&self, fut: F) -> Result<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(EngageError::Cancelled),
            out = fut => Ok(out),
        }
    }
}

fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    match flat.char_indices().nth(40) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat,
    }
}
