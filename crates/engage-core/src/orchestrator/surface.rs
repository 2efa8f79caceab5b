//! The browser-side collaborator the orchestrator drives.
//!
//! Everything that touches a page (listing videos, scrolling comments,
//! clicking a heart) lives behind [`EngagementSurface`]. The orchestrator only
//! sees typed items and typed outcomes.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::recency::RecencyWindow;
use crate::types::{ActionKind, EngagementItem, VideoRef};

/// Lazily produced items for one video. Finite; calling `discover` again
/// restarts from the top.
pub type ItemStream = BoxStream<'static, Result<EngagementItem>>;

/// Why a `perform` call did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PerformFailure {
    /// Timeout, network hiccup, element not ready. Worth retrying.
    #[error("transient failure: {0}")]
    Transient(String),
    /// Session lost, signed out, account blocked. The run must stop.
    #[error("fatal failure: {0}")]
    Fatal(String),
}

#[async_trait]
pub trait EngagementSurface: Send + Sync {
    /// List a channel's videos, newest first. `limit` of `None` means all.
    async fn list_videos(&self, channel: &str, limit: Option<usize>) -> Result<Vec<VideoRef>>;

    /// Start discovering items under `video`. `window` is a hint; the
    /// orchestrator filters by recency regardless.
    async fn discover(&self, video: &VideoRef, window: Option<RecencyWindow>) -> Result<ItemStream>;

    async fn perform(
        &self,
        item: &EngagementItem,
        action: ActionKind,
    ) -> std::result::Result<(), PerformFailure>;
}
