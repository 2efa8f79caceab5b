//! Channel video selection for a scenario's discovery method.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::recency::{self, RecencyWindow};
use crate::types::VideoRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    /// The newest `limit` videos.
    RecentPosts,
    /// Videos posted within the last `limit` days.
    RecentDays,
    /// Every listed video.
    AllPosts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discovery {
    pub method: DiscoveryMethod,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    5
}

impl Default for Discovery {
    fn default() -> Self {
        Self {
            method: DiscoveryMethod::RecentPosts,
            limit: default_limit(),
        }
    }
}

/// Upper bound on how many videos to ask the channel listing for.
const RECENT_DAYS_LISTING: usize = 100;

impl Discovery {
    pub fn listing_limit(&self) -> Option<usize> {
        match self.method {
            DiscoveryMethod::RecentPosts => Some(self.limit as usize),
            DiscoveryMethod::RecentDays => Some(RECENT_DAYS_LISTING),
            DiscoveryMethod::AllPosts => None,
        }
    }

    /// Pick the videos to process from a channel listing (newest first).
    ///
    /// For `RecentDays`, a video without posted text is kept (channel pages
    /// omit it for Shorts); posted text that does not parse drops the video.
    pub fn select(&self, videos: Vec<VideoRef>, now: DateTime<Utc>) -> Vec<VideoRef> {
        let selected: Vec<VideoRef> = match self.method {
            DiscoveryMethod::RecentPosts => videos.into_iter().take(self.limit as usize).collect(),
            DiscoveryMethod::AllPosts => videos,
            DiscoveryMethod::RecentDays => {
                let window = RecencyWindow::days(u64::from(self.limit));
                videos
                    .into_iter()
                    .filter(|v| match v.posted.as_deref().map(str::trim) {
                        None | Some("") => true,
                        Some(text) => match recency::resolve(text, now) {
                            Ok(posted) => {
                                let keep = window.contains(posted, now);
                                if !keep {
                                    debug!(url = %v.url, posted = text, "skipping old video");
                                }
                                keep
                            }
                            Err(e) => {
                                warn!(url = %v.url, error = %e, "dropping video with unreadable date");
                                false
                            }
                        },
                    })
                    .collect()
            }
        };
        debug!(method = ?self.method, count = selected.len(), "videos selected");
        selected
    }
}
