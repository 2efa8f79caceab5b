use serde::Serialize;

use crate::filter::FilterReason;
use crate::types::{ActionKind, EngagementItem};

/// Where an item ended up in the per-item state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    FilteredOut { reason: FilterReason },
    SkippedDuplicate,
    /// Dry-run stand-in for perform + record.
    WouldAct,
    ActedSuccess,
    ActedFailed { attempts: u32, reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemEvent {
    pub item_id: String,
    pub author: String,
    /// `None` for filtered items, which never reach an action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionKind>,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoReport {
    pub video: String,
    /// Every item discovery produced, including `unreadable` ones.
    pub discovered: usize,
    /// Items dropped because their timestamp could not be resolved. They
    /// carry no id, so they have no event.
    pub unreadable: usize,
    pub events: Vec<ItemEvent>,
    /// Discovery failure that cut this video short; siblings are unaffected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VideoReport {
    pub fn new(video: impl Into<String>) -> Self {
        Self {
            video: video.into(),
            discovered: 0,
            unreadable: 0,
            events: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn push(&mut self, item: &EngagementItem, action: Option<ActionKind>, outcome: ItemOutcome) {
        self.events.push(ItemEvent {
            item_id: item.id.clone(),
            author: item.author.clone(),
            action,
            outcome,
        });
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub videos: usize,
    pub discovered: usize,
    pub unreadable: usize,
    pub filtered: usize,
    pub duplicates: usize,
    pub would_act: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub video_errors: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub dry_run: bool,
    pub videos: Vec<VideoReport>,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let mut s = RunSummary {
            videos: self.videos.len(),
            ..RunSummary::default()
        };
        for video in &self.videos {
            s.discovered += video.discovered;
            s.unreadable += video.unreadable;
            if video.error.is_some() {
                s.video_errors += 1;
            }
            for event in &video.events {
                match event.outcome {
                    ItemOutcome::FilteredOut { .. } => s.filtered += 1,
                    ItemOutcome::SkippedDuplicate => s.duplicates += 1,
                    ItemOutcome::WouldAct => s.would_act += 1,
                    ItemOutcome::ActedSuccess => s.succeeded += 1,
                    ItemOutcome::ActedFailed { .. } => s.failed += 1,
                }
            }
        }
        s
    }

    pub fn events(&self) -> impl Iterator<Item = &ItemEvent> {
        self.videos.iter().flat_map(|v| v.events.iter())
    }
}
