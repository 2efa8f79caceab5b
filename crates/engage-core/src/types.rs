use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Like,
    Heart,
}

impl ActionKind {
    pub fn all() -> &'static [ActionKind] {
        &[ActionKind::Like, ActionKind::Heart]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Like => "like",
            ActionKind::Heart => "heart",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = crate::error::EngageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(ActionKind::Like),
            "heart" => Ok(ActionKind::Heart),
            _ => Err(crate::error::EngageError::Configuration(format!(
                "unknown action '{s}' (expected like or heart)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionResult {
    Success,
    Skipped,
    Failed,
}

impl ActionResult {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionResult::Success => "success",
            ActionResult::Skipped => "skipped",
            ActionResult::Failed => "failed",
        }
    }
}

impl fmt::Display for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EngagementItem
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    #[default]
    Comment,
}

/// A discovered comment. Identity is the platform-native id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementItem {
    pub id: String,
    /// The video (or parent thread) the item was found under.
    pub parent_id: String,
    pub discovered_at: DateTime<Utc>,
    pub posted_at: DateTime<Utc>,
    #[serde(default)]
    pub kind: ItemKind,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub text: String,
}

// ---------------------------------------------------------------------------
// ActionRecord
// ---------------------------------------------------------------------------

/// One ledger entry. `(item_id, action)` is the uniqueness key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub item_id: String,
    pub action: ActionKind,
    pub performed_at: DateTime<Utc>,
    pub result: ActionResult,
}

impl ActionRecord {
    pub fn key(&self) -> String {
        record_key(&self.item_id, self.action)
    }
}

/// Persisted key for an `(item_id, action)` pair.
pub fn record_key(item_id: &str, action: ActionKind) -> String {
    format!("{item_id}:{action}")
}

// ---------------------------------------------------------------------------
// VideoRef
// ---------------------------------------------------------------------------

/// A video listed on a channel page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRef {
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// Raw "posted" text as shown on the channel page, e.g. "3 days ago".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted: Option<String>,
}

impl VideoRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            posted: None,
        }
    }
}
