use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::recency::RecencyWindow;
use crate::types::EngagementItem;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FilterReason {
    OutsideWindow,
    IgnoredKeyword(String),
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterReason::OutsideWindow => f.write_str("outside recency window"),
            FilterReason::IgnoredKeyword(k) => write!(f, "matches ignore keyword '{k}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Eligible,
    Filtered(FilterReason),
}

/// Recency and keyword screening applied before the ledger is consulted.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    window: Option<RecencyWindow>,
    /// Lowercased, non-empty.
    ignore_keywords: Vec<String>,
}

impl ItemFilter {
    pub fn new(window: Option<RecencyWindow>, ignore_keywords: &[String]) -> Self {
        let ignore_keywords = ignore_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            window,
            ignore_keywords,
        }
    }

    pub fn window(&self) -> Option<RecencyWindow> {
        self.window
    }

    pub fn evaluate(&self, item: &EngagementItem, now: DateTime<Utc>) -> Verdict {
        if let Some(window) = self.window {
            if !window.contains(item.posted_at, now) {
                return Verdict::Filtered(FilterReason::OutsideWindow);
            }
        }
        if !self.ignore_keywords.is_empty() {
            let text = item.text.to_lowercase();
            if let Some(k) = self.ignore_keywords.iter().find(|k| text.contains(k.as_str())) {
                return Verdict::Filtered(FilterReason::IgnoredKeyword(k.clone()));
            }
        }
        Verdict::Eligible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recency::resolve;
    use crate::types::ItemKind;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn item(id: &str, posted: &str, text: &str) -> EngagementItem {
        EngagementItem {
            id: id.into(),
            parent_id: "v1".into(),
            discovered_at: now(),
            posted_at: resolve(posted, now()).unwrap(),
            kind: ItemKind::Comment,
            author: "viewer".into(),
            text: text.into(),
        }
    }

    #[test]
    fn seven_day_window_scenario() {
        let filter = ItemFilter::new(Some(RecencyWindow::days(7)), &[]);
        assert_eq!(
            filter.evaluate(&item("a", "3 days ago", "nice"), now()),
            Verdict::Eligible
        );
        assert_eq!(
            filter.evaluate(&item("b", "10 days ago", "nice"), now()),
            Verdict::Filtered(FilterReason::OutsideWindow)
        );
    }

    #[test]
    fn no_window_accepts_old_items() {
        let filter = ItemFilter::default();
        assert_eq!(
            filter.evaluate(&item("a", "3 years ago", "hi"), now()),
            Verdict::Eligible
        );
    }

    #[test]
    fn keywords_match_case_insensitively() {
        let filter = ItemFilter::new(None, &["Check My Channel".into(), "  ".into()]);
        assert_eq!(
            filter.evaluate(&item("a", "1 hour ago", "pls CHECK my channel!!"), now()),
            Verdict::Filtered(FilterReason::IgnoredKeyword("check my channel".into()))
        );
        assert_eq!(
            filter.evaluate(&item("b", "1 hour ago", "great video"), now()),
            Verdict::Eligible
        );
    }
}
