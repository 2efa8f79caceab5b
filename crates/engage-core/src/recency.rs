//! Timestamp text → instant conversion.
//!
//! Comment and video timestamps arrive as display text ("3 days ago",
//! "Streamed 2 weeks ago", "Jan 5, 2024"). [`resolve`] turns that text into
//! a `DateTime<Utc>` relative to a caller-supplied reference instant; it never
//! reads the wall clock. Whether an instant is recent enough is the caller's
//! decision, see [`RecencyWindow`].

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{EngageError, Result};

static RELATIVE_RE: OnceLock<Regex> = OnceLock::new();
static EDITED_RE: OnceLock<Regex> = OnceLock::new();

fn relative_re() -> &'static Regex {
    RELATIVE_RE.get_or_init(|| {
        Regex::new(r"^(\d+|an?|one)\s+(second|minute|hour|day|week|month|year)s?\s+ago$").unwrap()
    })
}

fn edited_re() -> &'static Regex {
    EDITED_RE.get_or_init(|| Regex::new(r"(?i)\s*\(edited\)\s*").unwrap())
}

const PREFIXES: &[&str] = &["streamed ", "premiered "];

/// Convert timestamp text into an instant, using `reference_now` as "now".
pub fn resolve(raw: &str, reference_now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let cleaned = edited_re().replace_all(raw, " ");
    let mut cleaned = cleaned.trim();
    for prefix in PREFIXES {
        let head = cleaned.get(..prefix.len());
        if head.is_some_and(|h| h.eq_ignore_ascii_case(prefix)) {
            cleaned = cleaned[prefix.len()..].trim_start();
        }
    }
    if cleaned.is_empty() {
        return Err(EngageError::Parse(raw.to_string()));
    }

    let lower = cleaned.to_lowercase();
    let lower = lower.split_whitespace().collect::<Vec<_>>().join(" ");
    if matches!(lower.as_str(), "just now" | "moments ago" | "now") {
        return Ok(reference_now);
    }

    if let Some(caps) = relative_re().captures(&lower) {
        let amount: i64 = match &caps[1] {
            "a" | "an" | "one" => 1,
            n => n
                .parse()
                .map_err(|_| EngageError::Parse(raw.to_string()))?,
        };
        let delta = unit_delta(&caps[2], amount).ok_or_else(|| EngageError::Parse(raw.to_string()))?;
        return reference_now
            .checked_sub_signed(delta)
            .ok_or_else(|| EngageError::Parse(raw.to_string()));
    }

    parse_absolute(cleaned).ok_or_else(|| EngageError::Parse(raw.to_string()))
}

/// Months and years are approximated as 30 and 365 days.
fn unit_delta(unit: &str, amount: i64) -> Option<Duration> {
    match unit {
        "second" => Duration::try_seconds(amount),
        "minute" => Duration::try_minutes(amount),
        "hour" => Duration::try_hours(amount),
        "day" => Duration::try_days(amount),
        "week" => Duration::try_weeks(amount),
        "month" => Duration::try_days(amount.checked_mul(30)?),
        "year" => Duration::try_days(amount.checked_mul(365)?),
        _ => None,
    }
}

fn parse_absolute(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d", "%b %d, %Y", "%B %d, %Y", "%d %b %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return Some(date.and_time(NaiveTime::MIN).and_utc());
        }
    }
    None
}

// ---------------------------------------------------------------------------
// RecencyWindow
// ---------------------------------------------------------------------------

/// How far back an instant may be and still count as recent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecencyWindow {
    pub max_age_secs: u64,
}

impl RecencyWindow {
    pub fn days(days: u64) -> Self {
        Self {
            max_age_secs: days.saturating_mul(86_400),
        }
    }

    pub fn max_age(&self) -> Duration {
        i64::try_from(self.max_age_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// Instants in the future relative to `now` count as inside the window.
    pub fn contains(&self, instant: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match now.checked_sub_signed(self.max_age()) {
            Some(cutoff) => instant >= cutoff,
            None => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn relative_units() {
        let cases = [
            ("30 seconds ago", Duration::seconds(30)),
            ("5 minutes ago", Duration::minutes(5)),
            ("2 hours ago", Duration::hours(2)),
            ("3 days ago", Duration::days(3)),
            ("1 week ago", Duration::days(7)),
            ("2 months ago", Duration::days(60)),
            ("1 year ago", Duration::days(365)),
        ];
        for (text, delta) in cases {
            assert_eq!(resolve(text, now()).unwrap(), now() - delta, "{text}");
        }
    }

    #[test]
    fn singular_and_plural_normalize_identically() {
        assert_eq!(
            resolve("1 day ago", now()).unwrap(),
            resolve("1 days ago", now()).unwrap()
        );
        assert_eq!(
            resolve("a day ago", now()).unwrap(),
            resolve("1 day ago", now()).unwrap()
        );
        assert_eq!(
            resolve("2 day ago", now()).unwrap(),
            resolve("2 days ago", now()).unwrap()
        );
    }

    #[test]
    fn case_whitespace_and_decorations_are_ignored() {
        let expected = now() - Duration::days(4);
        for text in [
            "4 Days Ago",
            "  4   days   ago ",
            "4 days ago (edited)",
            "Streamed 4 days ago",
            "Premiered 4 days ago",
        ] {
            assert_eq!(resolve(text, now()).unwrap(), expected, "{text}");
        }
    }

    #[test]
    fn just_now_is_reference_instant() {
        assert_eq!(resolve("Just now", now()).unwrap(), now());
        assert_eq!(resolve("moments ago", now()).unwrap(), now());
    }

    #[test]
    fn absolute_formats() {
        let midnight = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        assert_eq!(resolve("2024-01-05", now()).unwrap(), midnight);
        assert_eq!(resolve("Jan 5, 2024", now()).unwrap(), midnight);
        assert_eq!(resolve("January 5, 2024", now()).unwrap(), midnight);
        assert_eq!(
            resolve("2024-01-05T10:30:00Z", now()).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 5, 10, 30, 0).unwrap()
        );
    }

    #[test]
    fn unknown_text_is_parse_error() {
        for text in ["", "yesterday-ish", "ago", "5 fortnights ago", "-3 days ago"] {
            let err = resolve(text, now()).unwrap_err();
            assert!(matches!(err, EngageError::Parse(_)), "{text}");
        }
    }

    #[test]
    fn huge_magnitude_is_parse_error_not_panic() {
        assert!(resolve("99999999999999999999 years ago", now()).is_err());
        assert!(resolve("9999999999999 years ago", now()).is_err());
    }

    #[test]
    fn resolution_is_deterministic_in_reference() {
        let earlier = now() - Duration::days(10);
        assert_eq!(
            resolve("3 days ago", earlier).unwrap(),
            earlier - Duration::days(3)
        );
    }

    #[test]
    fn seven_day_window_keeps_three_days_drops_ten() {
        let window = RecencyWindow::days(7);
        let three = resolve("3 days ago", now()).unwrap();
        let ten = resolve("10 days ago", now()).unwrap();
        assert!(window.contains(three, now()));
        assert!(!window.contains(ten, now()));
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let window = RecencyWindow::days(7);
        assert!(window.contains(now() - Duration::days(7), now()));
        assert!(window.contains(now() + Duration::hours(1), now()));
    }

    #[test]
    fn oversized_window_saturates_and_keeps_everything() {
        let window = RecencyWindow::days(u64::MAX);
        assert_eq!(window.max_age_secs, u64::MAX);
        assert!(window.contains(now() - Duration::days(365 * 100), now()));
    }
}
