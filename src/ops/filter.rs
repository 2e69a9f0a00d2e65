use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::model::{Note, Priority};

/// Window of recent activity, measured on `updated_at`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeRange {
    #[default]
    All,
    Today,
    Week,
    Month,
    Year,
}

impl TimeRange {
    fn window(self) -> Option<Duration> {
        match self {
            TimeRange::All => None,
            TimeRange::Today => Some(Duration::days(1)),
            TimeRange::Week => Some(Duration::days(7)),
            TimeRange::Month => Some(Duration::days(30)),
            TimeRange::Year => Some(Duration::days(365)),
        }
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(TimeRange::All),
            "today" => Ok(TimeRange::Today),
            "week" => Ok(TimeRange::Week),
            "month" => Ok(TimeRange::Month),
            "year" => Ok(TimeRange::Year),
            other => Err(format!(
                "unknown range '{}' (expected all, today, week, month or year)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    DateDesc,
    DateAsc,
    TitleAsc,
    TitleDesc,
    PriorityHigh,
    PriorityLow,
}

impl SortOrder {
    pub const NAMES: [&'static str; 6] = [
        "date-desc",
        "date-asc",
        "title-asc",
        "title-desc",
        "priority-high",
        "priority-low",
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::DateDesc => "date-desc",
            SortOrder::DateAsc => "date-asc",
            SortOrder::TitleAsc => "title-asc",
            SortOrder::TitleDesc => "title-desc",
            SortOrder::PriorityHigh => "priority-high",
            SortOrder::PriorityLow => "priority-low",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "date-desc" | "newest" => Ok(SortOrder::DateDesc),
            "date-asc" | "oldest" => Ok(SortOrder::DateAsc),
            "title-asc" | "title" => Ok(SortOrder::TitleAsc),
            "title-desc" => Ok(SortOrder::TitleDesc),
            "priority-high" | "priority" => Ok(SortOrder::PriorityHigh),
            "priority-low" => Ok(SortOrder::PriorityLow),
            other => Err(format!(
                "unknown sort '{}' (expected one of: {})",
                other,
                Self::NAMES.join(", ")
            )),
        }
    }
}

/// Criteria for narrowing a note list. Every set criterion must match.
#[derive(Debug, Clone, Default)]
pub struct NoteFilter {
    /// Match notes carrying any of these tag names
    pub tags: Vec<String>,
    pub time_range: TimeRange,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Only scheduled notes whose date is still ahead
    pub future_only: bool,
    pub pinned_only: bool,
    pub priority: Option<Priority>,
    /// Matched against title and content
    pub pattern: Option<Regex>,
}

impl NoteFilter {
    pub fn matches(&self, note: &Note, now: DateTime<Utc>) -> bool {
        if !self.tags.is_empty() && !note.tags.iter().any(|t| self.tags.contains(&t.name)) {
            return false;
        }
        if self.future_only {
            if !note.is_upcoming(now) {
                return false;
            }
        } else if let Some(window) = self.time_range.window()
            && now.signed_duration_since(note.updated_at) >= window
        {
            return false;
        }
        if self.from.is_some_and(|from| note.updated_at < from) {
            return false;
        }
        if self.to.is_some_and(|to| note.updated_at > to) {
            return false;
        }
        if self.pinned_only && !note.is_pinned {
            return false;
        }
        if self.priority.is_some_and(|p| note.priority != p) {
            return false;
        }
        if let Some(re) = &self.pattern
            && !re.is_match(&note.title)
            && !re.is_match(&note.content)
        {
            return false;
        }
        true
    }

    pub fn apply<'a>(&self, notes: &'a [Note], now: DateTime<Utc>) -> Vec<&'a Note> {
        notes.iter().filter(|n| self.matches(n, now)).collect()
    }
}

/// Sort in place. The sort is stable, so notes that compare equal keep
/// their backend order.
pub fn sort_notes(notes: &mut [&Note], order: SortOrder) {
    notes.sort_by(|a, b| compare(a, b, order));
}

fn compare(a: &Note, b: &Note, order: SortOrder) -> Ordering {
    match order {
        SortOrder::DateDesc => b.updated_at.cmp(&a.updated_at),
        SortOrder::DateAsc => a.updated_at.cmp(&b.updated_at),
        SortOrder::TitleAsc => title_key(a).cmp(&title_key(b)),
        SortOrder::TitleDesc => title_key(b).cmp(&title_key(a)),
        SortOrder::PriorityHigh => b
            .priority
            .cmp(&a.priority)
            .then_with(|| b.is_pinned.cmp(&a.is_pinned)),
        SortOrder::PriorityLow => a
            .priority
            .cmp(&b.priority)
            .then_with(|| b.is_pinned.cmp(&a.is_pinned)),
    }
}

fn title_key(note: &Note) -> String {
    note.title.to_lowercase()
}
