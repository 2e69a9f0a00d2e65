use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::tag::Tag;

/// Note priority as the backend spells it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" | "med" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(format!(
                "unknown priority '{}' (expected: low, medium, high)",
                s
            )),
        }
    }
}

/// A note as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_feature_note: bool,
    #[serde(default, deserialize_with = "deserialize_opt_timestamp")]
    pub feature_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_favorite: bool,
}

impl Note {
    pub fn has_tag(&self, tag_id: i64) -> bool {
        self.tags.iter().any(|t| t.id == tag_id)
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }

    /// A note scheduled for a date that has not arrived yet
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.is_feature_note && self.feature_date.is_some_and(|d| d > now)
    }
}

/// Body for creating a note. Tags are sent by name; the backend creates
/// missing ones.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub priority: Priority,
    pub is_feature_note: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
}

/// Body for updating a note. The backend expects every field.
#[derive(Debug, Clone, Serialize)]
pub struct NoteUpdate {
    pub title: String,
    pub content: String,
    pub priority: Priority,
    pub tags: Vec<String>,
}

impl NoteUpdate {
    /// Start an update from the note's current values
    pub fn from_note(note: &Note) -> Self {
        NoteUpdate {
            title: note.title.clone(),
            content: note.content.clone(),
            priority: note.priority,
            tags: note.tags.iter().map(|t| t.name.clone()).collect(),
        }
    }
}

/// Parse a backend timestamp. The backend emits naive ISO-8601 (UTC) for
/// most columns but RFC 3339 with an offset in places, and the local cache
/// stores RFC 3339.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
}

fn deserialize_opt_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_timestamp(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const BACKEND_NOTE: &str = r#"{
        "id": 10,
        "title": "Groceries",
        "content": "milk",
        "priority": "High",
        "created_at": "2025-03-01T08:30:00.123456",
        "updated_at": "2025-03-02T09:00:00",
        "is_feature_note": true,
        "feature_date": "2025-04-01T00:00:00+00:00",
        "tags": [{"id": 3, "name": "personal"}],
        "owner_id": 5
    }"#;

    #[test]
    fn decode_backend_note() {
        let note: Note = serde_json::from_str(BACKEND_NOTE).unwrap();
        assert_eq!(note.id, 10);
        assert_eq!(note.priority, Priority::High);
        assert_eq!(note.tag_names(), vec!["personal"]);
        assert_eq!(
            note.updated_at,
            Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap()
        );
        assert!(note.feature_date.is_some());
        assert!(!note.is_pinned);
    }

    #[test]
    fn decode_minimal_note_uses_defaults() {
        let note: Note = serde_json::from_str(
            r#"{"id":1,"title":"t","created_at":"2025-01-01T00:00:00","updated_at":"2025-01-01T00:00:00","feature_date":null}"#,
        )
        .unwrap();
        assert_eq!(note.priority, Priority::Low);
        assert!(note.tags.is_empty());
        assert!(note.content.is_empty());
        assert!(note.feature_date.is_none());
    }

    #[test]
    fn cached_note_round_trips() {
        let note: Note = serde_json::from_str(BACKEND_NOTE).unwrap();
        let cached = serde_json::to_string(&note).unwrap();
        let back: Note = serde_json::from_str(&cached).unwrap();
        assert_eq!(back, note);
    }

    #[test]
    fn invalid_timestamp_is_rejected() {
        let err = serde_json::from_str::<Note>(
            r#"{"id":1,"title":"t","created_at":"yesterday","updated_at":"2025-01-01T00:00:00"}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn priority_parse_is_case_insensitive() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("med".parse::<Priority>().unwrap(), Priority::Medium);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn upcoming_requires_flag_and_future_date() {
        let mut note: Note = serde_json::from_str(BACKEND_NOTE).unwrap();
        let before = Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        assert!(note.is_upcoming(before));
        assert!(!note.is_upcoming(after));
        note.is_feature_note = false;
        assert!(!note.is_upcoming(before));
    }

    #[test]
    fn update_starts_from_note_values() {
        let note: Note = serde_json::from_str(BACKEND_NOTE).unwrap();
        let update = NoteUpdate::from_note(&note);
        assert_eq!(update.title, "Groceries");
        assert_eq!(update.tags, vec!["personal".to_string()]);
        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(body["priority"], "High");
    }
}
