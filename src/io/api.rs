use serde_json::Value;

use crate::model::{Note, NoteDraft, NoteUpdate, Tag};

/// Error type for calls to the notes backend
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not logged in (run `np login <email>` first)")]
    NotLoggedIn,
    #[error("session expired, please log in again")]
    SessionExpired,
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// The backend answers "no rows" lookups with an error whose detail
    /// mentions an empty table or the database. Listing calls treat that
    /// as an empty collection.
    pub fn is_empty_collection(&self) -> bool {
        match self {
            ApiError::Status { message, .. } | ApiError::Other(message) => {
                let lower = message.to_lowercase();
                lower.contains("empty") || lower.contains("database")
            }
            _ => false,
        }
    }
}

/// Turn an error response body into a human-readable message.
///
/// `detail` may be a string or a list of `{msg}` validation objects;
/// `message` is used as a fallback, then the raw text.
pub fn error_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        match value.get("detail") {
            Some(Value::String(s)) => return s.clone(),
            Some(Value::Array(items)) => {
                return items
                    .iter()
                    .map(|item| match item.get("msg").and_then(Value::as_str) {
                        Some(msg) => msg.to_string(),
                        None => item.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
            }
            Some(Value::Null) | None => {}
            Some(other) => return other.to_string(),
        }
        if let Some(msg) = value.get("message").and_then(Value::as_str) {
            return msg.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {} error", status)
    } else {
        trimmed.to_string()
    }
}

/// The remote operations the stores and the tag-deletion workflow need.
///
/// `HttpClient` is the production implementation; tests use an in-memory
/// backend.
pub trait RemoteApi {
    fn get_notes(&self) -> Result<Vec<Note>, ApiError>;
    fn get_tags(&self) -> Result<Vec<Tag>, ApiError>;
    fn create_tag(&self, name: &str) -> Result<Tag, ApiError>;
    fn update_tag(&self, id: i64, name: &str) -> Result<Tag, ApiError>;
    fn delete_tag(&self, id: i64) -> Result<(), ApiError>;
    fn delete_note(&self, id: i64) -> Result<(), ApiError>;
    fn add_tag_to_note(&self, note_id: i64, tag_id: i64) -> Result<(), ApiError>;
    fn create_note(&self, draft: &NoteDraft) -> Result<Note, ApiError>;
    fn update_note(&self, id: i64, update: &NoteUpdate) -> Result<Note, ApiError>;
    fn delete_notes(&self, ids: &[i64]) -> Result<(), ApiError>;
    fn toggle_pin(&self, id: i64) -> Result<Note, ApiError>;
    fn search_notes(&self, query: &str) -> Result<Vec<Note>, ApiError>;

    /// Attach a tag by name, creating the tag first if the account has none
    /// with that exact name.
    fn add_tag_to_note_by_name(&self, note_id: i64, tag_name: &str) -> Result<(), ApiError> {
        let existing = self.get_tags()?.into_iter().find(|t| t.name == tag_name);
        let tag = match existing {
            Some(tag) => tag,
            None => self.create_tag(tag_name)?,
        };
        self.add_tag_to_note(note_id, tag.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_string() {
        assert_eq!(
            error_message(404, r#"{"detail":"Note not found"}"#),
            "Note not found"
        );
    }

    #[test]
    fn detail_validation_list_is_joined() {
        let body = r#"{"detail":[{"loc":["body","name"],"msg":"field required"},{"msg":"too short"}]}"#;
        assert_eq!(error_message(422, body), "field required, too short");
    }

    #[test]
    fn detail_list_item_without_msg_is_stringified() {
        let body = r#"{"detail":[{"code":1}]}"#;
        assert_eq!(error_message(422, body), r#"{"code":1}"#);
    }

    #[test]
    fn message_fallback_then_raw_text() {
        assert_eq!(error_message(500, r#"{"message":"boom"}"#), "boom");
        assert_eq!(error_message(502, "Bad Gateway"), "Bad Gateway");
        assert_eq!(error_message(503, ""), "HTTP 503 error");
    }

    #[test]
    fn empty_collection_detection() {
        let err = ApiError::Status {
            status: 404,
            message: "Database is empty".into(),
        };
        assert!(err.is_empty_collection());
        let err = ApiError::Status {
            status: 404,
            message: "Note not found".into(),
        };
        assert!(!err.is_empty_collection());
        assert!(!ApiError::SessionExpired.is_empty_collection());
    }
}
