use serde::{Deserialize, Serialize};

/// A tag owned by the account. Names are unique per account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    /// Only some endpoints report usage counts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes_count: Option<i64>,
}

impl Tag {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Tag {
            id,
            name: name.into(),
            notes_count: None,
        }
    }
}

/// Find a tag by id or by exact name.
///
/// A purely numeric argument is tried as an id first, then as a name,
/// so a tag literally named "42" can still be addressed.
pub fn find_tag<'a>(tags: &'a [Tag], key: &str) -> Option<&'a Tag> {
    if let Ok(id) = key.parse::<i64>()
        && let Some(tag) = tags.iter().find(|t| t.id == id)
    {
        return Some(tag);
    }
    tags.iter().find(|t| t.name == key)
}
