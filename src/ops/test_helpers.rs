//! In-memory backend used by the ops tests.

use std::cell::RefCell;

use chrono::{TimeZone, Utc};

use crate::io::api::{ApiError, RemoteApi};
use crate::model::{Note, NoteDraft, NoteUpdate, Priority, Tag};

#[derive(Default)]
struct Backend {
    notes: Vec<Note>,
    tags: Vec<Tag>,
    next_id: i64,
}

/// Fake backend with the same referential behavior as the real service:
/// deleting a tag strips it from every note.
#[derive(Default)]
pub struct FakeApi {
    state: RefCell<Backend>,
    calls: RefCell<Vec<String>>,
    failures: RefCell<Vec<(String, String)>>,
}

pub fn note(id: i64, title: &str, tags: &[&Tag]) -> Note {
    let ts = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
    Note {
        id,
        title: title.to_string(),
        content: String::new(),
        tags: tags.iter().map(|t| (*t).clone()).collect(),
        priority: Priority::Low,
        created_at: ts,
        updated_at: ts,
        is_feature_note: false,
        feature_date: None,
        is_pinned: false,
        is_favorite: false,
    }
}

impl FakeApi {
    pub fn new(notes: Vec<Note>, tags: Vec<Tag>) -> Self {
        let next_id = 1000;
        FakeApi {
            state: RefCell::new(Backend {
                notes,
                tags,
                next_id,
            }),
            ..Default::default()
        }
    }

    /// Make every call whose log entry equals `call` fail with a 500
    pub fn fail_on(&self, call: &str) {
        self.fail_with(call, "simulated failure");
    }

    pub fn fail_with(&self, call: &str, message: &str) {
        self.failures
            .borrow_mut()
            .push((call.to_string(), message.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Mutating calls only, in order
    pub fn writes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("get_") && !c.starts_with("search"))
            .collect()
    }

    pub fn notes(&self) -> Vec<Note> {
        self.state.borrow().notes.clone()
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.state.borrow().tags.clone()
    }

    pub fn note_tag_names(&self, id: i64) -> Option<Vec<String>> {
        self.state
            .borrow()
            .notes
            .iter()
            .find(|n| n.id == id)
            .map(|n| n.tags.iter().map(|t| t.name.clone()).collect())
    }

    fn record(&self, call: String) -> Result<(), ApiError> {
        let failure = self
            .failures
            .borrow()
            .iter()
            .find(|(c, _)| *c == call)
            .map(|(_, message)| message.clone());
        self.calls.borrow_mut().push(call);
        match failure {
            Some(message) => Err(ApiError::Status {
                status: 500,
                message,
            }),
            None => Ok(()),
        }
    }

    fn not_found(what: &str) -> ApiError {
        ApiError::Status {
            status: 404,
            message: format!("{} not found", what),
        }
    }
}

impl RemoteApi for FakeApi {
    fn get_notes(&self) -> Result<Vec<Note>, ApiError> {
        self.record("get_notes".into())?;
        Ok(self.notes())
    }

    fn get_tags(&self) -> Result<Vec<Tag>, ApiError> {
        self.record("get_tags".into())?;
        Ok(self.tags())
    }

    fn create_tag(&self, name: &str) -> Result<Tag, ApiError> {
        self.record(format!("create_tag({})", name))?;
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let tag = Tag::new(state.next_id, name);
        state.tags.push(tag.clone());
        Ok(tag)
    }

    fn update_tag(&self, id: i64, name: &str) -> Result<Tag, ApiError> {
        self.record(format!("update_tag({},{})", id, name))?;
        let mut state = self.state.borrow_mut();
        let tag = state
            .tags
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Self::not_found("tag"))?;
        tag.name = name.to_string();
        let updated = tag.clone();
        for note in state.notes.iter_mut() {
            for t in note.tags.iter_mut().filter(|t| t.id == id) {
                t.name = name.to_string();
            }
        }
        Ok(updated)
    }

    fn delete_tag(&self, id: i64) -> Result<(), ApiError> {
        self.record(format!("delete_tag({})", id))?;
        let mut state = self.state.borrow_mut();
        let before = state.tags.len();
        state.tags.retain(|t| t.id != id);
        if state.tags.len() == before {
            return Err(Self::not_found("tag"));
        }
        for note in state.notes.iter_mut() {
            note.tags.retain(|t| t.id != id);
        }
        Ok(())
    }

    fn delete_note(&self, id: i64) -> Result<(), ApiError> {
        self.record(format!("delete_note({})", id))?;
        let mut state = self.state.borrow_mut();
        let before = state.notes.len();
        state.notes.retain(|n| n.id != id);
        if state.notes.len() == before {
            return Err(Self::not_found("note"));
        }
        Ok(())
    }

    fn add_tag_to_note(&self, note_id: i64, tag_id: i64) -> Result<(), ApiError> {
        self.record(format!("add_tag_to_note({},{})", note_id, tag_id))?;
        let mut state = self.state.borrow_mut();
        let tag = state
            .tags
            .iter()
            .find(|t| t.id == tag_id)
            .cloned()
            .ok_or_else(|| Self::not_found("tag"))?;
        let note = state
            .notes
            .iter_mut()
            .find(|n| n.id == note_id)
            .ok_or_else(|| Self::not_found("note"))?;
        if !note.has_tag(tag_id) {
            note.tags.push(tag);
        }
        Ok(())
    }

    fn create_note(&self, draft: &NoteDraft) -> Result<Note, ApiError> {
        self.record(format!("create_note({})", draft.title))?;
        let tags: Vec<Tag> = draft
            .tags
            .iter()
            .map(|name| {
                let existing = self.tags().into_iter().find(|t| &t.name == name);
                match existing {
                    Some(tag) => tag,
                    None => {
                        let mut state = self.state.borrow_mut();
                        state.next_id += 1;
                        let tag = Tag::new(state.next_id, name.clone());
                        state.tags.push(tag.clone());
                        tag
                    }
                }
            })
            .collect();
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let tag_refs: Vec<&Tag> = tags.iter().collect();
        let mut created = note(state.next_id, &draft.title, &tag_refs);
        created.content = draft.content.clone();
        created.priority = draft.priority;
        created.is_feature_note = draft.is_feature_note;
        created.feature_date = draft.feature_date;
        state.notes.push(created.clone());
        Ok(created)
    }

    fn update_note(&self, id: i64, update: &NoteUpdate) -> Result<Note, ApiError> {
        self.record(format!("update_note({})", id))?;
        let mut state = self.state.borrow_mut();
        let all_tags = state.tags.clone();
        let note = state
            .notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| Self::not_found("note"))?;
        note.title = update.title.clone();
        note.content = update.content.clone();
        note.priority = update.priority;
        note.tags = all_tags
            .into_iter()
            .filter(|t| update.tags.contains(&t.name))
            .collect();
        Ok(note.clone())
    }

    fn delete_notes(&self, ids: &[i64]) -> Result<(), ApiError> {
        let list: Vec<String> = ids.iter().map(|i| i.to_string()).collect();
        self.record(format!("delete_notes({})", list.join(",")))?;
        self.state
            .borrow_mut()
            .notes
            .retain(|n| !ids.contains(&n.id));
        Ok(())
    }

    fn toggle_pin(&self, id: i64) -> Result<Note, ApiError> {
        self.record(format!("toggle_pin({})", id))?;
        let mut state = self.state.borrow_mut();
        let note = state
            .notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| Self::not_found("note"))?;
        note.is_pinned = !note.is_pinned;
        Ok(note.clone())
    }

    fn search_notes(&self, query: &str) -> Result<Vec<Note>, ApiError> {
        self.record(format!("search({})", query))?;
        let needle = query.to_lowercase();
        Ok(self
            .notes()
            .into_iter()
            .filter(|n| n.title.to_lowercase().contains(&needle))
            .collect())
    }
}
