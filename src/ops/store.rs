use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::io::api::{ApiError, RemoteApi};
use crate::io::cache::{Cache, CacheError};
use crate::model::{Note, NoteDraft, NoteUpdate, Tag, find_tag};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("note not found: {0}")]
    NoteNotFound(i64),
}

/// Where the store's current contents came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Nothing loaded yet
    Empty,
    /// A cache blob inside the freshness window
    Cache,
    /// A fetch made during this run
    Remote,
}

/// The account's tags and notes, mirrored from the backend and cached
/// locally for a short window.
#[derive(Debug)]
pub struct Store {
    pub tags: Vec<Tag>,
    pub notes: Vec<Note>,
    source: DataSource,
    cache: Cache,
}

impl Store {
    /// Start from the cached blob when it is still fresh, else empty
    pub fn hydrate(cache: Cache, now: DateTime<Utc>) -> Self {
        match cache.load_fresh(now) {
            Some(blob) => Store {
                tags: blob.tags,
                notes: blob.notes,
                source: DataSource::Cache,
                cache,
            },
            None => Store {
                tags: Vec::new(),
                notes: Vec::new(),
                source: DataSource::Empty,
                cache,
            },
        }
    }

    pub fn source(&self) -> DataSource {
        self.source
    }

    /// Re-fetch both collections and replace them wholesale
    pub fn refresh<A: RemoteApi + ?Sized>(&mut self, api: &A) -> Result<(), StoreError> {
        let notes = or_empty(api.get_notes())?;
        let tags = or_empty(api.get_tags())?;
        debug!(notes = notes.len(), tags = tags.len(), "store refreshed");
        self.notes = notes;
        self.tags = tags;
        self.source = DataSource::Remote;
        self.persist();
        Ok(())
    }

    /// Make sure the store holds something: a fresh cache is kept as is,
    /// otherwise the backend is asked.
    pub fn ensure_loaded<A: RemoteApi + ?Sized>(&mut self, api: &A) -> Result<(), StoreError> {
        if self.source == DataSource::Empty {
            self.refresh(api)?;
        }
        Ok(())
    }

    /// Drop the cache file; used on logout
    pub fn invalidate(&mut self) -> Result<(), StoreError> {
        self.cache.clear()?;
        self.source = DataSource::Empty;
        Ok(())
    }

    pub fn note(&self, id: i64) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn tag(&self, key: &str) -> Option<&Tag> {
        find_tag(&self.tags, key)
    }

    /// Look a note up, refetching once when a cached view lacks it
    pub fn find_note<A: RemoteApi + ?Sized>(&mut self, api: &A, id: i64) -> Result<Note, StoreError> {
        self.ensure_loaded(api)?;
        if self.note(id).is_none() && self.source == DataSource::Cache {
            self.refresh(api)?;
        }
        self.note(id).cloned().ok_or(StoreError::NoteNotFound(id))
    }

    /// Same as [`Store::find_note`] for a tag given by id or name
    pub fn find_tag<A: RemoteApi + ?Sized>(&mut self, api: &A, key: &str) -> Result<Option<Tag>, StoreError> {
        self.ensure_loaded(api)?;
        if self.tag(key).is_none() && self.source == DataSource::Cache {
            self.refresh(api)?;
        }
        Ok(self.tag(key).cloned())
    }

    // -----------------------------------------------------------------------
    // Note mutations
    // -----------------------------------------------------------------------

    pub fn create_note<A: RemoteApi + ?Sized>(
        &mut self,
        api: &A,
        draft: &NoteDraft,
    ) -> Result<Note, StoreError> {
        let note = api.create_note(draft)?;
        self.learn_tags(&note);
        self.notes.insert(0, note.clone());
        self.persist();
        Ok(note)
    }

    pub fn update_note<A: RemoteApi + ?Sized>(
        &mut self,
        api: &A,
        id: i64,
        update: &NoteUpdate,
    ) -> Result<Note, StoreError> {
        let note = api.update_note(id, update)?;
        self.learn_tags(&note);
        self.replace_note(note.clone());
        self.persist();
        Ok(note)
    }

    pub fn delete_note<A: RemoteApi + ?Sized>(&mut self, api: &A, id: i64) -> Result<(), StoreError> {
        api.delete_note(id)?;
        self.notes.retain(|n| n.id != id);
        self.persist();
        Ok(())
    }

    pub fn delete_notes<A: RemoteApi + ?Sized>(&mut self, api: &A, ids: &[i64]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        api.delete_notes(ids)?;
        self.notes.retain(|n| !ids.contains(&n.id));
        self.persist();
        Ok(())
    }

    /// Flip the pin locally first. If the backend refuses, the notes are put
    /// back exactly as they were and the error is returned.
    pub fn toggle_pin<A: RemoteApi + ?Sized>(&mut self, api: &A, id: i64) -> Result<Note, StoreError> {
        let snapshot = self.notes.clone();
        let note = self
            .notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(StoreError::NoteNotFound(id))?;
        note.is_pinned = !note.is_pinned;
        self.persist();

        match api.toggle_pin(id) {
            Ok(updated) => {
                self.replace_note(updated.clone());
                self.persist();
                Ok(updated)
            }
            Err(e) => {
                warn!(note_id = id, error = %e, "pin toggle rejected, restoring");
                self.notes = snapshot;
                self.persist();
                Err(e.into())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Tag mutations
    // -----------------------------------------------------------------------

    pub fn create_tag<A: RemoteApi + ?Sized>(&mut self, api: &A, name: &str) -> Result<Tag, StoreError> {
        let tag = api.create_tag(name)?;
        self.tags.push(tag.clone());
        self.persist();
        Ok(tag)
    }

    pub fn rename_tag<A: RemoteApi + ?Sized>(
        &mut self,
        api: &A,
        id: i64,
        name: &str,
    ) -> Result<Tag, StoreError> {
        let renamed = api.update_tag(id, name)?;
        for tag in self.tags.iter_mut().filter(|t| t.id == id) {
            tag.name = renamed.name.clone();
        }
        for tag in self
            .notes
            .iter_mut()
            .flat_map(|n| n.tags.iter_mut())
            .filter(|t| t.id == id)
        {
            tag.name = renamed.name.clone();
        }
        self.persist();
        Ok(renamed)
    }

    /// Delete a tag that no note depends on. Tags carried by notes go
    /// through `ops::reconcile` instead.
    pub fn delete_unreferenced_tag<A: RemoteApi + ?Sized>(
        &mut self,
        api: &A,
        id: i64,
    ) -> Result<(), StoreError> {
        api.delete_tag(id)?;
        self.tags.retain(|t| t.id != id);
        for note in self.notes.iter_mut() {
            note.tags.retain(|t| t.id != id);
        }
        self.persist();
        Ok(())
    }

    fn replace_note(&mut self, note: Note) {
        match self.notes.iter_mut().find(|n| n.id == note.id) {
            Some(slot) => *slot = note,
            None => self.notes.insert(0, note),
        }
    }

    /// Notes come back with tags the backend may have just created
    fn learn_tags(&mut self, note: &Note) {
        for tag in &note.tags {
            if !self.tags.iter().any(|t| t.id == tag.id) {
                self.tags.push(tag.clone());
            }
        }
    }

    /// Write the collections to the cache. A store that was never loaded
    /// holds a partial view and must not overwrite the cache.
    fn persist(&self) {
        if self.source == DataSource::Empty {
            return;
        }
        if let Err(e) = self.cache.save(&self.notes, &self.tags, Utc::now()) {
            warn!(path = %self.cache.path().display(), error = %e, "could not update cache");
        }
    }
}

/// The backend reports an empty table as an error; treat it as no rows
fn or_empty<T>(result: Result<Vec<T>, ApiError>) -> Result<Vec<T>, ApiError> {
    match result {
        Err(e) if e.is_empty_collection() => {
            debug!(error = %e, "empty collection");
            Ok(Vec::new())
        }
        other => other,
    }
}
