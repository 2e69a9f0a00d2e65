use indexmap::{IndexMap, IndexSet};

use super::ReconcileError;
use super::plan::DeletionPlan;
use crate::model::Note;

/// What will happen to one orphan-risk note
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision<'a> {
    /// Attach this tag before the old one is removed
    Replace(&'a str),
    Delete,
    Undecided,
}

/// The user's per-note choices for a deletion plan.
///
/// A note either gets a replacement tag or is deleted, never both: setting
/// one clears the other.
#[derive(Debug, Clone, Default)]
pub struct Decisions {
    replacement_tags: IndexMap<i64, String>,
    notes_to_delete: IndexSet<i64>,
}

impl Decisions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Propose `tag_name` as the note's new tag. A non-blank name takes the
    /// note off the deletion list; a blank one leaves the list alone.
    pub fn set_replacement(
        &mut self,
        plan: &DeletionPlan,
        note_id: i64,
        tag_name: &str,
    ) -> Result<(), ReconcileError> {
        require_orphan(plan, note_id)?;
        if tag_name.trim() == plan.tag.name {
            return Err(ReconcileError::ReplacementIsDeletedTag(plan.tag.name.clone()));
        }
        self.replacement_tags.insert(note_id, tag_name.to_string());
        if !tag_name.trim().is_empty() {
            self.notes_to_delete.shift_remove(&note_id);
        }
        Ok(())
    }

    /// Mark the note for deletion, discarding any proposed replacement
    pub fn mark_for_deletion(&mut self, plan: &DeletionPlan, note_id: i64) -> Result<(), ReconcileError> {
        require_orphan(plan, note_id)?;
        self.notes_to_delete.insert(note_id);
        self.replacement_tags.shift_remove(&note_id);
        Ok(())
    }

    pub fn unmark_for_deletion(&mut self, note_id: i64) {
        self.notes_to_delete.shift_remove(&note_id);
    }

    /// Flip deletion membership; returns whether the note is now marked
    pub fn toggle_deletion(&mut self, plan: &DeletionPlan, note_id: i64) -> Result<bool, ReconcileError> {
        if self.notes_to_delete.contains(&note_id) {
            self.unmark_for_deletion(note_id);
            Ok(false)
        } else {
            self.mark_for_deletion(plan, note_id)?;
            Ok(true)
        }
    }

    /// The trimmed replacement for a note, if one is set and non-blank
    pub fn replacement(&self, note_id: i64) -> Option<&str> {
        self.replacement_tags
            .get(&note_id)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn is_marked_for_deletion(&self, note_id: i64) -> bool {
        self.notes_to_delete.contains(&note_id)
    }

    pub fn decision(&self, note_id: i64) -> Decision<'_> {
        if self.is_marked_for_deletion(note_id) {
            Decision::Delete
        } else if let Some(name) = self.replacement(note_id) {
            Decision::Replace(name)
        } else {
            Decision::Undecided
        }
    }

    /// Orphan-risk notes with neither a replacement nor a deletion mark
    pub fn undecided<'p>(&self, plan: &'p DeletionPlan) -> Vec<&'p Note> {
        plan.single_tag_notes
            .iter()
            .filter(|n| self.decision(n.id) == Decision::Undecided)
            .collect()
    }

    pub fn is_ready(&self, plan: &DeletionPlan) -> bool {
        self.undecided(plan).is_empty()
    }

    /// Mark every undecided note for deletion. Applied only after the user
    /// has confirmed the list of notes that will be lost.
    pub fn delete_undecided(&mut self, plan: &DeletionPlan) -> Vec<i64> {
        let ids: Vec<i64> = self.undecided(plan).iter().map(|n| n.id).collect();
        for id in &ids {
            self.notes_to_delete.insert(*id);
            self.replacement_tags.shift_remove(id);
        }
        ids
    }
}

fn require_orphan(plan: &DeletionPlan, note_id: i64) -> Result<(), ReconcileError> {
    if plan.is_orphan(note_id) {
        Ok(())
    } else {
        Err(ReconcileError::NotAnOrphan(note_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tag;
    use crate::ops::reconcile::plan_deletion;
    use crate::ops::test_helpers::note;

    fn plan() -> DeletionPlan {
        let personal = Tag::new(3, "personal");
        let work = Tag::new(7, "work");
        let notes = vec![
            note(10, "Groceries", &[&personal]),
            note(11, "Standup", &[&personal, &work]),
            note(12, "Diary", &[&personal]),
        ];
        plan_deletion(&personal, &notes)
    }

    #[test]
    fn replacement_clears_deletion() {
        let plan = plan();
        let mut d = Decisions::new();
        d.mark_for_deletion(&plan, 10).unwrap();
        d.set_replacement(&plan, 10, "general").unwrap();
        assert!(!d.is_marked_for_deletion(10));
        assert_eq!(d.decision(10), Decision::Replace("general"));
    }

    #[test]
    fn blank_replacement_keeps_deletion() {
        let plan = plan();
        let mut d = Decisions::new();
        d.mark_for_deletion(&plan, 10).unwrap();
        d.set_replacement(&plan, 10, "   ").unwrap();
        assert_eq!(d.decision(10), Decision::Delete);
    }

    #[test]
    fn deletion_clears_replacement() {
        let plan = plan();
        let mut d = Decisions::new();
        d.set_replacement(&plan, 10, "general").unwrap();
        d.mark_for_deletion(&plan, 10).unwrap();
        assert!(d.replacement(10).is_none());
        assert_eq!(d.decision(10), Decision::Delete);

        // unmarking does not bring the old replacement back
        d.unmark_for_deletion(10);
        assert_eq!(d.decision(10), Decision::Undecided);
    }

    #[test]
    fn toggle_flips_membership() {
        let plan = plan();
        let mut d = Decisions::new();
        assert!(d.toggle_deletion(&plan, 12).unwrap());
        assert!(!d.toggle_deletion(&plan, 12).unwrap());
        assert!(!d.is_marked_for_deletion(12));
    }

    #[test]
    fn readiness_tracks_undecided_notes() {
        let plan = plan();
        let mut d = Decisions::new();
        let undecided: Vec<i64> = d.undecided(&plan).iter().map(|n| n.id).collect();
        assert_eq!(undecided, vec![10, 12]);
        assert!(!d.is_ready(&plan));

        d.set_replacement(&plan, 10, " general ").unwrap();
        assert_eq!(d.replacement(10), Some("general"));
        assert!(!d.is_ready(&plan));

        d.mark_for_deletion(&plan, 12).unwrap();
        assert!(d.is_ready(&plan));
    }

    #[test]
    fn delete_undecided_defaults_remaining_notes() {
        let plan = plan();
        let mut d = Decisions::new();
        d.set_replacement(&plan, 10, "general").unwrap();
        assert_eq!(d.delete_undecided(&plan), vec![12]);
        assert!(d.is_ready(&plan));
        assert_eq!(d.decision(10), Decision::Replace("general"));
        assert_eq!(d.decision(12), Decision::Delete);
    }

    #[test]
    fn rejects_notes_outside_orphan_set() {
        let plan = plan();
        let mut d = Decisions::new();
        assert!(matches!(
            d.set_replacement(&plan, 11, "general"),
            Err(ReconcileError::NotAnOrphan(11))
        ));
        assert!(matches!(
            d.mark_for_deletion(&plan, 99),
            Err(ReconcileError::NotAnOrphan(99))
        ));
    }

    #[test]
    fn rejects_the_tag_being_deleted_as_replacement() {
        let plan = plan();
        let mut d = Decisions::new();
        assert!(matches!(
            d.set_replacement(&plan, 10, "personal"),
            Err(ReconcileError::ReplacementIsDeletedTag(_))
        ));
        assert_eq!(d.decision(10), Decision::Undecided);
    }
}
