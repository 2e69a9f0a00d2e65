use crate::model::{Note, Tag};

/// What a tag deletion requires before it can run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    /// No note references the tag: delete after one confirmation
    Unreferenced,
    /// Every referencing note keeps at least one other tag
    SecondaryOnly,
    /// Some notes would be left without tags; each needs a decision
    NeedsDecisions,
}

/// Classification of the notes a tag deletion touches
#[derive(Debug, Clone)]
pub struct DeletionPlan {
    pub tag: Tag,
    /// Every note that carries the tag, in backend order
    pub affected_notes: Vec<Note>,
    /// Affected notes whose only tag is this one (orphan risk)
    pub single_tag_notes: Vec<Note>,
}

impl DeletionPlan {
    pub fn kind(&self) -> PlanKind {
        if self.affected_notes.is_empty() {
            PlanKind::Unreferenced
        } else if self.single_tag_notes.is_empty() {
            PlanKind::SecondaryOnly
        } else {
            PlanKind::NeedsDecisions
        }
    }

    /// Affected notes that keep other tags after the deletion
    pub fn secondary_notes(&self) -> impl Iterator<Item = &Note> {
        self.affected_notes.iter().filter(|n| n.tags.len() > 1)
    }

    pub fn is_orphan(&self, note_id: i64) -> bool {
        self.single_tag_notes.iter().any(|n| n.id == note_id)
    }

    pub fn orphan(&self, note_id: i64) -> Option<&Note> {
        self.single_tag_notes.iter().find(|n| n.id == note_id)
    }
}

/// Classify `all_notes` against the tag about to be deleted.
///
/// `all_notes` must come from a fresh fetch; a stale list misclassifies
/// notes whose tags changed elsewhere.
pub fn plan_deletion(tag: &Tag, all_notes: &[Note]) -> DeletionPlan {
    let affected_notes: Vec<Note> = all_notes
        .iter()
        .filter(|n| n.has_tag(tag.id))
        .cloned()
        .collect();
    let single_tag_notes = affected_notes
        .iter()
        .filter(|n| n.tags.len() == 1)
        .cloned()
        .collect();

    DeletionPlan {
        tag: tag.clone(),
        affected_notes,
        single_tag_notes,
    }
}
