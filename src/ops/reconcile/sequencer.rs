use serde::Serialize;
use tracing::{info, warn};

use super::ReconcileError;
use super::decisions::{Decision, Decisions};
use super::plan::DeletionPlan;
use crate::io::api::{ApiError, RemoteApi};
use crate::model::Tag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Processing,
    Done,
    Error,
}

/// The remote call a step performs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StepKind {
    AddTag {
        note_id: i64,
        note_title: String,
        tag_name: String,
    },
    DeleteTag {
        tag_id: i64,
        tag_name: String,
    },
    DeleteNote {
        note_id: i64,
        note_title: String,
    },
}

/// One unit of remote work with a user-visible status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressStep {
    pub message: String,
    pub status: StepStatus,
    #[serde(flatten)]
    pub kind: StepKind,
}

impl ProgressStep {
    fn pending(kind: StepKind) -> Self {
        let message = match &kind {
            StepKind::AddTag {
                note_title,
                tag_name,
                ..
            } => format!("Adding tag \"{}\" to \"{}\"", tag_name, note_title),
            StepKind::DeleteTag { tag_name, .. } => format!("Deleting tag \"{}\"", tag_name),
            StepKind::DeleteNote { note_title, .. } => format!("Deleting note \"{}\"", note_title),
        };
        ProgressStep {
            message,
            status: StepStatus::Pending,
            kind,
        }
    }
}

/// A replacement tag that was attached to a note
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedReplacement {
    pub note_id: i64,
    pub note_title: String,
    pub tag_name: String,
}

/// A note deletion that the backend refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDeletion {
    pub note_id: i64,
    pub note_title: String,
    pub message: String,
}

/// Result of a completed (possibly partially failed) deletion run
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub tag: Tag,
    pub replacements_applied: Vec<AppliedReplacement>,
    pub notes_deleted: Vec<(i64, String)>,
    pub failed_deletions: Vec<FailedDeletion>,
    pub steps: Vec<ProgressStep>,
}

impl Outcome {
    pub fn is_complete(&self) -> bool {
        self.failed_deletions.is_empty()
    }
}

/// Build the ordered step list: replacements, the tag deletion, then note
/// deletions. Replacements must land before the tag goes so that no note
/// passes through a tag-less state unless it is being deleted.
pub fn build_steps(plan: &DeletionPlan, decisions: &Decisions) -> Vec<ProgressStep> {
    let mut steps = Vec::new();

    for note in &plan.single_tag_notes {
        if let Decision::Replace(name) = decisions.decision(note.id) {
            steps.push(ProgressStep::pending(StepKind::AddTag {
                note_id: note.id,
                note_title: note.title.clone(),
                tag_name: name.to_string(),
            }));
        }
    }

    steps.push(ProgressStep::pending(StepKind::DeleteTag {
        tag_id: plan.tag.id,
        tag_name: plan.tag.name.clone(),
    }));

    for note in &plan.single_tag_notes {
        if decisions.decision(note.id) == Decision::Delete {
            steps.push(ProgressStep::pending(StepKind::DeleteNote {
                note_id: note.id,
                note_title: note.title.clone(),
            }));
        }
    }

    steps
}

/// Step list plus the observer that renders it. Status changes address
/// steps by their index in the precomputed list.
struct Progress<F> {
    steps: Vec<ProgressStep>,
    observer: F,
}

impl<F: FnMut(usize, &ProgressStep)> Progress<F> {
    fn set(&mut self, index: usize, status: StepStatus) {
        self.steps[index].status = status;
        (self.observer)(index, &self.steps[index]);
    }

    fn fail(&mut self, index: usize, err: &ApiError) {
        let step = &mut self.steps[index];
        step.message = format!("{} (failed: {})", step.message, err);
        self.set(index, StepStatus::Error);
    }
}

/// Run a confirmed plan against the backend, one call at a time.
///
/// A failed replacement or tag deletion stops the run before anything that
/// depends on it. Failed note deletions are recorded and the remaining
/// deletions still run. Nothing is retried or rolled back.
pub fn execute<A, F>(
    api: &A,
    plan: &DeletionPlan,
    decisions: &Decisions,
    observer: F,
) -> Result<Outcome, ReconcileError>
where
    A: RemoteApi + ?Sized,
    F: FnMut(usize, &ProgressStep),
{
    let undecided: Vec<i64> = decisions.undecided(plan).iter().map(|n| n.id).collect();
    if !undecided.is_empty() {
        return Err(ReconcileError::Undecided(undecided));
    }

    let mut progress = Progress {
        steps: build_steps(plan, decisions),
        observer,
    };
    let mut replacements_applied = Vec::new();
    let mut notes_deleted = Vec::new();
    let mut failed_deletions = Vec::new();

    for index in 0..progress.steps.len() {
        let kind = progress.steps[index].kind.clone();
        progress.set(index, StepStatus::Processing);
        info!(step = index, message = %progress.steps[index].message, "running step");

        match kind {
            StepKind::AddTag {
                note_id,
                note_title,
                tag_name,
            } => match api.add_tag_to_note_by_name(note_id, &tag_name) {
                Ok(()) => {
                    progress.set(index, StepStatus::Done);
                    replacements_applied.push(AppliedReplacement {
                        note_id,
                        note_title,
                        tag_name,
                    });
                }
                Err(e) => {
                    warn!(note_id, error = %e, "replacement failed, aborting");
                    progress.fail(index, &e);
                    return Err(ReconcileError::ReplacementFailed {
                        note_title,
                        tag_name,
                        source: e,
                        replacements_applied,
                        steps: progress.steps,
                    });
                }
            },
            StepKind::DeleteTag { tag_id, tag_name } => match api.delete_tag(tag_id) {
                Ok(()) => progress.set(index, StepStatus::Done),
                Err(e) => {
                    warn!(tag_id, error = %e, "tag deletion failed, aborting");
                    progress.fail(index, &e);
                    return Err(ReconcileError::TagDeleteFailed {
                        tag_name,
                        source: e,
                        replacements_applied,
                        steps: progress.steps,
                    });
                }
            },
            StepKind::DeleteNote {
                note_id,
                note_title,
            } => match api.delete_note(note_id) {
                Ok(()) => {
                    progress.set(index, StepStatus::Done);
                    notes_deleted.push((note_id, note_title));
                }
                Err(e) => {
                    warn!(note_id, error = %e, "note deletion failed, continuing");
                    progress.fail(index, &e);
                    failed_deletions.push(FailedDeletion {
                        note_id,
                        note_title,
                        message: e.to_string(),
                    });
                }
            },
        }
    }

    Ok(Outcome {
        tag: plan.tag.clone(),
        replacements_applied,
        notes_deleted,
        failed_deletions,
        steps: progress.steps,
    })
}
