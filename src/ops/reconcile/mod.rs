//! Tag deletion with orphan handling.
//!
//! Deleting a tag that is the only tag on some notes would leave those notes
//! untagged. The workflow is: [`plan_deletion`] classifies the notes,
//! [`Decisions`] collects a replacement tag or a deletion mark for each
//! orphan-risk note, and [`execute`] runs the remote calls in an order that
//! never strands a note.

pub mod decisions;
pub mod plan;
pub mod sequencer;

pub use decisions::{Decision, Decisions};
pub use plan::{DeletionPlan, PlanKind, plan_deletion};
pub use sequencer::{
    AppliedReplacement, FailedDeletion, Outcome, ProgressStep, StepKind, StepStatus, build_steps,
    execute,
};

use crate::io::api::ApiError;

/// Error type for the tag deletion workflow
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("note {0} does not depend on the tag being deleted")]
    NotAnOrphan(i64),
    #[error("replacement tag cannot be \"{0}\", the tag being deleted")]
    ReplacementIsDeletedTag(String),
    #[error("no decision for note(s) {}", join_ids(.0))]
    Undecided(Vec<i64>),
    #[error("could not add tag \"{tag_name}\" to \"{note_title}\": {source}")]
    ReplacementFailed {
        note_title: String,
        tag_name: String,
        source: ApiError,
        replacements_applied: Vec<AppliedReplacement>,
        steps: Vec<ProgressStep>,
    },
    #[error("could not delete tag \"{tag_name}\": {source}")]
    TagDeleteFailed {
        tag_name: String,
        source: ApiError,
        replacements_applied: Vec<AppliedReplacement>,
        steps: Vec<ProgressStep>,
    },
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ReconcileError {
    /// Step list at the point the run stopped, if it got that far
    pub fn steps(&self) -> Option<&[ProgressStep]> {
        match self {
            ReconcileError::ReplacementFailed { steps, .. }
            | ReconcileError::TagDeleteFailed { steps, .. } => Some(steps),
            _ => None,
        }
    }

    /// Replacements that reached the backend before the run stopped
    pub fn replacements_applied(&self) -> &[AppliedReplacement] {
        match self {
            ReconcileError::ReplacementFailed {
                replacements_applied,
                ..
            }
            | ReconcileError::TagDeleteFailed {
                replacements_applied,
                ..
            } => replacements_applied,
            _ => &[],
        }
    }
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
