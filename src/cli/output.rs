use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cli::theme::Theme;
use crate::model::{Note, Priority, Tag, User};
use crate::ops::reconcile::{
    AppliedReplacement, Decision, Decisions, DeletionPlan, FailedDeletion, Outcome, ProgressStep,
    StepStatus,
};
use crate::util::unicode::{first_line, fit_to_width, truncate_to_width};

const TITLE_WIDTH: usize = 32;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct NoteJson {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub priority: Priority,
    pub pinned: bool,
    pub favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct TagJson {
    pub id: i64,
    pub name: String,
    pub notes: usize,
}

#[derive(Serialize)]
pub struct TagDeletionJson {
    pub tag: TagJson,
    pub replaced: Vec<AppliedReplacement>,
    pub deleted_notes: Vec<i64>,
    pub failed: Vec<FailedDeletion>,
    pub steps: Vec<ProgressStep>,
}

#[derive(Serialize)]
pub struct UserJson<'a> {
    #[serde(flatten)]
    pub user: &'a User,
    pub display_name: String,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn note_to_json(note: &Note) -> NoteJson {
    NoteJson {
        id: note.id,
        title: note.title.clone(),
        content: note.content.clone(),
        tags: note.tag_names().into_iter().map(String::from).collect(),
        priority: note.priority,
        pinned: note.is_pinned,
        favorite: note.is_favorite,
        created_at: note.created_at,
        updated_at: note.updated_at,
        due: note.feature_date.filter(|_| note.is_feature_note),
    }
}

/// Number of notes carrying the tag. The backend count wins when present.
pub fn tag_note_count(tag: &Tag, notes: &[Note]) -> usize {
    match tag.notes_count {
        Some(n) if n >= 0 => n as usize,
        _ => notes.iter().filter(|n| n.has_tag(tag.id)).count(),
    }
}

pub fn tag_to_json(tag: &Tag, notes: &[Note]) -> TagJson {
    TagJson {
        id: tag.id,
        name: tag.name.clone(),
        notes: tag_note_count(tag, notes),
    }
}

pub fn outcome_to_json(outcome: &Outcome, notes_before: usize) -> TagDeletionJson {
    TagDeletionJson {
        tag: TagJson {
            id: outcome.tag.id,
            name: outcome.tag.name.clone(),
            notes: notes_before,
        },
        replaced: outcome.replacements_applied.clone(),
        deleted_notes: outcome.notes_deleted.iter().map(|(id, _)| *id).collect(),
        failed: outcome.failed_deletions.clone(),
        steps: outcome.steps.clone(),
    }
}

// ---------------------------------------------------------------------------
// Notes
// ---------------------------------------------------------------------------

fn format_tags(tags: &[Tag], theme: &Theme) -> String {
    tags.iter()
        .map(|t| theme.paint(format!("#{}", t.name), theme.tag_color()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One-line summary: id, pin, priority, title, last update, tags
pub fn format_note_line(note: &Note, theme: &Theme) -> String {
    let pin = if note.is_pinned { "*" } else { " " };
    let priority = format!("{:<6}", note.priority.as_str());
    let mut line = format!(
        "{:>5} {} {} {} {}",
        note.id,
        theme.paint(pin, theme.yellow),
        theme.paint(priority, theme.priority_color(note.priority)),
        fit_to_width(&note.title, TITLE_WIDTH),
        theme.paint(note.updated_at.format("%Y-%m-%d"), theme.dim),
    );
    if !note.tags.is_empty() {
        line.push_str("  ");
        line.push_str(&format_tags(&note.tags, theme));
    }
    line
}

pub fn format_note_detail(note: &Note, theme: &Theme) -> Vec<String> {
    let mut lines = Vec::new();
    let pin = if note.is_pinned { " (pinned)" } else { "" };
    lines.push(format!(
        "{} {}{}",
        theme.paint(format!("#{}", note.id), theme.dim),
        theme.bold(&note.title),
        pin
    ));
    lines.push(format!(
        "priority: {}",
        theme.paint(note.priority, theme.priority_color(note.priority))
    ));
    if !note.tags.is_empty() {
        lines.push(format!("tags: {}", format_tags(&note.tags, theme)));
    }
    if note.is_feature_note
        && let Some(due) = note.feature_date
    {
        lines.push(format!("due: {}", due.format("%Y-%m-%d %H:%M")));
    }
    lines.push(format!("created: {}", note.created_at.format("%Y-%m-%d %H:%M")));
    lines.push(format!("updated: {}", note.updated_at.format("%Y-%m-%d %H:%M")));
    if !note.content.trim().is_empty() {
        lines.push(String::new());
        lines.extend(note.content.lines().map(|l| l.to_string()));
    }
    lines
}

/// `id  title` plus a content preview, used in prompts and reports
pub fn format_note_ref(note: &Note) -> String {
    let preview = first_line(&note.content);
    if preview.is_empty() {
        format!("{:>5}  {}", note.id, note.title)
    } else {
        format!(
            "{:>5}  {}  ({})",
            note.id,
            note.title,
            truncate_to_width(preview, 40)
        )
    }
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

pub fn format_tag_line(tag: &Tag, notes: &[Note], theme: &Theme) -> String {
    let count = tag_note_count(tag, notes);
    format!(
        "{:>5}  {}  {}",
        tag.id,
        theme.paint(fit_to_width(&tag.name, 24), theme.tag_color()),
        theme.paint(plural(count, "note"), theme.dim)
    )
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("1 {}", word)
    } else {
        format!("{} {}s", n, word)
    }
}

// ---------------------------------------------------------------------------
// Tag deletion
// ---------------------------------------------------------------------------

/// What deleting the tag touches, before any decision is made
pub fn format_plan(plan: &DeletionPlan) -> Vec<String> {
    let mut lines = Vec::new();
    if plan.affected_notes.is_empty() {
        lines.push(format!("Tag \"{}\" is not used by any note.", plan.tag.name));
        return lines;
    }
    lines.push(format!(
        "Tag \"{}\" is used by {}.",
        plan.tag.name,
        plural(plan.affected_notes.len(), "note")
    ));

    let secondary: Vec<&Note> = plan.secondary_notes().collect();
    if !secondary.is_empty() {
        lines.push(format!("{} other tags and will only lose this one:", keeps(secondary.len())));
        for note in secondary {
            lines.push(format!("  {}", format_note_ref(note)));
        }
    }
    if !plan.single_tag_notes.is_empty() {
        lines.push(format!(
            "{} no other tag and {} a decision:",
            has(plan.single_tag_notes.len()),
            if plan.single_tag_notes.len() == 1 { "needs" } else { "need" }
        ));
        for note in &plan.single_tag_notes {
            lines.push(format!("  {}", format_note_ref(note)));
        }
    }
    lines
}

fn keeps(n: usize) -> String {
    if n == 1 { "1 note keeps".into() } else { format!("{} notes keep", n) }
}

fn has(n: usize) -> String {
    if n == 1 { "1 note has".into() } else { format!("{} notes have", n) }
}

/// The collected decisions, shown before the final confirmation
pub fn format_decisions(plan: &DeletionPlan, decisions: &Decisions) -> Vec<String> {
    let mut lines = vec![format!("Deleting tag \"{}\":", plan.tag.name)];
    for note in &plan.single_tag_notes {
        let line = match decisions.decision(note.id) {
            Decision::Replace(name) => format!("  replace {:>5}  {} -> #{}", note.id, note.title, name),
            Decision::Delete => format!("  delete  {:>5}  {}", note.id, note.title),
            Decision::Undecided => format!("  ???     {:>5}  {}", note.id, note.title),
        };
        lines.push(line);
    }
    lines
}

fn status_marker(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "[ ]",
        StepStatus::Processing => "[~]",
        StepStatus::Done => "[x]",
        StepStatus::Error => "[!]",
    }
}

pub fn format_step(step: &ProgressStep, theme: &Theme) -> String {
    format!(
        "{} {}",
        theme.paint(status_marker(step.status), theme.status_color(step.status)),
        step.message
    )
}

pub fn format_outcome(outcome: &Outcome) -> Vec<String> {
    let mut lines = vec![format!("Deleted tag \"{}\".", outcome.tag.name)];
    let mut parts = Vec::new();
    if !outcome.replacements_applied.is_empty() {
        parts.push(format!("re-tagged {}", plural(outcome.replacements_applied.len(), "note")));
    }
    if !outcome.notes_deleted.is_empty() {
        parts.push(format!("deleted {}", plural(outcome.notes_deleted.len(), "note")));
    }
    if !parts.is_empty() {
        let summary = parts.join(", ");
        let mut chars = summary.chars();
        if let Some(first) = chars.next() {
            lines.push(format!("{}{}.", first.to_uppercase(), chars.as_str()));
        }
    }
    if !outcome.failed_deletions.is_empty() {
        lines.push(format!(
            "Could not delete {}:",
            plural(outcome.failed_deletions.len(), "note")
        ));
        for failed in &outcome.failed_deletions {
            lines.push(format!("  {:>5}  {}: {}", failed.note_id, failed.note_title, failed.message));
        }
    }
    lines
}

/// Notes that were re-tagged before a run stopped now carry both tags
pub fn format_partial_replacements(tag_name: &str, applied: &[AppliedReplacement]) -> Vec<String> {
    if applied.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![format!(
        "{} already received a replacement and still carry \"{}\":",
        plural(applied.len(), "note"),
        tag_name
    )];
    for r in applied {
        lines.push(format!("  {:>5}  {} (+#{})", r.note_id, r.note_title, r.tag_name));
    }
    lines
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

pub fn format_user(user: &User) -> Vec<String> {
    let mut lines = vec![
        format!("{} <{}>", user.display_name(), user.email),
        format!("username: {}", user.username),
    ];
    if let Some(phone) = user.phone_number.as_deref().filter(|p| !p.is_empty()) {
        lines.push(format!("phone: {}", phone));
    }
    if let Some(role) = user.role.as_deref() {
        lines.push(format!("role: {}", role));
    }
    lines
}
