use std::collections::HashMap;
use std::error::Error;
use std::io::{self, BufRead, IsTerminal, Write};

use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use tracing::warn;

use super::prompt::Prompter;
use super::{CmdResult, Context, load_for_listing, print_json, print_lines, revalidate};
use crate::cli::commands::{TagNewArgs, TagRenameArgs, TagRmArgs, TagsListArgs};
use crate::cli::output::{
    format_decisions, format_note_ref, format_outcome, format_partial_replacements, format_plan,
    format_step, format_tag_line, outcome_to_json, tag_to_json,
};
use crate::cli::theme::Theme;
use crate::model::Tag;
use crate::ops::reconcile::{
    Decision, Decisions, DeletionPlan, Outcome, PlanKind, ProgressStep, StepStatus, execute,
    plan_deletion,
};
use crate::ops::store::Store;

pub fn cmd_list(ctx: &Context, args: TagsListArgs) -> CmdResult {
    let (api, mut store) = ctx.open()?;
    load_for_listing(&mut store, &api, args.refresh)?;

    if ctx.json {
        let out: Vec<_> = store
            .tags
            .iter()
            .map(|t| tag_to_json(t, &store.notes))
            .collect();
        print_json(&out)?;
    } else if store.tags.is_empty() {
        println!("No tags");
    } else {
        for tag in &store.tags {
            println!("{}", format_tag_line(tag, &store.notes, &ctx.theme));
        }
    }

    revalidate(&mut store, &api)?;
    Ok(())
}

fn validate_name(store: &Store, name: &str, except: Option<i64>) -> Result<String, Box<dyn Error>> {
    let name = name.trim();
    if name.is_empty() {
        return Err("tag name must not be empty".into());
    }
    if store
        .tags
        .iter()
        .any(|t| t.name == name && Some(t.id) != except)
    {
        return Err(format!("tag \"{}\" already exists", name).into());
    }
    Ok(name.to_string())
}

pub fn cmd_new(ctx: &Context, args: TagNewArgs) -> CmdResult {
    let (api, mut store) = ctx.open()?;
    store.ensure_loaded(&api)?;
    let name = validate_name(&store, &args.name, None)?;
    let tag = store.create_tag(&api, &name)?;
    if ctx.json {
        print_json(&tag_to_json(&tag, &store.notes))
    } else {
        println!("Created tag {} ({})", tag.name, tag.id);
        Ok(())
    }
}

pub fn cmd_rename(ctx: &Context, args: TagRenameArgs) -> CmdResult {
    let (api, mut store) = ctx.open()?;
    let tag = store
        .find_tag(&api, &args.tag)?
        .ok_or_else(|| format!("tag not found: {}", args.tag))?;
    let name = validate_name(&store, &args.name, Some(tag.id))?;
    let renamed = store.rename_tag(&api, tag.id, &name)?;
    if ctx.json {
        print_json(&tag_to_json(&renamed, &store.notes))
    } else {
        println!("Renamed tag {} -> {}", tag.name, renamed.name);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tag deletion
// ---------------------------------------------------------------------------

/// Parse a `--replace NOTE=TAG` value
pub fn parse_replacement(raw: &str) -> Result<(i64, String), String> {
    let (id, tag) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid --replace '{}' (expected NOTE=TAG)", raw))?;
    let id: i64 = id
        .trim()
        .parse()
        .map_err(|_| format!("invalid note id in --replace '{}'", raw))?;
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(format!("empty tag name in --replace '{}'", raw));
    }
    Ok((id, tag.to_string()))
}

/// Record the decisions given on the command line. A note may be named
/// by one flag only.
pub fn apply_flags(
    plan: &DeletionPlan,
    decisions: &mut Decisions,
    replace: &[String],
    delete: &[i64],
) -> Result<(), Box<dyn Error>> {
    let parsed = replace
        .iter()
        .map(|raw| parse_replacement(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let mut seen: HashMap<i64, &str> = HashMap::new();
    for (id, tag) in &parsed {
        if let Some(previous) = seen.insert(*id, tag.as_str())
            && previous != tag.as_str()
        {
            return Err(format!(
                "note {} has two replacements: \"{}\" and \"{}\"",
                id, previous, tag
            )
            .into());
        }
    }
    if let Some(id) = delete.iter().find(|id| seen.contains_key(*id)) {
        return Err(format!("note {} is given both --replace and --delete-note", id).into());
    }

    for (id, tag) in &parsed {
        decisions.set_replacement(plan, *id, tag)?;
    }
    for id in delete {
        decisions.mark_for_deletion(plan, *id)?;
    }
    Ok(())
}

/// Ask about every orphan-risk note that has no decision yet. An empty
/// answer leaves the note undecided; it is dealt with at confirmation.
pub fn prompt_decisions<R: BufRead, W: Write>(
    plan: &DeletionPlan,
    decisions: &mut Decisions,
    prompt: &mut Prompter<R, W>,
) -> io::Result<()> {
    for note in &plan.single_tag_notes {
        if decisions.decision(note.id) != Decision::Undecided {
            continue;
        }
        prompt.say(&format_note_ref(note))?;
        loop {
            let answer = prompt.ask("  replacement tag, 'd' to delete the note, Enter to skip: ")?;
            if answer.is_empty() {
                break;
            }
            if answer.eq_ignore_ascii_case("d") {
                decisions
                    .mark_for_deletion(plan, note.id)
                    .map_err(io::Error::other)?;
                break;
            }
            match decisions.set_replacement(plan, note.id, &answer) {
                Ok(()) => break,
                Err(e) => prompt.say(&format!("  {}", e))?,
            }
        }
    }
    Ok(())
}

/// Last chance before any remote call. Notes still undecided are listed
/// and, once accepted, marked for deletion. Returns false when cancelled.
pub fn confirm_deletion<R: BufRead, W: Write>(
    plan: &DeletionPlan,
    decisions: &mut Decisions,
    prompt: &mut Prompter<R, W>,
    assume_yes: bool,
) -> io::Result<bool> {
    if plan.kind() == PlanKind::NeedsDecisions {
        for line in format_decisions(plan, decisions) {
            prompt.say(&line)?;
        }
    }

    let undecided: Vec<String> = decisions
        .undecided(plan)
        .iter()
        .map(|n| format_note_ref(n))
        .collect();
    if !undecided.is_empty() {
        prompt.say(&format!(
            "{} without a replacement will be deleted:",
            if undecided.len() == 1 {
                "1 note".to_string()
            } else {
                format!("{} notes", undecided.len())
            }
        ))?;
        for line in &undecided {
            prompt.say(&format!("  {}", line))?;
        }
        if !assume_yes && !prompt.confirm("Delete them along with the tag?")? {
            return Ok(false);
        }
        decisions.delete_undecided(plan);
    }

    if assume_yes {
        return Ok(true);
    }
    prompt.confirm(&format!("Delete tag \"{}\"?", plan.tag.name))
}

pub fn cmd_rm(ctx: &Context, args: TagRmArgs) -> CmdResult {
    let (api, mut store) = ctx.open()?;
    let found = store
        .find_tag(&api, &args.tag)?
        .ok_or_else(|| format!("tag not found: {}", args.tag))?;

    // plan against a fresh note set
    store.refresh(&api)?;
    let tag: Tag = store
        .tags
        .iter()
        .find(|t| t.id == found.id)
        .cloned()
        .ok_or_else(|| format!("tag not found: {}", args.tag))?;
    let plan = plan_deletion(&tag, &store.notes);

    let mut decisions = Decisions::new();
    apply_flags(&plan, &mut decisions, &args.replace, &args.delete_note)?;

    if ctx.json {
        if !args.yes {
            return Err("refusing to delete a tag without --yes in --json mode".into());
        }
        decisions.delete_undecided(&plan);
    } else {
        let mut prompt = Prompter::stdio();
        for line in format_plan(&plan) {
            prompt.say(&line)?;
        }
        if !args.yes {
            prompt_decisions(&plan, &mut decisions, &mut prompt)?;
        }
        if !confirm_deletion(&plan, &mut decisions, &mut prompt, args.yes)? {
            println!("cancelled");
            return Ok(());
        }
    }

    let notes_before = plan.affected_notes.len();
    if plan.kind() == PlanKind::Unreferenced {
        store.delete_unreferenced_tag(&api, tag.id)?;
        let outcome = Outcome {
            tag,
            replacements_applied: Vec::new(),
            notes_deleted: Vec::new(),
            failed_deletions: Vec::new(),
            steps: Vec::new(),
        };
        return report(ctx, &outcome, notes_before);
    }

    let json = ctx.json;
    let stdout = io::stdout();
    let live = stdout.is_terminal();
    let mut printer = StepPrinter::new(stdout, &ctx.theme, live);
    let result = execute(&api, &plan, &decisions, |_, step| {
        if json {
            return;
        }
        if let Err(e) = printer.show(step) {
            warn!(error = %e, "could not print progress");
        }
    });

    if let Err(e) = store.refresh(&api) {
        warn!(error = %e, "could not refresh after tag deletion");
    }

    match result {
        Ok(outcome) => report(ctx, &outcome, notes_before),
        Err(e) => {
            if !json {
                print_lines(&format_partial_replacements(
                    &tag.name,
                    e.replacements_applied(),
                ));
            }
            Err(e.into())
        }
    }
}

/// Step progress for a tag deletion. On a terminal the step in flight is
/// shown and then overwritten by its result, so a slow request is visible.
/// Elsewhere only results are printed.
pub struct StepPrinter<'t, W: Write> {
    out: W,
    theme: &'t Theme,
    live: bool,
}

impl<'t, W: Write> StepPrinter<'t, W> {
    pub fn new(out: W, theme: &'t Theme, live: bool) -> Self {
        StepPrinter { out, theme, live }
    }

    pub fn show(&mut self, step: &ProgressStep) -> io::Result<()> {
        match step.status {
            StepStatus::Pending => Ok(()),
            StepStatus::Processing if !self.live => Ok(()),
            StepStatus::Processing => {
                write!(self.out, "{}", format_step(step, self.theme))?;
                self.out.flush()
            }
            StepStatus::Done | StepStatus::Error => {
                if self.live {
                    queue!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
                }
                writeln!(self.out, "{}", format_step(step, self.theme))?;
                self.out.flush()
            }
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

fn report(ctx: &Context, outcome: &Outcome, notes_before: usize) -> CmdResult {
    if ctx.json {
        print_json(&outcome_to_json(outcome, notes_before))?;
    } else {
        print_lines(&format_outcome(outcome));
    }
    if outcome.is_complete() {
        Ok(())
    } else {
        Err(format!(
            "{} note(s) could not be deleted",
            outcome.failed_deletions.len()
        )
        .into())
    }
}
