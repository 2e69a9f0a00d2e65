use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use super::prompt::Prompter;
use super::{CmdResult, Context, load_for_listing, print_json, print_lines, revalidate};
use crate::cli::commands::{
    NoteIdArg, NotesEditArgs, NotesListArgs, NotesNewArgs, NotesRmArgs, NotesSearchArgs,
};
use crate::cli::output::{format_note_detail, format_note_line, format_note_ref, note_to_json};
use crate::cli::theme::Theme;
use crate::io::api::RemoteApi;
use crate::model::{Note, NoteDraft, NoteUpdate, Priority, parse_timestamp};
use crate::ops::filter::{NoteFilter, SortOrder, TimeRange, sort_notes};

fn print_notes(json: bool, notes: &[&Note], theme: &Theme) -> CmdResult {
    if json {
        let out: Vec<_> = notes.iter().map(|n| note_to_json(n)).collect();
        return print_json(&out);
    }
    if notes.is_empty() {
        println!("No notes");
    }
    for note in notes {
        println!("{}", format_note_line(note, theme));
    }
    Ok(())
}

/// Accept `YYYY-MM-DD` (whole day, start or end) or a full timestamp
pub fn parse_date_arg(s: &str, end_of_day: bool) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let time = if end_of_day {
            date.and_hms_opt(23, 59, 59)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        if let Some(dt) = time {
            return Ok(dt.and_utc());
        }
    }
    parse_timestamp(s).ok_or_else(|| format!("invalid date '{}' (expected YYYY-MM-DD)", s))
}

fn build_filter(args: &NotesListArgs) -> Result<NoteFilter, Box<dyn std::error::Error>> {
    let mut filter = NoteFilter {
        tags: args.tags.clone(),
        future_only: args.future,
        pinned_only: args.pinned,
        ..Default::default()
    };
    if let Some(range) = &args.range {
        filter.time_range = range.parse::<TimeRange>()?;
    }
    if let Some(from) = &args.from {
        filter.from = Some(parse_date_arg(from, false)?);
    }
    if let Some(to) = &args.to {
        filter.to = Some(parse_date_arg(to, true)?);
    }
    if let Some(priority) = &args.priority {
        filter.priority = Some(priority.parse::<Priority>()?);
    }
    if let Some(pattern) = &args.grep {
        filter.pattern = Some(Regex::new(pattern)?);
    }
    Ok(filter)
}

pub fn cmd_list(ctx: &Context, args: NotesListArgs) -> CmdResult {
    let filter = build_filter(&args)?;
    let sort: SortOrder = args
        .sort
        .as_deref()
        .unwrap_or(&ctx.config.ui.default_sort)
        .parse()?;

    let (api, mut store) = ctx.open()?;
    load_for_listing(&mut store, &api, args.refresh)?;

    let mut notes = filter.apply(&store.notes, Utc::now());
    sort_notes(&mut notes, sort);
    print_notes(ctx.json, &notes, &ctx.theme)?;

    revalidate(&mut store, &api)?;
    Ok(())
}

pub fn cmd_show(ctx: &Context, args: NoteIdArg) -> CmdResult {
    let (api, mut store) = ctx.open()?;
    let note = store.find_note(&api, args.id)?;
    if ctx.json {
        print_json(&note_to_json(&note))
    } else {
        print_lines(&format_note_detail(&note, &ctx.theme));
        Ok(())
    }
}

pub fn cmd_new(ctx: &Context, args: NotesNewArgs) -> CmdResult {
    let title = args.title.trim();
    if title.is_empty() {
        return Err("title must not be empty".into());
    }
    let mut draft = NoteDraft {
        title: title.to_string(),
        content: args.content.unwrap_or_default(),
        tags: args.tags,
        ..Default::default()
    };
    if let Some(priority) = &args.priority {
        draft.priority = priority.parse()?;
    }
    if let Some(due) = &args.due {
        draft.is_feature_note = true;
        draft.feature_date = Some(parse_date_arg(due, false)?);
    }

    let (api, mut store) = ctx.open()?;
    let note = store.create_note(&api, &draft)?;
    if ctx.json {
        print_json(&note_to_json(&note))
    } else {
        println!("Created note {}", note.id);
        Ok(())
    }
}

pub fn cmd_edit(ctx: &Context, args: NotesEditArgs) -> CmdResult {
    let (api, mut store) = ctx.open()?;
    let current = store.find_note(&api, args.id)?;

    let mut update = NoteUpdate::from_note(&current);
    if let Some(title) = args.title {
        update.title = title;
    }
    if let Some(content) = args.content {
        update.content = content;
    }
    if let Some(priority) = &args.priority {
        update.priority = priority.parse()?;
    }
    if !args.tags.is_empty() {
        update.tags = args.tags;
    }

    let note = store.update_note(&api, args.id, &update)?;
    if ctx.json {
        print_json(&note_to_json(&note))
    } else {
        println!("Updated note {}", note.id);
        Ok(())
    }
}

pub fn cmd_rm(ctx: &Context, args: NotesRmArgs) -> CmdResult {
    let (api, mut store) = ctx.open()?;
    store.ensure_loaded(&api)?;

    if !args.yes {
        if ctx.json {
            return Err("refusing to delete notes without --yes in --json mode".into());
        }
        let mut prompt = Prompter::stdio();
        for id in &args.ids {
            match store.note(*id) {
                Some(note) => prompt.say(&format_note_ref(note))?,
                None => prompt.say(&format!("{:>5}  (not in local view)", id))?,
            }
        }
        let question = if args.ids.len() == 1 {
            "Delete this note?".to_string()
        } else {
            format!("Delete these {} notes?", args.ids.len())
        };
        if !prompt.confirm(&question)? {
            println!("cancelled");
            return Ok(());
        }
    }

    if let [id] = args.ids.as_slice() {
        store.delete_note(&api, *id)?;
    } else {
        store.delete_notes(&api, &args.ids)?;
    }
    if ctx.json {
        print_json(&serde_json::json!({ "deleted": args.ids }))
    } else {
        println!("Deleted {} note(s)", args.ids.len());
        Ok(())
    }
}

pub fn cmd_pin(ctx: &Context, args: NoteIdArg) -> CmdResult {
    let (api, mut store) = ctx.open()?;
    store.find_note(&api, args.id)?;
    let note = store.toggle_pin(&api, args.id)?;
    if ctx.json {
        print_json(&note_to_json(&note))
    } else {
        let state = if note.is_pinned { "Pinned" } else { "Unpinned" };
        println!("{} note {}", state, note.id);
        Ok(())
    }
}

pub fn cmd_search(ctx: &Context, args: NotesSearchArgs) -> CmdResult {
    let api = ctx.client()?;
    let found = api.search_notes(&args.query)?;
    let refs: Vec<&Note> = found.iter().collect();
    print_notes(ctx.json, &refs, &ctx.theme)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn date_args_cover_whole_days() {
        assert_eq!(
            parse_date_arg("2025-03-01", false).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_date_arg("2025-03-01", true).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 23, 59, 59).unwrap()
        );
    }

    #[test]
    fn date_args_accept_timestamps() {
        assert_eq!(
            parse_date_arg("2025-03-01T10:30:00Z", false).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 10, 30, 0).unwrap()
        );
        assert!(parse_date_arg("next tuesday", false).is_err());
    }

    #[test]
    fn filter_from_args() {
        let args = NotesListArgs {
            tags: vec!["work".into()],
            range: Some("week".into()),
            from: None,
            to: None,
            future: false,
            pinned: true,
            priority: Some("high".into()),
            grep: Some("invoice|receipt".into()),
            sort: None,
            refresh: false,
        };
        let filter = build_filter(&args).unwrap();
        assert_eq!(filter.time_range, TimeRange::Week);
        assert_eq!(filter.priority, Some(Priority::High));
        assert!(filter.pinned_only);
        assert!(filter.pattern.is_some());
    }

    #[test]
    fn bad_regex_is_an_error() {
        let args = NotesListArgs {
            tags: vec![],
            range: None,
            from: None,
            to: None,
            future: false,
            pinned: false,
            priority: None,
            grep: Some("(".into()),
            sort: None,
            refresh: false,
        };
        assert!(build_filter(&args).is_err());
    }
}
