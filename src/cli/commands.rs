use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "np", about = concat!("notepad v", env!("CARGO_PKG_VERSION"), " - your notes from the terminal"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Backend URL (overrides config and NP_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session
    Login(LoginArgs),
    /// Create an account and sign in
    Register(RegisterArgs),
    /// Sign out and drop the local cache
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Edit the account profile
    Profile(ProfileCmd),
    /// Change the account password
    Password(PasswordArgs),
    /// List, create and edit notes
    Notes(NotesCmd),
    /// List, create, rename and delete tags
    Tags(TagsCmd),
    /// Show or switch the color theme
    Theme(ThemeArgs),
    /// Read or edit config.toml
    Config(ConfigCmd),
}

// ---------------------------------------------------------------------------
// Account args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct LoginArgs {
    /// Account e-mail
    pub email: String,
    /// Read the password from stdin instead of prompting
    #[arg(long)]
    pub password_stdin: bool,
}

#[derive(Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub surname: String,
    #[arg(long)]
    pub phone: Option<String>,
    /// Read the password from stdin instead of prompting
    #[arg(long)]
    pub password_stdin: bool,
}

#[derive(Args)]
pub struct ProfileCmd {
    #[command(subcommand)]
    pub action: ProfileAction,
}

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Update profile fields (unset flags keep their value)
    Update(ProfileUpdateArgs),
}

#[derive(Args)]
pub struct ProfileUpdateArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub surname: Option<String>,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
}

#[derive(Args)]
pub struct PasswordArgs {
    /// Read old and new password from stdin, one per line
    #[arg(long)]
    pub password_stdin: bool,
}

// ---------------------------------------------------------------------------
// Notes
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct NotesCmd {
    #[command(subcommand)]
    pub action: NotesAction,
}

#[derive(Subcommand)]
pub enum NotesAction {
    /// List notes
    List(NotesListArgs),
    /// Show one note in full
    Show(NoteIdArg),
    /// Create a note
    New(NotesNewArgs),
    /// Edit a note (unset flags keep their value)
    Edit(NotesEditArgs),
    /// Delete one or more notes
    Rm(NotesRmArgs),
    /// Pin or unpin a note
    Pin(NoteIdArg),
    /// Search notes on the server
    Search(NotesSearchArgs),
}

#[derive(Args)]
pub struct NotesListArgs {
    /// Only notes with this tag (repeatable, matches any)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
    /// Updated within: today, week, month, year
    #[arg(long)]
    pub range: Option<String>,
    /// Updated on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,
    /// Updated on or before this date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,
    /// Only scheduled notes whose date is ahead
    #[arg(long)]
    pub future: bool,
    /// Only pinned notes
    #[arg(long)]
    pub pinned: bool,
    /// Only notes with this priority (low, medium, high)
    #[arg(long)]
    pub priority: Option<String>,
    /// Regex matched against title and content
    #[arg(long, value_name = "RE")]
    pub grep: Option<String>,
    /// date-desc, date-asc, title-asc, title-desc, priority-high, priority-low
    #[arg(long)]
    pub sort: Option<String>,
    /// Ignore the local cache
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Args)]
pub struct NoteIdArg {
    /// Note ID
    pub id: i64,
}

#[derive(Args)]
pub struct NotesNewArgs {
    pub title: String,
    #[arg(long)]
    pub content: Option<String>,
    /// Tag name (repeatable; missing tags are created)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
    #[arg(long)]
    pub priority: Option<String>,
    /// Schedule the note for a date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub due: Option<String>,
}

#[derive(Args)]
pub struct NotesEditArgs {
    /// Note ID
    pub id: i64,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub content: Option<String>,
    #[arg(long)]
    pub priority: Option<String>,
    /// Replace the note's tags (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
}

#[derive(Args)]
pub struct NotesRmArgs {
    /// Note IDs
    #[arg(required = true)]
    pub ids: Vec<i64>,
    /// Skip confirmation
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Args)]
pub struct NotesSearchArgs {
    pub query: String,
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct TagsCmd {
    #[command(subcommand)]
    pub action: TagsAction,
}

#[derive(Subcommand)]
pub enum TagsAction {
    /// List tags with note counts
    List(TagsListArgs),
    /// Create a tag
    New(TagNewArgs),
    /// Rename a tag
    Rename(TagRenameArgs),
    /// Delete a tag, deciding what happens to notes that only carry it
    Rm(TagRmArgs),
}

#[derive(Args)]
pub struct TagsListArgs {
    /// Ignore the local cache
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Args)]
pub struct TagNewArgs {
    pub name: String,
}

#[derive(Args)]
pub struct TagRenameArgs {
    /// Tag ID or name
    pub tag: String,
    /// New name
    pub name: String,
}

#[derive(Args)]
pub struct TagRmArgs {
    /// Tag ID or name
    pub tag: String,
    /// Give a note a replacement tag: NOTE_ID=TAG (repeatable)
    #[arg(long = "replace", value_name = "NOTE=TAG")]
    pub replace: Vec<String>,
    /// Delete a note that only carries this tag (repeatable)
    #[arg(long = "delete-note", value_name = "NOTE")]
    pub delete_note: Vec<i64>,
    /// Confirm without prompting; undecided notes are deleted
    #[arg(long, short)]
    pub yes: bool,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ThemeArgs {
    /// light, dark or toggle (omit to show the current theme)
    pub mode: Option<String>,
}

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print every setting
    Show,
    /// Print one setting
    Get(ConfigKeyArg),
    /// Change one setting
    Set(ConfigSetArgs),
}

#[derive(Args)]
pub struct ConfigKeyArg {
    /// Dotted key, e.g. ui.theme
    pub key: String,
}

#[derive(Args)]
pub struct ConfigSetArgs {
    /// Dotted key, e.g. ui.theme
    pub key: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_tag_rm_decisions() {
        let cli = Cli::try_parse_from([
            "np",
            "tags",
            "rm",
            "personal",
            "--replace",
            "10=general",
            "--delete-note",
            "12",
            "--yes",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Tags(TagsCmd {
                action: TagsAction::Rm(args),
            }) => {
                assert_eq!(args.tag, "personal");
                assert_eq!(args.replace, vec!["10=general"]);
                assert_eq!(args.delete_note, vec![12]);
                assert!(args.yes);
            }
            _ => panic!("expected tags rm"),
        }
    }

    #[test]
    fn verbose_counts() {
        let cli = Cli::try_parse_from(["np", "-vv", "whoami"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
