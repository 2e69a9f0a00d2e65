mod account;
mod notes;
pub mod prompt;
mod settings;
pub mod tags;

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cli::commands::*;
use crate::cli::theme::Theme;
use crate::io::api::ApiError;
use crate::io::cache::Cache;
use crate::io::config_io;
use crate::io::http::HttpClient;
use crate::io::paths;
use crate::io::session::{self, Session};
use crate::model::AppConfig;
use crate::ops::reconcile::ReconcileError;
use crate::ops::store::{DataSource, Store, StoreError};

pub type CmdResult = Result<(), Box<dyn Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let ctx = Context::load(cli.json, cli.api_url.as_deref())?;

    let result = match cli.command {
        // Account
        Commands::Login(args) => account::cmd_login(&ctx, args),
        Commands::Register(args) => account::cmd_register(&ctx, args),
        Commands::Logout => account::cmd_logout(&ctx),
        Commands::Whoami => account::cmd_whoami(&ctx),
        Commands::Profile(cmd) => match cmd.action {
            ProfileAction::Update(args) => account::cmd_profile_update(&ctx, args),
        },
        Commands::Password(args) => account::cmd_password(&ctx, args),

        // Notes
        Commands::Notes(cmd) => match cmd.action {
            NotesAction::List(args) => notes::cmd_list(&ctx, args),
            NotesAction::Show(args) => notes::cmd_show(&ctx, args),
            NotesAction::New(args) => notes::cmd_new(&ctx, args),
            NotesAction::Edit(args) => notes::cmd_edit(&ctx, args),
            NotesAction::Rm(args) => notes::cmd_rm(&ctx, args),
            NotesAction::Pin(args) => notes::cmd_pin(&ctx, args),
            NotesAction::Search(args) => notes::cmd_search(&ctx, args),
        },

        // Tags
        Commands::Tags(cmd) => match cmd.action {
            TagsAction::List(args) => tags::cmd_list(&ctx, args),
            TagsAction::New(args) => tags::cmd_new(&ctx, args),
            TagsAction::Rename(args) => tags::cmd_rename(&ctx, args),
            TagsAction::Rm(args) => tags::cmd_rm(&ctx, args),
        },

        // Settings (no session needed)
        Commands::Theme(args) => settings::cmd_theme(&ctx, args),
        Commands::Config(cmd) => match cmd.action {
            ConfigAction::Show => settings::cmd_config_show(&ctx),
            ConfigAction::Get(args) => settings::cmd_config_get(&ctx, args),
            ConfigAction::Set(args) => settings::cmd_config_set(&ctx, args),
        },
    };

    if let Err(e) = &result
        && is_session_expired(e.as_ref())
    {
        warn!("server rejected the token, clearing session");
        session::clear_session(&ctx.session_path)?;
    }
    result
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything a handler needs from the environment
pub struct Context {
    pub json: bool,
    pub config: AppConfig,
    pub config_path: PathBuf,
    pub session_path: PathBuf,
    pub cache_dir: PathBuf,
    /// Effective backend: --api-url, then NP_API_URL, then config
    pub api_url: String,
    pub theme: Theme,
}

impl Context {
    pub fn load(json: bool, api_url_flag: Option<&str>) -> Result<Self, Box<dyn Error>> {
        let config_path = paths::config_path();
        let config = config_io::load_config(&config_path)?;
        let api_url = api_url_flag
            .map(str::to_string)
            .or_else(|| std::env::var("NP_API_URL").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| config.server.api_url.clone());
        debug!(config = %config_path.display(), %api_url, "context loaded");

        Ok(Context {
            json,
            theme: Theme::from_config(&config.ui),
            config,
            config_path,
            session_path: paths::session_path(),
            cache_dir: paths::cache_dir(),
            api_url,
        })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.server.timeout_secs)
    }

    /// Client without credentials, for login and registration
    pub fn anonymous_client(&self) -> Result<HttpClient, ApiError> {
        HttpClient::new(&self.api_url, self.timeout())
    }

    /// The stored session for the effective backend
    pub fn session(&self) -> Result<Session, ApiError> {
        match session::read_session(&self.session_path) {
            Some(s) if s.api_url == self.api_url => Ok(s),
            Some(s) => {
                debug!(session_url = %s.api_url, "session belongs to another server");
                Err(ApiError::NotLoggedIn)
            }
            None => Err(ApiError::NotLoggedIn),
        }
    }

    pub fn client(&self) -> Result<HttpClient, ApiError> {
        let session = self.session()?;
        Ok(self.anonymous_client()?.with_token(session.token))
    }

    pub fn cache_for(&self, session: &Session) -> Cache {
        let ttl = chrono::Duration::seconds(self.config.cache.ttl_secs.min(i64::MAX as u64) as i64);
        Cache::new(&self.cache_dir, &session.account_key(), ttl)
    }

    /// Signed-in client plus a store hydrated from the account's cache
    pub fn open(&self) -> Result<(HttpClient, Store), ApiError> {
        let session = self.session()?;
        let client = self.anonymous_client()?.with_token(session.token.clone());
        let store = Store::hydrate(self.cache_for(&session), Utc::now());
        Ok((client, store))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fill the store for a listing. With a fresh cache the caller renders
/// first and calls [`revalidate`] afterwards.
fn load_for_listing(store: &mut Store, api: &HttpClient, force: bool) -> Result<(), StoreError> {
    if force {
        store.refresh(api)
    } else {
        store.ensure_loaded(api)
    }
}

/// Refresh a store that was served from cache. The data is already on
/// screen, so only an expired session is worth failing the command for.
fn revalidate(store: &mut Store, api: &HttpClient) -> Result<(), StoreError> {
    if store.source() != DataSource::Cache {
        return Ok(());
    }
    match store.refresh(api) {
        Ok(()) => Ok(()),
        Err(StoreError::Api(ApiError::SessionExpired)) => {
            Err(StoreError::Api(ApiError::SessionExpired))
        }
        Err(e) => {
            warn!(error = %e, "background refresh failed");
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

fn is_session_expired(err: &(dyn Error + 'static)) -> bool {
    if let Some(e) = err.downcast_ref::<ApiError>() {
        return matches!(e, ApiError::SessionExpired);
    }
    if let Some(StoreError::Api(e)) = err.downcast_ref::<StoreError>() {
        return matches!(e, ApiError::SessionExpired);
    }
    match err.downcast_ref::<ReconcileError>() {
        Some(ReconcileError::Api(e))
        | Some(ReconcileError::ReplacementFailed { source: e, .. })
        | Some(ReconcileError::TagDeleteFailed { source: e, .. }) => {
            matches!(e, ApiError::SessionExpired)
        }
        _ => false,
    }
}
