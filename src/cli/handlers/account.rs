use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use super::prompt::{Prompter, read_password};
use super::{CmdResult, Context, print_json, print_lines};
use crate::cli::commands::{LoginArgs, PasswordArgs, ProfileUpdateArgs, RegisterArgs};
use crate::cli::output::{UserJson, format_user};
use crate::io::http::HttpClient;
use crate::io::session::{self, Session};
use crate::model::{ProfileUpdate, Registration, User};
use crate::ops::store::Store;

fn password_from(stdin: bool, prompt: &str) -> Result<String, Box<dyn std::error::Error>> {
    let password = if stdin {
        Prompter::stdio().read_secret_line()?
    } else {
        read_password(prompt)?
    };
    if password.is_empty() {
        return Err("password must not be empty".into());
    }
    Ok(password)
}

/// Log in and persist the token for this backend
fn sign_in(
    ctx: &Context,
    client: &HttpClient,
    email: &str,
    password: &str,
) -> Result<Session, Box<dyn std::error::Error>> {
    let token = client.login(email, password)?;
    let session = Session::new(&ctx.api_url, email, &token.access_token);
    session::write_session(&ctx.session_path, &session)?;
    info!(email, api_url = %ctx.api_url, "signed in");
    Ok(session)
}

fn print_user(ctx: &Context, user: &User) -> CmdResult {
    if ctx.json {
        print_json(&UserJson {
            user,
            display_name: user.display_name(),
        })
    } else {
        print_lines(&format_user(user));
        Ok(())
    }
}

pub fn cmd_login(ctx: &Context, args: LoginArgs) -> CmdResult {
    let email = args.email.trim();
    let password = password_from(args.password_stdin, "Password: ")?;
    let client = ctx.anonymous_client()?;
    let session = sign_in(ctx, &client, email, &password)?;

    if ctx.json {
        print_json(&json!({ "email": session.email, "api_url": session.api_url }))
    } else {
        println!("Logged in as {}", session.email);
        Ok(())
    }
}

pub fn cmd_register(ctx: &Context, args: RegisterArgs) -> CmdResult {
    let password = password_from(args.password_stdin, "Choose a password: ")?;
    let registration = Registration {
        email: args.email.trim().to_string(),
        password,
        name: args.name,
        surname: args.surname,
        username: args.username,
        phone_number: args.phone,
    };

    let client = ctx.anonymous_client()?;
    let user = client.register(&registration)?;
    sign_in(ctx, &client, &registration.email, &registration.password)?;

    if ctx.json {
        print_user(ctx, &user)
    } else {
        println!("Registered and logged in as {}", user.email);
        Ok(())
    }
}

/// Sign out. The server call is best effort; local state always goes.
pub fn cmd_logout(ctx: &Context) -> CmdResult {
    let Some(session) = session::read_session(&ctx.session_path) else {
        if !ctx.json {
            println!("Not logged in");
        }
        return Ok(());
    };

    match HttpClient::new(&session.api_url, ctx.timeout())
        .map(|c| c.with_token(session.token.clone()))
        .and_then(|c| c.logout())
    {
        Ok(()) => {}
        Err(e) => warn!(error = %e, "server logout failed"),
    }
    Store::hydrate(ctx.cache_for(&session), Utc::now()).invalidate()?;
    session::clear_session(&ctx.session_path)?;

    if ctx.json {
        print_json(&json!({ "logged_out": session.email }))
    } else {
        println!("Logged out {}", session.email);
        Ok(())
    }
}

pub fn cmd_whoami(ctx: &Context) -> CmdResult {
    let user = ctx.client()?.me()?;
    print_user(ctx, &user)
}

pub fn cmd_profile_update(ctx: &Context, args: ProfileUpdateArgs) -> CmdResult {
    let client = ctx.client()?;
    let current = client.me()?;
    let mut update = ProfileUpdate::from_user(&current);
    if let Some(name) = args.name {
        update.name = name;
    }
    if let Some(surname) = args.surname {
        update.surname = surname;
    }
    if let Some(username) = args.username {
        update.username = username;
    }
    if let Some(phone) = args.phone {
        update.phone_number = phone;
    }
    let email_changed = args.email.as_deref().is_some_and(|e| e != current.email);
    if let Some(email) = args.email {
        update.email = email;
    }

    let user = client.update_profile(&update)?;
    if email_changed && let Some(mut session) = session::read_session(&ctx.session_path) {
        session.email = user.email.clone();
        session::write_session(&ctx.session_path, &session)?;
    }
    print_user(ctx, &user)
}

pub fn cmd_password(ctx: &Context, args: PasswordArgs) -> CmdResult {
    let client = ctx.client()?;
    let (old, new, confirm) = if args.password_stdin {
        let mut p = Prompter::stdio();
        let old = p.read_secret_line()?;
        let new = p.read_secret_line()?;
        (old, new.clone(), new)
    } else {
        (
            read_password("Current password: ")?,
            read_password("New password: ")?,
            read_password("Repeat new password: ")?,
        )
    };
    if new.is_empty() {
        return Err("new password must not be empty".into());
    }
    if new != confirm {
        return Err("new passwords do not match".into());
    }

    client.change_password(&old, &new)?;
    if !ctx.json {
        println!("Password changed");
    }
    Ok(())
}
