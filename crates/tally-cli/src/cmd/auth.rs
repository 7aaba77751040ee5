//! `tally login`, `register`, `logout`, `whoami`.

use clap::Args;
use std::io::{self, Write};
use tally_core::model::{LoginCredentials, RegisterCredentials, User};
use tally_core::session;
use tracing::info;

use crate::context::Context;
use crate::output::{pretty_kv, pretty_section, render_mode, render_success};

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email.
    #[arg(short, long)]
    pub email: String,

    /// Password. Falls back to TALLY_PASSWORD, then one line of stdin.
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Account email.
    #[arg(short, long)]
    pub email: String,

    #[arg(long)]
    pub first_name: String,

    #[arg(long)]
    pub last_name: String,

    /// Password. Falls back to TALLY_PASSWORD, then one line of stdin.
    #[arg(long)]
    pub password: Option<String>,
}

pub fn run_login(args: &LoginArgs, ctx: &Context) -> anyhow::Result<()> {
    let credentials = LoginCredentials {
        email: args.email.trim().to_string(),
        password: Context::password(args.password.as_deref())?,
    };
    let session = session::login(&ctx.client()?, &credentials)?;
    ctx.session_file()?.save(&session)?;
    render_user(ctx, &session.user, "Logged in as")
}

pub fn run_register(args: &RegisterArgs, ctx: &Context) -> anyhow::Result<()> {
    let credentials = RegisterCredentials {
        email: args.email.trim().to_string(),
        password: Context::password(args.password.as_deref())?,
        first_name: args.first_name.trim().to_string(),
        last_name: args.last_name.trim().to_string(),
    };
    let session = session::register(&ctx.client()?, &credentials)?;
    ctx.session_file()?.save(&session)?;
    render_user(ctx, &session.user, "Registered")
}

/// Always ends the local session, even when the server cannot be told.
pub fn run_logout(ctx: &Context) -> anyhow::Result<()> {
    let file = ctx.session_file()?;
    let Some(stored) = file.load()? else {
        return render_success(ctx.output, "Not logged in");
    };
    match ctx.client() {
        Ok(client) => session::logout(&client.with_token(stored.token.as_str()), stored),
        Err(err) => info!("skipping remote logout: {err:#}"),
    }
    file.clear()?;
    render_success(ctx.output, "Logged out")
}

pub fn run_whoami(ctx: &Context) -> anyhow::Result<()> {
    let (session, _client) = ctx.require_session()?;
    render_user(ctx, &session.user, "Logged in as")
}

fn render_user(ctx: &Context, user: &User, heading: &str) -> anyhow::Result<()> {
    render_mode(
        ctx.output,
        user,
        |user, w| writeln!(w, "{}\t{}", user.id, user.email),
        |user, w| pretty_user(w, heading, user),
    )
}

fn pretty_user(w: &mut dyn Write, heading: &str, user: &User) -> io::Result<()> {
    pretty_section(w, &format!("{heading} {}", user.display_name()))?;
    pretty_kv(w, "id", user.id.as_str())?;
    pretty_kv(w, "email", &user.email)?;
    Ok(())
}
