//! `tally collab`: workspace collaborators.

use clap::Subcommand;
use std::io::{self, Write};
use tally_core::dashboard;
use tally_core::model::{CollaboratorId, CollaboratorRole, Workspace, WorkspaceId};
use tally_core::remote::HttpClient;
use tally_core::roster::{self, RosterEntry};

use crate::context::Context;
use crate::output::{Renderable, render_list};

#[derive(Subcommand, Debug)]
pub enum CollabCommand {
    #[command(
        about = "List a workspace's collaborators",
        after_help = "EXAMPLES:\n    tally collab list 65f0c1d2e4"
    )]
    List { workspace: String },

    #[command(
        about = "Invite a user by email (owner only)",
        after_help = "EXAMPLES:\n    # Invite as editor (default)\n    tally collab add 65f0c1d2e4 bo@example.com\n\n    # Read-only access\n    tally collab add 65f0c1d2e4 bo@example.com --role viewer"
    )]
    Add {
        workspace: String,
        email: String,

        /// viewer or editor.
        #[arg(short, long, default_value = "editor")]
        role: String,
    },

    #[command(
        about = "Remove a collaborator entry (owner only)",
        after_help = "EXAMPLES:\n    # Collaborator IDs are shown by `tally collab list`\n    tally collab remove 65f0c1d2e4 65f0c9a0b1"
    )]
    Remove {
        workspace: String,
        collaborator: String,
    },
}

pub fn run_collab(command: &CollabCommand, ctx: &Context) -> anyhow::Result<()> {
    let (session, client) = ctx.require_session()?;
    let workspace_id = match command {
        CollabCommand::List { workspace }
        | CollabCommand::Add { workspace, .. }
        | CollabCommand::Remove { workspace, .. } => WorkspaceId::new(workspace.as_str()),
    };
    let workspace = dashboard::get_workspace(&client, &workspace_id)?;

    let updated = match command {
        CollabCommand::List { .. } => workspace,
        CollabCommand::Add { email, role, .. } => {
            let role: CollaboratorRole = role.parse()?;
            roster::add_collaborator(&client, &session, &workspace, email, role)?
        }
        CollabCommand::Remove { collaborator, .. } => roster::remove_collaborator(
            &client,
            &session,
            &workspace,
            &CollaboratorId::new(collaborator.as_str()),
        )?,
    };
    render_roster(ctx, &client, &updated)
}

fn render_roster(ctx: &Context, client: &HttpClient, workspace: &Workspace) -> anyhow::Result<()> {
    let entries = roster::roster(client, workspace);
    let lines: Vec<RosterLine<'_>> = entries.iter().map(RosterLine).collect();
    render_list(&lines, ctx.output)?;
    Ok(())
}

struct RosterLine<'a>(&'a RosterEntry);

impl Renderable for RosterLine<'_> {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{:<8} {}  [{}]",
            self.0.collaborator.role.as_str(),
            self.0.label(),
            self.0.collaborator.id
        )
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self.0).map_err(io::Error::other)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let email = self.0.user.as_ref().map_or("-", |user| user.email.as_str());
        writeln!(
            w,
            "{}  {}  {}  {}",
            self.0.collaborator.id,
            self.0.collaborator.role.as_str(),
            self.0.collaborator.user_id,
            email
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["id", "role", "user", "email"]
    }
}
