//! `tally workspace`: the dashboard of workspaces.

use clap::Subcommand;
use serde::Serialize;
use std::io::{self, Write};
use tally_core::dashboard::{self, DashboardEntry};
use tally_core::model::{Role, UpdateWorkspacePayload, Workspace, WorkspaceId, resolve_role};
use tally_core::roster::{self, RosterEntry};

use crate::context::Context;
use crate::output::{
    Renderable, pretty_kv, pretty_rule, pretty_section, render_list, render_mode, render_success,
};

#[derive(Subcommand, Debug)]
pub enum WorkspaceCommand {
    #[command(
        about = "List workspaces you own or collaborate on",
        after_help = "EXAMPLES:\n    # Every workspace with your role in it\n    tally workspace list\n\n    # Emit machine-readable output\n    tally workspace list --json"
    )]
    List,

    #[command(
        about = "Show one workspace and its collaborators",
        after_help = "EXAMPLES:\n    tally workspace show 65f0c1d2e4"
    )]
    Show {
        /// Workspace ID.
        id: String,
    },

    #[command(
        about = "Create a workspace you own",
        after_help = "EXAMPLES:\n    tally workspace create \"Launch\" --description \"Q3 launch plan\""
    )]
    Create {
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },

    #[command(
        about = "Rename or re-describe a workspace (owner only)",
        after_help = "EXAMPLES:\n    tally workspace update 65f0c1d2e4 --name \"Launch v2\""
    )]
    Update {
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        description: Option<String>,
    },

    #[command(
        about = "Delete a workspace and its tasks (owner only)",
        after_help = "EXAMPLES:\n    tally workspace delete 65f0c1d2e4"
    )]
    Delete { id: String },
}

pub fn run_workspace(command: &WorkspaceCommand, ctx: &Context) -> anyhow::Result<()> {
    let (session, client) = ctx.require_session()?;
    match command {
        WorkspaceCommand::List => {
            let entries = dashboard::list_workspaces(&client, &session)?;
            let lines: Vec<WorkspaceLine<'_>> = entries.iter().map(WorkspaceLine).collect();
            render_list(&lines, ctx.output)?;
            Ok(())
        }
        WorkspaceCommand::Show { id } => {
            let workspace = dashboard::get_workspace(&client, &WorkspaceId::new(id.as_str()))?;
            let detail = WorkspaceDetail {
                role: resolve_role(session.user_id(), &workspace),
                collaborators: roster::roster(&client, &workspace),
                workspace,
            };
            render_mode(ctx.output, &detail, text_detail, pretty_detail)
        }
        WorkspaceCommand::Create { name, description } => {
            let workspace = dashboard::create_workspace(&client, name, description)?;
            render_workspace(ctx, &workspace, Role::Owner, "Created")
        }
        WorkspaceCommand::Update {
            id,
            name,
            description,
        } => {
            let payload = UpdateWorkspacePayload {
                name: name.clone(),
                description: description.clone(),
            };
            let workspace = dashboard::update_workspace(
                &client,
                &session,
                &WorkspaceId::new(id.as_str()),
                &payload,
            )?;
            render_workspace(ctx, &workspace, Role::Owner, "Updated")
        }
        WorkspaceCommand::Delete { id } => {
            dashboard::delete_workspace(&client, &session, &WorkspaceId::new(id.as_str()))?;
            render_success(ctx.output, &format!("Deleted workspace {id}"))
        }
    }
}

fn render_workspace(
    ctx: &Context,
    workspace: &Workspace,
    role: Role,
    verb: &str,
) -> anyhow::Result<()> {
    let entry = DashboardEntry {
        workspace: workspace.clone(),
        role,
    };
    render_mode(
        ctx.output,
        &entry,
        |entry, w| WorkspaceLine(entry).render_table(w),
        |entry, w| writeln!(w, "✓ {verb} {} ({})", entry.workspace.name, entry.workspace.id),
    )
}

/// One dashboard row.
struct WorkspaceLine<'a>(&'a DashboardEntry);

impl Renderable for WorkspaceLine<'_> {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let DashboardEntry { workspace, role } = self.0;
        writeln!(
            w,
            "{:<8} {}  ({}, {} collaborator{})",
            role.as_str(),
            workspace.name,
            workspace.id,
            workspace.collaborators.len(),
            if workspace.collaborators.len() == 1 { "" } else { "s" }
        )
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self.0).map_err(io::Error::other)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let DashboardEntry { workspace, role } = self.0;
        writeln!(
            w,
            "{}  {}  {}  {}",
            workspace.id,
            role.as_str(),
            workspace.collaborators.len(),
            workspace.name
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["id", "role", "collaborators", "name"]
    }
}

#[derive(Debug, Serialize)]
struct WorkspaceDetail {
    #[serde(flatten)]
    workspace: Workspace,
    role: Role,
    collaborators: Vec<RosterEntry>,
}

fn text_detail(detail: &WorkspaceDetail, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}  {}  {}", detail.workspace.id, detail.role, detail.workspace.name)?;
    for entry in &detail.collaborators {
        writeln!(
            w,
            "  {}  {}  {}",
            entry.collaborator.id,
            entry.collaborator.role,
            entry.label()
        )?;
    }
    Ok(())
}

fn pretty_detail(detail: &WorkspaceDetail, w: &mut dyn Write) -> io::Result<()> {
    let workspace = &detail.workspace;
    pretty_section(w, &workspace.name)?;
    pretty_kv(w, "id", workspace.id.as_str())?;
    pretty_kv(w, "your role", detail.role.as_str())?;
    if !workspace.description.is_empty() {
        pretty_kv(w, "description", &workspace.description)?;
    }
    pretty_kv(w, "created", workspace.created_at.format("%Y-%m-%d %H:%M").to_string())?;
    writeln!(w)?;
    pretty_section(w, "Collaborators")?;
    if detail.collaborators.is_empty() {
        writeln!(w, "(none)")?;
    }
    for entry in &detail.collaborators {
        writeln!(
            w,
            "{:<8} {}  [{}]",
            entry.collaborator.role.as_str(),
            entry.label(),
            entry.collaborator.id
        )?;
    }
    pretty_rule(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use clap::Parser;
    use tally_core::model::{Collaborator, CollaboratorRole, User};

    #[derive(Parser)]
    struct Wrapper {
        #[command(subcommand)]
        command: WorkspaceCommand,
    }

    fn workspace() -> Workspace {
        let at = DateTime::<Utc>::from_timestamp(1_735_689_600, 0).expect("valid timestamp");
        Workspace {
            id: "ws-1".into(),
            name: "Launch".into(),
            description: String::new(),
            owner_id: "u1".into(),
            collaborators: vec![Collaborator {
                id: "c1".into(),
                user_id: "u2".into(),
                role: CollaboratorRole::Editor,
            }],
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn update_takes_optional_fields() {
        let w = Wrapper::parse_from(["test", "update", "ws-1", "--name", "New"]);
        let WorkspaceCommand::Update {
            name, description, ..
        } = w.command
        else {
            panic!("expected update");
        };
        assert_eq!(name.as_deref(), Some("New"));
        assert!(description.is_none());
    }

    #[test]
    fn create_description_defaults_to_empty() {
        let w = Wrapper::parse_from(["test", "create", "Launch"]);
        assert!(matches!(
            w.command,
            WorkspaceCommand::Create { ref description, .. } if description.is_empty()
        ));
    }

    #[test]
    fn dashboard_row_pluralizes_collaborators() {
        let entry = DashboardEntry {
            workspace: workspace(),
            role: Role::Editor,
        };
        let mut buf = Vec::new();
        WorkspaceLine(&entry).render_human(&mut buf).expect("render");
        assert_eq!(
            String::from_utf8(buf).expect("utf8"),
            "editor   Launch  (ws-1, 1 collaborator)\n"
        );
    }

    #[test]
    fn detail_json_flattens_workspace() {
        let detail = WorkspaceDetail {
            workspace: workspace(),
            role: Role::Owner,
            collaborators: vec![RosterEntry {
                collaborator: workspace().collaborators[0].clone(),
                user: Some(User {
                    id: "u2".into(),
                    email: "bo@example.com".into(),
                    first_name: String::new(),
                    last_name: String::new(),
                }),
            }],
        };
        let value = serde_json::to_value(&detail).expect("serialize");
        assert_eq!(value["_id"], "ws-1");
        assert_eq!(value["role"], "owner");
        assert_eq!(value["collaborators"][0]["user"]["email"], "bo@example.com");
    }

    #[test]
    fn pretty_detail_labels_unknown_users() {
        let detail = WorkspaceDetail {
            workspace: workspace(),
            role: Role::Owner,
            collaborators: vec![RosterEntry {
                collaborator: workspace().collaborators[0].clone(),
                user: None,
            }],
        };
        let mut buf = Vec::new();
        pretty_detail(&detail, &mut buf).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("editor   Unknown User  [c1]"));
    }
}
