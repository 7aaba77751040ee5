//! `tally task`: read and change the tasks of one workspace.
//!
//! Every command builds a [`TaskViewSync`] for the workspace, so role checks
//! and local view updates behave exactly as in `tally watch`.

use chrono::NaiveDate;
use clap::Subcommand;
use std::fmt::Write as _;
use std::io::{self, Write};
use tally_core::model::{
    CreateTaskPayload, Task, TaskId, TaskPriority, TaskStatus, UpdateTaskPayload,
    WorkspaceId, parse_due_date,
};
use tally_core::remote::{HttpClient, RemoteError, TaskApi, WorkspaceApi};
use tally_core::session::Session;
use tally_core::view::{SortKey, parse_filter};
use tally_core::{TallyError, TaskViewSync};

use crate::context::Context;
use crate::output::{
    OutputMode, Renderable, pretty_kv, pretty_section, render_mode, render_success, write_list,
};

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    #[command(
        about = "List a workspace's tasks",
        long_about = "List the tasks of one workspace, optionally filtered by status and sorted by priority or due date.",
        after_help = "EXAMPLES:\n    # Everything, in server order\n    tally task list 65f0c1d2e4\n\n    # In-progress work, most urgent first\n    tally task list 65f0c1d2e4 --status in-progress --sort priority\n\n    # Soonest due first\n    tally task list 65f0c1d2e4 --sort due-date --json"
    )]
    List {
        workspace: String,

        /// stale, in-progress, completed or all.
        #[arg(short, long)]
        status: Option<String>,

        /// priority or due-date.
        #[arg(long)]
        sort: Option<String>,
    },

    #[command(about = "Show one task", after_help = "EXAMPLES:\n    tally task show 65f1a2b3c4")]
    Show { id: String },

    #[command(
        about = "Create a task (owner or editor)",
        after_help = "EXAMPLES:\n    tally task create 65f0c1d2e4 \"Write release notes\" --priority high --due 2025-03-01"
    )]
    Create {
        workspace: String,
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// low, medium or high.
        #[arg(short, long, default_value = "medium")]
        priority: String,

        /// stale, in-progress or completed.
        #[arg(short, long, default_value = "stale")]
        status: String,

        /// Due date, YYYY-MM-DD.
        #[arg(long)]
        due: Option<String>,
    },

    #[command(
        about = "Edit a task's fields (owner or editor)",
        after_help = "EXAMPLES:\n    tally task edit 65f1a2b3c4 --title \"Ship release notes\" --priority medium"
    )]
    Edit {
        id: String,

        /// Workspace of the task; looked up when omitted.
        #[arg(short, long)]
        workspace: Option<String>,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(short, long)]
        priority: Option<String>,

        /// Due date, YYYY-MM-DD.
        #[arg(long)]
        due: Option<String>,
    },

    #[command(
        about = "Change a task's status (owner or editor)",
        after_help = "EXAMPLES:\n    tally task status 65f1a2b3c4 completed"
    )]
    Status {
        id: String,

        /// stale, in-progress or completed.
        status: String,

        /// Workspace of the task; looked up when omitted.
        #[arg(short, long)]
        workspace: Option<String>,
    },

    #[command(
        about = "Delete a task (owner or editor)",
        after_help = "EXAMPLES:\n    tally task delete 65f1a2b3c4"
    )]
    Delete {
        id: String,

        /// Workspace of the task; looked up when omitted.
        #[arg(short, long)]
        workspace: Option<String>,
    },
}

pub fn run_task(command: &TaskCommand, ctx: &Context) -> anyhow::Result<()> {
    let (session, client) = ctx.require_session()?;
    match command {
        TaskCommand::List {
            workspace,
            status,
            sort,
        } => {
            let mut view = open_view(ctx, &client, &session, WorkspaceId::new(workspace.as_str()))?;
            view.set_filter(parse_filter(status.as_deref().unwrap_or_default())?);
            view.set_sort(sort.as_deref().map(str::parse::<SortKey>).transpose()?);
            let stdout = io::stdout();
            let mut out = stdout.lock();
            write_view(&mut out, ctx.output, &view)?;
            Ok(())
        }
        TaskCommand::Show { id } => {
            let task = fetch_task(&client, &TaskId::new(id.as_str()))?;
            render_task(ctx.output, &task)
        }
        TaskCommand::Create {
            workspace,
            title,
            description,
            priority,
            status,
            due,
        } => {
            let workspace_id = WorkspaceId::new(workspace.as_str());
            let payload = CreateTaskPayload {
                title: title.clone(),
                description: description.clone(),
                workspace_id: workspace_id.clone(),
                status: status.parse()?,
                due_date: due.as_deref().map(parse_due).transpose()?,
                priority: priority.parse()?,
            };
            let mut view = open_view(ctx, &client, &session, workspace_id)?;
            let task = view.create_task(&payload)?;
            render_task(ctx.output, &task)
        }
        TaskCommand::Edit {
            id,
            workspace,
            title,
            description,
            priority,
            due,
        } => {
            let id = TaskId::new(id.as_str());
            let payload = UpdateTaskPayload {
                title: title.clone(),
                description: description.clone(),
                priority: priority.as_deref().map(str::parse::<TaskPriority>).transpose()?,
                due_date: due.as_deref().map(parse_due).transpose()?,
            };
            let workspace_id = workspace_of(&client, &id, workspace.as_deref())?;
            let mut view = open_view(ctx, &client, &session, workspace_id)?;
            let task = view.update_task(&id, &payload)?;
            render_task(ctx.output, &task)
        }
        TaskCommand::Status {
            id,
            status,
            workspace,
        } => {
            let id = TaskId::new(id.as_str());
            let status: TaskStatus = status.parse()?;
            let workspace_id = workspace_of(&client, &id, workspace.as_deref())?;
            let mut view = open_view(ctx, &client, &session, workspace_id)?;
            let task = view.change_status(&id, status)?;
            render_task(ctx.output, &task)
        }
        TaskCommand::Delete { id, workspace } => {
            let id = TaskId::new(id.as_str());
            let workspace_id = workspace_of(&client, &id, workspace.as_deref())?;
            let mut view = open_view(ctx, &client, &session, workspace_id)?;
            view.delete_task(&id)?;
            render_success(ctx.output, &format!("Deleted task {id}"))
        }
    }
}

/// An initialized view of `workspace` for the session user.
pub fn open_view<'a>(
    ctx: &Context,
    client: &'a HttpClient,
    session: &Session,
    workspace: WorkspaceId,
) -> Result<TaskViewSync<&'a HttpClient>, TallyError> {
    let mut view = TaskViewSync::for_session(client, session, workspace)
        .with_update_scope(ctx.config.events.update_scope());
    view.initialize()?;
    Ok(view)
}

fn fetch_task(client: &HttpClient, id: &TaskId) -> Result<Task, TallyError> {
    client.get_task(id).map_err(|err| match err {
        RemoteError::Rejected { status: 404, .. } => TallyError::NotFound {
            kind: "task",
            id: id.to_string(),
        },
        other => other.into(),
    })
}

fn workspace_of(
    client: &HttpClient,
    id: &TaskId,
    flag: Option<&str>,
) -> Result<WorkspaceId, TallyError> {
    match flag {
        Some(workspace) => Ok(WorkspaceId::new(workspace)),
        None => Ok(fetch_task(client, id)?.workspace_id),
    }
}

fn parse_due(raw: &str) -> Result<NaiveDate, TallyError> {
    parse_due_date(raw)
        .ok_or_else(|| TallyError::InvalidInput(format!("'{raw}' is not a date (YYYY-MM-DD)")))
}

/// Write the derived view: a heading in pretty mode, then one line per task.
pub fn write_view<A>(
    w: &mut dyn Write,
    mode: OutputMode,
    view: &TaskViewSync<A>,
) -> io::Result<()>
where
    A: TaskApi + WorkspaceApi,
{
    let tasks = view.derived_view();
    if mode == OutputMode::Pretty {
        let name = view
            .workspace()
            .map_or_else(|| view.workspace_id().to_string(), |ws| ws.name.clone());
        let params = view.params();
        let (shown, total) = (tasks.len(), view.state().len());
        let mut heading = format!("{name} ({}, {shown} of {total})", view.role());
        if let Some(status) = params.filter {
            let _ = write!(heading, " · {status}");
        }
        if let Some(sort) = params.sort {
            let _ = write!(heading, " · by {sort}");
        }
        pretty_section(w, &heading)?;
        if tasks.is_empty() {
            writeln!(w, "(no tasks)")?;
        }
    }
    let lines: Vec<TaskLine<'_>> = tasks.into_iter().map(TaskLine).collect();
    write_list(w, &lines, mode)
}

fn render_task(mode: OutputMode, task: &Task) -> anyhow::Result<()> {
    render_mode(
        mode,
        task,
        |task, w| TaskLine(task).render_table(w),
        |task, w| pretty_task(w, task),
    )
}

fn due_label(task: &Task) -> String {
    task.due_date
        .map_or_else(|| "-".to_string(), |due| due.format("%Y-%m-%d").to_string())
}

fn pretty_task(w: &mut dyn Write, task: &Task) -> io::Result<()> {
    pretty_section(w, &task.title)?;
    pretty_kv(w, "id", task.id.as_str())?;
    pretty_kv(w, "status", task.status.as_str())?;
    pretty_kv(w, "priority", task.priority.as_str())?;
    pretty_kv(w, "due", due_label(task))?;
    pretty_kv(w, "workspace", task.workspace_id.as_str())?;
    pretty_kv(w, "updated", task.updated_at.format("%Y-%m-%d %H:%M").to_string())?;
    if !task.description.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}", task.description)?;
    }
    Ok(())
}

/// One row of a task list.
pub struct TaskLine<'a>(pub &'a Task);

impl Renderable for TaskLine<'_> {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let task = self.0;
        writeln!(
            w,
            "{:<11} {:<6} {:<10} {}  ({})",
            task.status.as_str(),
            task.priority.as_str(),
            due_label(task),
            task.title,
            task.id
        )
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self.0).map_err(io::Error::other)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let task = self.0;
        writeln!(
            w,
            "{}  {}  {}  {}  {}",
            task.id,
            task.status.as_str(),
            task.priority.as_str(),
            due_label(task),
            task.title
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["id", "status", "priority", "due", "title"]
    }
}
