//! `tally watch`: follow one workspace's tasks as they change.
//!
//! The event stream is opened before the snapshot is fetched, so nothing that
//! happens while the snapshot loads is lost. Output per mode:
//!
//! - pretty: the task list, redrawn after every change
//! - text: the task list once, then one tab-separated line per event
//! - json: NDJSON, a `snapshot` line followed by one line per event

use clap::Args;
use serde_json::json;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tally_core::event::PushEvent;
use tally_core::model::WorkspaceId;
use tally_core::remote::{TaskApi, WorkspaceApi};
use tally_core::view::{ApplyOutcome, SortKey, parse_filter};
use tally_core::{ErrorCode, TaskViewSync};
use tracing::info;

use super::task::write_view;
use crate::context::Context;
use crate::output::{CliError, OutputMode};

const TICK: Duration = Duration::from_millis(500);

#[derive(Args, Debug)]
pub struct WatchArgs {
    pub workspace: String,

    /// stale, in-progress, completed or all.
    #[arg(short, long)]
    pub status: Option<String>,

    /// priority or due-date.
    #[arg(long)]
    pub sort: Option<String>,

    /// Stop after this many seconds instead of running until interrupted.
    #[arg(long, value_name = "SECS")]
    pub duration: Option<u64>,
}

pub fn run_watch(args: &WatchArgs, ctx: &Context) -> anyhow::Result<()> {
    let (session, client) = ctx.require_session()?;
    let feed = ctx.event_feed()?;

    let workspace = WorkspaceId::new(args.workspace.as_str());
    let mut view = TaskViewSync::for_session(&client, &session, workspace)
        .with_update_scope(ctx.config.events.update_scope());
    view.set_filter(parse_filter(args.status.as_deref().unwrap_or_default())?);
    view.set_sort(args.sort.as_deref().map(str::parse::<SortKey>).transpose()?);

    view.subscribe(&feed, &session)?;
    view.initialize()?;
    info!(workspace = %view.workspace_id(), url = %feed.url(), "watching");

    let stdout = io::stdout();
    write_snapshot(&mut stdout.lock(), ctx.output, &view)?;

    let deadline = args.duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    while deadline.is_none_or(|at| Instant::now() < at) {
        let mut seen = Vec::new();
        view.drain(Some(TICK), |event, outcome| seen.push((event.clone(), outcome)));
        if !seen.is_empty() {
            let mut out = stdout.lock();
            write_events(&mut out, ctx.output, &view, &seen)?;
            out.flush()?;
        }
        if !view.is_subscribed() {
            let message = view
                .error()
                .unwrap_or(ErrorCode::EventStreamClosed.message())
                .to_string();
            view.teardown();
            return Err(CliError::coded(message, ErrorCode::EventStreamClosed).into());
        }
    }

    view.teardown();
    Ok(())
}

fn write_snapshot<A: TaskApi + WorkspaceApi>(
    w: &mut dyn Write,
    mode: OutputMode,
    view: &TaskViewSync<A>,
) -> io::Result<()> {
    if mode.is_json() {
        let line = json!({
            "snapshot": view.derived_view(),
            "role": view.role(),
            "workspace": view.workspace_id(),
        });
        return writeln!(w, "{line}");
    }
    write_view(w, mode, view)
}

fn write_events<A: TaskApi + WorkspaceApi>(
    w: &mut dyn Write,
    mode: OutputMode,
    view: &TaskViewSync<A>,
    seen: &[(PushEvent, ApplyOutcome)],
) -> io::Result<()> {
    for (event, outcome) in seen {
        writeln!(w, "{}", event_line(mode, event, *outcome))?;
    }
    let redraw = seen
        .iter()
        .any(|(_, outcome)| outcome.changed() || *outcome == ApplyOutcome::WorkspaceRefreshed);
    if mode == OutputMode::Pretty && redraw {
        writeln!(w)?;
        write_view(w, mode, view)?;
    }
    Ok(())
}

fn event_line(mode: OutputMode, event: &PushEvent, outcome: ApplyOutcome) -> String {
    let subject = event
        .task_id()
        .map(ToString::to_string)
        .or_else(|| event.workspace_id().map(ToString::to_string))
        .unwrap_or_default();
    match mode {
        OutputMode::Json => json!({ "event": event, "outcome": outcome.as_str() }).to_string(),
        OutputMode::Text => format!("{}\t{subject}\t{}", event.name(), outcome.as_str()),
        OutputMode::Pretty => format!("» {} {subject}: {}", event.name(), outcome.as_str()),
    }
}
