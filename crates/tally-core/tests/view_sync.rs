use std::time::Duration;

use tally_core::TallyError;
use tally_core::event::{EventBus, EventSource, PushEvent};
use tally_core::model::{
    CollaboratorRole, CreateTaskPayload, Role, TaskId, TaskPriority, TaskStatus,
    UpdateTaskPayload, WorkspaceId,
};
use tally_core::remote::RemoteError;
use tally_core::view::{ApplyOutcome, DRAIN_BATCH, SortKey, TaskViewSync, UpdateScope};

use fixtures::*;

fn view_as<'a>(remote: &'a FakeRemote, user: &str) -> TaskViewSync<&'a FakeRemote> {
    TaskViewSync::for_session(remote, &session(user), WorkspaceId::new(WS))
}

fn ids(view: &TaskViewSync<&FakeRemote>) -> Vec<String> {
    view.derived_view()
        .iter()
        .map(|task| task.id.to_string())
        .collect()
}

#[test]
fn initialize_loads_snapshot_and_role() {
    let remote = FakeRemote::new(vec![
        task("1", TaskStatus::Stale, TaskPriority::Low),
        in_workspace(task("x", TaskStatus::Stale, TaskPriority::Low), "elsewhere"),
    ]);
    let mut view = view_as(&remote, EDITOR);
    assert_eq!(view.role(), Role::None);

    view.initialize().expect("initialize");
    assert_eq!(view.role(), Role::Editor);
    assert!(!view.is_loading());
    assert!(view.error().is_none());
    assert_eq!(ids(&view), ["1"]);
    assert_eq!(*remote.calls.borrow(), ["get_workspace", "list_tasks"]);
}

#[test]
fn created_high_priority_task_sorts_first() {
    let remote = FakeRemote::new(vec![task("1", TaskStatus::Stale, TaskPriority::Low)]);
    let mut view = view_as(&remote, OWNER);
    view.initialize().expect("initialize");

    let outcome = view.on_task_created(task("2", TaskStatus::Stale, TaskPriority::High));
    assert_eq!(outcome, ApplyOutcome::Inserted);
    view.set_sort(Some(SortKey::Priority));
    assert_eq!(ids(&view), ["2", "1"]);

    view.set_sort(None);
    assert_eq!(ids(&view), ["1", "2"]);
}

#[test]
fn deleting_unknown_task_is_silent() {
    let remote = FakeRemote::new(vec![task("1", TaskStatus::Stale, TaskPriority::Low)]);
    let mut view = view_as(&remote, OWNER);
    view.initialize().expect("initialize");
    let before = view.state().clone();

    assert_eq!(
        view.on_task_deleted(TaskId::new("99")),
        ApplyOutcome::IgnoredUnknown
    );
    assert_eq!(*view.state(), before);
    assert!(view.error().is_none());
}

#[test]
fn update_for_unknown_task_is_not_inserted() {
    let remote = FakeRemote::new(vec![]);
    let mut view = view_as(&remote, OWNER);
    view.initialize().expect("initialize");
    assert_eq!(
        view.on_task_updated(task("7", TaskStatus::Completed, TaskPriority::Low)),
        ApplyOutcome::IgnoredUnknown
    );
    assert!(view.state().is_empty());
}

#[test]
fn viewer_cannot_change_status_and_no_call_is_made() {
    let remote = FakeRemote::new(vec![task("1", TaskStatus::Stale, TaskPriority::Low)]);
    let mut view = view_as(&remote, VIEWER);
    view.initialize().expect("initialize");
    let calls_after_init = remote.call_count();

    let err = view
        .change_status(&TaskId::new("1"), TaskStatus::Completed)
        .expect_err("viewer must be refused");
    assert!(matches!(err, TallyError::PermissionDenied { role: Role::Viewer, .. }));
    assert_eq!(remote.call_count(), calls_after_init);
    assert!(view.error().unwrap_or_default().contains("permission"));

    assert!(view.delete_task(&TaskId::new("1")).is_err());
    assert_eq!(remote.call_count(), calls_after_init);
    assert_eq!(view.state().len(), 1);
}

#[test]
fn outsider_is_refused_like_a_viewer() {
    let remote = FakeRemote::new(vec![task("1", TaskStatus::Stale, TaskPriority::Low)]);
    let mut view = view_as(&remote, "stranger");
    view.initialize().expect("initialize");
    assert_eq!(view.role(), Role::None);
    assert!(view.change_status(&TaskId::new("1"), TaskStatus::Completed).is_err());
    assert!(!remote.called("update_task_status"));
}

#[test]
fn editor_status_change_is_applied_locally() {
    let remote = FakeRemote::new(vec![task("1", TaskStatus::Stale, TaskPriority::Low)]);
    let mut view = view_as(&remote, EDITOR);
    view.initialize().expect("initialize");

    let updated = view
        .change_status(&TaskId::new("1"), TaskStatus::Completed)
        .expect("change status");
    assert_eq!(updated.status, TaskStatus::Completed);
    let held = view.state().get(&TaskId::new("1")).expect("still present");
    assert_eq!(held.status, TaskStatus::Completed);

    view.set_filter(Some(TaskStatus::Completed));
    assert_eq!(ids(&view), ["1"]);
    view.set_filter(Some(TaskStatus::Stale));
    assert!(ids(&view).is_empty());
}

#[test]
fn failed_snapshot_leaves_view_empty_without_retry() {
    let remote = FakeRemote::new(vec![task("1", TaskStatus::Stale, TaskPriority::Low)]);
    remote.fail_next(RemoteError::Transport("connection refused".into()));
    let mut view = view_as(&remote, OWNER);

    assert!(view.initialize().is_err());
    assert!(view.state().is_empty());
    assert!(!view.state().is_loaded());
    assert!(!view.is_loading());
    assert_eq!(view.error(), Some("connection refused"));
    assert_eq!(remote.call_count(), 1);

    view.initialize().expect("explicit second attempt");
    assert_eq!(view.state().len(), 1);
    assert!(view.error().is_none());
}

#[test]
fn failed_mutation_keeps_mapping_and_next_success_clears_error() {
    let remote = FakeRemote::new(vec![task("1", TaskStatus::Stale, TaskPriority::Low)]);
    let mut view = view_as(&remote, OWNER);
    view.initialize().expect("initialize");
    let before = view.state().clone();

    remote.fail_next(RemoteError::Rejected {
        status: 400,
        message: "Invalid status transition".into(),
    });
    assert!(view.change_status(&TaskId::new("1"), TaskStatus::Completed).is_err());
    assert_eq!(*view.state(), before);
    assert_eq!(view.error(), Some("Invalid status transition"));

    remote.fail_next(RemoteError::Transport("timed out".into()));
    assert!(view.delete_task(&TaskId::new("1")).is_err());
    assert_eq!(view.error(), Some("timed out"));
    assert_eq!(*view.state(), before);

    view.delete_task(&TaskId::new("1")).expect("delete");
    assert!(view.error().is_none());
    assert!(view.state().is_empty());
}

#[test]
fn dismissed_error_stays_cleared_until_next_failure() {
    let remote = FakeRemote::new(vec![task("1", TaskStatus::Stale, TaskPriority::Low)]);
    let mut view = view_as(&remote, OWNER);
    view.initialize().expect("initialize");

    remote.fail_next(RemoteError::Transport("timed out".into()));
    assert!(view.delete_task(&TaskId::new("1")).is_err());
    assert_eq!(view.error(), Some("timed out"));

    view.clear_error();
    assert!(view.error().is_none());
    assert_eq!(view.state().len(), 1);
}

#[test]
fn create_and_edit_go_through_the_view() {
    let remote = FakeRemote::new(vec![]);
    let mut view = view_as(&remote, EDITOR);
    view.initialize().expect("initialize");

    let created = view
        .create_task(&CreateTaskPayload {
            title: "Write docs".into(),
            description: String::new(),
            workspace_id: WorkspaceId::new(WS),
            status: TaskStatus::Stale,
            due_date: Some(date("2025-02-01")),
            priority: TaskPriority::High,
        })
        .expect("create");
    assert_eq!(ids(&view), [created.id.to_string()]);

    let edited = view
        .update_task(
            &created.id,
            &UpdateTaskPayload {
                title: Some("Write more docs".into()),
                ..UpdateTaskPayload::default()
            },
        )
        .expect("edit");
    assert_eq!(edited.title, "Write more docs");
    assert_eq!(view.state().get(&created.id).map(|t| t.title.as_str()), Some("Write more docs"));
}

#[test]
fn create_rejects_foreign_workspace_and_blank_title() {
    let remote = FakeRemote::new(vec![]);
    let mut view = view_as(&remote, OWNER);
    view.initialize().expect("initialize");
    let calls = remote.call_count();

    let mut payload = CreateTaskPayload {
        title: "x".into(),
        description: String::new(),
        workspace_id: WorkspaceId::new("elsewhere"),
        status: TaskStatus::Stale,
        due_date: None,
        priority: TaskPriority::Medium,
    };
    assert!(matches!(
        view.create_task(&payload),
        Err(TallyError::InvalidInput(_))
    ));

    payload.workspace_id = WorkspaceId::new(WS);
    payload.title = "   ".into();
    assert!(matches!(
        view.create_task(&payload),
        Err(TallyError::InvalidInput(_))
    ));

    assert!(matches!(
        view.update_task(&TaskId::new("1"), &UpdateTaskPayload::default()),
        Err(TallyError::InvalidInput(_))
    ));
    assert_eq!(remote.call_count(), calls);
}

#[test]
fn teardown_detaches_events_and_mutations() {
    let remote = FakeRemote::new(vec![task("1", TaskStatus::Stale, TaskPriority::Low)]);
    let bus = EventBus::new();
    let mut view = view_as(&remote, OWNER);
    view.subscribe(&bus, &session(OWNER)).expect("subscribe");
    view.initialize().expect("initialize");
    let before = view.state().clone();

    view.teardown();
    assert!(!view.is_active());
    assert_eq!(bus.live_subscribers(), 0);

    assert_eq!(
        view.on_task_created(task("2", TaskStatus::Stale, TaskPriority::High)),
        ApplyOutcome::Detached
    );
    assert_eq!(
        view.on_task_deleted(TaskId::new("1")),
        ApplyOutcome::Detached
    );
    assert_eq!(*view.state(), before);
    assert!(matches!(
        view.change_status(&TaskId::new("1"), TaskStatus::Completed),
        Err(TallyError::TornDown(_))
    ));
    assert!(!remote.called("update_task_status"));
}

#[test]
fn demotion_via_collaborator_event_blocks_next_mutation() {
    let remote = FakeRemote::new(vec![task("1", TaskStatus::Stale, TaskPriority::Low)]);
    let mut view = view_as(&remote, EDITOR);
    view.initialize().expect("initialize");
    assert_eq!(view.role(), Role::Editor);

    let mut demoted = workspace();
    demoted.collaborators[0].role = CollaboratorRole::Viewer;
    assert_eq!(
        view.handle(&PushEvent::CollaboratorUpdated(demoted)),
        ApplyOutcome::WorkspaceRefreshed
    );
    assert_eq!(view.role(), Role::Viewer);

    let calls = remote.call_count();
    assert!(view.change_status(&TaskId::new("1"), TaskStatus::Completed).is_err());
    assert_eq!(remote.call_count(), calls);
}

#[test]
fn collaborator_event_for_other_workspace_is_ignored() {
    let remote = FakeRemote::new(vec![]);
    let mut view = view_as(&remote, EDITOR);
    view.initialize().expect("initialize");

    let mut other = workspace();
    other.id = WorkspaceId::new("ws-2");
    other.collaborators.clear();
    assert_eq!(
        view.handle(&PushEvent::CollaboratorUpdated(other)),
        ApplyOutcome::IgnoredForeign
    );
    assert_eq!(view.role(), Role::Editor);
}

#[test]
fn events_published_before_snapshot_are_replayed_by_pump() {
    let remote = FakeRemote::new(vec![task("1", TaskStatus::Stale, TaskPriority::Low)]);
    let bus = EventBus::new();
    let mut view = view_as(&remote, OWNER);
    view.subscribe(&bus, &session(OWNER)).expect("subscribe");

    bus.publish(&PushEvent::TaskCreated(task("2", TaskStatus::Stale, TaskPriority::High)));
    bus.publish(&PushEvent::TaskDeleted(TaskId::new("1")));
    assert_eq!(view.pump(), 2);
    assert_eq!(view.state().pending_len(), 2);

    view.initialize().expect("initialize");
    assert_eq!(ids(&view), ["2"]);

    let mut done = task("2", TaskStatus::Completed, TaskPriority::High);
    done.updated_at = at(50);
    bus.publish(&PushEvent::TaskUpdated(done));
    assert_eq!(view.pump_wait(Duration::from_millis(50)), 1);
    assert_eq!(
        view.state().get(&TaskId::new("2")).map(|t| t.status),
        Some(TaskStatus::Completed)
    );
}

#[test]
fn busy_stream_is_drained_one_batch_at_a_time() {
    let remote = FakeRemote::new(vec![task("1", TaskStatus::Stale, TaskPriority::Low)]);
    let bus = EventBus::new();
    let mut view = view_as(&remote, OWNER);
    view.attach(bus.subscribe("token-owner").expect("subscribe"));
    assert!(view.is_subscribed());
    view.initialize().expect("initialize");

    for n in 0..DRAIN_BATCH + 5 {
        bus.publish(&PushEvent::TaskDeleted(TaskId::new(format!("gone-{n}"))));
    }
    let mut outcomes = Vec::new();
    let taken = view.drain(None, |_, outcome| outcomes.push(outcome));
    assert_eq!(taken, DRAIN_BATCH);
    assert!(outcomes.iter().all(|o| *o == ApplyOutcome::IgnoredUnknown));

    assert_eq!(view.pump(), 5);
    assert_eq!(view.pump(), 0);
    assert_eq!(ids(&view), ["1"]);
}

#[test]
fn closed_stream_surfaces_an_error() {
    let remote = FakeRemote::new(vec![]);
    let bus = EventBus::new();
    let mut view = view_as(&remote, OWNER);
    view.subscribe(&bus, &session(OWNER)).expect("subscribe");
    view.initialize().expect("initialize");

    bus.close();
    assert_eq!(view.pump(), 0);
    assert!(!view.is_subscribed());
    assert_eq!(view.error(), Some("Event stream closed"));
}

#[test]
fn rejected_subscription_surfaces_an_error() {
    let remote = FakeRemote::new(vec![]);
    let bus = EventBus::requiring_token("someone-else");
    let mut view = view_as(&remote, OWNER);
    let err = view
        .subscribe(&bus, &session(OWNER))
        .expect_err("token mismatch");
    assert_eq!(err.to_string(), "Unauthorized");
    assert_eq!(view.error(), Some("Unauthorized"));
}

#[test]
fn switching_workspace_releases_subscription_and_resets_state() {
    let remote = FakeRemote::new(vec![task("1", TaskStatus::Stale, TaskPriority::Low)]);
    let bus = EventBus::new();
    let mut view = view_as(&remote, OWNER);
    view.subscribe(&bus, &session(OWNER)).expect("subscribe");
    view.initialize().expect("initialize");
    view.set_sort(Some(SortKey::DueDate));

    view.switch_workspace(WorkspaceId::new("ws-2"));
    assert_eq!(bus.live_subscribers(), 0);
    assert!(view.state().is_empty());
    assert_eq!(view.role(), Role::None);
    assert_eq!(view.params().sort, Some(SortKey::DueDate));

    // Old subscription is gone, so nothing from the old feed reaches the view.
    bus.publish(&PushEvent::TaskCreated(task("9", TaskStatus::Stale, TaskPriority::Low)));
    assert_eq!(view.pump(), 0);
}

#[test]
fn scoped_updates_ignore_foreign_records() {
    let remote = FakeRemote::new(vec![task("1", TaskStatus::Stale, TaskPriority::Low)]);
    let mut view = view_as(&remote, OWNER).with_update_scope(UpdateScope::Workspace);
    view.initialize().expect("initialize");

    let foreign = in_workspace(task("1", TaskStatus::Completed, TaskPriority::Low), "ws-2");
    assert_eq!(view.on_task_updated(foreign.clone()), ApplyOutcome::IgnoredForeign);

    let mut unscoped = view_as(&remote, OWNER);
    unscoped.initialize().expect("initialize");
    assert_eq!(unscoped.on_task_updated(foreign), ApplyOutcome::Replaced);
}

#[test]
fn bus_subscription_is_exposed_through_event_source() {
    fn open(source: &dyn EventSource) -> bool {
        source.subscribe("token-owner").is_ok()
    }
    assert!(open(&EventBus::new()));
}
