//! Live task view for one workspace.
//!
//! [`TaskViewSync`] ties a [`ViewState`] to a remote API, an optional event
//! subscription and the viewer's role. It runs entirely on the caller's
//! thread: events are taken from the subscription only when
//! [`TaskViewSync::pump`] is called.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::derive::{SortKey, ViewParams, derive};
use super::state::{ApplyOutcome, UpdateScope, ViewState};
use crate::error::{ErrorCode, TallyError};
use crate::event::{Delivery, EventSource, PushEvent, Subscription};
use crate::model::{
    CreateTaskPayload, Role, Task, TaskId, TaskStatus, UpdateTaskPayload, UserId, Workspace,
    WorkspaceId, resolve_role,
};
use crate::remote::{TaskApi, WorkspaceApi};
use crate::session::Session;

/// Most events one [`TaskViewSync::drain`] call takes, so a busy stream
/// cannot keep the caller from rendering or checking its own deadline.
pub const DRAIN_BATCH: usize = 256;

#[derive(Debug)]
pub struct TaskViewSync<A> {
    api: A,
    user: UserId,
    state: ViewState,
    params: ViewParams,
    workspace: Option<Workspace>,
    role: Role,
    error: Option<String>,
    loading: bool,
    subscription: Option<Subscription>,
    active: bool,
}

impl<A: TaskApi + WorkspaceApi> TaskViewSync<A> {
    /// A view for `workspace_id` as seen by `user`. Nothing is fetched until
    /// [`TaskViewSync::initialize`]; the role starts as [`Role::None`].
    pub fn new(api: A, user: UserId, workspace_id: WorkspaceId) -> Self {
        Self {
            api,
            user,
            state: ViewState::new(workspace_id),
            params: ViewParams::default(),
            workspace: None,
            role: Role::None,
            error: None,
            loading: false,
            subscription: None,
            active: true,
        }
    }

    pub fn for_session(api: A, session: &Session, workspace_id: WorkspaceId) -> Self {
        Self::new(api, session.user_id().clone(), workspace_id)
    }

    #[must_use]
    pub fn with_update_scope(mut self, scope: UpdateScope) -> Self {
        self.state = ViewState::new(self.state.workspace_id().clone()).with_scope(scope);
        self
    }

    // -- lifecycle ---------------------------------------------------------

    /// Open the live event stream. Events that arrive before the snapshot
    /// are held and replayed once it lands.
    ///
    /// # Errors
    ///
    /// Fails when the view was torn down or the stream cannot be opened; the
    /// error is also surfaced through [`TaskViewSync::error`].
    pub fn subscribe<S: EventSource + ?Sized>(
        &mut self,
        source: &S,
        session: &Session,
    ) -> Result<(), TallyError> {
        self.ensure_active()?;
        match source.subscribe(&session.token) {
            Ok(subscription) => {
                info!(
                    workspace = %self.workspace_id(),
                    source = subscription.source(),
                    "task view subscribed"
                );
                self.subscription = Some(subscription);
                Ok(())
            }
            Err(err) => Err(self.fail(err.into())),
        }
    }

    /// Attach an already opened subscription.
    pub fn attach(&mut self, subscription: Subscription) {
        if self.active {
            self.subscription = Some(subscription);
        }
    }

    /// Fetch the workspace (for the role) and then its task snapshot.
    ///
    /// On success the mapping is replaced and buffered events are replayed.
    /// On failure the mapping is left empty and the error is surfaced.
    /// Nothing is retried.
    ///
    /// # Errors
    ///
    /// Returns the remote failure, or [`TallyError::TornDown`].
    pub fn initialize(&mut self) -> Result<(), TallyError> {
        self.ensure_active()?;
        self.loading = true;
        debug!(workspace = %self.workspace_id(), "loading task snapshot");

        let fetched = self.fetch_snapshot();
        self.loading = false;

        match fetched {
            Ok((workspace, tasks)) => {
                self.role = resolve_role(&self.user, &workspace);
                self.workspace = Some(workspace);
                let count = tasks.len();
                let replayed = self.state.load_snapshot(tasks);
                self.error = None;
                info!(
                    workspace = %self.workspace_id(),
                    tasks = count,
                    replayed,
                    role = %self.role,
                    "task snapshot loaded"
                );
                Ok(())
            }
            Err(err) => {
                self.state.mark_failed();
                Err(self.fail(err))
            }
        }
    }

    fn fetch_snapshot(&self) -> Result<(Workspace, Vec<Task>), TallyError> {
        let id = self.state.workspace_id();
        let workspace = self.api.get_workspace(id)?;
        let tasks = self.api.list_tasks(id)?;
        Ok((workspace, tasks))
    }

    /// Release the subscription. Later events and mutations are refused.
    pub fn teardown(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(subscription) = self.subscription.take() {
            subscription.release();
        }
        info!(workspace = %self.workspace_id(), "task view torn down");
    }

    /// Point the view at another workspace.
    ///
    /// The old subscription is released and all state except the view
    /// parameters is reset. Call [`TaskViewSync::subscribe`] and
    /// [`TaskViewSync::initialize`] again afterwards.
    pub fn switch_workspace(&mut self, workspace_id: WorkspaceId) {
        if let Some(subscription) = self.subscription.take() {
            subscription.release();
        }
        info!(from = %self.workspace_id(), to = %workspace_id, "switching workspace");
        self.state = ViewState::new(workspace_id).with_scope(self.state.scope());
        self.workspace = None;
        self.role = Role::None;
        self.error = None;
        self.loading = false;
        self.active = true;
    }

    // -- events ------------------------------------------------------------

    /// Route one push event into the view.
    pub fn handle(&mut self, event: &PushEvent) -> ApplyOutcome {
        if !self.active {
            debug!(event = event.name(), "event for torn-down view ignored");
            return ApplyOutcome::Detached;
        }
        match event {
            PushEvent::CollaboratorUpdated(workspace) => self.refresh_workspace(workspace),
            _ => self.state.apply(event),
        }
    }

    pub fn on_task_created(&mut self, task: Task) -> ApplyOutcome {
        self.handle(&PushEvent::TaskCreated(task))
    }

    pub fn on_task_updated(&mut self, task: Task) -> ApplyOutcome {
        self.handle(&PushEvent::TaskUpdated(task))
    }

    pub fn on_task_deleted(&mut self, id: TaskId) -> ApplyOutcome {
        self.handle(&PushEvent::TaskDeleted(id))
    }

    fn refresh_workspace(&mut self, workspace: &Workspace) -> ApplyOutcome {
        if workspace.id != *self.state.workspace_id() {
            return ApplyOutcome::IgnoredForeign;
        }
        let role = resolve_role(&self.user, workspace);
        if role != self.role {
            info!(workspace = %workspace.id, from = %self.role, to = %role, "role changed");
        }
        self.role = role;
        self.workspace = Some(workspace.clone());
        ApplyOutcome::WorkspaceRefreshed
    }

    /// Apply the events queued on the subscription, at most [`DRAIN_BATCH`].
    /// Returns how many were taken. A closed stream surfaces an error and
    /// drops the subscription.
    pub fn pump(&mut self) -> usize {
        self.drain(None, |_, _| {})
    }

    /// Like [`TaskViewSync::pump`], but block up to `timeout` for the first
    /// event.
    pub fn pump_wait(&mut self, timeout: Duration) -> usize {
        self.drain(Some(timeout), |_, _| {})
    }

    /// Drain up to [`DRAIN_BATCH`] events, reporting each one and what it did.
    pub fn drain(
        &mut self,
        mut wait: Option<Duration>,
        mut observe: impl FnMut(&PushEvent, ApplyOutcome),
    ) -> usize {
        let mut taken = 0;
        while taken < DRAIN_BATCH {
            let delivery = match (&self.subscription, wait.take()) {
                (Some(subscription), Some(timeout)) => subscription.wait(timeout),
                (Some(subscription), None) => subscription.poll(),
                (None, _) => break,
            };
            match delivery {
                Delivery::Event(event) => {
                    let outcome = self.handle(&event);
                    observe(&event, outcome);
                    taken += 1;
                }
                Delivery::Idle => break,
                Delivery::Closed => {
                    self.stream_closed();
                    break;
                }
            }
        }
        taken
    }

    fn stream_closed(&mut self) {
        warn!(workspace = %self.workspace_id(), "event stream closed");
        self.subscription = None;
        self.error = Some(ErrorCode::EventStreamClosed.message().to_string());
    }

    // -- view parameters ---------------------------------------------------

    pub fn set_filter(&mut self, filter: Option<TaskStatus>) {
        self.params.filter = filter;
    }

    pub fn set_sort(&mut self, sort: Option<SortKey>) {
        self.params.sort = sort;
    }

    // -- mutations ---------------------------------------------------------

    /// Change a task's status. Requires owner or editor; a refusal happens
    /// before any remote call.
    ///
    /// # Errors
    ///
    /// [`TallyError::PermissionDenied`] or the remote failure. Either way
    /// the mapping is unchanged and the error is surfaced.
    pub fn change_status(&mut self, id: &TaskId, status: TaskStatus) -> Result<Task, TallyError> {
        self.authorize("change task status")?;
        let task = self
            .api
            .update_task_status(id, status)
            .map_err(|err| self.fail(err.into()))?;
        self.apply_local(&PushEvent::TaskUpdated(task.clone()));
        Ok(task)
    }

    /// Delete a task. Requires owner or editor.
    ///
    /// # Errors
    ///
    /// [`TallyError::PermissionDenied`] or the remote failure.
    pub fn delete_task(&mut self, id: &TaskId) -> Result<(), TallyError> {
        self.authorize("delete tasks")?;
        self.api
            .delete_task(id)
            .map_err(|err| self.fail(err.into()))?;
        self.apply_local(&PushEvent::TaskDeleted(id.clone()));
        Ok(())
    }

    /// Create a task in this workspace. Requires owner or editor.
    ///
    /// # Errors
    ///
    /// [`TallyError::InvalidInput`] for a blank title or a payload aimed at
    /// another workspace, [`TallyError::PermissionDenied`], or the remote
    /// failure.
    pub fn create_task(&mut self, payload: &CreateTaskPayload) -> Result<Task, TallyError> {
        self.authorize("create tasks")?;
        if payload.title.trim().is_empty() {
            return Err(self.fail(TallyError::InvalidInput("title must not be empty".into())));
        }
        if payload.workspace_id != *self.state.workspace_id() {
            return Err(self.fail(TallyError::InvalidInput(format!(
                "task targets workspace '{}' but this view shows '{}'",
                payload.workspace_id,
                self.state.workspace_id()
            ))));
        }
        let task = self
            .api
            .create_task(payload)
            .map_err(|err| self.fail(err.into()))?;
        self.apply_local(&PushEvent::TaskCreated(task.clone()));
        Ok(task)
    }

    /// Edit title, description, priority or due date. Requires owner or
    /// editor.
    ///
    /// # Errors
    ///
    /// [`TallyError::InvalidInput`] when nothing would change,
    /// [`TallyError::PermissionDenied`], or the remote failure.
    pub fn update_task(
        &mut self,
        id: &TaskId,
        payload: &UpdateTaskPayload,
    ) -> Result<Task, TallyError> {
        self.authorize("edit tasks")?;
        if payload.is_empty() {
            return Err(self.fail(TallyError::InvalidInput("nothing to update".into())));
        }
        let task = self
            .api
            .update_task(id, payload)
            .map_err(|err| self.fail(err.into()))?;
        self.apply_local(&PushEvent::TaskUpdated(task.clone()));
        Ok(task)
    }

    fn authorize(&mut self, action: &'static str) -> Result<(), TallyError> {
        self.ensure_active()?;
        if self.role.can_edit_tasks() {
            Ok(())
        } else {
            Err(self.fail(TallyError::PermissionDenied {
                action,
                role: self.role,
            }))
        }
    }

    fn apply_local(&mut self, event: &PushEvent) {
        let outcome = self.state.apply(event);
        debug!(event = event.name(), ?outcome, "applied mutation result");
        self.error = None;
    }

    fn ensure_active(&self) -> Result<(), TallyError> {
        if self.active {
            Ok(())
        } else {
            Err(TallyError::TornDown(self.workspace_id().to_string()))
        }
    }

    /// Surface `err` as the current error and hand it back.
    fn fail(&mut self, err: TallyError) -> TallyError {
        warn!(workspace = %self.workspace_id(), code = %err.error_code(), "{err}");
        self.error = Some(err.to_string());
        err
    }

    // -- read side ---------------------------------------------------------

    /// The filtered and sorted view.
    #[must_use]
    pub fn derived_view(&self) -> Vec<&Task> {
        derive(self.state.tasks(), &self.params)
    }

    #[must_use]
    pub const fn params(&self) -> &ViewParams {
        &self.params
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// True only while [`TaskViewSync::initialize`] is fetching. That call
    /// blocks until the fetch finishes, so outside it this always reads
    /// `false`.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub const fn workspace(&self) -> Option<&Workspace> {
        self.workspace.as_ref()
    }

    #[must_use]
    pub const fn workspace_id(&self) -> &WorkspaceId {
        self.state.workspace_id()
    }

    #[must_use]
    pub const fn state(&self) -> &ViewState {
        &self.state
    }

    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }
}
