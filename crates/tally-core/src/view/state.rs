//! Owned task mapping for one workspace and the reducer that mutates it.
//!
//! [`ViewState`] is plain data: no I/O and no subscriptions. Every change
//! goes through [`ViewState::apply`] or [`ViewState::load_snapshot`], so the
//! state after any sequence of inputs is a function of that sequence alone.

use std::collections::VecDeque;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::event::PushEvent;
use crate::model::{Task, TaskId, WorkspaceId};

/// Upper bound on events held while waiting for the first snapshot.
pub const PENDING_LIMIT: usize = 4096;

/// How `taskUpdated` events are matched against the active workspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdateScope {
    /// Replace any known task regardless of the workspace it names.
    #[default]
    Unscoped,
    /// Ignore updates whose record names a different workspace.
    Workspace,
}

/// What an input did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Inserted,
    Replaced,
    Removed,
    /// Held until the snapshot lands.
    Buffered,
    /// The record belongs to another workspace.
    IgnoredForeign,
    /// Update or delete for a task this view has never seen.
    IgnoredUnknown,
    /// Not a task event; the reducer leaves it to its caller.
    NotTaskEvent,
    /// The view no longer accepts input.
    Detached,
    /// The held workspace record (and with it the role) was replaced.
    WorkspaceRefreshed,
}

impl ApplyOutcome {
    /// Returns `true` when the task mapping changed.
    #[must_use]
    pub const fn changed(self) -> bool {
        matches!(self, Self::Inserted | Self::Replaced | Self::Removed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Replaced => "replaced",
            Self::Removed => "removed",
            Self::Buffered => "buffered",
            Self::IgnoredForeign => "ignored-foreign",
            Self::IgnoredUnknown => "ignored-unknown",
            Self::NotTaskEvent => "not-task-event",
            Self::Detached => "detached",
            Self::WorkspaceRefreshed => "workspace-refreshed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    workspace_id: WorkspaceId,
    tasks: IndexMap<TaskId, Task>,
    loaded: bool,
    pending: VecDeque<PushEvent>,
    scope: UpdateScope,
}

impl ViewState {
    /// Empty, not-yet-loaded state for `workspace_id`.
    #[must_use]
    pub fn new(workspace_id: WorkspaceId) -> Self {
        Self {
            workspace_id,
            tasks: IndexMap::new(),
            loaded: false,
            pending: VecDeque::new(),
            scope: UpdateScope::default(),
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: UpdateScope) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub const fn workspace_id(&self) -> &WorkspaceId {
        &self.workspace_id
    }

    #[must_use]
    pub const fn scope(&self) -> UpdateScope {
        self.scope
    }

    /// Whether a snapshot has been applied.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Tasks in arrival order: snapshot order, then creations appended.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Events waiting for the snapshot.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Apply one push event.
    ///
    /// Before the first snapshot, task events are buffered and replayed by
    /// [`ViewState::load_snapshot`]. `collaboratorUpdated` is never handled
    /// here.
    pub fn apply(&mut self, event: &PushEvent) -> ApplyOutcome {
        if !event.is_task_event() {
            return ApplyOutcome::NotTaskEvent;
        }
        if !self.loaded {
            if self.pending.len() >= PENDING_LIMIT {
                if let Some(dropped) = self.pending.pop_front() {
                    warn!(
                        workspace = %self.workspace_id,
                        event = dropped.name(),
                        "pre-snapshot buffer full, dropping oldest event"
                    );
                }
            }
            self.pending.push_back(event.clone());
            return ApplyOutcome::Buffered;
        }
        self.apply_loaded(event)
    }

    fn apply_loaded(&mut self, event: &PushEvent) -> ApplyOutcome {
        let outcome = match event {
            PushEvent::TaskCreated(task) => {
                if task.workspace_id != self.workspace_id {
                    ApplyOutcome::IgnoredForeign
                } else if self.tasks.insert(task.id.clone(), task.clone()).is_some() {
                    ApplyOutcome::Replaced
                } else {
                    ApplyOutcome::Inserted
                }
            }
            PushEvent::TaskUpdated(task) => {
                if self.scope == UpdateScope::Workspace && task.workspace_id != self.workspace_id {
                    ApplyOutcome::IgnoredForeign
                } else if let Some(slot) = self.tasks.get_mut(&task.id) {
                    *slot = task.clone();
                    ApplyOutcome::Replaced
                } else {
                    ApplyOutcome::IgnoredUnknown
                }
            }
            PushEvent::TaskDeleted(id) => {
                if self.tasks.shift_remove(id).is_some() {
                    ApplyOutcome::Removed
                } else {
                    ApplyOutcome::IgnoredUnknown
                }
            }
            PushEvent::CollaboratorUpdated(_) => ApplyOutcome::NotTaskEvent,
        };
        if !outcome.changed() {
            debug!(
                workspace = %self.workspace_id,
                event = event.name(),
                ?outcome,
                "push event left view unchanged"
            );
        }
        outcome
    }

    /// Replace the mapping with `tasks` and replay buffered events on top.
    ///
    /// A buffered update older than the copy already in the mapping is
    /// dropped so replay cannot regress a fresher snapshot record. Returns
    /// the number of buffered events that changed the mapping.
    pub fn load_snapshot(&mut self, tasks: Vec<Task>) -> usize {
        self.tasks = tasks
            .into_iter()
            .map(|task| (task.id.clone(), task))
            .collect();
        self.loaded = true;

        let mut replayed = 0;
        while let Some(event) = self.pending.pop_front() {
            if let PushEvent::TaskUpdated(update) = &event {
                if self
                    .tasks
                    .get(&update.id)
                    .is_some_and(|held| update.updated_at < held.updated_at)
                {
                    debug!(task = %update.id, "dropping stale buffered update");
                    continue;
                }
            }
            if self.apply_loaded(&event).changed() {
                replayed += 1;
            }
        }
        replayed
    }

    /// Record a failed snapshot fetch: the mapping is emptied and the view
    /// stays unloaded. Buffered events are kept for the next attempt.
    pub fn mark_failed(&mut self) {
        self.tasks.clear();
        self.loaded = false;
    }

    /// Drop everything, including buffered events.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.pending.clear();
        self.loaded = false;
    }
}

/// Pure form of [`ViewState::apply`].
#[must_use]
pub fn apply_event(mut state: ViewState, event: &PushEvent) -> ViewState {
    state.apply(event);
    state
}
