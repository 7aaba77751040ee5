//! Push events delivered outside the request/response cycle.
//!
//! Four named events exist: `taskCreated`, `taskUpdated`, `taskDeleted`,
//! and `collaboratorUpdated`. The wire envelope is
//! `{"event": "<name>", "data": <payload>}`; see [`codec`] for the line
//! format and [`feed`] for subscriptions.

pub mod codec;
pub mod feed;

use serde::{Deserialize, Deserializer, Serialize};

use crate::model::{Task, TaskId, Workspace, WorkspaceId};

pub use codec::{CodecError, decode_line, encode_line};
pub use feed::{Delivery, EventBus, EventSource, HttpEventFeed, STREAM_READ_POLL, Subscription};

/// Every event name the client understands.
pub const EVENT_NAMES: [&str; 4] = [
    "taskCreated",
    "taskUpdated",
    "taskDeleted",
    "collaboratorUpdated",
];

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum PushEvent {
    TaskCreated(Task),
    TaskUpdated(Task),
    TaskDeleted(#[serde(deserialize_with = "task_ref")] TaskId),
    /// The workspace's collaborator list changed; carries the whole record.
    CollaboratorUpdated(Workspace),
}

impl PushEvent {
    /// Wire name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TaskCreated(_) => "taskCreated",
            Self::TaskUpdated(_) => "taskUpdated",
            Self::TaskDeleted(_) => "taskDeleted",
            Self::CollaboratorUpdated(_) => "collaboratorUpdated",
        }
    }

    /// The task this event concerns, if it is a task event.
    #[must_use]
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            Self::TaskCreated(task) | Self::TaskUpdated(task) => Some(&task.id),
            Self::TaskDeleted(id) => Some(id),
            Self::CollaboratorUpdated(_) => None,
        }
    }

    /// The workspace the payload claims to belong to.
    ///
    /// Deletions carry only an id and therefore no workspace.
    #[must_use]
    pub fn workspace_id(&self) -> Option<&WorkspaceId> {
        match self {
            Self::TaskCreated(task) | Self::TaskUpdated(task) => Some(&task.workspace_id),
            Self::TaskDeleted(_) => None,
            Self::CollaboratorUpdated(workspace) => Some(&workspace.id),
        }
    }

    #[must_use]
    pub const fn is_task_event(&self) -> bool {
        !matches!(self, Self::CollaboratorUpdated(_))
    }
}

/// `taskDeleted` carries the bare id; some servers wrap it as `{"_id": ..}`.
fn task_ref<'de, D: Deserializer<'de>>(d: D) -> Result<TaskId, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Ref {
        Bare(TaskId),
        Wrapped {
            #[serde(alias = "_id")]
            id: TaskId,
        },
    }

    Ok(match Ref::deserialize(d)? {
        Ref::Bare(id) | Ref::Wrapped { id } => id,
    })
}
