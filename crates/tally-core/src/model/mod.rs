//! Records exchanged with the backend: tasks, workspaces, users.

pub mod id;
pub mod task;
pub mod user;
pub mod workspace;

use std::fmt;

pub use id::{CollaboratorId, TaskId, UserId, WorkspaceId};
pub use task::{
    CreateTaskPayload, Task, TaskPriority, TaskStatus, UpdateTaskPayload,
    UpdateTaskStatusPayload, parse_due_date,
};
pub use user::{AuthResponse, LoginCredentials, RegisterCredentials, User};
pub use workspace::{
    Collaborator, CollaboratorPayload, CollaboratorRole, CreateWorkspacePayload, Role,
    UpdateWorkspacePayload, Workspace, resolve_role,
};

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}
