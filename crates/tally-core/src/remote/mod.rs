//! Request/response access to the tally backend.
//!
//! The traits here are the seam between the synchronization logic and the
//! network: [`http::HttpClient`] implements them over HTTP, and tests plug in
//! scripted fakes. Every method is a single blocking round trip.

pub mod http;

use crate::model::{
    AuthResponse, CollaboratorId, CollaboratorPayload, CreateTaskPayload, CreateWorkspacePayload,
    LoginCredentials, RegisterCredentials, Task, TaskId, TaskStatus, UpdateTaskPayload,
    UpdateWorkspacePayload, User, UserId, Workspace, WorkspaceId,
};

pub use http::HttpClient;

/// Message used when the server gives no usable error body.
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";

/// Message used when the server's error body has no `message` field.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred while making the request";

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The server answered with a non-success status.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("{0}")]
    Transport(String),

    /// The response body did not match the expected shape.
    #[error("unexpected response from server: {0}")]
    Decode(String),
}

impl RemoteError {
    /// HTTP status of a rejected call.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Authentication and user lookup endpoints.
pub trait AuthApi {
    fn register(&self, credentials: &RegisterCredentials) -> RemoteResult<AuthResponse>;
    fn login(&self, credentials: &LoginCredentials) -> RemoteResult<AuthResponse>;
    fn logout(&self) -> RemoteResult<()>;
    /// The profile of the user the client's token belongs to.
    fn profile(&self) -> RemoteResult<User>;
    fn user_by_id(&self, id: &UserId) -> RemoteResult<User>;
}

/// Workspace ("todo app") and collaborator endpoints.
pub trait WorkspaceApi {
    fn list_workspaces(&self) -> RemoteResult<Vec<Workspace>>;
    fn get_workspace(&self, id: &WorkspaceId) -> RemoteResult<Workspace>;
    fn create_workspace(&self, payload: &CreateWorkspacePayload) -> RemoteResult<Workspace>;
    fn update_workspace(
        &self,
        id: &WorkspaceId,
        payload: &UpdateWorkspacePayload,
    ) -> RemoteResult<Workspace>;
    fn delete_workspace(&self, id: &WorkspaceId) -> RemoteResult<()>;
    fn add_collaborator(
        &self,
        id: &WorkspaceId,
        payload: &CollaboratorPayload,
    ) -> RemoteResult<Workspace>;
    fn remove_collaborator(
        &self,
        id: &WorkspaceId,
        collaborator: &CollaboratorId,
    ) -> RemoteResult<Workspace>;
}

/// Task endpoints.
pub trait TaskApi {
    /// Full current task set of one workspace.
    fn list_tasks(&self, workspace: &WorkspaceId) -> RemoteResult<Vec<Task>>;
    fn get_task(&self, id: &TaskId) -> RemoteResult<Task>;
    fn create_task(&self, payload: &CreateTaskPayload) -> RemoteResult<Task>;
    fn update_task(&self, id: &TaskId, payload: &UpdateTaskPayload) -> RemoteResult<Task>;
    fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> RemoteResult<Task>;
    fn delete_task(&self, id: &TaskId) -> RemoteResult<()>;
}

impl<T: AuthApi + ?Sized> AuthApi for &T {
    fn register(&self, credentials: &RegisterCredentials) -> RemoteResult<AuthResponse> {
        (**self).register(credentials)
    }
    fn login(&self, credentials: &LoginCredentials) -> RemoteResult<AuthResponse> {
        (**self).login(credentials)
    }
    fn logout(&self) -> RemoteResult<()> {
        (**self).logout()
    }
    fn profile(&self) -> RemoteResult<User> {
        (**self).profile()
    }
    fn user_by_id(&self, id: &UserId) -> RemoteResult<User> {
        (**self).user_by_id(id)
    }
}

impl<T: WorkspaceApi + ?Sized> WorkspaceApi for &T {
    fn list_workspaces(&self) -> RemoteResult<Vec<Workspace>> {
        (**self).list_workspaces()
    }
    fn get_workspace(&self, id: &WorkspaceId) -> RemoteResult<Workspace> {
        (**self).get_workspace(id)
    }
    fn create_workspace(&self, payload: &CreateWorkspacePayload) -> RemoteResult<Workspace> {
        (**self).create_workspace(payload)
    }
    fn update_workspace(
        &self,
        id: &WorkspaceId,
        payload: &UpdateWorkspacePayload,
    ) -> RemoteResult<Workspace> {
        (**self).update_workspace(id, payload)
    }
    fn delete_workspace(&self, id: &WorkspaceId) -> RemoteResult<()> {
        (**self).delete_workspace(id)
    }
    fn add_collaborator(
        &self,
        id: &WorkspaceId,
        payload: &CollaboratorPayload,
    ) -> RemoteResult<Workspace> {
        (**self).add_collaborator(id, payload)
    }
    fn remove_collaborator(
        &self,
        id: &WorkspaceId,
        collaborator: &CollaboratorId,
    ) -> RemoteResult<Workspace> {
        (**self).remove_collaborator(id, collaborator)
    }
}

impl<T: TaskApi + ?Sized> TaskApi for &T {
    fn list_tasks(&self, workspace: &WorkspaceId) -> RemoteResult<Vec<Task>> {
        (**self).list_tasks(workspace)
    }
    fn get_task(&self, id: &TaskId) -> RemoteResult<Task> {
        (**self).get_task(id)
    }
    fn create_task(&self, payload: &CreateTaskPayload) -> RemoteResult<Task> {
        (**self).create_task(payload)
    }
    fn update_task(&self, id: &TaskId, payload: &UpdateTaskPayload) -> RemoteResult<Task> {
        (**self).update_task(id, payload)
    }
    fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> RemoteResult<Task> {
        (**self).update_task_status(id, status)
    }
    fn delete_task(&self, id: &TaskId) -> RemoteResult<()> {
        (**self).delete_task(id)
    }
}
