//! Workspace dashboard: listing and managing the workspaces a user can see.

use serde::Serialize;
use tracing::info;

use crate::error::TallyError;
use crate::model::{
    CreateWorkspacePayload, Role, UpdateWorkspacePayload, Workspace, WorkspaceId, resolve_role,
};
use crate::remote::{RemoteError, WorkspaceApi};
use crate::session::Session;

/// A workspace together with the session user's role in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardEntry {
    #[serde(flatten)]
    pub workspace: Workspace,
    pub role: Role,
}

/// Every workspace the user owns or collaborates on.
///
/// # Errors
///
/// Returns the remote failure.
pub fn list_workspaces<A: WorkspaceApi>(
    api: &A,
    session: &Session,
) -> Result<Vec<DashboardEntry>, TallyError> {
    let workspaces = api.list_workspaces()?;
    Ok(workspaces
        .into_iter()
        .map(|workspace| DashboardEntry {
            role: resolve_role(session.user_id(), &workspace),
            workspace,
        })
        .collect())
}

/// Fetch one workspace; a 404 becomes [`TallyError::NotFound`].
///
/// # Errors
///
/// Returns [`TallyError::NotFound`] or the remote failure.
pub fn get_workspace<A: WorkspaceApi>(api: &A, id: &WorkspaceId) -> Result<Workspace, TallyError> {
    api.get_workspace(id).map_err(|err| match err {
        RemoteError::Rejected { status: 404, .. } => TallyError::NotFound {
            kind: "workspace",
            id: id.to_string(),
        },
        other => other.into(),
    })
}

/// Create a workspace owned by the session user.
///
/// # Errors
///
/// Returns [`TallyError::InvalidInput`] for a blank name, or the remote
/// failure.
pub fn create_workspace<A: WorkspaceApi>(
    api: &A,
    name: &str,
    description: &str,
) -> Result<Workspace, TallyError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TallyError::InvalidInput("workspace name must not be empty".into()));
    }
    let workspace = api.create_workspace(&CreateWorkspacePayload {
        name: name.to_string(),
        description: description.trim().to_string(),
    })?;
    info!(workspace = %workspace.id, "workspace created");
    Ok(workspace)
}

/// Rename or re-describe a workspace. Owner only.
///
/// # Errors
///
/// Returns [`TallyError::PermissionDenied`] before any write when the user
/// is not the owner, [`TallyError::InvalidInput`] when nothing would change,
/// or the remote failure.
pub fn update_workspace<A: WorkspaceApi>(
    api: &A,
    session: &Session,
    id: &WorkspaceId,
    payload: &UpdateWorkspacePayload,
) -> Result<Workspace, TallyError> {
    if payload.is_empty() {
        return Err(TallyError::InvalidInput("nothing to update".into()));
    }
    if payload.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(TallyError::InvalidInput("workspace name must not be empty".into()));
    }
    let current = get_workspace(api, id)?;
    require_owner(session, &current, "edit this workspace")?;
    let workspace = api.update_workspace(id, payload)?;
    info!(workspace = %workspace.id, "workspace updated");
    Ok(workspace)
}

/// Delete a workspace. Owner only, checked before the delete is sent.
///
/// # Errors
///
/// Returns [`TallyError::PermissionDenied`] or the remote failure.
pub fn delete_workspace<A: WorkspaceApi>(
    api: &A,
    session: &Session,
    id: &WorkspaceId,
) -> Result<(), TallyError> {
    let current = get_workspace(api, id)?;
    require_owner(session, &current, "delete this workspace")?;
    api.delete_workspace(id)?;
    info!(workspace = %id, "workspace deleted");
    Ok(())
}

pub(crate) fn require_owner(
    session: &Session,
    workspace: &Workspace,
    action: &'static str,
) -> Result<(), TallyError> {
    let role = resolve_role(session.user_id(), workspace);
    if role.can_manage_workspace() {
        Ok(())
    } else {
        Err(TallyError::PermissionDenied { action, role })
    }
}
