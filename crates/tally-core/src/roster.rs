//! Collaborator roster and membership changes.

use serde::Serialize;
use tracing::{info, warn};

use crate::dashboard::require_owner;
use crate::error::TallyError;
use crate::model::{
    Collaborator, CollaboratorId, CollaboratorPayload, CollaboratorRole, User, Workspace,
};
use crate::remote::{AuthApi, WorkspaceApi};
use crate::session::Session;

pub const UNKNOWN_USER: &str = "Unknown User";

/// One collaborator joined with its user record, when that could be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    pub collaborator: Collaborator,
    pub user: Option<User>,
}

impl RosterEntry {
    #[must_use]
    pub fn label(&self) -> String {
        self.user
            .as_ref()
            .map_or_else(|| UNKNOWN_USER.to_string(), User::display_name)
    }
}

/// Resolve every collaborator of `workspace` to a user. A failed lookup
/// yields an entry without a user instead of failing the roster.
pub fn roster<A: AuthApi>(api: &A, workspace: &Workspace) -> Vec<RosterEntry> {
    workspace
        .collaborators
        .iter()
        .map(|collaborator| {
            let user = match api.user_by_id(&collaborator.user_id) {
                Ok(user) => Some(user),
                Err(err) => {
                    warn!(user = %collaborator.user_id, "collaborator lookup failed: {err}");
                    None
                }
            };
            RosterEntry {
                collaborator: collaborator.clone(),
                user,
            }
        })
        .collect()
}

/// Invite `email` to `workspace` with `role`. Owner only.
///
/// # Errors
///
/// Returns [`TallyError::PermissionDenied`] before any remote call,
/// [`TallyError::InvalidInput`] for an implausible email, or the remote
/// failure.
pub fn add_collaborator<A: WorkspaceApi>(
    api: &A,
    session: &Session,
    workspace: &Workspace,
    email: &str,
    role: CollaboratorRole,
) -> Result<Workspace, TallyError> {
    require_owner(session, workspace, "manage collaborators")?;
    let email = email.trim();
    if !looks_like_email(email) {
        return Err(TallyError::InvalidInput(format!("'{email}' is not an email address")));
    }
    let updated = api.add_collaborator(
        &workspace.id,
        &CollaboratorPayload {
            email: email.to_string(),
            role,
        },
    )?;
    info!(workspace = %workspace.id, %role, "collaborator added");
    Ok(updated)
}

/// Remove a collaborator entry from `workspace`. Owner only.
///
/// # Errors
///
/// Returns [`TallyError::PermissionDenied`], [`TallyError::NotFound`] when
/// the entry is not on the workspace, or the remote failure.
pub fn remove_collaborator<A: WorkspaceApi>(
    api: &A,
    session: &Session,
    workspace: &Workspace,
    collaborator: &CollaboratorId,
) -> Result<Workspace, TallyError> {
    require_owner(session, workspace, "manage collaborators")?;
    if !workspace.collaborators.iter().any(|c| c.id == *collaborator) {
        return Err(TallyError::NotFound {
            kind: "collaborator",
            id: collaborator.to_string(),
        });
    }
    let updated = api.remove_collaborator(&workspace.id, collaborator)?;
    info!(workspace = %workspace.id, collaborator = %collaborator, "collaborator removed");
    Ok(updated)
}

fn looks_like_email(email: &str) -> bool {
    email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
    })
}
