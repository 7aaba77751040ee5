use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::ParseEnumError;
use super::id::{CollaboratorId, UserId, WorkspaceId};

/// Role a collaborator can be granted. Ownership is not grantable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaboratorRole {
    Viewer,
    Editor,
}

impl Default for CollaboratorRole {
    fn default() -> Self {
        Self::Editor
    }
}

impl CollaboratorRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Editor => "editor",
        }
    }
}

/// The viewer's effective role within one workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Editor,
    Viewer,
    /// Not the owner and not on the collaborator list.
    None,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
            Self::None => "none",
        }
    }

    /// Create, edit, change status of, and delete tasks.
    #[must_use]
    pub const fn can_edit_tasks(self) -> bool {
        matches!(self, Self::Owner | Self::Editor)
    }

    /// Rename or delete the workspace and manage collaborators.
    #[must_use]
    pub const fn can_manage_workspace(self) -> bool {
        matches!(self, Self::Owner)
    }
}

impl From<CollaboratorRole> for Role {
    fn from(role: CollaboratorRole) -> Self {
        match role {
            CollaboratorRole::Viewer => Self::Viewer,
            CollaboratorRole::Editor => Self::Editor,
        }
    }
}

/// A collaborator entry on a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    #[serde(rename = "_id")]
    pub id: CollaboratorId,
    pub user_id: UserId,
    pub role: CollaboratorRole,
}

/// A workspace ("todo app" on the wire): a named collection of tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    #[serde(rename = "_id")]
    pub id: WorkspaceId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner_id: UserId,
    #[serde(default)]
    pub collaborators: Vec<Collaborator>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    /// Resolve `user`'s role in this workspace. See [`resolve_role`].
    #[must_use]
    pub fn role_of(&self, user: &UserId) -> Role {
        resolve_role(user, self)
    }
}

/// Resolve a user's role from a workspace's owner and collaborator list.
///
/// The owner check wins over any collaborator entry for the same user. When
/// a user appears on the list more than once the first entry counts.
#[must_use]
pub fn resolve_role(user: &UserId, workspace: &Workspace) -> Role {
    if workspace.owner_id == *user {
        return Role::Owner;
    }
    workspace
        .collaborators
        .iter()
        .find(|collab| collab.user_id == *user)
        .map_or(Role::None, |collab| collab.role.into())
}

/// Body of `POST /todo-apps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWorkspacePayload {
    pub name: String,
    pub description: String,
}

/// Body of `PATCH /todo-apps/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateWorkspacePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UpdateWorkspacePayload {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

/// Body of `POST /todo-apps/{id}/collaborators`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorPayload {
    pub email: String,
    pub role: CollaboratorRole,
}

impl fmt::Display for CollaboratorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollaboratorRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viewer" => Ok(Self::Viewer),
            "editor" => Ok(Self::Editor),
            _ => Err(ParseEnumError {
                expected: "collaborator role",
                got: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace(owner: &str, collabs: &[(&str, CollaboratorRole)]) -> Workspace {
        let ts = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        Workspace {
            id: WorkspaceId::new("ws"),
            name: "Home".into(),
            description: String::new(),
            owner_id: UserId::new(owner),
            collaborators: collabs
                .iter()
                .enumerate()
                .map(|(i, (user, role))| Collaborator {
                    id: CollaboratorId::new(format!("c{i}")),
                    user_id: UserId::new(*user),
                    role: *role,
                })
                .collect(),
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn owner_resolves_to_owner() {
        let ws = workspace("alice", &[]);
        assert_eq!(resolve_role(&UserId::new("alice"), &ws), Role::Owner);
    }

    #[test]
    fn owner_wins_over_collaborator_entry() {
        let ws = workspace("alice", &[("alice", CollaboratorRole::Viewer)]);
        assert_eq!(ws.role_of(&UserId::new("alice")), Role::Owner);
    }

    #[test]
    fn collaborators_resolve_to_their_role() {
        let ws = workspace(
            "alice",
            &[
                ("bob", CollaboratorRole::Editor),
                ("carol", CollaboratorRole::Viewer),
            ],
        );
        assert_eq!(ws.role_of(&UserId::new("bob")), Role::Editor);
        assert_eq!(ws.role_of(&UserId::new("carol")), Role::Viewer);
        assert_eq!(ws.role_of(&UserId::new("dave")), Role::None);
    }

    #[test]
    fn role_permissions() {
        assert!(Role::Owner.can_edit_tasks());
        assert!(Role::Editor.can_edit_tasks());
        assert!(!Role::Viewer.can_edit_tasks());
        assert!(!Role::None.can_edit_tasks());
        assert!(Role::Owner.can_manage_workspace());
        assert!(!Role::Editor.can_manage_workspace());
    }

    #[test]
    fn decodes_backend_workspace() {
        let raw = r#"{
            "_id": "ws1",
            "name": "Groceries",
            "description": "weekly",
            "ownerId": "u1",
            "collaborators": [{"userId": "u2", "role": "viewer", "_id": "c1"}],
            "createdAt": "2025-01-01T00:00:00.000Z",
            "updatedAt": "2025-01-02T00:00:00.000Z"
        }"#;
        let ws: Workspace = serde_json::from_str(raw).unwrap();
        assert_eq!(ws.collaborators.len(), 1);
        assert_eq!(ws.collaborators[0].id.as_str(), "c1");
        assert_eq!(ws.role_of(&UserId::new("u2")), Role::Viewer);
    }

    #[test]
    fn collaborator_role_parses() {
        assert_eq!(
            "Editor".parse::<CollaboratorRole>().unwrap(),
            CollaboratorRole::Editor
        );
        assert!("owner".parse::<CollaboratorRole>().is_err());
    }
}
