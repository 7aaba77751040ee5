//! Blocking HTTP implementation of the remote traits.
//!
//! Requests carry `Authorization: Bearer <token>` when the client was built
//! with a token, send JSON bodies, and map non-success statuses to
//! [`RemoteError::Rejected`] using the server's `message` field.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{
    AuthApi, GENERIC_ERROR_MESSAGE, RemoteError, RemoteResult, TaskApi, UNKNOWN_ERROR_MESSAGE,
    WorkspaceApi,
};
use crate::model::{
    AuthResponse, CollaboratorId, CollaboratorPayload, CreateTaskPayload, CreateWorkspacePayload,
    LoginCredentials, RegisterCredentials, Task, TaskId, TaskStatus, UpdateTaskPayload,
    UpdateTaskStatusPayload, UpdateWorkspacePayload, User, UserId, Workspace, WorkspaceId,
};

const USER_AGENT: &str = concat!("tally/", env!("CARGO_PKG_VERSION"));

/// REST client for the tally backend.
#[derive(Debug, Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
    base: Url,
    token: Option<String>,
}

impl HttpClient {
    /// Build a client for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Transport`] when `base_url` is not an absolute
    /// http(s) URL.
    pub fn new(base_url: &str, timeout: Duration) -> RemoteResult<Self> {
        let base = parse_base_url(base_url)?;
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build();
        Ok(Self {
            agent,
            base,
            token: None,
        })
    }

    /// Attach a bearer token to every subsequent request.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    #[must_use]
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        join_segments(&self.base, segments)
    }

    fn call(&self, method: &str, url: &Url, body: Option<Value>) -> RemoteResult<ureq::Response> {
        let mut request = self
            .agent
            .request(method, url.as_str())
            .set("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        debug!(method, url = %url, "api request");
        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };
        result.map_err(map_ureq_error)
    }

    fn get<T: DeserializeOwned>(&self, url: &Url) -> RemoteResult<T> {
        decode(self.call("GET", url, None)?)
    }

    fn send<T: DeserializeOwned>(
        &self,
        method: &str,
        url: &Url,
        body: Option<&impl Serialize>,
    ) -> RemoteResult<T> {
        let body = body.map(encode).transpose()?;
        decode(self.call(method, url, body)?)
    }

    /// Call an endpoint whose response body is irrelevant (204 or an echo).
    fn send_discard(&self, method: &str, url: &Url) -> RemoteResult<()> {
        self.call(method, url, None).map(drop)
    }
}

pub(crate) fn parse_base_url(raw: &str) -> RemoteResult<Url> {
    let base = Url::parse(raw.trim())
        .map_err(|err| RemoteError::Transport(format!("invalid API URL '{raw}': {err}")))?;
    if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
        return Err(RemoteError::Transport(format!(
            "invalid API URL '{raw}': expected an http(s) URL"
        )));
    }
    Ok(base)
}

/// Append path segments to `base`, percent-encoding each one.
///
/// A trailing slash on the base path does not produce an empty segment.
pub(crate) fn join_segments(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

pub(crate) fn map_ureq_error(err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Status(status, response) => {
            let message = response.into_string().map_or_else(
                |_| UNKNOWN_ERROR_MESSAGE.to_string(),
                |body| message_from_body(&body),
            );
            RemoteError::Rejected { status, message }
        }
        ureq::Error::Transport(transport) => RemoteError::Transport(transport.to_string()),
    }
}

/// Extract the human message from an error body.
///
/// Undecodable bodies yield [`UNKNOWN_ERROR_MESSAGE`]; JSON bodies without a
/// usable `message` yield [`GENERIC_ERROR_MESSAGE`]. Validation errors that
/// carry a list of messages are joined with `; `.
pub(crate) fn message_from_body(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return UNKNOWN_ERROR_MESSAGE.to_string();
    };
    match value.get("message") {
        Some(Value::String(message)) if !message.trim().is_empty() => message.clone(),
        Some(Value::Array(items)) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            if parts.is_empty() {
                GENERIC_ERROR_MESSAGE.to_string()
            } else {
                parts.join("; ")
            }
        }
        _ => GENERIC_ERROR_MESSAGE.to_string(),
    }
}

fn encode(body: &impl Serialize) -> RemoteResult<Value> {
    serde_json::to_value(body).map_err(|err| RemoteError::Decode(err.to_string()))
}

fn decode<T: DeserializeOwned>(response: ureq::Response) -> RemoteResult<T> {
    response
        .into_json::<T>()
        .map_err(|err| RemoteError::Decode(err.to_string()))
}

/// The fetch-by-id endpoint for workspaces answers with either the record or
/// a one-element array holding it.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum OneOrFirst<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrFirst<T> {
    fn into_first(self) -> Option<T> {
        match self {
            Self::One(value) => Some(value),
            Self::Many(values) => values.into_iter().next(),
        }
    }
}

impl AuthApi for HttpClient {
    fn register(&self, credentials: &RegisterCredentials) -> RemoteResult<AuthResponse> {
        self.send("POST", &self.endpoint(&["auth", "register"]), Some(credentials))
    }

    fn login(&self, credentials: &LoginCredentials) -> RemoteResult<AuthResponse> {
        self.send("POST", &self.endpoint(&["auth", "login"]), Some(credentials))
    }

    fn logout(&self) -> RemoteResult<()> {
        self.send_discard("POST", &self.endpoint(&["auth", "logout"]))
    }

    fn profile(&self) -> RemoteResult<User> {
        self.get(&self.endpoint(&["api", "users", "profile"]))
    }

    fn user_by_id(&self, id: &UserId) -> RemoteResult<User> {
        self.get(&self.endpoint(&["users", id.as_str()]))
    }
}

impl WorkspaceApi for HttpClient {
    fn list_workspaces(&self) -> RemoteResult<Vec<Workspace>> {
        self.get(&self.endpoint(&["todo-apps"]))
    }

    fn get_workspace(&self, id: &WorkspaceId) -> RemoteResult<Workspace> {
        let found: OneOrFirst<Workspace> = self.get(&self.endpoint(&["todo-apps", id.as_str()]))?;
        found.into_first().ok_or_else(|| RemoteError::Rejected {
            status: 404,
            message: "Workspace not found".to_string(),
        })
    }

    fn create_workspace(&self, payload: &CreateWorkspacePayload) -> RemoteResult<Workspace> {
        self.send("POST", &self.endpoint(&["todo-apps"]), Some(payload))
    }

    fn update_workspace(
        &self,
        id: &WorkspaceId,
        payload: &UpdateWorkspacePayload,
    ) -> RemoteResult<Workspace> {
        self.send(
            "PATCH",
            &self.endpoint(&["todo-apps", id.as_str()]),
            Some(payload),
        )
    }

    fn delete_workspace(&self, id: &WorkspaceId) -> RemoteResult<()> {
        self.send_discard("DELETE", &self.endpoint(&["todo-apps", id.as_str()]))
    }

    fn add_collaborator(
        &self,
        id: &WorkspaceId,
        payload: &CollaboratorPayload,
    ) -> RemoteResult<Workspace> {
        self.send(
            "POST",
            &self.endpoint(&["todo-apps", id.as_str(), "collaborators"]),
            Some(payload),
        )
    }

    fn remove_collaborator(
        &self,
        id: &WorkspaceId,
        collaborator: &CollaboratorId,
    ) -> RemoteResult<Workspace> {
        let url = self.endpoint(&[
            "todo-apps",
            id.as_str(),
            "collaborators",
            collaborator.as_str(),
        ]);
        decode(self.call("DELETE", &url, None)?)
    }
}

impl TaskApi for HttpClient {
    fn list_tasks(&self, workspace: &WorkspaceId) -> RemoteResult<Vec<Task>> {
        let mut url = self.endpoint(&["tasks"]);
        url.query_pairs_mut()
            .append_pair("todoAppId", workspace.as_str());
        self.get(&url)
    }

    fn get_task(&self, id: &TaskId) -> RemoteResult<Task> {
        self.get(&self.endpoint(&["tasks", id.as_str()]))
    }

    fn create_task(&self, payload: &CreateTaskPayload) -> RemoteResult<Task> {
        self.send("POST", &self.endpoint(&["tasks"]), Some(payload))
    }

    fn update_task(&self, id: &TaskId, payload: &UpdateTaskPayload) -> RemoteResult<Task> {
        self.send("PATCH", &self.endpoint(&["tasks", id.as_str()]), Some(payload))
    }

    fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> RemoteResult<Task> {
        self.send(
            "PATCH",
            &self.endpoint(&["tasks", id.as_str(), "status"]),
            Some(&UpdateTaskStatusPayload { status }),
        )
    }

    fn delete_task(&self, id: &TaskId) -> RemoteResult<()> {
        self.send_discard("DELETE", &self.endpoint(&["tasks", id.as_str()]))
    }
}
