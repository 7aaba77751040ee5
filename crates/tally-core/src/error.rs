use std::fmt;

use crate::model::Role;
use crate::remote::RemoteError;

/// Machine-readable error codes for scripts and agents driving the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotLoggedIn,
    ConfigParseError,
    SessionRejected,
    TaskNotFound,
    WorkspaceNotFound,
    CollaboratorNotFound,
    PermissionDenied,
    InvalidEnumValue,
    InvalidInput,
    RemoteRejected,
    TransportFailed,
    ResponseDecodeFailed,
    EventStreamClosed,
    ViewTornDown,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotLoggedIn => "E1001",
            Self::ConfigParseError => "E1002",
            Self::SessionRejected => "E1003",
            Self::TaskNotFound => "E2001",
            Self::WorkspaceNotFound => "E2002",
            Self::CollaboratorNotFound => "E2006",
            Self::PermissionDenied => "E2003",
            Self::InvalidEnumValue => "E2004",
            Self::InvalidInput => "E2005",
            Self::RemoteRejected => "E3001",
            Self::TransportFailed => "E3002",
            Self::ResponseDecodeFailed => "E3003",
            Self::EventStreamClosed => "E4001",
            Self::ViewTornDown => "E4002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotLoggedIn => "Not logged in",
            Self::ConfigParseError => "Config file parse error",
            Self::SessionRejected => "Stored session was rejected",
            Self::TaskNotFound => "Task not found",
            Self::WorkspaceNotFound => "Workspace not found",
            Self::CollaboratorNotFound => "Collaborator not found",
            Self::PermissionDenied => "Permission denied",
            Self::InvalidEnumValue => "Invalid status/priority/role value",
            Self::InvalidInput => "Invalid input",
            Self::RemoteRejected => "Request rejected by server",
            Self::TransportFailed => "Could not reach server",
            Self::ResponseDecodeFailed => "Unexpected server response",
            Self::EventStreamClosed => "Event stream closed",
            Self::ViewTornDown => "Task view torn down",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotLoggedIn => Some("Run `tally login` first."),
            Self::ConfigParseError => Some("Fix syntax in tally/config.toml and retry."),
            Self::SessionRejected => Some("Your token expired or was revoked; run `tally login`."),
            Self::TaskNotFound | Self::WorkspaceNotFound => None,
            Self::CollaboratorNotFound => Some("List collaborators with `tally collab list`."),
            Self::PermissionDenied => {
                Some("Ask the workspace owner for editor access.")
            }
            Self::InvalidEnumValue => Some(
                "Status: stale|in-progress|completed. Priority: low|medium|high. Role: viewer|editor.",
            ),
            Self::InvalidInput => None,
            Self::RemoteRejected => None,
            Self::TransportFailed => {
                Some("Check the API URL (--api-url, TALLY_API_URL) and your connection.")
            }
            Self::ResponseDecodeFailed => {
                Some("The server may be running an incompatible version.")
            }
            Self::EventStreamClosed => Some("Re-run the command to resubscribe."),
            Self::ViewTornDown => None,
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors surfaced by the tally client library.
///
/// The `Display` output is the single human-readable message shown to the
/// user; the remote's own message is passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TallyError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("You do not have permission to {action} (role: {role})")]
    PermissionDenied { action: &'static str, role: Role },

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("task view for workspace '{0}' has been torn down")]
    TornDown(String),
}

impl TallyError {
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Remote(RemoteError::Rejected { status, .. }) if *status == 401 => {
                ErrorCode::SessionRejected
            }
            Self::Remote(RemoteError::Rejected { status, .. }) if *status == 403 => {
                ErrorCode::PermissionDenied
            }
            Self::Remote(RemoteError::Rejected { .. }) => ErrorCode::RemoteRejected,
            Self::Remote(RemoteError::Transport(_)) => ErrorCode::TransportFailed,
            Self::Remote(RemoteError::Decode(_)) => ErrorCode::ResponseDecodeFailed,
            Self::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            Self::NotLoggedIn => ErrorCode::NotLoggedIn,
            Self::NotFound { kind, .. } => match *kind {
                "workspace" => ErrorCode::WorkspaceNotFound,
                "collaborator" => ErrorCode::CollaboratorNotFound,
                _ => ErrorCode::TaskNotFound,
            },
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::TornDown(_) => ErrorCode::ViewTornDown,
        }
    }

    /// Remediation hint for the error, falling back to the code's summary.
    #[must_use]
    pub fn suggestion(&self) -> String {
        let code = self.error_code();
        code.hint().unwrap_or(code.message()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 15] = [
        ErrorCode::NotLoggedIn,
        ErrorCode::ConfigParseError,
        ErrorCode::SessionRejected,
        ErrorCode::TaskNotFound,
        ErrorCode::WorkspaceNotFound,
        ErrorCode::CollaboratorNotFound,
        ErrorCode::PermissionDenied,
        ErrorCode::InvalidEnumValue,
        ErrorCode::InvalidInput,
        ErrorCode::RemoteRejected,
        ErrorCode::TransportFailed,
        ErrorCode::ResponseDecodeFailed,
        ErrorCode::EventStreamClosed,
        ErrorCode::ViewTornDown,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let code = code.code();
            assert_eq!(code.len(), 5);
            assert!(code.starts_with('E'));
            assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn remote_message_passes_through() {
        let err = TallyError::from(RemoteError::Rejected {
            status: 400,
            message: "Title is required".into(),
        });
        assert_eq!(err.to_string(), "Title is required");
        assert_eq!(err.error_code(), ErrorCode::RemoteRejected);
    }

    #[test]
    fn unauthorized_maps_to_session_rejected() {
        let err = TallyError::from(RemoteError::Rejected {
            status: 401,
            message: "Unauthorized".into(),
        });
        assert_eq!(err.error_code(), ErrorCode::SessionRejected);
        assert!(err.suggestion().contains("tally login"));
    }

    #[test]
    fn permission_message_names_action_and_role() {
        let err = TallyError::PermissionDenied {
            action: "change task status",
            role: Role::Viewer,
        };
        assert_eq!(
            err.to_string(),
            "You do not have permission to change task status (role: viewer)"
        );
    }

    #[test]
    fn not_found_codes_follow_kind() {
        let ws = TallyError::NotFound {
            kind: "workspace",
            id: "w".into(),
        };
        let task = TallyError::NotFound {
            kind: "task",
            id: "t".into(),
        };
        assert_eq!(ws.error_code(), ErrorCode::WorkspaceNotFound);
        assert_eq!(task.error_code(), ErrorCode::TaskNotFound);
    }
}
