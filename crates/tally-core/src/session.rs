//! Authenticated identity, passed explicitly to whatever needs it.
//!
//! A [`Session`] only comes into existence through [`login`], [`register`]
//! or [`restore`], and ends with [`logout`]. The CLI keeps the token between
//! runs in a [`SessionFile`].

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::TallyError;
use crate::model::{AuthResponse, LoginCredentials, RegisterCredentials, User, UserId};
use crate::remote::{AuthApi, GENERIC_ERROR_MESSAGE, RemoteError, UNKNOWN_ERROR_MESSAGE};

pub const LOGIN_FAILED: &str = "Failed to login";
pub const REGISTER_FAILED: &str = "Failed to register";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

impl Session {
    #[must_use]
    pub fn from_auth(auth: AuthResponse) -> Self {
        Self {
            token: auth.access_token,
            user: auth.user,
        }
    }

    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user.id
    }
}

/// Authenticate with email and password.
///
/// # Errors
///
/// Returns the server's message, or "Failed to login" when it gave none.
pub fn login<A: AuthApi>(api: &A, credentials: &LoginCredentials) -> Result<Session, TallyError> {
    let auth = api
        .login(credentials)
        .map_err(|err| with_fallback(err, LOGIN_FAILED))?;
    info!(user = %auth.user.id, "logged in");
    Ok(Session::from_auth(auth))
}

/// Create an account and sign in to it.
///
/// # Errors
///
/// Returns the server's message, or "Failed to register" when it gave none.
pub fn register<A: AuthApi>(
    api: &A,
    credentials: &RegisterCredentials,
) -> Result<Session, TallyError> {
    let auth = api
        .register(credentials)
        .map_err(|err| with_fallback(err, REGISTER_FAILED))?;
    info!(user = %auth.user.id, "registered");
    Ok(Session::from_auth(auth))
}

/// End `session`. The session is consumed whether or not the server
/// acknowledges the logout.
pub fn logout<A: AuthApi>(api: &A, session: Session) {
    match api.logout() {
        Ok(()) => info!(user = %session.user.id, "logged out"),
        Err(err) => warn!(user = %session.user.id, "remote logout failed: {err}"),
    }
}

/// Validate a stored token by fetching the profile it belongs to.
///
/// `api` must already carry `token`. Returns `None` when the server refuses
/// it; the caller should then discard the stored token.
pub fn restore<A: AuthApi>(api: &A, token: &str) -> Option<Session> {
    match api.profile() {
        Ok(user) => Some(Session {
            token: token.to_string(),
            user,
        }),
        Err(err) => {
            warn!("stored session rejected: {err}");
            None
        }
    }
}

fn with_fallback(err: RemoteError, fallback: &str) -> TallyError {
    match err {
        RemoteError::Rejected { status, message }
            if message == GENERIC_ERROR_MESSAGE || message == UNKNOWN_ERROR_MESSAGE =>
        {
            RemoteError::Rejected {
                status,
                message: fallback.to_string(),
            }
            .into()
        }
        other => other.into(),
    }
}

/// On-disk copy of the current session.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub const FILE_NAME: &'static str = "session.json";

    /// Session file inside `dir`.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(Self::FILE_NAME),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session, if any.
    ///
    /// # Errors
    ///
    /// Fails when the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let session = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(Some(session))
    }

    /// Write `session`, creating the directory if needed. The file is
    /// readable by the owner only on unix.
    ///
    /// # Errors
    ///
    /// Fails when the directory or file cannot be written.
    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(session).context("Failed to encode session")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        restrict_permissions(&self.path)?;
        Ok(())
    }

    /// Remove the stored session. Missing files are fine.
    ///
    /// # Errors
    ///
    /// Fails when an existing file cannot be removed.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to remove {}", self.path.display()))
            }
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteResult;
    use std::cell::Cell;

    struct FakeAuth {
        outcome: RemoteResult<AuthResponse>,
        logout_ok: bool,
        logouts: Cell<usize>,
    }

    fn alice() -> User {
        User {
            id: UserId::new("u1"),
            email: "alice@example.com".into(),
            first_name: "Alice".into(),
            last_name: "Liddell".into(),
        }
    }

    impl AuthApi for FakeAuth {
        fn register(&self, _: &RegisterCredentials) -> RemoteResult<AuthResponse> {
            self.outcome.clone()
        }
        fn login(&self, _: &LoginCredentials) -> RemoteResult<AuthResponse> {
            self.outcome.clone()
        }
        fn logout(&self) -> RemoteResult<()> {
            self.logouts.set(self.logouts.get() + 1);
            if self.logout_ok {
                Ok(())
            } else {
                Err(RemoteError::Transport("connection refused".into()))
            }
        }
        fn profile(&self) -> RemoteResult<User> {
            self.outcome.clone().map(|auth| auth.user)
        }
        fn user_by_id(&self, _: &UserId) -> RemoteResult<User> {
            Ok(alice())
        }
    }

    fn fake(outcome: RemoteResult<AuthResponse>) -> FakeAuth {
        FakeAuth {
            outcome,
            logout_ok: false,
            logouts: Cell::new(0),
        }
    }

    fn creds() -> LoginCredentials {
        LoginCredentials {
            email: "alice@example.com".into(),
            password: "pw".into(),
        }
    }

    #[test]
    fn login_builds_session() {
        let api = fake(Ok(AuthResponse {
            access_token: "tok".into(),
            user: alice(),
        }));
        let session = login(&api, &creds()).unwrap();
        assert_eq!(session.token, "tok");
        assert_eq!(session.user_id().as_str(), "u1");
    }

    #[test]
    fn login_keeps_server_message() {
        let api = fake(Err(RemoteError::Rejected {
            status: 401,
            message: "Invalid credentials".into(),
        }));
        assert_eq!(login(&api, &creds()).unwrap_err().to_string(), "Invalid credentials");
    }

    #[test]
    fn login_and_register_fall_back_to_fixed_messages() {
        let api = fake(Err(RemoteError::Rejected {
            status: 400,
            message: GENERIC_ERROR_MESSAGE.into(),
        }));
        assert_eq!(login(&api, &creds()).unwrap_err().to_string(), LOGIN_FAILED);

        let reg = RegisterCredentials {
            email: "a@b.c".into(),
            password: "pw".into(),
            first_name: "A".into(),
            last_name: "B".into(),
        };
        assert_eq!(register(&api, &reg).unwrap_err().to_string(), REGISTER_FAILED);
    }

    #[test]
    fn logout_tolerates_remote_failure() {
        let api = fake(Err(RemoteError::Transport("x".into())));
        let session = Session {
            token: "tok".into(),
            user: alice(),
        };
        logout(&api, session);
        assert_eq!(api.logouts.get(), 1);
    }

    #[test]
    fn restore_validates_token() {
        let ok = fake(Ok(AuthResponse {
            access_token: "ignored".into(),
            user: alice(),
        }));
        assert_eq!(restore(&ok, "tok").map(|s| s.token), Some("tok".to_string()));

        let rejected = fake(Err(RemoteError::Rejected {
            status: 401,
            message: "Unauthorized".into(),
        }));
        assert!(restore(&rejected, "tok").is_none());
    }

    #[test]
    fn session_file_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::in_dir(&dir.path().join("nested"));
        assert!(file.load().unwrap().is_none());

        let session = Session {
            token: "tok".into(),
            user: alice(),
        };
        file.save(&session).unwrap();
        assert_eq!(file.load().unwrap(), Some(session));

        file.clear().unwrap();
        assert!(file.load().unwrap().is_none());
        file.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::in_dir(dir.path());
        file.save(&Session {
            token: "tok".into(),
            user: alice(),
        })
        .unwrap();
        let mode = fs::metadata(file.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn corrupt_session_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::in_dir(dir.path());
        fs::write(file.path(), "{not json").unwrap();
        assert!(file.load().is_err());
    }
}
