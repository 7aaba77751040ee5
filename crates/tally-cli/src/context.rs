//! Per-invocation context: config file, API URL, stored session.
//!
//! # API URL resolution
//!
//! 1. `--api-url`
//! 2. `TALLY_API_URL`
//! 3. `[api] base_url` in `config.toml`
//! 4. The built-in default
//!
//! # Password resolution
//!
//! 1. `--password`
//! 2. `TALLY_PASSWORD`
//! 3. One line from stdin (prompted on a terminal)

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context as _;
use tally_core::config::{self, API_URL_ENV, CONFIG_DIR_ENV, ClientConfig};
use tally_core::event::HttpEventFeed;
use tally_core::remote::{HttpClient, RemoteError};
use tally_core::session::{self, Session, SessionFile};
use tally_core::{ErrorCode, TallyError};
use tracing::debug;

use crate::output::{CliError, OutputMode, resolve_output_mode};

pub const PASSWORD_ENV: &str = "TALLY_PASSWORD";

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

/// Real environment reader.
struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        io::stdin().is_terminal()
    }
}

fn resolve_api_url_with(flag: Option<&str>, env: &dyn EnvReader, config: &ClientConfig) -> String {
    config::resolve_api_url(flag, env.get(API_URL_ENV).as_deref(), config)
}

fn resolve_password_with(
    flag: Option<&str>,
    env: &dyn EnvReader,
    stdin: &mut dyn BufRead,
) -> anyhow::Result<String> {
    if let Some(password) = flag.filter(|p| !p.is_empty()) {
        return Ok(password.to_string());
    }
    if let Some(password) = env.get(PASSWORD_ENV) {
        return Ok(password);
    }
    if env.is_tty() {
        eprint!("Password: ");
        io::stderr().flush()?;
    }
    let mut line = String::new();
    stdin.read_line(&mut line).context("reading password from stdin")?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        return Err(TallyError::InvalidInput("password must not be empty".into()).into());
    }
    Ok(password.to_string())
}

/// Everything a command needs besides its own arguments.
#[derive(Debug)]
pub struct Context {
    pub config: ClientConfig,
    pub api_url: String,
    pub output: OutputMode,
    config_dir: Option<PathBuf>,
}

impl Context {
    /// Load `config.toml` and resolve the API URL and output mode.
    ///
    /// # Errors
    ///
    /// Fails with `E1002` when the config file cannot be read or parsed.
    pub fn load(
        api_flag: Option<&str>,
        format_flag: Option<OutputMode>,
        json_flag: bool,
    ) -> anyhow::Result<Self> {
        let config_dir = config::config_dir();
        let config = match &config_dir {
            Some(dir) => config::load_config_from(dir)
                .map_err(|err| CliError::coded(format!("{err:#}"), ErrorCode::ConfigParseError))?,
            None => ClientConfig::default(),
        };
        let api_url = resolve_api_url_with(api_flag, &RealEnv, &config);
        let output = resolve_output_mode(format_flag, json_flag, config.output.clone());
        debug!(api_url = %api_url, ?output, "context loaded");
        Ok(Self {
            config,
            api_url,
            output,
            config_dir,
        })
    }

    /// An unauthenticated client for the configured API.
    pub fn client(&self) -> anyhow::Result<HttpClient> {
        HttpClient::new(&self.api_url, self.config.api.timeout())
            .map_err(|err| TallyError::from(err).into())
    }

    /// The push-event feed of the configured API.
    pub fn event_feed(&self) -> anyhow::Result<HttpEventFeed> {
        HttpEventFeed::new(&self.api_url, &self.config.events.path, self.config.api.timeout())
            .map_err(|err| TallyError::from(err).into())
    }

    pub fn session_file(&self) -> anyhow::Result<SessionFile> {
        self.config_dir.as_deref().map(SessionFile::in_dir).ok_or_else(|| {
            CliError::new(format!(
                "no config directory available; set {CONFIG_DIR_ENV}"
            ))
            .into()
        })
    }

    /// The stored session, without contacting the server.
    pub fn stored_session(&self) -> anyhow::Result<Option<Session>> {
        self.session_file()?.load()
    }

    /// The stored session, validated against the server, plus a client that
    /// carries its token.
    ///
    /// A session the server refuses is removed from disk.
    ///
    /// # Errors
    ///
    /// `E1001` without a stored session, `E1003` when it was refused.
    pub fn require_session(&self) -> anyhow::Result<(Session, HttpClient)> {
        let stored = self.stored_session()?.ok_or(TallyError::NotLoggedIn)?;
        let client = self.client()?.with_token(stored.token.as_str());
        match session::restore(&client, &stored.token) {
            Some(session) => Ok((session, client)),
            None => {
                self.session_file()?.clear()?;
                Err(TallyError::from(RemoteError::Rejected {
                    status: 401,
                    message: ErrorCode::SessionRejected.message().to_string(),
                })
                .into())
            }
        }
    }

    /// Resolve the password for `login`/`register`.
    pub fn password(flag: Option<&str>) -> anyhow::Result<String> {
        let stdin = io::stdin();
        let mut lock = stdin.lock();
        resolve_password_with(flag, &RealEnv, &mut lock)
    }
}
