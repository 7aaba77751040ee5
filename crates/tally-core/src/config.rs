use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::view::UpdateScope;

pub const DEFAULT_API_URL: &str = "https://todo-app-production-8c59.up.railway.app/";
pub const CONFIG_DIR_ENV: &str = "TALLY_CONFIG_DIR";
pub const API_URL_ENV: &str = "TALLY_API_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_events_path")]
    pub path: String,
    /// Ignore `taskUpdated` events naming another workspace.
    #[serde(default)]
    pub scope_updates: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            path: default_events_path(),
            scope_updates: false,
        }
    }
}

impl EventsConfig {
    #[must_use]
    pub const fn update_scope(&self) -> UpdateScope {
        if self.scope_updates {
            UpdateScope::Workspace
        } else {
            UpdateScope::Unscoped
        }
    }
}

/// Directory holding `config.toml` and `session.json`.
///
/// `TALLY_CONFIG_DIR` wins; otherwise `<platform config dir>/tally`.
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = env::var_os(CONFIG_DIR_ENV).filter(|dir| !dir.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|dir| dir.join("tally"))
}

pub fn load_config_from(dir: &Path) -> Result<ClientConfig> {
    let path = dir.join("config.toml");
    if !path.exists() {
        return Ok(ClientConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ClientConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Pick the API base URL: flag, then environment, then config, then the
/// built-in default. Blank values are skipped.
#[must_use]
pub fn resolve_api_url(
    flag: Option<&str>,
    env_value: Option<&str>,
    config: &ClientConfig,
) -> String {
    [flag, env_value, config.api.base_url.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or(DEFAULT_API_URL)
        .to_string()
}

/// Resolve the output mode: `--json`, then `FORMAT`, then config, then
/// pretty on a terminal and text otherwise.
pub fn resolve_output(
    cli_json: bool,
    user_output: Option<String>,
    env_format: Option<String>,
) -> Result<String> {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "plain" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return Ok("json".to_string());
    }

    if let Some(mode) = env_format.as_deref().and_then(normalize_output_mode) {
        return Ok(mode.to_string());
    }

    if let Some(mode) = user_output.as_deref().and_then(normalize_output_mode) {
        return Ok(mode.to_string());
    }

    if std::io::stdout().is_terminal() {
        Ok("pretty".to_string())
    } else {
        Ok("text".to_string())
    }
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_events_path() -> String {
    "/events".to_string()
}
