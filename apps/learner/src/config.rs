use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;

pub const CONFIG_FILE: &str = "learner.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub session_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".into(),
            poll_interval_secs: 60,
            request_timeout_secs: 30,
            session_file: default_session_file(),
        }
    }
}

fn default_session_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("peer-review")
        .join("session.toml")
}

/// Defaults, then the config file, then environment overrides. An explicit
/// `config_path` must exist; the default `learner.toml` is optional.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let file = match config_path {
        Some(path) => Some(read_config_file(path)?),
        None => read_config_file(Path::new(CONFIG_FILE)).ok(),
    };
    Ok(resolve_settings(file.as_ref(), |key| std::env::var(key).ok()))
}

fn read_config_file(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    let table = toml::from_str::<HashMap<String, toml::Value>>(&raw)
        .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
    Ok(table
        .into_iter()
        .map(|(key, value)| match value {
            toml::Value::String(text) => (key, text),
            other => (key, other.to_string()),
        })
        .collect())
}

pub fn resolve_settings(
    file: Option<&HashMap<String, String>>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(file_cfg) = file {
        if let Some(v) = file_cfg.get("server_url") {
            settings.server_url = v.clone();
        }
        if let Some(v) = file_cfg.get("poll_interval_secs").and_then(|v| parse_secs(v)) {
            settings.poll_interval_secs = v;
        }
        if let Some(v) = file_cfg.get("request_timeout_secs").and_then(|v| parse_secs(v)) {
            settings.request_timeout_secs = v;
        }
        if let Some(v) = file_cfg.get("session_file") {
            settings.session_file = PathBuf::from(v);
        }
    }

    if let Some(v) = env_override(&env, "PEER_REVIEW_SERVER_URL", "APP__SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env_override(&env, "PEER_REVIEW_POLL_INTERVAL_SECS", "APP__POLL_INTERVAL_SECS")
        .and_then(|v| parse_secs(&v))
    {
        settings.poll_interval_secs = v;
    }
    if let Some(v) = env_override(&env, "PEER_REVIEW_REQUEST_TIMEOUT_SECS", "APP__REQUEST_TIMEOUT_SECS")
        .and_then(|v| parse_secs(&v))
    {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = env_override(&env, "PEER_REVIEW_SESSION_FILE", "APP__SESSION_FILE") {
        settings.session_file = PathBuf::from(v);
    }

    settings
}

/// `APP__*` wins over the plain name when both are set.
fn env_override(env: &impl Fn(&str) -> Option<String>, name: &str, app_name: &str) -> Option<String> {
    env(app_name).or_else(|| env(name))
}

fn parse_secs(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|secs| *secs > 0)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
