use std::{fs, io::ErrorKind, path::Path};

use anyhow::Context;
use client_core::Session;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

pub fn load(path: &Path) -> anyhow::Result<Option<Session>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read session file '{}'", path.display()))
        }
    };
    let stored: StoredSession = toml::from_str(&raw)
        .with_context(|| format!("failed to parse session file '{}'", path.display()))?;
    Ok(Some(Session::new(stored.access_token, stored.token_type)))
}

pub fn save(path: &Path, session: &Session) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("failed to create session directory '{}'", parent.display())
        })?;
    }
    let stored = StoredSession {
        access_token: session.token().to_string(),
        token_type: session.token_type().to_string(),
    };
    fs::write(path, toml::to_string(&stored)?)
        .with_context(|| format!("failed to write session file '{}'", path.display()))
}

/// Returns whether a file was removed.
pub fn remove(path: &Path) -> anyhow::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err)
            .with_context(|| format!("failed to remove session file '{}'", path.display())),
    }
}
