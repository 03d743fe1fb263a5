//! Backend setup functions.
//!
//! The messaging backend and the agent runtime each read a small TOML artifact
//! from the work directory, and the messaging backend keeps a session database
//! of registered users. These functions prepare those files. They take explicit
//! paths, are idempotent, and can be called before any controller exists.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default runtime scheduler tick.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 50;

/// File locations of every backend artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendPaths {
    pub messaging_config: PathBuf,
    pub runtime_config: PathBuf,
    pub session_db: PathBuf,
}

impl BackendPaths {
    /// Standard layout inside a work directory.
    pub fn in_dir(workdir: &Path) -> Self {
        Self {
            messaging_config: workdir.join("messaging.toml"),
            runtime_config: workdir.join("runtime.toml"),
            session_db: workdir.join("user_db.json"),
        }
    }
}

/// Contents of `messaging.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagingArtifact {
    pub host: String,
    #[serde(default)]
    pub debug: bool,
}

/// Contents of `runtime.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeArtifact {
    pub host: String,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

impl MessagingArtifact {
    pub fn load(path: &Path) -> io::Result<Self> {
        read_toml(path)
    }
}

impl RuntimeArtifact {
    pub fn load(path: &Path) -> io::Result<Self> {
        read_toml(path)
    }
}

/// Writes the messaging and runtime artifacts for `host`.
///
/// A file is (re)written when it is missing, unreadable, or names another host.
/// Other settings in an existing file are kept. Returns `true` when any file
/// was written.
pub fn ensure_backend_config(paths: &BackendPaths, host: &str) -> io::Result<bool> {
    let mut written = false;

    let messaging = MessagingArtifact::load(&paths.messaging_config).ok();
    if messaging.as_ref().map(|m| m.host.as_str()) != Some(host) {
        let artifact = MessagingArtifact {
            host: host.to_string(),
            debug: messaging.map_or(false, |m| m.debug),
        };
        write_toml(&paths.messaging_config, &artifact)?;
        written = true;
    }

    let runtime = RuntimeArtifact::load(&paths.runtime_config).ok();
    if runtime.as_ref().map(|r| r.host.as_str()) != Some(host) {
        let artifact = RuntimeArtifact {
            host: host.to_string(),
            tick_interval_ms: runtime.map_or(DEFAULT_TICK_INTERVAL_MS, |r| r.tick_interval_ms),
        };
        write_toml(&paths.runtime_config, &artifact)?;
        written = true;
    }

    if written {
        tracing::debug!(
            messaging = %paths.messaging_config.display(),
            runtime = %paths.runtime_config.display(),
            host,
            "Generated backend configuration"
        );
    }
    Ok(written)
}

/// Overwrites the session database with an empty user table for `host`.
pub fn reset_session_db(path: &Path, host: &str) -> io::Result<()> {
    create_parent(path)?;
    let mut users = serde_json::Map::new();
    users.insert(host.to_string(), serde_json::Value::Object(serde_json::Map::new()));
    let json = serde_json::to_string_pretty(&serde_json::Value::Object(users))?;
    fs::write(path, json)
}

fn create_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn write_toml<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    create_parent(path)?;
    let content =
        toml::to_string_pretty(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(path, content)
}

fn read_toml<T: for<'de> Deserialize<'de>>(path: &Path) -> io::Result<T> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
