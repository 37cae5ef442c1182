//! Path resolution for agentlink data files.
//!
//! Resolved once at startup from: CLI `--data-dir` > `AGENTLINK_DATA_DIR` env
//! (handled by clap) > `~/.agentlink/ide`. The resolved directory lives in
//! [`Config`](crate::config::Config) and is passed down explicitly.

use std::path::{Path, PathBuf};

use anyhow::Context;

/// Resolve the data directory, falling back to `~/.agentlink/ide`.
pub fn resolve_data_dir(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    let home = dirs::home_dir().context("HOME directory not found; pass --data-dir")?;
    Ok(home.join(".agentlink").join("ide"))
}

/// Discovery file for the session listening on `port`.
pub fn lockfile_path(data_dir: &Path, port: u16) -> PathBuf {
    data_dir.join(format!("{port}.json"))
}

pub fn log_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

/// Canonical identity of a project: the canonicalized root path, or the path
/// as given when it cannot be canonicalized (e.g. it does not exist yet).
pub fn canonical_project_root(path: &str) -> String {
    std::fs::canonicalize(path)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| path.to_string())
}

pub fn project_name(project_root: &str) -> String {
    Path::new(project_root)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(project_root)
        .to_string()
}
