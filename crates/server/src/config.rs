//! Runtime configuration assembled from CLI flags and environment.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_IDE_NAME: &str = "agentlink";
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `<port>.json` lockfiles and `logs/`.
    pub data_dir: PathBuf,
    /// Host identifier advertised in lockfiles.
    pub ide_name: String,
    /// Version reported in `pluginMetadata`.
    pub version: String,
    /// Quiescence window for selection notifications.
    pub debounce: Duration,
    /// Reject everything but `authenticate` and `ping` until the peer authenticates.
    pub require_auth: bool,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ide_name: DEFAULT_IDE_NAME.to_string(),
            version: crate::VERSION.to_string(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            require_auth: false,
        }
    }
}
