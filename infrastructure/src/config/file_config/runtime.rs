//! Registry and logging locations from TOML (`[registry]`, `[logging]`)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw registry configuration from TOML
///
/// ```toml
/// [registry]
/// path = "~/.local/share/blockhand/registry.json"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRegistryConfig {
    /// Collaborator registry document. Defaults to the user data directory.
    pub path: Option<String>,
}

impl FileRegistryConfig {
    /// Resolve the registry path, expanding a leading `~/`.
    ///
    /// Falls back to `$XDG_DATA_HOME/blockhand/registry.json`, then to
    /// `./registry.json` when no data directory is known.
    pub fn resolve_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => expand_home(path),
            None => dirs::data_dir()
                .map(|d| d.join("blockhand").join("registry.json"))
                .unwrap_or_else(|| PathBuf::from("registry.json")),
        }
    }
}

/// Raw logging configuration from TOML
///
/// ```toml
/// [logging]
/// file = "blockhand.log"             # tracing output, in addition to stderr
/// activity_log = "activity.jsonl"    # structured activity events
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    pub file: Option<String>,
    pub activity_log: Option<String>,
}

impl FileLoggingConfig {
    pub fn file_path(&self) -> Option<PathBuf> {
        self.file.as_deref().map(expand_home)
    }

    pub fn activity_log_path(&self) -> Option<PathBuf> {
        self.activity_log.as_deref().map(expand_home)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
