//! Storage configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name used inside a data directory.
pub const SNAPSHOT_FILE_NAME: &str = "tags.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the JSON snapshot file
    pub snapshot_path: PathBuf,
    /// Persist every new snapshot in the background
    pub write_back: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("./storyshelf").join(SNAPSHOT_FILE_NAME),
            write_back: true,
        }
    }
}

impl StorageConfig {
    /// Config rooted at a data directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            snapshot_path: dir.as_ref().join(SNAPSHOT_FILE_NAME),
            ..Default::default()
        }
    }

    /// Load a JSON config file. Missing fields fall back to the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config {}: {e}", path.display()))?;
        let config = serde_json::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))?;
        Ok(config)
    }
}
