//! Persistence collaborators.
//!
//! A store holds exactly one full (categories, tags) pair. `save` replaces it
//! wholesale; there are no deltas.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use storyshelf_graph::{Category, GraphError, Tag, TagGraph};
use tokio::io::AsyncWriteExt;

pub const SNAPSHOT_FILE_VERSION_V1: &str = "storyshelf_snapshot_v1";

// ============================================================================
// Snapshot state
// ============================================================================

/// The stored form of a snapshot: raw records, no derived data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotState {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl SnapshotState {
    pub fn from_graph(graph: &TagGraph) -> Self {
        let (categories, tags) = graph.to_parts();
        Self { categories, tags }
    }

    pub fn into_graph(self) -> Result<TagGraph, GraphError> {
        TagGraph::build(self.categories, self.tags)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.tags.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFileV1 {
    version: String,
    #[serde(flatten)]
    state: SnapshotState,
}

// ============================================================================
// Store trait
// ============================================================================

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The last stored state, or an empty state if nothing was stored yet.
    async fn load(&self) -> anyhow::Result<SnapshotState>;

    /// Replace the stored state.
    async fn save(&self, state: &SnapshotState) -> anyhow::Result<()>;

    /// Short label for log lines.
    fn describe(&self) -> String;
}

// ============================================================================
// JSON file store
// ============================================================================

/// Pretty-printed JSON document, replaced atomically via `<path>.tmp` + rename.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn load(&self) -> anyhow::Result<SnapshotState> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no stored snapshot; starting empty");
                return Ok(SnapshotState::default());
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "failed to read snapshot {}: {e}",
                    self.path.display()
                ))
            }
        };

        let file: SnapshotFileV1 = serde_json::from_slice(&bytes)
            .map_err(|e| anyhow::anyhow!("invalid snapshot {}: {e}", self.path.display()))?;
        if file.version != SNAPSHOT_FILE_VERSION_V1 {
            return Err(anyhow::anyhow!(
                "unsupported snapshot version '{}' in {} (expected {SNAPSHOT_FILE_VERSION_V1})",
                file.version,
                self.path.display()
            ));
        }
        Ok(file.state)
    }

    async fn save(&self, state: &SnapshotState) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let doc = SnapshotFileV1 {
            version: SNAPSHOT_FILE_VERSION_V1.to_string(),
            state: state.clone(),
        };
        let json = serde_json::to_vec_pretty(&doc)?;
        let tmp = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store. Can be switched into a failing mode to exercise the
/// non-fatal write-back path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<Option<SnapshotState>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: SnapshotState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            ..Self::default()
        }
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Option<SnapshotState> {
        self.state.lock().clone()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load(&self) -> anyhow::Result<SnapshotState> {
        Ok(self.state.lock().clone().unwrap_or_default())
    }

    async fn save(&self, state: &SnapshotState) -> anyhow::Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            anyhow::bail!("memory store is refusing writes");
        }
        *self.state.lock() = Some(state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
