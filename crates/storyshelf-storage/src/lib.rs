//! Storyshelf tag library storage
//!
//! ```text
//!   caller ──mutate──► TagLibrary ──copy-and-mutate──► TagGraph (new)
//!                          │  swap Arc under writer lock
//!                          ▼
//!                      WriteBack ──latest snapshot only──► SnapshotStore
//!                                                          (JSON file / memory)
//! ```
//!
//! - **Single writer**: mutations are serialized; reads never wait on them
//! - **Latest wins**: bursts of changes coalesce into one write of the newest
//!   snapshot
//! - **Non-fatal persistence**: a failed write is logged and the in-memory
//!   snapshot stays authoritative

pub mod config;
pub mod library;
pub mod persistence;
pub mod writer;


use std::path::Path;

pub use config::{StorageConfig, SNAPSHOT_FILE_NAME};
pub use library::TagLibrary;
pub use persistence::{
    JsonFileStore, MemoryStore, SnapshotState, SnapshotStore, SNAPSHOT_FILE_VERSION_V1,
};
pub use writer::{WriteBack, WriteStatus};

// ============================================================================
// Convenience Functions
// ============================================================================

/// Open the library stored in `data_dir` (`tags.json`), with write-back.
pub async fn open_library(data_dir: impl AsRef<Path>) -> anyhow::Result<TagLibrary> {
    TagLibrary::open_with_config(&StorageConfig::in_dir(data_dir)).await
}
