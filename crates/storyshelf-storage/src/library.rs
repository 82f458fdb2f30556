//! The tag library: process-wide holder of the current [`TagGraph`].
//!
//! Reads clone the current `Arc` and run against that snapshot without
//! further locking. Mutations take the writer lock for the whole
//! read-modify-swap, so two concurrent callers can never both build on the
//! same base snapshot and drop each other's change.

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::Arc;
use storyshelf_graph::{
    Category, CategoryId, ExtendedTag, GraphError, Tag, TagGraph, TagId,
};

use crate::config::StorageConfig;
use crate::persistence::{JsonFileStore, SnapshotStore};
use crate::writer::{WriteBack, WriteStatus};

pub struct TagLibrary {
    current: RwLock<Arc<TagGraph>>,
    /// Serializes mutations; holds the generation of `current`.
    generation: Mutex<u64>,
    writer: Option<WriteBack>,
}

impl TagLibrary {
    /// Load the stored state and start background write-back to `store`.
    pub async fn open(store: Arc<dyn SnapshotStore>) -> anyhow::Result<Self> {
        let state = store.load().await?;
        let graph = state.into_graph().map_err(|e| {
            if e.is_validation() {
                anyhow::anyhow!("stored snapshot in {} is inconsistent: {e}", store.describe())
            } else {
                anyhow::anyhow!("stored snapshot in {} was rejected: {e}", store.describe())
            }
        })?;
        tracing::info!(
            store = %store.describe(),
            categories = graph.category_count(),
            tags = graph.tag_count(),
            "tag library loaded"
        );
        let writer = WriteBack::spawn(store, 0);
        Ok(Self {
            current: RwLock::new(Arc::new(graph)),
            generation: Mutex::new(0),
            writer: Some(writer),
        })
    }

    /// Open the JSON store named by `config`.
    pub async fn open_with_config(config: &StorageConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn SnapshotStore> = Arc::new(JsonFileStore::new(&config.snapshot_path));
        if config.write_back {
            return Self::open(store).await;
        }
        let graph = store.load().await?.into_graph()?;
        Ok(Self::in_memory(graph))
    }

    /// A library with no persistence at all.
    pub fn in_memory(graph: TagGraph) -> Self {
        Self {
            current: RwLock::new(Arc::new(graph)),
            generation: Mutex::new(0),
            writer: None,
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// The current snapshot. Holders keep a consistent view across calls.
    pub fn snapshot(&self) -> Arc<TagGraph> {
        self.current.read().clone()
    }

    pub fn generation(&self) -> u64 {
        *self.generation.lock()
    }

    pub fn category(&self, id: CategoryId) -> Option<Category> {
        self.snapshot().category(id).cloned()
    }

    pub fn tag(&self, id: TagId) -> Option<Tag> {
        self.snapshot().tag(id).cloned()
    }

    pub fn category_by_name(&self, name: &str) -> Option<Category> {
        self.snapshot().category_by_name(name).cloned()
    }

    pub fn tag_by_name(&self, name: &str) -> Option<Tag> {
        self.snapshot().tag_by_name(name).cloned()
    }

    pub fn categories(&self) -> Vec<Category> {
        self.snapshot().categories().into_iter().cloned().collect()
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.snapshot().tags().cloned().collect()
    }

    pub fn tags_in_category(&self, id: CategoryId) -> Vec<Tag> {
        self.snapshot()
            .tags_in_category(id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn tag_count_in_category(&self, id: CategoryId) -> usize {
        self.snapshot().tag_count_in_category(id)
    }

    pub fn extended_tag(&self, id: TagId) -> Option<ExtendedTag> {
        self.snapshot().extended_tag(id)
    }

    /// Tags implied (directly or transitively) by any of `explicit`.
    pub fn resolve_implied_closure(&self, explicit: &[TagId]) -> BTreeSet<TagId> {
        self.snapshot().resolve_implied_closure(explicit)
    }

    /// `explicit` plus everything they imply.
    pub fn effective_tags(&self, explicit: &[TagId]) -> BTreeSet<TagId> {
        let mut out = self.resolve_implied_closure(explicit);
        out.extend(explicit.iter().copied());
        out
    }

    /// Whether a story tagged with `explicit` effectively carries `tag`.
    pub fn carries_tag(&self, explicit: &[TagId], tag: TagId) -> bool {
        explicit.contains(&tag) || self.resolve_implied_closure(explicit).contains(&tag)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub fn create_category(&self, category: Category) -> Result<Category, GraphError> {
        self.commit("create_category", |g| g.create_category(category))
    }

    pub fn update_category(&self, category: Category) -> Result<Category, GraphError> {
        self.commit("update_category", |g| g.update_category(category))
    }

    pub fn delete_category(&self, id: CategoryId) -> Result<Category, GraphError> {
        self.commit("delete_category", |g| g.delete_category(id))
    }

    pub fn create_tag(&self, tag: Tag) -> Result<Tag, GraphError> {
        self.commit("create_tag", |g| g.create_tag(tag))
    }

    pub fn update_tag(&self, tag: Tag) -> Result<Tag, GraphError> {
        self.commit("update_tag", |g| g.update_tag(tag))
    }

    /// All-or-nothing batch update producing a single new snapshot.
    pub fn update_tags(&self, tags: Vec<Tag>) -> Result<Vec<Tag>, GraphError> {
        self.commit("update_tags", |g| g.update_tags(tags))
    }

    /// Fails while other tags still imply `id`; see [`Self::purge_tag`].
    pub fn delete_tag(&self, id: TagId) -> Result<Tag, GraphError> {
        self.commit("delete_tag", |g| g.delete_tag(id))
    }

    /// Strip `id` from every implying tag and delete it in one step.
    /// Returns the rewritten implying tags.
    pub fn purge_tag(&self, id: TagId) -> Result<Vec<Tag>, GraphError> {
        self.commit("purge_tag", |g| g.strip_and_delete_tag(id))
    }

    fn commit<T, F>(&self, op: &'static str, mutate: F) -> Result<T, GraphError>
    where
        F: FnOnce(&TagGraph) -> Result<(TagGraph, T), GraphError>,
    {
        let mut generation = self.generation.lock();
        let base = self.snapshot();
        let (next, affected) = match mutate(&base) {
            Ok(result) => result,
            Err(err) => {
                tracing::debug!(op, error = %err, "tag library mutation rejected");
                return Err(err);
            }
        };

        let next = Arc::new(next);
        *generation += 1;
        *self.current.write() = Arc::clone(&next);
        tracing::debug!(
            op,
            generation = *generation,
            tags = next.tag_count(),
            "tag library snapshot replaced"
        );
        if let Some(writer) = &self.writer {
            writer.submit(*generation, next);
        }
        Ok(affected)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub fn write_status(&self) -> Option<WriteStatus> {
        self.writer.as_ref().map(WriteBack::status)
    }

    /// Wait for the current snapshot to be written. Without write-back this
    /// is a no-op.
    pub async fn flush(&self) -> anyhow::Result<()> {
        let generation = self.generation();
        match &self.writer {
            Some(writer) => writer.flush(generation).await,
            None => Ok(()),
        }
    }

    /// Flush and stop the background writer.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        let generation = self.generation();
        match &self.writer {
            Some(writer) => writer.shutdown(generation).await,
            None => Ok(()),
        }
    }
}
