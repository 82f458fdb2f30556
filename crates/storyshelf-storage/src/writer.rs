//! Background write-back of the latest snapshot.
//!
//! One task owns the store. Submissions go into a single-slot `watch`
//! channel, so a burst of mutations coalesces into one write of the newest
//! snapshot, and writes never run concurrently: an older snapshot cannot land
//! after a newer one.

use parking_lot::Mutex;
use std::sync::Arc;
use storyshelf_graph::TagGraph;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::persistence::{SnapshotState, SnapshotStore};

/// Progress of the worker, by snapshot generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStatus {
    /// Newest generation the worker has tried to save
    pub attempted: u64,
    /// Newest generation saved successfully
    pub persisted: u64,
    /// Failed saves so far
    pub failures: u64,
}

#[derive(Clone)]
struct Pending {
    generation: u64,
    graph: Arc<TagGraph>,
}

pub struct WriteBack {
    tx: watch::Sender<Option<Pending>>,
    status: watch::Receiver<WriteStatus>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WriteBack {
    /// Spawn the worker on the current tokio runtime. `initial_generation`
    /// is reported as already persisted (it came from the store).
    pub fn spawn(store: Arc<dyn SnapshotStore>, initial_generation: u64) -> Self {
        let (tx, rx) = watch::channel(None);
        let (status_tx, status) = watch::channel(WriteStatus {
            attempted: initial_generation,
            persisted: initial_generation,
            failures: 0,
        });
        let task = tokio::spawn(run(store, rx, status_tx));
        Self {
            tx,
            status,
            task: Mutex::new(Some(task)),
        }
    }

    /// Replace the pending slot; never blocks.
    pub fn submit(&self, generation: u64, graph: Arc<TagGraph>) {
        self.tx.send_replace(Some(Pending { generation, graph }));
    }

    pub fn status(&self) -> WriteStatus {
        *self.status.borrow()
    }

    /// Wait until `generation` (or something newer) has been attempted.
    /// Errors if that attempt failed.
    pub async fn flush(&self, generation: u64) -> anyhow::Result<()> {
        let mut status = self.status.clone();
        let reached = *status
            .wait_for(|s| s.attempted >= generation)
            .await
            .map_err(|_| anyhow::anyhow!("write-back worker stopped"))?;
        if reached.persisted >= generation {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "snapshot generation {generation} was not persisted ({} failed writes)",
                reached.failures
            ))
        }
    }

    /// Flush `generation`, then stop the worker.
    pub async fn shutdown(&self, generation: u64) -> anyhow::Result<()> {
        let flushed = self.flush(generation).await;
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        flushed
    }
}

async fn run(
    store: Arc<dyn SnapshotStore>,
    mut rx: watch::Receiver<Option<Pending>>,
    status: watch::Sender<WriteStatus>,
) {
    while rx.changed().await.is_ok() {
        let Some(pending) = rx.borrow_and_update().clone() else {
            continue;
        };
        let state = SnapshotState::from_graph(&pending.graph);
        match store.save(&state).await {
            Ok(()) => {
                tracing::debug!(
                    store = %store.describe(),
                    generation = pending.generation,
                    tags = state.tags.len(),
                    "snapshot persisted"
                );
                status.send_modify(|s| {
                    s.attempted = pending.generation;
                    s.persisted = pending.generation;
                });
            }
            Err(err) => {
                tracing::warn!(
                    store = %store.describe(),
                    generation = pending.generation,
                    error = %err,
                    "snapshot write-back failed; keeping in-memory snapshot"
                );
                status.send_modify(|s| {
                    s.attempted = pending.generation;
                    s.failures += 1;
                });
            }
        }
    }
    tracing::debug!(store = %store.describe(), "write-back worker stopped");
}
