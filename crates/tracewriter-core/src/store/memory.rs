//! In-memory [`SnapshotStore`] for tests and embedding.
//!
//! Holds the latest snapshot behind `std::sync::RwLock`.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use super::{SaveReceipt, Snapshot, SnapshotStore};

#[derive(Default)]
struct Stored {
    snapshot: Option<Snapshot>,
    saves: usize,
}

/// In-memory store. Starts empty.
pub struct InMemoryStore {
    inner: RwLock<Stored>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Stored::default()),
        }
    }

    /// A store that already holds `snapshot`.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            inner: RwLock::new(Stored {
                snapshot: Some(snapshot),
                saves: 0,
            }),
        }
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.inner.read().map(|s| s.saves).unwrap_or(0)
    }

    /// The last saved snapshot, if any.
    pub fn latest(&self) -> Option<Snapshot> {
        self.inner.read().ok().and_then(|s| s.snapshot.clone())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStore for InMemoryStore {
    async fn load(&self) -> Result<Snapshot> {
        let stored = self
            .inner
            .read()
            .map_err(|_| anyhow!("snapshot lock poisoned"))?;
        Ok(stored.snapshot.clone().unwrap_or_default())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<SaveReceipt> {
        let mut stored = self
            .inner
            .write()
            .map_err(|_| anyhow!("snapshot lock poisoned"))?;
        stored.snapshot = Some(snapshot.clone());
        stored.saves += 1;
        Ok(SaveReceipt {
            saved_at: Utc::now(),
        })
    }
}
