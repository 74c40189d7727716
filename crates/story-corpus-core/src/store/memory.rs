//! In-memory [`SnapshotStore`] for tests and ephemeral runs.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{Snapshot, SnapshotStore};

/// Holds at most one snapshot behind a `RwLock`.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    slot: RwLock<Option<Snapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let mut slot = self
            .slot
            .write()
            .map_err(|_| anyhow!("snapshot store lock poisoned"))?;
        *slot = Some(snapshot.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<Snapshot>> {
        let slot = self
            .slot
            .read()
            .map_err(|_| anyhow!("snapshot store lock poisoned"))?;
        Ok(slot.clone())
    }

    async fn clear(&self) -> Result<()> {
        let mut slot = self
            .slot
            .write()
            .map_err(|_| anyhow!("snapshot store lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}
