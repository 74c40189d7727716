//! Snapshot persistence for published index generations.
//!
//! A [`Snapshot`] is everything needed to rebuild a generation without
//! touching the tables or the corpus: the resolved units and the located
//! asset (path and body text) of every unit that reconciled. The index itself is not stored; it is
//! rebuilt from the bodies on restore.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::{ReconciledAsset, StoryUnit};

/// Bumped whenever the snapshot layout changes. Snapshots written with
/// another version are ignored and the index must be rebuilt.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotUnit {
    pub unit: StoryUnit,
    /// `None` when the unit did not reconcile to a corpus asset.
    pub asset: Option<ReconciledAsset>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u32,
    pub generation_id: String,
    /// Unix seconds.
    pub built_at: i64,
    pub fingerprint: String,
    pub units: Vec<SnapshotUnit>,
}

impl Snapshot {
    pub fn is_current(&self) -> bool {
        self.format_version == SNAPSHOT_FORMAT_VERSION
    }
}

/// SHA-256 over story ids, titles and bodies in unit order.
///
/// Two builds over the same tables and corpus produce the same value.
pub fn content_fingerprint<'a, I>(units: I) -> String
where
    I: IntoIterator<Item = (&'a StoryUnit, Option<&'a str>)>,
{
    let mut hasher = Sha256::new();
    for (unit, body) in units {
        hasher.update(unit.story_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(unit.resolved_title.as_bytes());
        hasher.update([0u8]);
        match body {
            Some(text) => {
                hasher.update([1u8]);
                hasher.update(text.as_bytes());
            }
            None => hasher.update([2u8]),
        }
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// Storage backend for generation snapshots.
///
/// Only the most recent snapshot is kept: [`save`](SnapshotStore::save)
/// replaces whatever was there.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Replace the stored snapshot.
    async fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// The stored snapshot, if any. Version checks are the caller's job.
    async fn load(&self) -> Result<Option<Snapshot>>;

    /// Remove the stored snapshot.
    async fn clear(&self) -> Result<()>;
}
