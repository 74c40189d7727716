//! Index lifecycle: the published generation, single-flight rebuilds, and
//! snapshot restore.
//!
//! # Concurrency model
//!
//! - Queries load the published `Arc<Generation>` from an [`ArcSwapOption`]
//!   and finish on it even if a rebuild swaps in a new one meanwhile. A
//!   query never sees a half-built index.
//! - At most one rebuild runs at a time. The first caller becomes the
//!   leader and owns a `tokio::sync::watch` sender; callers arriving while
//!   it runs wait on a receiver and get the leader's outcome with
//!   `coalesced = true`.
//! - If the leader's future is dropped mid-build nothing is published, the
//!   state goes back to what it was, and waiters get a failed outcome.
//!
//! ```text
//! Empty ──rebuild──▶ Building ──ok──▶ Ready ──rebuild──▶ Rebuilding ──▶ Ready
//!   ▲                   │                                    │
//!   └──────fail─────────┘               Ready ◀──────fail────┘
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use arc_swap::ArcSwapOption;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use story_corpus_core::index::SearchOptions;
use story_corpus_core::models::SearchResult;
use story_corpus_core::normalize::last_segment;
use story_corpus_core::store::SnapshotStore;

use crate::generation::{Generation, GenerationBuilder, GenerationSummary};
use crate::progress::{NoProgress, RebuildProgressReporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    /// Nothing published yet.
    Empty,
    /// First build in progress; queries return nothing.
    Building,
    /// A generation is published and no build is running.
    Ready,
    /// A build is running; the previous generation keeps serving.
    Rebuilding,
}

impl IndexState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexState::Empty => "empty",
            IndexState::Building => "building",
            IndexState::Ready => "ready",
            IndexState::Rebuilding => "rebuilding",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RebuildOutcome {
    Rebuilt {
        summary: GenerationSummary,
        /// The caller joined a rebuild another caller started.
        coalesced: bool,
        /// The generation was written to the snapshot store.
        persisted: bool,
    },
    Failed {
        reason: String,
        coalesced: bool,
    },
}

impl RebuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RebuildOutcome::Rebuilt { .. })
    }

    pub fn is_coalesced(&self) -> bool {
        match self {
            RebuildOutcome::Rebuilt { coalesced, .. } | RebuildOutcome::Failed { coalesced, .. } => {
                *coalesced
            }
        }
    }

    fn into_coalesced(self) -> Self {
        match self {
            RebuildOutcome::Rebuilt {
                summary, persisted, ..
            } => RebuildOutcome::Rebuilt {
                summary,
                coalesced: true,
                persisted,
            },
            RebuildOutcome::Failed { reason, .. } => RebuildOutcome::Failed {
                reason,
                coalesced: true,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub state: IndexState,
    pub generation: Option<GenerationSummary>,
    /// Reason of the most recent failed rebuild, cleared on success.
    pub last_error: Option<String>,
}

type OutcomeSlot = Option<watch::Receiver<Option<RebuildOutcome>>>;

/// Owns the published generation and serializes rebuilds.
pub struct IndexManager {
    published: ArcSwapOption<Generation>,
    state: Mutex<IndexState>,
    in_flight: Mutex<OutcomeSlot>,
    last_error: Mutex<Option<String>>,
    builder: Arc<dyn GenerationBuilder>,
    store: Option<Arc<dyn SnapshotStore>>,
    progress: Arc<dyn RebuildProgressReporter>,
    search_options: SearchOptions,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl IndexManager {
    pub fn new(builder: Arc<dyn GenerationBuilder>, search_options: SearchOptions) -> Self {
        Self {
            published: ArcSwapOption::empty(),
            state: Mutex::new(IndexState::Empty),
            in_flight: Mutex::new(None),
            last_error: Mutex::new(None),
            builder,
            store: None,
            progress: Arc::new(NoProgress),
            search_options,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn RebuildProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn state(&self) -> IndexState {
        *lock(&self.state)
    }

    pub fn search_options(&self) -> &SearchOptions {
        &self.search_options
    }

    fn set_state(&self, state: IndexState) {
        let mut current = lock(&self.state);
        if *current != state {
            info!(from = current.as_str(), to = state.as_str(), "index state");
            *current = state;
        }
    }

    /// State to return to when no build is running.
    fn idle_state(&self) -> IndexState {
        if self.published.load().is_some() {
            IndexState::Ready
        } else {
            IndexState::Empty
        }
    }

    /// The published generation, if any.
    pub fn current(&self) -> Option<Arc<Generation>> {
        self.published.load_full()
    }

    pub fn search(&self, query: &str) -> Vec<SearchResult> {
        self.search_with(query, &self.search_options)
    }

    pub fn search_with(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        match self.current() {
            Some(generation) => generation.search(query, options),
            None => Vec::new(),
        }
    }

    pub fn resolve_title(&self, id: &str) -> String {
        match self.current() {
            Some(generation) => generation.resolve_title(id),
            None => last_segment(id.trim()).to_string(),
        }
    }

    pub fn open_story(&self, id: &str) -> Option<String> {
        self.current()?.open_story(id).map(str::to_string)
    }

    pub fn status(&self) -> IndexStatus {
        IndexStatus {
            state: self.state(),
            generation: self.current().map(|g| g.summary()),
            last_error: lock(&self.last_error).clone(),
        }
    }

    /// Build a new generation and publish it, or join the build already
    /// running.
    pub async fn rebuild_index(&self) -> RebuildOutcome {
        let role = {
            let mut slot = lock(&self.in_flight);
            match slot.as_ref() {
                Some(rx) => Role::Waiter(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    *slot = Some(rx);
                    let next = match self.idle_state() {
                        IndexState::Ready => IndexState::Rebuilding,
                        _ => IndexState::Building,
                    };
                    self.set_state(next);
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Waiter(mut rx) => {
                info!("rebuild already in progress; waiting for it");
                let outcome = match rx.wait_for(Option::is_some).await {
                    Ok(value) => value.clone(),
                    Err(_) => None,
                };
                outcome
                    .map(RebuildOutcome::into_coalesced)
                    .unwrap_or_else(|| RebuildOutcome::Failed {
                        reason: "rebuild abandoned".to_string(),
                        coalesced: true,
                    })
            }
            Role::Leader(tx) => {
                let mut guard = InFlight {
                    manager: self,
                    tx: Some(tx),
                };
                let outcome = self.run_build().await;
                guard.finish(&outcome);
                outcome
            }
        }
    }

    async fn run_build(&self) -> RebuildOutcome {
        info!("rebuild started");
        match self.builder.build(Arc::clone(&self.progress)).await {
            Ok(generation) => {
                let generation = Arc::new(generation);
                self.published.store(Some(Arc::clone(&generation)));
                let summary = generation.summary();
                info!(
                    generation = %summary.generation_id,
                    units = summary.unit_count,
                    indexed = summary.indexed_count,
                    unresolved = summary.unresolved_count,
                    warnings = summary.warning_count,
                    "generation published"
                );
                *lock(&self.last_error) = None;
                let persisted = self.persist(&generation).await;
                RebuildOutcome::Rebuilt {
                    summary,
                    coalesced: false,
                    persisted,
                }
            }
            Err(err) => {
                let reason = err.to_string();
                warn!("rebuild failed: {}", reason);
                *lock(&self.last_error) = Some(reason.clone());
                RebuildOutcome::Failed {
                    reason,
                    coalesced: false,
                }
            }
        }
    }

    async fn persist(&self, generation: &Generation) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        match store.save(&generation.to_snapshot()).await {
            Ok(()) => true,
            Err(err) => {
                warn!("failed to persist index snapshot: {:#}", err);
                false
            }
        }
    }

    /// Publish the persisted snapshot, if there is a usable one and nothing
    /// has been published or started yet.
    pub async fn restore(&self) -> Result<Option<GenerationSummary>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let Some(snapshot) = store.load().await? else {
            return Ok(None);
        };
        if !snapshot.is_current() {
            info!(
                version = snapshot.format_version,
                "snapshot format changed; rebuild required"
            );
            return Ok(None);
        }

        let generation =
            tokio::task::spawn_blocking(move || Generation::from_snapshot(snapshot)).await?;
        let generation = Arc::new(generation);

        let mut state = lock(&self.state);
        if *state != IndexState::Empty {
            info!("index already {}; ignoring snapshot", state.as_str());
            return Ok(None);
        }
        self.published.store(Some(Arc::clone(&generation)));
        *state = IndexState::Ready;
        let summary = generation.summary();
        info!(
            generation = %summary.generation_id,
            units = summary.unit_count,
            "restored index snapshot"
        );
        Ok(Some(summary))
    }
}

enum Role {
    Leader(watch::Sender<Option<RebuildOutcome>>),
    Waiter(watch::Receiver<Option<RebuildOutcome>>),
}

/// Clears the in-flight slot when the leader finishes or is dropped.
struct InFlight<'a> {
    manager: &'a IndexManager,
    tx: Option<watch::Sender<Option<RebuildOutcome>>>,
}

impl InFlight<'_> {
    fn finish(&mut self, outcome: &RebuildOutcome) {
        if let Some(tx) = self.tx.take() {
            self.release();
            tx.send_replace(Some(outcome.clone()));
        }
    }

    fn release(&self) {
        let mut slot = lock(&self.manager.in_flight);
        *slot = None;
        self.manager.set_state(self.manager.idle_state());
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.tx.take().is_some() {
            warn!("rebuild abandoned before completion");
            self.release();
        }
    }
}
