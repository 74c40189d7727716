//! Index generations and the pipeline that builds them.
//!
//! A [`Generation`] is one complete, immutable build: the resolved units,
//! the inverted index over their bodies, and the warnings collected while
//! building. It is never mutated after construction; a rebuild produces a
//! new one.
//!
//! # Build pipeline
//!
//! ```text
//! load tables ─┐   (spawn_blocking, in parallel)
//! walk corpus ─┴─▶ assemble catalog ─▶ reconcile + read bodies ─▶ index
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use story_corpus_core::catalog::Catalog;
use story_corpus_core::index::{IndexedDoc, InvertedIndex, SearchOptions};
use story_corpus_core::models::{ReconciledAsset, SearchResult, StoryUnit};
use story_corpus_core::normalize::{last_segment, normalized_key};
use story_corpus_core::store::{
    content_fingerprint, Snapshot, SnapshotUnit, SNAPSHOT_FORMAT_VERSION,
};

use crate::config::{CorpusConfig, TablesConfig};
use crate::corpus::scan_corpus;
use crate::error::{BuildError, SyncWarning};
use crate::progress::{RebuildProgressEvent, RebuildProgressReporter, INDEXING_REPORT_EVERY};
use crate::reconcile::{reconcile, Reconciled};
use crate::render::BodyRenderer;
use crate::tables::load_table_set;

/// Counts and identity of a generation, as shown by `story status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationSummary {
    pub generation_id: String,
    pub built_at: DateTime<Utc>,
    pub unit_count: usize,
    pub indexed_count: usize,
    pub unresolved_count: usize,
    pub warning_count: usize,
    pub fingerprint: String,
    /// Loaded from a persisted snapshot rather than built from the corpus.
    pub restored: bool,
}

#[derive(Debug, Clone)]
struct Located {
    doc: u32,
    actual_path: PathBuf,
}

pub struct Generation {
    id: Uuid,
    built_at: DateTime<Utc>,
    units: Vec<StoryUnit>,
    /// Index document and asset path per unit; `None` for unresolved units.
    located: Vec<Option<Located>>,
    by_id: HashMap<String, usize>,
    by_key: HashMap<String, usize>,
    index: InvertedIndex,
    warnings: Vec<SyncWarning>,
    fingerprint: String,
    restored: bool,
}

impl std::fmt::Debug for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generation")
            .field("id", &self.id)
            .field("units", &self.units.len())
            .field("indexed", &self.index.len())
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl Generation {
    /// Build a generation from reconciled units.
    pub fn assemble(entries: Vec<Reconciled>, warnings: Vec<SyncWarning>) -> Generation {
        let parts = entries.into_iter().map(|e| (e.unit, e.asset)).collect();
        Self::from_parts(Uuid::new_v4(), Utc::now(), parts, warnings, false)
    }

    /// Rebuild a generation from a persisted snapshot. The index is
    /// recomputed from the stored bodies; the corpus is not touched.
    pub fn from_snapshot(snapshot: Snapshot) -> Generation {
        let id = Uuid::parse_str(&snapshot.generation_id).unwrap_or_else(|_| Uuid::new_v4());
        let built_at = Utc
            .timestamp_opt(snapshot.built_at, 0)
            .single()
            .unwrap_or_else(Utc::now);
        let parts: Vec<(StoryUnit, Option<ReconciledAsset>)> = snapshot
            .units
            .into_iter()
            .map(|u| (u.unit, u.asset))
            .collect();
        let warnings = parts
            .iter()
            .filter(|(_, body)| body.is_none())
            .map(|(unit, _)| SyncWarning::UnresolvedAsset {
                story_id: unit.story_id.clone(),
                logical_id: unit.logical_id.clone(),
            })
            .collect();

        let generation = Self::from_parts(id, built_at, parts, warnings, true);
        if generation.fingerprint != snapshot.fingerprint {
            warn!(
                stored = %snapshot.fingerprint,
                computed = %generation.fingerprint,
                "snapshot fingerprint mismatch"
            );
        }
        generation
    }

    fn from_parts(
        id: Uuid,
        built_at: DateTime<Utc>,
        parts: Vec<(StoryUnit, Option<ReconciledAsset>)>,
        warnings: Vec<SyncWarning>,
        restored: bool,
    ) -> Generation {
        let fingerprint = content_fingerprint(
            parts
                .iter()
                .map(|(u, a)| (u, a.as_ref().map(|a| a.body_text.as_str()))),
        );

        let mut units = Vec::with_capacity(parts.len());
        let mut located = Vec::with_capacity(parts.len());
        let mut indexed = Vec::new();
        let mut by_id = HashMap::new();
        let mut by_key = HashMap::new();

        for (ordinal, (unit, asset)) in parts.into_iter().enumerate() {
            by_id.entry(unit.story_id.clone()).or_insert(ordinal);
            for alias in &unit.aliases {
                by_id.entry(alias.clone()).or_insert(ordinal);
            }
            by_key.entry(unit.normalized_key()).or_insert(ordinal);

            located.push(asset.map(|asset| {
                indexed.push(IndexedDoc {
                    story_id: unit.story_id.clone(),
                    title: unit.resolved_title.clone(),
                    category: unit.category_label(),
                    body: asset.body_text,
                });
                Located {
                    doc: (indexed.len() - 1) as u32,
                    actual_path: asset.actual_path,
                }
            }));
            units.push(unit);
        }

        let index = InvertedIndex::build(indexed);

        Generation {
            id,
            built_at,
            units,
            located,
            by_id,
            by_key,
            index,
            warnings,
            fingerprint,
            restored,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn units(&self) -> &[StoryUnit] {
        &self.units
    }

    pub fn warnings(&self) -> &[SyncWarning] {
        &self.warnings
    }

    pub fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
        self.index.search(query, options)
    }

    fn position(&self, id: &str) -> Option<usize> {
        let id = id.trim();
        self.by_id
            .get(id)
            .or_else(|| self.by_key.get(&normalized_key(id)))
            .copied()
    }

    /// The unit known by story id, alias, or logical path.
    pub fn unit(&self, id: &str) -> Option<&StoryUnit> {
        self.position(id).map(|i| &self.units[i])
    }

    /// Display title for `id`; an unknown id falls back to its last path
    /// segment.
    pub fn resolve_title(&self, id: &str) -> String {
        match self.unit(id) {
            Some(unit) => unit.resolved_title.clone(),
            None => last_segment(id.trim()).to_string(),
        }
    }

    /// Body of a resolved unit. `None` for unknown or unresolved units.
    pub fn open_story(&self, id: &str) -> Option<&str> {
        let pos = self.position(id)?;
        let doc = self.located[pos].as_ref()?.doc;
        self.index.doc(doc).map(|d| d.body.as_str())
    }

    /// On-disk file (or monthly-chat directory) a resolved unit was read
    /// from.
    pub fn asset_path(&self, id: &str) -> Option<&Path> {
        let pos = self.position(id)?;
        self.located[pos].as_ref().map(|l| l.actual_path.as_path())
    }

    pub fn summary(&self) -> GenerationSummary {
        GenerationSummary {
            generation_id: self.id.to_string(),
            built_at: self.built_at,
            unit_count: self.units.len(),
            indexed_count: self.index.len(),
            unresolved_count: self.units.len() - self.index.len(),
            warning_count: self.warnings.len(),
            fingerprint: self.fingerprint.clone(),
            restored: self.restored,
        }
    }

    pub fn to_snapshot(&self) -> Snapshot {
        let units = self
            .units
            .iter()
            .zip(&self.located)
            .map(|(unit, located)| SnapshotUnit {
                unit: unit.clone(),
                asset: located.as_ref().and_then(|l| {
                    self.index.doc(l.doc).map(|d| ReconciledAsset {
                        actual_path: l.actual_path.clone(),
                        body_text: d.body.clone(),
                    })
                }),
            })
            .collect();
        Snapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            generation_id: self.id.to_string(),
            built_at: self.built_at.timestamp(),
            fingerprint: self.fingerprint.clone(),
            units,
        }
    }
}

/// Produces a new generation. The lifecycle manager owns one of these.
#[async_trait]
pub trait GenerationBuilder: Send + Sync {
    async fn build(
        &self,
        progress: Arc<dyn RebuildProgressReporter>,
    ) -> Result<Generation, BuildError>;
}

/// Builds generations from the configured tables directory and corpus.
pub struct CorpusBuilder {
    corpus: CorpusConfig,
    tables: TablesConfig,
    renderer: Arc<dyn BodyRenderer>,
}

impl CorpusBuilder {
    pub fn new(
        corpus: CorpusConfig,
        tables: TablesConfig,
        renderer: Arc<dyn BodyRenderer>,
    ) -> Self {
        Self {
            corpus,
            tables,
            renderer,
        }
    }

    pub fn tables_dir(&self) -> PathBuf {
        self.corpus.tables_path()
    }
}

#[async_trait]
impl GenerationBuilder for CorpusBuilder {
    async fn build(
        &self,
        progress: Arc<dyn RebuildProgressReporter>,
    ) -> Result<Generation, BuildError> {
        let started = Instant::now();

        progress.report(RebuildProgressEvent::LoadingTables);
        progress.report(RebuildProgressEvent::Scanning);

        let tables_dir = self.corpus.tables_path();
        let names = self.tables.clone();
        let tables_task =
            tokio::task::spawn_blocking(move || load_table_set(&tables_dir, &names));

        let corpus = self.corpus.clone();
        let scan_task = tokio::task::spawn_blocking(move || scan_corpus(&corpus));

        let (tables_res, scan_res) = tokio::join!(tables_task, scan_task);
        let (tables, mut warnings) = tables_res?;
        let scan = scan_res??;
        warnings.extend(scan.warnings);
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            records = tables.total_records(),
            files = scan.map.file_count(),
            "tables loaded and corpus scanned"
        );

        let catalog = Catalog::assemble(&tables, &scan.map);
        if catalog.duplicates > 0 {
            debug!(duplicates = catalog.duplicates, "dropped duplicate units");
        }
        info!(
            units = catalog.units.len(),
            side_map = catalog.side_map.len(),
            "catalog assembled"
        );

        let renderer = Arc::clone(&self.renderer);
        let map = scan.map;
        let generation = tokio::task::spawn_blocking(move || {
            let result = reconcile(catalog.units, &map, renderer.as_ref(), |n, total| {
                let (n, total) = (n as u64, total as u64);
                if n % INDEXING_REPORT_EVERY == 0 || n == total {
                    progress.report(RebuildProgressEvent::Indexing { n, total });
                }
            });
            warnings.extend(result.warnings);
            let generation = Generation::assemble(result.entries, warnings);
            let summary = generation.summary();
            progress.report(RebuildProgressEvent::Done {
                units: summary.unit_count as u64,
                unresolved: summary.unresolved_count as u64,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
            generation
        })
        .await?;

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            terms = generation.index.term_count(),
            "generation built"
        );
        Ok(generation)
    }
}
