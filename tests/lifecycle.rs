mod common;

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use story_corpus::error::{BuildError, SyncWarning};
use story_corpus::generation::{CorpusBuilder, Generation, GenerationBuilder};
use story_corpus::lifecycle::{IndexManager, IndexState, RebuildOutcome};
use story_corpus::progress::RebuildProgressReporter;
use story_corpus::reconcile::Reconciled;
use story_corpus::render::RawText;
use story_corpus::sqlite_store::SqliteSnapshotStore;
use story_corpus_core::index::SearchOptions;
use story_corpus_core::models::{ReconciledAsset, StoryCategory, StoryUnit, TitleOrigin};

fn corpus_manager(root: &std::path::Path) -> IndexManager {
    let config = common::game_config(root);
    let builder = CorpusBuilder::new(config.corpus, config.tables, Arc::new(RawText));
    IndexManager::new(Arc::new(builder), config.search.options())
}

async fn ready(root: &std::path::Path) -> IndexManager {
    let manager = corpus_manager(root);
    let outcome = manager.rebuild_index().await;
    assert!(outcome.is_success(), "rebuild failed: {:?}", outcome);
    manager
}

#[tokio::test]
async fn test_mainline_note_resolves_through_zone_table() {
    let tmp = tempfile::tempdir().unwrap();
    common::write_game(tmp.path());
    let manager = ready(tmp.path()).await;

    let path = "Obt/Record/main_10/text_main_10_note_1";
    assert_eq!(manager.resolve_title(path), "笔记 10-2");
    assert_eq!(manager.resolve_title("main_10_record_main_10_2"), "笔记 10-2");
    assert_eq!(manager.resolve_title("record_main_10_2"), "笔记 10-2");
    assert!(manager.open_story(path).unwrap().contains("切尔诺伯格"));

    let generation = manager.current().unwrap();
    let unit = generation.unit(path).unwrap();
    assert_eq!(unit.category, StoryCategory::MainlineNote);
    assert_eq!(unit.category_label(), "主线笔记 | 第十章 破碎日冕");
}

#[tokio::test]
async fn test_endbook_name_wins_over_other_candidates() {
    let tmp = tempfile::tempdir().unwrap();
    common::write_game(tmp.path());
    let manager = ready(tmp.path()).await;

    assert_eq!(manager.resolve_title("endbook_rogue_2_1_1"), "十字路口");
    assert_eq!(
        manager.resolve_title("obt/rogue/rogue_2/endbook/endbook_rogue_2_1_1"),
        "十字路口"
    );
}

#[tokio::test]
async fn test_search_finds_title_and_snippet() {
    let tmp = tempfile::tempdir().unwrap();
    common::write_game(tmp.path());
    let manager = ready(tmp.path()).await;

    assert!(manager.search("").is_empty());
    assert!(manager.search("   ").is_empty());

    let results = manager.search("枯萎");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].story_id, "act_withered_st01");
    assert_eq!(results[0].story_name, "枯萎之声");
    assert_eq!(results[0].category, "活动 | 枯萎之地");
    assert!(!results[0].matched_text.is_empty());

    // Every segment must match.
    assert_eq!(manager.search("枯萎 低语").len(), 1);
    assert!(manager.search("枯萎 钟声").is_empty());
}

#[tokio::test]
async fn test_unresolved_units_keep_titles_but_are_not_searchable() {
    let tmp = tempfile::tempdir().unwrap();
    common::write_game(tmp.path());
    let manager = ready(tmp.path()).await;

    assert_eq!(manager.resolve_title("main_00_02"), "level_main_00-02_beg");
    assert!(manager.open_story("main_00_02").is_none());
    assert_eq!(manager.resolve_title("Obt/Unknown/Some_Story"), "Some_Story");

    let generation = manager.current().unwrap();
    let summary = generation.summary();
    assert_eq!(summary.unit_count, 5);
    assert_eq!(summary.indexed_count, 4);
    assert_eq!(summary.unresolved_count, 1);

    let warnings = generation.warnings();
    assert!(warnings.iter().any(|w| matches!(
        w,
        SyncWarning::UnresolvedAsset { story_id, .. } if story_id == "main_00_02"
    )));
    assert_eq!(
        warnings
            .iter()
            .filter(|w| matches!(w, SyncWarning::MissingTable { .. }))
            .count(),
        2
    );
}

#[tokio::test]
async fn test_rebuilds_over_unchanged_corpus_agree() {
    let tmp = tempfile::tempdir().unwrap();
    common::write_game(tmp.path());
    let manager = ready(tmp.path()).await;

    let first = manager.current().unwrap();
    assert!(manager.rebuild_index().await.is_success());
    let second = manager.current().unwrap();

    assert_ne!(first.id(), second.id());
    assert_eq!(first.fingerprint(), second.fingerprint());
    for query in ["枯萎", "十字路口", "博士", "切尔诺伯格"] {
        assert_eq!(
            first.search(query, &SearchOptions::default()),
            second.search(query, &SearchOptions::default())
        );
    }
}

#[tokio::test]
async fn test_missing_corpus_fails_without_publishing() {
    let tmp = tempfile::tempdir().unwrap();
    let manager = corpus_manager(tmp.path());

    let outcome = manager.rebuild_index().await;
    assert!(matches!(outcome, RebuildOutcome::Failed { coalesced: false, .. }));
    assert_eq!(manager.state(), IndexState::Empty);
    assert!(manager.current().is_none());
    assert!(manager.status().last_error.is_some());
}

#[tokio::test]
async fn test_snapshot_restores_in_a_fresh_manager() {
    let tmp = tempfile::tempdir().unwrap();
    common::write_game(tmp.path());
    let db = tmp.path().join("data/story_index.sqlite");

    let store = Arc::new(SqliteSnapshotStore::open(&db).await.unwrap());
    let manager = corpus_manager(tmp.path()).with_store(store);
    let outcome = manager.rebuild_index().await;
    assert!(matches!(outcome, RebuildOutcome::Rebuilt { persisted: true, .. }));
    let fingerprint = manager.current().unwrap().fingerprint().to_string();

    // Remove the corpus so nothing can come from a rebuild.
    std::fs::remove_dir_all(tmp.path().join(common::STORY_DIR)).unwrap();

    let store = Arc::new(SqliteSnapshotStore::open(&db).await.unwrap());
    let restored = corpus_manager(tmp.path()).with_store(store);
    let summary = restored.restore().await.unwrap().unwrap();
    assert!(summary.restored);
    assert_eq!(summary.fingerprint, fingerprint);
    assert_eq!(restored.state(), IndexState::Ready);
    assert_eq!(restored.resolve_title("endbook_rogue_2_1_1"), "十字路口");
    assert_eq!(restored.search("枯萎")[0].story_name, "枯萎之声");
    assert!(restored.open_story("main_00_02").is_none());

    // The failed rebuild keeps the restored generation serving.
    assert!(!restored.rebuild_index().await.is_success());
    assert_eq!(restored.state(), IndexState::Ready);
    assert_eq!(restored.search("枯萎").len(), 1);
}

/// A builder that blocks until released, for observing in-flight states.
struct Gated {
    calls: AtomicUsize,
    started: Notify,
    release: Notify,
}

impl Gated {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            started: Notify::new(),
            release: Notify::new(),
        })
    }
}

fn one_unit_generation(title: &str) -> Generation {
    let unit = StoryUnit {
        story_id: "s1".to_string(),
        logical_id: "obt/s1".to_string(),
        category: StoryCategory::Activity,
        group: "g".to_string(),
        resolved_title: title.to_string(),
        source_used: TitleOrigin::Filename,
        aliases: Vec::new(),
    };
    let asset = ReconciledAsset {
        actual_path: PathBuf::from("/corpus/obt/s1.txt"),
        body_text: format!("{title} 的正文"),
    };
    Generation::assemble(
        vec![Reconciled {
            unit,
            asset: Some(asset),
        }],
        Vec::new(),
    )
}

#[async_trait]
impl GenerationBuilder for Gated {
    async fn build(
        &self,
        _progress: Arc<dyn RebuildProgressReporter>,
    ) -> Result<Generation, BuildError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        self.release.notified().await;
        Ok(one_unit_generation(&format!("第{n}版")))
    }
}

async fn let_other_tasks_run() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_concurrent_rebuilds_coalesce() {
    let gate = Gated::new();
    let manager = Arc::new(IndexManager::new(gate.clone(), SearchOptions::default()));

    let leader = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.rebuild_index().await }
    });
    gate.started.notified().await;
    assert_eq!(manager.state(), IndexState::Building);
    assert!(manager.search("正文").is_empty());

    let waiter = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.rebuild_index().await }
    });
    let_other_tasks_run().await;
    gate.release.notify_one();

    let leader = leader.await.unwrap();
    let waiter = waiter.await.unwrap();
    assert_eq!(gate.calls.load(Ordering::SeqCst), 1);
    assert!(leader.is_success() && !leader.is_coalesced());
    assert!(waiter.is_success() && waiter.is_coalesced());

    let id = |o: &RebuildOutcome| match o {
        RebuildOutcome::Rebuilt { summary, .. } => summary.generation_id.clone(),
        RebuildOutcome::Failed { .. } => String::new(),
    };
    assert_eq!(id(&leader), id(&waiter));
    assert_eq!(manager.state(), IndexState::Ready);
}

#[tokio::test]
async fn test_queries_see_old_generation_until_swap() {
    let gate = Gated::new();
    let manager = Arc::new(IndexManager::new(gate.clone(), SearchOptions::default()));

    let first = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.rebuild_index().await }
    });
    gate.started.notified().await;
    gate.release.notify_one();
    assert!(first.await.unwrap().is_success());
    assert_eq!(manager.resolve_title("s1"), "第0版");

    let second = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.rebuild_index().await }
    });
    gate.started.notified().await;
    assert_eq!(manager.state(), IndexState::Rebuilding);
    let held = manager.current().unwrap();
    assert_eq!(manager.resolve_title("s1"), "第0版");
    assert_eq!(manager.search("正文")[0].story_name, "第0版");

    gate.release.notify_one();
    assert!(second.await.unwrap().is_success());
    assert_eq!(manager.resolve_title("s1"), "第1版");
    // A reader holding the old generation keeps its answers.
    assert_eq!(held.resolve_title("s1"), "第0版");
}

#[tokio::test]
async fn test_abandoned_rebuild_fails_waiters_and_restores_state() {
    let gate = Gated::new();
    let manager = Arc::new(IndexManager::new(gate.clone(), SearchOptions::default()));

    let leader = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.rebuild_index().await }
    });
    gate.started.notified().await;

    let waiter = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.rebuild_index().await }
    });
    let_other_tasks_run().await;

    leader.abort();
    assert!(leader.await.unwrap_err().is_cancelled());

    let outcome = waiter.await.unwrap();
    assert!(matches!(
        outcome,
        RebuildOutcome::Failed { ref reason, coalesced: true } if reason.contains("abandoned")
    ));
    assert_eq!(manager.state(), IndexState::Empty);
    assert!(manager.current().is_none());

    // The slot is free again.
    let retry = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.rebuild_index().await }
    });
    gate.started.notified().await;
    gate.release.notify_one();
    assert!(retry.await.unwrap().is_success());
    assert_eq!(manager.state(), IndexState::Ready);
}
