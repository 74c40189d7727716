//! Path reconciliation: story units → on-disk bodies.
//!
//! A unit's declared path rarely matches the file's casing, so units are
//! looked up by normalized key in the scanned [`PathMap`]. A unit with no
//! asset, or whose asset cannot be read, is unresolved: it stays in the
//! catalog for title lookups but is neither indexed nor openable.

use std::path::Path;

use story_corpus_core::models::{ReconciledAsset, StoryCategory, StoryUnit};
use story_corpus_core::pathmap::{AssetEntry, AssetKind, PathMap};
use tracing::warn;

use crate::error::SyncWarning;
use crate::render::BodyRenderer;

/// Separator between the parts of a multi-file asset.
pub const PART_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub unit: StoryUnit,
    pub asset: Option<ReconciledAsset>,
}

#[derive(Debug, Default)]
pub struct Reconciliation {
    pub entries: Vec<Reconciled>,
    pub warnings: Vec<SyncWarning>,
}

impl Reconciliation {
    pub fn resolved_count(&self) -> usize {
        self.entries.iter().filter(|e| e.asset.is_some()).count()
    }
}

/// Resolve every unit and load its body. `on_progress(n, total)` is called
/// after each unit.
pub fn reconcile(
    units: Vec<StoryUnit>,
    map: &PathMap,
    renderer: &dyn BodyRenderer,
    mut on_progress: impl FnMut(usize, usize),
) -> Reconciliation {
    let total = units.len();
    let mut out = Reconciliation::default();

    for (i, unit) in units.into_iter().enumerate() {
        let key = unit.normalized_key();
        let asset = match map.get(&key, asset_kind(&unit.category)) {
            Some(entry) => match read_body(entry) {
                Ok(raw) => Some(ReconciledAsset {
                    actual_path: entry.actual_path.clone(),
                    body_text: renderer.render(&raw),
                }),
                Err(e) => {
                    warn!(
                        story_id = %unit.story_id,
                        path = %entry.actual_path.display(),
                        "failed to read story body: {}",
                        e
                    );
                    None
                }
            },
            None => None,
        };

        if asset.is_none() {
            let warning = SyncWarning::UnresolvedAsset {
                story_id: unit.story_id.clone(),
                logical_id: unit.logical_id.clone(),
            };
            warn!("{}", warning);
            out.warnings.push(warning);
        }

        out.entries.push(Reconciled { unit, asset });
        on_progress(i + 1, total);
    }

    out
}

/// Monthly chats are stored as a directory of parts. Everything else names
/// a single file.
fn asset_kind(category: &StoryCategory) -> AssetKind {
    match category {
        StoryCategory::RogueMonthlyChat => AssetKind::Directory,
        _ => AssetKind::File,
    }
}

/// Contents of an asset: the file itself, or a directory's parts in order
/// joined by a blank line.
pub fn read_body(entry: &AssetEntry) -> std::io::Result<String> {
    let parts = entry
        .parts
        .iter()
        .map(|p| read_text(p))
        .collect::<std::io::Result<Vec<String>>>()?;
    Ok(parts.join(PART_SEPARATOR))
}

fn read_text(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8(bytes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RawText;
    use std::fs;
    use story_corpus_core::models::{StoryCategory, TitleOrigin};

    fn unit(id: &str, logical: &str, category: StoryCategory) -> StoryUnit {
        StoryUnit {
            story_id: id.to_string(),
            logical_id: logical.to_string(),
            category,
            group: String::new(),
            resolved_title: id.to_string(),
            source_used: TitleOrigin::Filename,
            aliases: Vec::new(),
        }
    }

    fn map_for(root: &Path, files: &[(&str, &[u8])]) -> PathMap {
        let mut map = PathMap::new();
        for (rel, contents) in files {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, contents).unwrap();
            map.insert_file(rel, path).unwrap();
        }
        map
    }

    #[test]
    fn test_case_mismatch_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let map = map_for(
            dir.path(),
            &[("obt/record/main_10/text_main_10_note_1.txt", "笔记正文".as_bytes())],
        );
        let result = reconcile(
            vec![unit(
                "main_10_r1",
                "Obt/Record/main_10/text_main_10_note_1",
                StoryCategory::MainlineNote,
            )],
            &map,
            &RawText,
            |_, _| {},
        );
        let asset = result.entries[0].asset.as_ref().unwrap();
        assert_eq!(asset.body_text, "笔记正文");
        assert!(asset
            .actual_path
            .ends_with("obt/record/main_10/text_main_10_note_1.txt"));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_directory_parts_concatenate_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let map = map_for(
            dir.path(),
            &[
                ("obt/rogue/month_chat_rogue_1_1/month_chat_rogue_1_1_2.txt", "second".as_bytes()),
                ("obt/rogue/month_chat_rogue_1_1/month_chat_rogue_1_1_1.txt", "first".as_bytes()),
            ],
        );
        let result = reconcile(
            vec![unit(
                "chat",
                "obt/rogue/month_chat_rogue_1_1",
                StoryCategory::RogueMonthlyChat,
            )],
            &map,
            &RawText,
            |_, _| {},
        );
        let asset = result.entries[0].asset.as_ref().unwrap();
        assert_eq!(asset.body_text, "first\n\nsecond");
        assert!(asset.actual_path.ends_with("obt/rogue/month_chat_rogue_1_1"));
    }

    #[test]
    fn test_unresolved_and_unreadable_units_warn() {
        let dir = tempfile::tempdir().unwrap();
        let map = map_for(dir.path(), &[("obt/bad.txt", &[0xffu8, 0xfe, 0x00][..])]);
        let mut calls = Vec::new();
        let result = reconcile(
            vec![
                unit("missing", "obt/missing", StoryCategory::Activity),
                unit("bad", "obt/bad", StoryCategory::Activity),
            ],
            &map,
            &RawText,
            |n, total| calls.push((n, total)),
        );
        assert_eq!(result.resolved_count(), 0);
        assert_eq!(result.warnings.len(), 2);
        assert!(result
            .warnings
            .iter()
            .all(|w| w.kind() == "unresolved_asset"));
        assert_eq!(calls, vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn test_directory_does_not_stand_in_for_a_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let map = map_for(
            dir.path(),
            &[("obt/main/level_x/unrelated.txt", "other story".as_bytes())],
        );
        let result = reconcile(
            vec![
                unit("level_x", "Obt/Main/level_x", StoryCategory::MainStory),
                unit("chat", "obt/main/unrelated", StoryCategory::RogueMonthlyChat),
            ],
            &map,
            &RawText,
            |_, _| {},
        );
        assert_eq!(result.resolved_count(), 0);
        assert_eq!(result.warnings.len(), 2);
        assert!(matches!(
            &result.warnings[0],
            SyncWarning::UnresolvedAsset { story_id, .. } if story_id == "level_x"
        ));
    }

    #[test]
    fn test_bom_is_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let map = map_for(dir.path(), &[("a.txt", "\u{feff}hello".as_bytes())]);
        let result = reconcile(
            vec![unit("a", "a", StoryCategory::Activity)],
            &map,
            &RawText,
            |_, _| {},
        );
        assert_eq!(result.entries[0].asset.as_ref().unwrap().body_text, "hello");
    }
}
