//! Catalog assembly: loaded tables plus the corpus listing → story units.
//!
//! Sources are processed in a fixed order and units are deduplicated on
//! `(category, normalized key)` with the first unit kept, so a titled
//! record always shadows an untitled listing of the same path:
//!
//! 1. story review rows (main story, activities, side stories, episodes)
//! 2. roguelike topic records with rogue paths
//! 3. story table keys under the rogue trees
//! 4. monthly-chat directories found in the corpus
//! 5. zone table main-line notes
//! 6. crisis-contract (rune) texts found in the corpus
//!
//! The finished list is sorted by story id.

use std::collections::HashSet;

use crate::models::{
    MetadataRecord, MetadataSource, StoryCategory, StoryUnit, TableSet, TitleOrigin,
};
use crate::normalize::{last_segment, normalized_key};
use crate::pathmap::{AssetEntry, PathMap};
use crate::rules::{declared_path, resolve, resolve_display_title, SideMap, MONTH_CHAT_PREFIX};

const ROGUE_ROOT: &str = "obt/rogue";
const ROGUELIKE_ROOT: &str = "obt/roguelike";
const RUNE_ROOT: &str = "obt/rune";

/// Secondary sources feeding the side-map, in priority order.
pub const SIDE_MAP_SOURCES: [MetadataSource; 2] =
    [MetadataSource::ReviewMeta, MetadataSource::RoguelikeTopic];

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub units: Vec<StoryUnit>,
    pub side_map: SideMap,
    /// Units dropped because an earlier unit had the same category and key.
    pub duplicates: usize,
}

impl Catalog {
    pub fn assemble(tables: &TableSet, corpus: &PathMap) -> Catalog {
        let mut side_map = SideMap::new();
        for source in SIDE_MAP_SOURCES {
            side_map.absorb(source, tables.records(source));
        }

        let mut builder = UnitList::default();

        for record in tables.records(MetadataSource::StoryReview) {
            if let Some(unit) = review_unit(record, &side_map) {
                builder.push(unit);
            }
        }

        for record in tables.records(MetadataSource::RoguelikeTopic) {
            if let Some(unit) = rogue_topic_unit(record, &side_map) {
                builder.push(unit);
            }
        }

        for record in tables.records(MetadataSource::StoryTable) {
            if let Some(unit) = story_table_unit(record, &side_map) {
                builder.push(unit);
            }
        }

        for dir in corpus.dirs_under(ROGUE_ROOT) {
            if let Some(unit) = month_chat_unit(dir, &side_map) {
                builder.push(unit);
            }
        }

        for record in tables.records(MetadataSource::ZoneTable) {
            if let Some(unit) = zone_unit(record) {
                builder.push(unit);
            }
        }

        for file in corpus.files_under(RUNE_ROOT) {
            if let Some(unit) = rune_unit(file) {
                builder.push(unit);
            }
        }

        let UnitList {
            mut units,
            duplicates,
            ..
        } = builder;
        units.sort_by(|a, b| a.story_id.cmp(&b.story_id));

        Catalog {
            units,
            side_map,
            duplicates,
        }
    }
}

#[derive(Default)]
struct UnitList {
    units: Vec<StoryUnit>,
    seen: HashSet<(String, String)>,
    duplicates: usize,
}

impl UnitList {
    fn push(&mut self, unit: StoryUnit) {
        let key = (unit.category.code().to_string(), unit.normalized_key());
        if self.seen.insert(key) {
            self.units.push(unit);
        } else {
            self.duplicates += 1;
        }
    }
}

fn explicit(record: &MetadataRecord, source: MetadataSource) -> Option<(String, MetadataSource)> {
    resolve(record, source).map(|title| (title, source))
}

fn review_unit(record: &MetadataRecord, side_map: &SideMap) -> Option<StoryUnit> {
    let source = MetadataSource::StoryReview;
    let logical_id = declared_path(record, source)?;
    let category = StoryCategory::from_entry_type(record.context_str("entryType").unwrap_or(""));
    let group = match record.context_str("name").map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!(
            "{} ({})",
            category.label(),
            record.group.as_deref().unwrap_or("")
        ),
    };
    let story_id = record
        .str_field("storyId")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| logical_id.clone());
    let (resolved_title, source_used) =
        resolve_display_title(explicit(record, source), side_map, &logical_id);

    Some(StoryUnit {
        story_id,
        logical_id,
        category,
        group,
        resolved_title,
        source_used,
        aliases: Vec::new(),
    })
}

fn is_rogue_path(key: &str) -> bool {
    key.starts_with("obt/rogue/") || key.starts_with("obt/roguelike/")
}

fn is_month_chat_path(key: &str) -> bool {
    key.split('/').any(|segment| segment.starts_with(MONTH_CHAT_PREFIX))
}

/// Display group of a rogue path: `RO1` for `obt/roguelike/ro1/...`,
/// `ROGUE_2` for `obt/rogue/rogue_2/...`, and `MONTH_CHAT_ROGUE_1` for the
/// `month_chat_rogue_1_*` directories.
pub fn rogue_group(key: &str) -> String {
    let parts: Vec<&str> = key.split('/').collect();
    let Some(third) = parts.get(2) else {
        return "ROGUE".to_string();
    };
    if key.starts_with(ROGUELIKE_ROOT) {
        return third.to_uppercase();
    }
    month_chat_group(third).unwrap_or_else(|| third.to_uppercase())
}

fn month_chat_group(dir_name: &str) -> Option<String> {
    if !dir_name.starts_with(MONTH_CHAT_PREFIX) {
        return None;
    }
    let prefix = dir_name
        .rsplit_once('_')
        .map(|(head, _)| head)
        .unwrap_or(dir_name);
    Some(prefix.to_uppercase())
}

fn rogue_category(key: &str) -> StoryCategory {
    if key.contains("endbook") {
        StoryCategory::RogueEndbook
    } else if key.starts_with("obt/roguelike/") {
        StoryCategory::RogueStage
    } else {
        StoryCategory::RogueOther
    }
}

fn rogue_topic_unit(record: &MetadataRecord, side_map: &SideMap) -> Option<StoryUnit> {
    let source = MetadataSource::RoguelikeTopic;
    let logical_id = declared_path(record, source)?;
    let key = normalized_key(&logical_id);
    if !is_rogue_path(&key) || is_month_chat_path(&key) {
        return None;
    }
    let (resolved_title, source_used) =
        resolve_display_title(explicit(record, source), side_map, &logical_id);
    let story_id = record
        .key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .unwrap_or_else(|| logical_id.clone());
    let aliases = if story_id == logical_id {
        Vec::new()
    } else {
        vec![logical_id.clone()]
    };

    Some(StoryUnit {
        story_id,
        category: rogue_category(&key),
        group: rogue_group(&key),
        logical_id,
        resolved_title,
        source_used,
        aliases,
    })
}

fn story_table_unit(record: &MetadataRecord, side_map: &SideMap) -> Option<StoryUnit> {
    let logical_id = declared_path(record, MetadataSource::StoryTable)?;
    let key = normalized_key(&logical_id);
    if !is_rogue_path(&key) || is_month_chat_path(&key) {
        return None;
    }
    let (resolved_title, source_used) = resolve_display_title(None, side_map, &logical_id);

    Some(StoryUnit {
        story_id: logical_id.clone(),
        category: rogue_category(&key),
        group: rogue_group(&key),
        logical_id,
        resolved_title,
        source_used,
        aliases: Vec::new(),
    })
}

fn month_chat_unit(dir: &AssetEntry, side_map: &SideMap) -> Option<StoryUnit> {
    let dir_name = last_segment(&dir.relative);
    let group = month_chat_group(&dir_name.to_ascii_lowercase())?;
    // Only direct children of the rogue root.
    if dir.key.matches('/').count() != 2 {
        return None;
    }

    // Titles are declared against the parts; the first part stands in for
    // the whole chat.
    let first_part = dir
        .parts
        .first()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .map(|name| normalized_key(&format!("{}/{}", dir.key, name)))
        .unwrap_or_else(|| dir.key.clone());
    let (resolved_title, source_used) = match side_map.lookup(&first_part) {
        Some(title) => (title.to_string(), TitleOrigin::SideMap),
        None => (dir_name.to_string(), TitleOrigin::Filename),
    };

    Some(StoryUnit {
        story_id: dir.relative.clone(),
        logical_id: dir.relative.clone(),
        category: StoryCategory::RogueMonthlyChat,
        group,
        resolved_title,
        source_used,
        aliases: Vec::new(),
    })
}

fn zone_unit(record: &MetadataRecord) -> Option<StoryUnit> {
    let source = MetadataSource::ZoneTable;
    let zone = record.group.as_deref()?;
    if !zone.starts_with("main_") {
        return None;
    }
    let logical_id = declared_path(record, source)?;
    let record_id = record
        .str_field("recordId")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| (record.ordinal + 1).to_string());

    let chapter = [
        record.context_str("zoneNameFirst"),
        record.context_str("zoneNameSecond"),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join(" ");
    let group = if chapter.is_empty() {
        zone.to_uppercase()
    } else {
        chapter
    };

    let resolved_title = resolve(record, source)?;

    Some(StoryUnit {
        story_id: format!("{}_{}", zone, record_id),
        logical_id,
        category: StoryCategory::MainlineNote,
        group,
        resolved_title,
        source_used: TitleOrigin::Explicit(source),
        aliases: vec![record_id],
    })
}

/// Crisis-contract texts are not listed in any table; titles and ids come
/// from the file layout under `obt/rune`.
fn rune_unit(file: &AssetEntry) -> Option<StoryUnit> {
    let rest = file
        .relative
        .splitn(3, '/')
        .nth(2)
        .filter(|r| !r.is_empty())?;
    let segments: Vec<&str> = rest.split('/').collect();
    let stem_of = |name: &str| -> String {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".txt") {
            name[..name.len() - 4].to_string()
        } else {
            name.to_string()
        }
    };

    let (story_id, resolved_title) = match segments.as_slice() {
        [name] => {
            let stem = stem_of(name);
            let title = if stem.contains("overall") {
                "危机合约 - 序章".to_string()
            } else {
                format!("危机合约 - {}", stem.replace('_', " "))
            };
            (format!("rune_{}", stem), title)
        }
        [folder, name] => {
            let stem = stem_of(name);
            (
                format!("rune_{}_{}", folder, stem),
                format!("危机合约 - {} - {}", folder, stem),
            )
        }
        _ => return None,
    };

    let logical_id = match file.relative.to_ascii_lowercase().ends_with(".txt") {
        true => file.relative[..file.relative.len() - 4].to_string(),
        false => file.relative.clone(),
    };

    Some(StoryUnit {
        story_id,
        logical_id,
        category: StoryCategory::Rune,
        group: String::new(),
        resolved_title,
        source_used: TitleOrigin::Derived,
        aliases: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};
    use std::path::PathBuf;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn corpus(paths: &[&str]) -> PathMap {
        let mut map = PathMap::new();
        for p in paths {
            let _ = map.insert_file(p, PathBuf::from("/c").join(p));
        }
        map
    }

    fn find<'a>(catalog: &'a Catalog, story_id: &str) -> &'a StoryUnit {
        catalog
            .units
            .iter()
            .find(|u| u.story_id == story_id)
            .unwrap_or_else(|| panic!("no unit {story_id}"))
    }

    #[test]
    fn test_review_rows_become_units_by_entry_type() {
        let mut tables = TableSet::new();
        tables.insert(
            MetadataSource::StoryReview,
            vec![
                MetadataRecord::new(obj(json!({
                    "storyId": "main_00_01",
                    "storyName": "黑暗时代·上",
                    "storyTxt": "Obt/Main/level_main_00-01_beg",
                })))
                .with_group("main_0", 0)
                .with_context(obj(json!({"entryType": "MAINLINE", "name": "黑暗时代"}))),
                MetadataRecord::new(obj(json!({
                    "storyId": "act_1",
                    "storyName": "x",
                    "storyTxt": "  ",
                })))
                .with_group("act1", 0)
                .with_context(obj(json!({"entryType": "ACTIVITY", "name": ""}))),
            ],
        );

        let catalog = Catalog::assemble(&tables, &PathMap::new());
        assert_eq!(catalog.units.len(), 1);
        let unit = find(&catalog, "main_00_01");
        assert_eq!(unit.category, StoryCategory::MainStory);
        assert_eq!(unit.group, "黑暗时代");
        assert_eq!(unit.resolved_title, "黑暗时代·上");
        assert_eq!(
            unit.source_used,
            TitleOrigin::Explicit(MetadataSource::StoryReview)
        );
    }

    #[test]
    fn test_review_group_falls_back_to_label_and_id() {
        let mut tables = TableSet::new();
        tables.insert(
            MetadataSource::StoryReview,
            vec![MetadataRecord::new(obj(json!({
                "storyId": "s1",
                "storyTxt": "Obt/Side/s1",
            })))
            .with_group("side_1", 0)
            .with_context(obj(json!({"entryType": "SIDESTORY"})))],
        );
        let catalog = Catalog::assemble(&tables, &PathMap::new());
        let unit = find(&catalog, "s1");
        assert_eq!(unit.group, "支线 (side_1)");
        assert_eq!(unit.resolved_title, "s1");
        assert_eq!(unit.source_used, TitleOrigin::Filename);
    }

    #[test]
    fn test_rogue_sources_dedupe_and_keep_titled_record() {
        let mut tables = TableSet::new();
        tables.insert(
            MetadataSource::RoguelikeTopic,
            vec![MetadataRecord::new(obj(json!({
                "textId": "Obt/Rogue/rogue_2/endbook/endbook_rogue_2_1_1",
                "endbookName": "十字路口",
            })))
            .with_key("endbook_rogue_2_1_1")],
        );
        tables.insert(
            MetadataSource::StoryTable,
            vec![
                MetadataRecord::default().with_key("Obt/Rogue/rogue_2/endbook/endbook_rogue_2_1_1"),
                MetadataRecord::default().with_key("Obt/Roguelike/RO1/level_rogue1_1-1"),
                MetadataRecord::default().with_key("Obt/Main/level_main_01-01"),
            ],
        );

        let catalog = Catalog::assemble(&tables, &PathMap::new());
        assert_eq!(catalog.units.len(), 2);
        assert_eq!(catalog.duplicates, 1);

        let endbook = find(&catalog, "endbook_rogue_2_1_1");
        assert_eq!(endbook.resolved_title, "十字路口");
        assert_eq!(endbook.category, StoryCategory::RogueEndbook);
        assert_eq!(endbook.group, "ROGUE_2");
        assert_eq!(
            endbook.aliases,
            vec!["Obt/Rogue/rogue_2/endbook/endbook_rogue_2_1_1".to_string()]
        );

        let stage = find(&catalog, "Obt/Roguelike/RO1/level_rogue1_1-1");
        assert_eq!(stage.category, StoryCategory::RogueStage);
        assert_eq!(stage.group, "RO1");
        assert_eq!(stage.resolved_title, "level_rogue1_1-1");
    }

    #[test]
    fn test_side_map_titles_story_table_entries() {
        let mut tables = TableSet::new();
        tables.insert(
            MetadataSource::ReviewMeta,
            vec![MetadataRecord::new(obj(json!({
                "contentPath": "obt/rogue/rogue_3/level_rogue3_1",
                "desc": "来自元数据",
            })))],
        );
        tables.insert(
            MetadataSource::StoryTable,
            vec![MetadataRecord::default().with_key("Obt/Rogue/rogue_3/level_rogue3_1")],
        );
        let catalog = Catalog::assemble(&tables, &PathMap::new());
        let unit = &catalog.units[0];
        assert_eq!(unit.resolved_title, "来自元数据");
        assert_eq!(unit.source_used, TitleOrigin::SideMap);
        assert_eq!(unit.category, StoryCategory::RogueOther);
    }

    #[test]
    fn test_month_chat_directories_become_single_units() {
        let mut tables = TableSet::new();
        tables.insert(
            MetadataSource::RoguelikeTopic,
            vec![MetadataRecord::new(obj(json!({
                "chatStoryId": "Obt/Rogue/month_chat_rogue_1_1/month_chat_rogue_1_1_1",
                "chatDesc": "第一次月度聊天",
            })))],
        );
        let map = corpus(&[
            "obt/rogue/month_chat_rogue_1_1/month_chat_rogue_1_1_2.txt",
            "obt/rogue/month_chat_rogue_1_1/month_chat_rogue_1_1_1.txt",
            "obt/rogue/month_chat_rogue_1_2/month_chat_rogue_1_2_1.txt",
        ]);
        let catalog = Catalog::assemble(&tables, &map);
        assert_eq!(catalog.units.len(), 2);

        let first = find(&catalog, "obt/rogue/month_chat_rogue_1_1");
        assert_eq!(first.category, StoryCategory::RogueMonthlyChat);
        assert_eq!(first.group, "MONTH_CHAT_ROGUE_1");
        assert_eq!(first.resolved_title, "第一次月度聊天");
        assert_eq!(first.source_used, TitleOrigin::SideMap);

        let second = find(&catalog, "obt/rogue/month_chat_rogue_1_2");
        assert_eq!(second.resolved_title, "month_chat_rogue_1_2");
    }

    #[test]
    fn test_zone_records_become_mainline_notes() {
        let mut tables = TableSet::new();
        let context = obj(json!({"zoneNameFirst": "第十章", "zoneNameSecond": "破碎日冕"}));
        tables.insert(
            MetadataSource::ZoneTable,
            vec![
                MetadataRecord::new(obj(json!({
                    "recordId": "record_10_1",
                    "recordTitleName": "10-2",
                    "textPath": "Obt/Record/main_10/text_main_10_note_1",
                })))
                .with_group("main_10", 0)
                .with_context(context.clone()),
                MetadataRecord::new(obj(json!({
                    "recordId": "record_w_1",
                    "textPath": "Obt/Record/weekly/x",
                })))
                .with_group("weekly_1", 0),
            ],
        );
        let catalog = Catalog::assemble(&tables, &PathMap::new());
        assert_eq!(catalog.units.len(), 1);
        let unit = find(&catalog, "main_10_record_10_1");
        assert_eq!(unit.resolved_title, "笔记 10-2");
        assert_eq!(unit.group, "第十章 破碎日冕");
        assert_eq!(unit.category_label(), "主线笔记 | 第十章 破碎日冕");
    }

    #[test]
    fn test_rune_files_get_derived_titles() {
        let map = corpus(&[
            "obt/rune/rune_overall_intro.txt",
            "obt/rune/season_1_day.txt",
            "obt/rune/season2/day_1.txt",
        ]);
        let catalog = Catalog::assemble(&TableSet::new(), &map);
        assert_eq!(catalog.units.len(), 3);
        assert_eq!(find(&catalog, "rune_rune_overall_intro").resolved_title, "危机合约 - 序章");
        assert_eq!(find(&catalog, "rune_season_1_day").resolved_title, "危机合约 - season 1 day");
        let nested = find(&catalog, "rune_season2_day_1");
        assert_eq!(nested.resolved_title, "危机合约 - season2 - day_1");
        assert_eq!(nested.logical_id, "obt/rune/season2/day_1");
        assert_eq!(nested.source_used, TitleOrigin::Derived);
        assert_eq!(nested.category_label(), "危机合约");
    }

    #[test]
    fn test_cross_category_collisions_do_not_merge() {
        let mut tables = TableSet::new();
        tables.insert(
            MetadataSource::StoryReview,
            vec![MetadataRecord::new(obj(json!({
                "storyId": "shared",
                "storyName": "Shared",
                "storyTxt": "Obt/Rogue/rogue_1/shared",
            })))
            .with_group("act", 0)
            .with_context(obj(json!({"entryType": "ACTIVITY", "name": "A"})))],
        );
        tables.insert(
            MetadataSource::StoryTable,
            vec![MetadataRecord::default().with_key("Obt/Rogue/rogue_1/shared")],
        );
        let catalog = Catalog::assemble(&tables, &PathMap::new());
        assert_eq!(catalog.units.len(), 2);
        assert_eq!(catalog.duplicates, 0);
    }

    #[test]
    fn test_units_sorted_by_story_id() {
        let map = corpus(&["obt/rune/b.txt", "obt/rune/a.txt"]);
        let catalog = Catalog::assemble(&TableSet::new(), &map);
        let ids: Vec<&str> = catalog.units.iter().map(|u| u.story_id.as_str()).collect();
        assert_eq!(ids, vec!["rune_a", "rune_b"]);
    }

    #[test]
    fn test_rogue_group_keys() {
        assert_eq!(rogue_group("obt/roguelike/ro1/level_rogue1_1"), "RO1");
        assert_eq!(rogue_group("obt/rogue/rogue_2/endbook/x"), "ROGUE_2");
        assert_eq!(rogue_group("obt/rogue/month_chat_rogue_1_1/x"), "MONTH_CHAT_ROGUE_1");
        assert_eq!(rogue_group("obt/rogue"), "ROGUE");
    }
}
