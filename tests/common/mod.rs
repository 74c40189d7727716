#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use story_corpus::config::{Config, CorpusConfig, IndexConfig, SearchConfig, TablesConfig};

pub const STORY_DIR: &str = "zh_CN/gamedata/story";
pub const TABLES_DIR: &str = "zh_CN/gamedata/excel";

fn write_json(dir: &Path, name: &str, value: &Value) {
    fs::write(dir.join(name), serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn write_story(root: &Path, relative: &str, body: &str) {
    let path = root.join(STORY_DIR).join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

/// A small extracted game tree under `root`:
///
/// - an activity story titled 枯萎之声 and a titled main story
/// - a main story whose file is missing (unresolved)
/// - a rogue endbook titled 十字路口 through `endbookName`
/// - a main-line note titled through the zone table
///
/// `story_review_meta_table.json` and `story_table.json` are absent.
pub fn write_game(root: &Path) {
    let tables = root.join(TABLES_DIR);
    fs::create_dir_all(&tables).unwrap();

    write_json(
        &tables,
        "story_review_table.json",
        &json!({
            "act_withered": {
                "entryType": "ACTIVITY",
                "name": "枯萎之地",
                "infoUnlockDatas": [
                    {
                        "storyId": "act_withered_st01",
                        "storyTxt": "Activities/Act_Withered/level_act_withered_st01",
                        "storyName": "枯萎之声"
                    }
                ]
            },
            "main_0": {
                "entryType": "MAINLINE",
                "name": "黑暗时代",
                "infoUnlockDatas": [
                    {
                        "storyId": "main_00_01",
                        "storyTxt": "Obt/Main/level_main_00-01_beg",
                        "storyName": "序章"
                    },
                    {
                        "storyId": "main_00_02",
                        "storyTxt": "Obt/Main/level_main_00-02_beg",
                        "storyName": "   "
                    }
                ]
            }
        }),
    );

    write_json(
        &tables,
        "roguelike_topic_table.json",
        &json!({
            "details": {
                "rogue_2": {
                    "endbook": {
                        "endbook_rogue_2_1_1": {
                            "textId": "Obt/Rogue/rogue_2/endbook/endbook_rogue_2_1_1",
                            "endbookName": "十字路口",
                            "title": "不该被选中的标题"
                        }
                    }
                }
            }
        }),
    );

    write_json(
        &tables,
        "zone_table.json",
        &json!({
            "zones": {
                "main_10": {"zoneNameFirst": "第十章", "zoneNameSecond": "破碎日冕"}
            },
            "zoneRecordGroupedData": {
                "main_10": {
                    "records": [
                        {
                            "recordId": "record_main_10_2",
                            "recordTitleName": "10-2",
                            "rewards": [
                                {"textPath": "Obt/Record/main_10/text_main_10_note_1"}
                            ]
                        }
                    ]
                }
            }
        }),
    );

    write_story(
        root,
        "activities/act_withered/level_act_withered_st01.txt",
        "风吹过荒原。\n枯萎的花在低语，没有人回答。",
    );
    write_story(root, "Obt/Main/level_main_00-01_beg.txt", "博士在石棺中醒来。");
    write_story(
        root,
        "obt/rogue/rogue_2/endbook/endbook_rogue_2_1_1.txt",
        "你站在十字路口，远处传来钟声。",
    );
    write_story(
        root,
        "obt/record/main_10/text_main_10_note_1.txt",
        "笔记正文：切尔诺伯格的夜晚。",
    );
}

pub fn game_config(root: &Path) -> Config {
    Config {
        corpus: CorpusConfig {
            root: root.to_path_buf(),
            story_dir: STORY_DIR.into(),
            tables_dir: TABLES_DIR.into(),
            include_globs: vec!["**/*.txt".to_string()],
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        },
        tables: TablesConfig::default(),
        search: SearchConfig::default(),
        index: IndexConfig {
            path: root.join("data/story_index.sqlite"),
            persist: true,
        },
    }
}

/// Write `config/story.toml` pointing at the game tree under `root`.
pub fn write_config_file(root: &Path) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let content = format!(
        r#"[corpus]
root = "{root}/game"

[search]
max_results = 50
snippet_chars = 60

[index]
path = "{root}/data/story_index.sqlite"
"#,
        root = root.display()
    );
    let path = config_dir.join("story.toml");
    fs::write(&path, content).unwrap();
    path
}
