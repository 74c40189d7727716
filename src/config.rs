use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use story_corpus_core::index::SearchOptions;
use story_corpus_core::models::MetadataSource;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub tables: TablesConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// Root of the extracted game data.
    pub root: PathBuf,
    #[serde(default = "default_story_dir")]
    pub story_dir: PathBuf,
    #[serde(default = "default_tables_dir")]
    pub tables_dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_story_dir() -> PathBuf {
    PathBuf::from("zh_CN/gamedata/story")
}
fn default_tables_dir() -> PathBuf {
    PathBuf::from("zh_CN/gamedata/excel")
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.txt".to_string()]
}

impl CorpusConfig {
    pub fn story_path(&self) -> PathBuf {
        self.root.join(&self.story_dir)
    }

    pub fn tables_path(&self) -> PathBuf {
        self.root.join(&self.tables_dir)
    }
}

/// Table file names, relative to `corpus.tables_dir`.
#[derive(Debug, Deserialize, Clone)]
pub struct TablesConfig {
    #[serde(default = "default_story_review")]
    pub story_review: String,
    #[serde(default = "default_review_meta")]
    pub review_meta: String,
    #[serde(default = "default_story_table")]
    pub story_table: String,
    #[serde(default = "default_roguelike_topic")]
    pub roguelike_topic: String,
    #[serde(default = "default_zone_table")]
    pub zone_table: String,
}

fn default_story_review() -> String {
    MetadataSource::StoryReview.default_file_name().to_string()
}
fn default_review_meta() -> String {
    MetadataSource::ReviewMeta.default_file_name().to_string()
}
fn default_story_table() -> String {
    MetadataSource::StoryTable.default_file_name().to_string()
}
fn default_roguelike_topic() -> String {
    MetadataSource::RoguelikeTopic.default_file_name().to_string()
}
fn default_zone_table() -> String {
    MetadataSource::ZoneTable.default_file_name().to_string()
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            story_review: default_story_review(),
            review_meta: default_review_meta(),
            story_table: default_story_table(),
            roguelike_topic: default_roguelike_topic(),
            zone_table: default_zone_table(),
        }
    }
}

impl TablesConfig {
    pub fn file_name(&self, source: MetadataSource) -> &str {
        match source {
            MetadataSource::StoryReview => &self.story_review,
            MetadataSource::ReviewMeta => &self.review_meta,
            MetadataSource::StoryTable => &self.story_table,
            MetadataSource::RoguelikeTopic => &self.roguelike_topic,
            MetadataSource::ZoneTable => &self.zone_table,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

fn default_max_results() -> usize {
    500
}
fn default_snippet_chars() -> usize {
    120
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

impl SearchConfig {
    pub fn options(&self) -> SearchOptions {
        SearchOptions {
            limit: self.max_results,
            snippet_chars: self.snippet_chars,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// SQLite file holding the last published snapshot.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    #[serde(default = "default_persist")]
    pub persist: bool,
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./data/story_index.sqlite")
}
fn default_persist() -> bool {
    true
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            persist: default_persist(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.corpus.root.as_os_str().is_empty() {
        anyhow::bail!("corpus.root must not be empty");
    }

    if config.corpus.include_globs.is_empty() {
        anyhow::bail!("corpus.include_globs must contain at least one pattern");
    }

    for pattern in config
        .corpus
        .include_globs
        .iter()
        .chain(&config.corpus.exclude_globs)
    {
        globset::Glob::new(pattern)
            .with_context(|| format!("Invalid glob pattern in corpus config: {}", pattern))?;
    }

    for source in MetadataSource::ALL {
        if config.tables.file_name(source).trim().is_empty() {
            anyhow::bail!("tables.{} must not be empty", source);
        }
    }

    if config.search.max_results < 1 {
        anyhow::bail!("search.max_results must be >= 1");
    }

    if config.search.snippet_chars < 16 {
        anyhow::bail!("search.snippet_chars must be >= 16");
    }

    if config.index.persist && config.index.path.as_os_str().is_empty() {
        anyhow::bail!("index.path must be set when index.persist is true");
    }

    Ok(())
}
