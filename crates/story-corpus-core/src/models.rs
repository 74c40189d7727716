//! Core data models shared by the resolution, reconciliation, and search layers.
//!
//! These types describe what flows from the metadata tables through the
//! title resolver and path reconciler into the search index. None of them
//! perform I/O.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::normalize::normalized_key;

/// Origin table of a [`MetadataRecord`].
///
/// Each source has its own record schema and its own ordered list of
/// candidate title fields (see [`crate::rules`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataSource {
    /// `story_review_table.json`: activity entries with `infoUnlockDatas` rows.
    StoryReview,
    /// `story_review_meta_table.json`: any object carrying a `contentPath`.
    ReviewMeta,
    /// `story_table.json`: an object keyed by content path.
    StoryTable,
    /// `roguelike_topic_table.json`: nested rogue-mode chats, endbooks and stages.
    RoguelikeTopic,
    /// `zone_table.json`: main-line note records per zone.
    ZoneTable,
}

impl MetadataSource {
    pub const ALL: [MetadataSource; 5] = [
        MetadataSource::StoryReview,
        MetadataSource::ReviewMeta,
        MetadataSource::StoryTable,
        MetadataSource::RoguelikeTopic,
        MetadataSource::ZoneTable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataSource::StoryReview => "story_review",
            MetadataSource::ReviewMeta => "review_meta",
            MetadataSource::StoryTable => "story_table",
            MetadataSource::RoguelikeTopic => "roguelike_topic",
            MetadataSource::ZoneTable => "zone_table",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|src| src.as_str() == s)
    }

    /// File name the game ships this table under.
    pub fn default_file_name(&self) -> &'static str {
        match self {
            MetadataSource::StoryReview => "story_review_table.json",
            MetadataSource::ReviewMeta => "story_review_meta_table.json",
            MetadataSource::StoryTable => "story_table.json",
            MetadataSource::RoguelikeTopic => "roguelike_topic_table.json",
            MetadataSource::ZoneTable => "zone_table.json",
        }
    }
}

impl fmt::Display for MetadataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row extracted from a source table.
///
/// `fields` holds the row object as found in the table. `context` carries
/// selected scalar fields of the enclosing entry (activity name, entry type,
/// zone names) so that a row can be categorized without its parent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetadataRecord {
    /// Map key the row object was found under, if any.
    pub key: Option<String>,
    /// Enclosing entry id (activity id, zone id).
    pub group: Option<String>,
    /// Zero-based position of the row within its group.
    pub ordinal: usize,
    pub fields: Map<String, Value>,
    pub context: Map<String, Value>,
}

impl MetadataRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>, ordinal: usize) -> Self {
        self.group = Some(group.into());
        self.ordinal = ordinal;
        self
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    /// String value of `name`, if present and a string.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// String value of `name` in the enclosing entry's context.
    pub fn context_str(&self, name: &str) -> Option<&str> {
        self.context.get(name).and_then(Value::as_str)
    }
}

/// All records loaded for one build generation, grouped by source.
///
/// A source that was missing or malformed is simply absent.
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    tables: BTreeMap<MetadataSource, Vec<MetadataRecord>>,
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: MetadataSource, records: Vec<MetadataRecord>) {
        self.tables.insert(source, records);
    }

    /// Records for `source`; empty when the source was not loaded.
    pub fn records(&self, source: MetadataSource) -> &[MetadataRecord] {
        self.tables.get(&source).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, source: MetadataSource) -> bool {
        self.tables.contains_key(&source)
    }

    pub fn total_records(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }
}

/// Reader-facing category of a story unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StoryCategory {
    MainStory,
    Activity,
    SideStory,
    CharacterEpisode,
    RogueStage,
    RogueMonthlyChat,
    RogueEndbook,
    RogueOther,
    MainlineNote,
    Rune,
    /// An `entryType` this build does not know about, kept verbatim.
    Other(String),
}

impl StoryCategory {
    /// Map a story review `entryType` to a category.
    pub fn from_entry_type(entry_type: &str) -> Self {
        match entry_type {
            "MAINLINE" => StoryCategory::MainStory,
            "ACTIVITY" | "MINI_ACTIVITY" => StoryCategory::Activity,
            "SIDESTORY" => StoryCategory::SideStory,
            "NONE" => StoryCategory::CharacterEpisode,
            other => StoryCategory::Other(other.to_string()),
        }
    }

    /// Stable code used in persisted snapshots.
    pub fn code(&self) -> &str {
        match self {
            StoryCategory::MainStory => "MAINLINE",
            StoryCategory::Activity => "ACTIVITY",
            StoryCategory::SideStory => "SIDESTORY",
            StoryCategory::CharacterEpisode => "NONE",
            StoryCategory::RogueStage => "ROGUE_STAGE",
            StoryCategory::RogueMonthlyChat => "ROGUE_MONTH_CHAT",
            StoryCategory::RogueEndbook => "ROGUE_ENDBOOK",
            StoryCategory::RogueOther => "ROGUELIKE",
            StoryCategory::MainlineNote => "RECORD",
            StoryCategory::Rune => "RUNE",
            StoryCategory::Other(code) => code,
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            "ROGUE_STAGE" => StoryCategory::RogueStage,
            "ROGUE_MONTH_CHAT" => StoryCategory::RogueMonthlyChat,
            "ROGUE_ENDBOOK" => StoryCategory::RogueEndbook,
            "ROGUELIKE" => StoryCategory::RogueOther,
            "RECORD" => StoryCategory::MainlineNote,
            "RUNE" => StoryCategory::Rune,
            other => StoryCategory::from_entry_type(other),
        }
    }

    /// Display prefix shown in search results.
    pub fn label(&self) -> &str {
        match self {
            StoryCategory::MainStory => "主线",
            StoryCategory::Activity => "活动",
            StoryCategory::SideStory => "支线",
            StoryCategory::CharacterEpisode => "干员密录",
            StoryCategory::RogueStage
            | StoryCategory::RogueMonthlyChat
            | StoryCategory::RogueEndbook
            | StoryCategory::RogueOther => "肉鸽",
            StoryCategory::MainlineNote => "主线笔记",
            StoryCategory::Rune => "危机合约",
            StoryCategory::Other(code) => code,
        }
    }

    /// `"{label} | {group}"`, or just the label when the group adds nothing.
    pub fn format_label(&self, group: &str) -> String {
        let prefix = self.label();
        let name = group.trim();
        if name.is_empty() || name == prefix {
            prefix.to_string()
        } else {
            format!("{} | {}", prefix, name)
        }
    }
}

impl From<String> for StoryCategory {
    fn from(code: String) -> Self {
        StoryCategory::from_code(&code)
    }
}

impl From<StoryCategory> for String {
    fn from(category: StoryCategory) -> Self {
        category.code().to_string()
    }
}

/// Which tier of the title chain produced a unit's display title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TitleOrigin {
    /// A candidate field of the unit's own record.
    Explicit(MetadataSource),
    /// The path → title side-map built from lower-priority sources.
    SideMap,
    /// Last segment of the logical id.
    Filename,
    /// Computed from the corpus layout (rune and monthly-chat files).
    Derived,
}

impl TitleOrigin {
    pub fn code(&self) -> String {
        match self {
            TitleOrigin::Explicit(source) => format!("explicit:{}", source.as_str()),
            TitleOrigin::SideMap => "side_map".to_string(),
            TitleOrigin::Filename => "filename".to_string(),
            TitleOrigin::Derived => "derived".to_string(),
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            "side_map" => TitleOrigin::SideMap,
            "derived" => TitleOrigin::Derived,
            other => other
                .strip_prefix("explicit:")
                .and_then(MetadataSource::from_str_opt)
                .map(TitleOrigin::Explicit)
                .unwrap_or(TitleOrigin::Filename),
        }
    }
}

impl From<String> for TitleOrigin {
    fn from(code: String) -> Self {
        TitleOrigin::from_code(&code)
    }
}

impl From<TitleOrigin> for String {
    fn from(origin: TitleOrigin) -> Self {
        origin.code()
    }
}

/// One narrative item addressable by a logical content path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryUnit {
    pub story_id: String,
    /// Content path as declared in metadata, original casing.
    pub logical_id: String,
    pub category: StoryCategory,
    /// Display group (activity name, zone name, rogue season).
    pub group: String,
    pub resolved_title: String,
    pub source_used: TitleOrigin,
    /// Extra lookup keys, e.g. the roguelike record key.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl StoryUnit {
    pub fn normalized_key(&self) -> String {
        normalized_key(&self.logical_id)
    }

    pub fn category_label(&self) -> String {
        self.category.format_label(&self.group)
    }
}

/// A unit's on-disk text, located by the path reconciler. Its key is the
/// owning unit's [`StoryUnit::normalized_key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledAsset {
    /// The matched file, or the directory for multi-part assets.
    pub actual_path: PathBuf,
    pub body_text: String,
}

/// A search hit as shown to the reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(rename = "storyId")]
    pub story_id: String,
    #[serde(rename = "storyName")]
    pub story_name: String,
    pub category: String,
    #[serde(rename = "matchedText")]
    pub matched_text: String,
}
