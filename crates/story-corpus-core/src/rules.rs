//! Per-source title extraction rules and the path → title side-map.
//!
//! Each [`MetadataSource`] has one [`ExtractionRule`]: the ordered list of
//! candidate title fields, where its content path lives, and how a found
//! title is rendered. [`resolve`] walks a rule; it never branches on the
//! source itself.
//!
//! Display titles come from a three-tier chain, always in this order:
//!
//! 1. the unit's own record ([`resolve`]),
//! 2. the [`SideMap`] built from lower-priority sources,
//! 3. the last `/` segment of the logical id.

use std::collections::HashMap;

use crate::models::{MetadataRecord, MetadataSource, TitleOrigin};
use crate::normalize::{last_segment, normalized_key, parent_key};

/// How titles and paths are pulled out of one source's records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionRule {
    pub source: MetadataSource,
    /// Candidate title fields, highest priority first.
    pub title_fields: &'static [&'static str],
    /// Candidate content-path fields, highest priority first.
    pub path_fields: &'static [&'static str],
    /// The record's map key is its content path.
    pub key_is_path: bool,
    /// Rendering for a found title; `{}` is replaced with the value.
    pub template: Option<&'static str>,
    /// Render the 1-based ordinal through `template` when no field matches.
    pub ordinal_fallback: bool,
}

pub const RULES: [ExtractionRule; 5] = [
    ExtractionRule {
        source: MetadataSource::StoryReview,
        title_fields: &["storyName"],
        path_fields: &["storyTxt"],
        key_is_path: false,
        template: None,
        ordinal_fallback: false,
    },
    ExtractionRule {
        source: MetadataSource::ReviewMeta,
        title_fields: &["desc", "name", "rawBrief"],
        path_fields: &["contentPath"],
        key_is_path: false,
        template: None,
        ordinal_fallback: false,
    },
    ExtractionRule {
        source: MetadataSource::StoryTable,
        title_fields: &[],
        path_fields: &[],
        key_is_path: true,
        template: None,
        ordinal_fallback: false,
    },
    ExtractionRule {
        source: MetadataSource::RoguelikeTopic,
        title_fields: &["endbookName", "teamName", "chatDesc", "title"],
        path_fields: &["textId", "chatStoryId", "chatId", "avgId"],
        key_is_path: false,
        template: None,
        ordinal_fallback: false,
    },
    ExtractionRule {
        source: MetadataSource::ZoneTable,
        title_fields: &["recordTitleName"],
        path_fields: &["textPath"],
        key_is_path: false,
        template: Some("笔记 {}"),
        ordinal_fallback: true,
    },
];

pub fn rule_for(source: MetadataSource) -> &'static ExtractionRule {
    RULES
        .iter()
        .find(|rule| rule.source == source)
        .unwrap_or(&RULES[0])
}

fn render(template: Option<&str>, value: &str) -> String {
    match template {
        Some(t) => t.replacen("{}", value, 1),
        None => value.to_string(),
    }
}

/// First non-blank string among `fields`, trimmed.
fn first_non_blank<'a>(record: &'a MetadataRecord, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .filter_map(|f| record.str_field(f))
        .map(str::trim)
        .find(|v| !v.is_empty())
}

/// Explicit title of `record` under `source`'s rule.
///
/// Returns the first candidate field that is a string and non-blank after
/// trimming, rendered through the rule's template. Non-string values are
/// skipped, not stringified.
pub fn resolve(record: &MetadataRecord, source: MetadataSource) -> Option<String> {
    let rule = rule_for(source);
    match first_non_blank(record, rule.title_fields) {
        Some(value) => Some(render(rule.template, value)),
        None if rule.ordinal_fallback => {
            Some(render(rule.template, &(record.ordinal + 1).to_string()))
        }
        None => None,
    }
}

/// Content path `record` declares, in its original casing.
pub fn declared_path(record: &MetadataRecord, source: MetadataSource) -> Option<String> {
    let rule = rule_for(source);
    if rule.key_is_path {
        return record
            .key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);
    }
    first_non_blank(record, rule.path_fields).map(str::to_string)
}

/// Directory name prefix of a roguelike monthly chat. Its parts inherit the
/// directory's title.
pub const MONTH_CHAT_PREFIX: &str = "month_chat_rogue_";

/// Normalized path → title, filled from secondary sources.
///
/// The first title inserted for a key is kept; later sources never
/// overwrite it.
#[derive(Debug, Clone, Default)]
pub struct SideMap {
    entries: HashMap<String, (String, MetadataSource)>,
}

impl SideMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `title` for `path`. Returns false if the key already had one.
    pub fn insert(&mut self, path: &str, title: &str, source: MetadataSource) -> bool {
        let key = normalized_key(path);
        let title = title.trim();
        if key.is_empty() || title.is_empty() || self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, (title.to_string(), source));
        true
    }

    /// Add every record of `source` that declares both a path and a title.
    pub fn absorb(&mut self, source: MetadataSource, records: &[MetadataRecord]) -> usize {
        records
            .iter()
            .filter_map(|r| Some((declared_path(r, source)?, resolve(r, source)?)))
            .filter(|(path, title)| self.insert(path, title, source))
            .count()
    }

    /// Title for a normalized key: the key itself, then, for monthly-chat
    /// parts only, the enclosing chat directory and its bare name.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        if let Some((title, _)) = self.entries.get(key) {
            return Some(title.as_str());
        }
        let parent = parent_key(key)?;
        if !last_segment(parent).starts_with(MONTH_CHAT_PREFIX) {
            return None;
        }
        self.entries
            .get(parent)
            .or_else(|| self.entries.get(last_segment(parent)))
            .map(|(title, _)| title.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Run the three-tier chain for one unit.
pub fn resolve_display_title(
    explicit: Option<(String, MetadataSource)>,
    side_map: &SideMap,
    logical_id: &str,
) -> (String, TitleOrigin) {
    if let Some((title, source)) = explicit {
        if !title.trim().is_empty() {
            return (title, TitleOrigin::Explicit(source));
        }
    }
    if let Some(title) = side_map.lookup(&normalized_key(logical_id)) {
        return (title.to_string(), TitleOrigin::SideMap);
    }
    (last_segment(logical_id).to_string(), TitleOrigin::Filename)
}
