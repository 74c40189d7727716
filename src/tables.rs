//! Metadata table loading.
//!
//! Each source table is a JSON file with its own shape. Loading turns one
//! file into a flat list of [`MetadataRecord`]s and knows nothing about
//! titles, categories, or the corpus. Object keys are visited in sorted
//! order so the output is the same on every run.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use story_corpus_core::models::{MetadataRecord, MetadataSource, TableSet};
use story_corpus_core::rules::rule_for;
use tracing::{debug, warn};

use crate::config::TablesConfig;
use crate::error::{SyncWarning, TableError};

/// Load one table. Absent → [`TableError::Missing`]; unreadable JSON or a
/// top-level shape the source does not use → [`TableError::Malformed`].
pub fn load_table(source: MetadataSource, path: &Path) -> Result<Vec<MetadataRecord>, TableError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TableError::Missing {
                source_name: source,
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(malformed(source, path, e.to_string())),
    };

    let value: Value =
        serde_json::from_str(&content).map_err(|e| malformed(source, path, e.to_string()))?;

    let records = extract(source, &value).map_err(|reason| malformed(source, path, reason))?;
    debug!(source = %source, records = records.len(), "loaded table");
    Ok(records)
}

/// Like [`load_table`], but a problem degrades to zero records plus a
/// warning. `None` records means the source should be treated as absent.
pub fn load_optional(
    source: MetadataSource,
    path: &Path,
) -> (Option<Vec<MetadataRecord>>, Option<SyncWarning>) {
    match load_table(source, path) {
        Ok(records) => (Some(records), None),
        Err(err) => {
            warn!(source = %err.source_kind(), "{}", err);
            (None, Some(err.into()))
        }
    }
}

/// Load every source from `dir`. Problem sources are left out of the set.
pub fn load_table_set(dir: &Path, names: &TablesConfig) -> (TableSet, Vec<SyncWarning>) {
    let mut set = TableSet::new();
    let mut warnings = Vec::new();

    for source in MetadataSource::ALL {
        let path = table_path(dir, names, source);
        let (records, warning) = load_optional(source, &path);
        if let Some(records) = records {
            set.insert(source, records);
        }
        warnings.extend(warning);
    }

    (set, warnings)
}

pub fn table_path(dir: &Path, names: &TablesConfig, source: MetadataSource) -> PathBuf {
    dir.join(names.file_name(source))
}

fn malformed(source: MetadataSource, path: &Path, reason: String) -> TableError {
    TableError::Malformed {
        source_name: source,
        path: path.to_path_buf(),
        reason,
    }
}

fn extract(source: MetadataSource, value: &Value) -> Result<Vec<MetadataRecord>, String> {
    let root = value
        .as_object()
        .ok_or_else(|| "top-level value is not an object".to_string())?;

    let records = match source {
        MetadataSource::StoryReview => extract_story_review(root),
        MetadataSource::ReviewMeta | MetadataSource::RoguelikeTopic => {
            let fields = rule_for(source).path_fields;
            let mut out = Vec::new();
            collect_carriers(value, None, fields, &mut out);
            out
        }
        MetadataSource::StoryTable => sorted(root)
            .map(|(key, v)| {
                MetadataRecord::new(v.as_object().cloned().unwrap_or_default()).with_key(key)
            })
            .collect(),
        MetadataSource::ZoneTable => extract_zone_table(root)?,
    };
    Ok(records)
}

fn sorted(map: &Map<String, Value>) -> impl Iterator<Item = (&String, &Value)> {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries.into_iter()
}

fn pick_context(entry: &Map<String, Value>, names: &[&str]) -> Map<String, Value> {
    names
        .iter()
        .filter_map(|n| entry.get(*n).map(|v| (n.to_string(), v.clone())))
        .collect()
}

/// `{ activityId: { entryType, name, infoUnlockDatas: [row, ...] } }`
fn extract_story_review(root: &Map<String, Value>) -> Vec<MetadataRecord> {
    let mut out = Vec::new();
    for (id, entry) in sorted(root) {
        let Some(entry) = entry.as_object() else {
            continue;
        };
        let Some(rows) = entry.get("infoUnlockDatas").and_then(Value::as_array) else {
            continue;
        };
        let context = pick_context(entry, &["entryType", "name", "actType"]);
        for (ordinal, row) in rows.iter().enumerate() {
            if let Some(fields) = row.as_object() {
                out.push(
                    MetadataRecord::new(fields.clone())
                        .with_group(id.clone(), ordinal)
                        .with_context(context.clone()),
                );
            }
        }
    }
    out
}

/// Every object, at any depth, that carries one of `fields` as a string.
fn collect_carriers(
    value: &Value,
    key: Option<&str>,
    fields: &[&str],
    out: &mut Vec<MetadataRecord>,
) {
    match value {
        Value::Object(obj) => {
            if fields.iter().any(|f| obj.get(*f).is_some_and(Value::is_string)) {
                let mut record = MetadataRecord::new(obj.clone());
                if let Some(k) = key {
                    record = record.with_key(k);
                }
                out.push(record);
            }
            for (k, v) in sorted(obj) {
                collect_carriers(v, Some(k), fields, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_carriers(item, None, fields, out);
            }
        }
        _ => {}
    }
}

/// `zoneRecordGroupedData.<zone>.records[]`, with zone names from `zones`.
fn extract_zone_table(root: &Map<String, Value>) -> Result<Vec<MetadataRecord>, String> {
    let grouped = root
        .get("zoneRecordGroupedData")
        .and_then(Value::as_object)
        .ok_or_else(|| "zoneRecordGroupedData not found".to_string())?;
    let zones = root.get("zones").and_then(Value::as_object);

    let mut out = Vec::new();
    for (zone_id, group) in sorted(grouped) {
        let Some(records) = group.get("records").and_then(Value::as_array) else {
            continue;
        };
        let context = zones
            .and_then(|z| z.get(zone_id))
            .and_then(Value::as_object)
            .map(|z| pick_context(z, &["zoneNameFirst", "zoneNameSecond"]))
            .unwrap_or_default();

        for (ordinal, record) in records.iter().enumerate() {
            let Some(fields) = record.as_object() else {
                continue;
            };
            let mut fields = fields.clone();
            if !fields.contains_key("textPath") {
                if let Some(path) = first_reward_text_path(&fields) {
                    fields.insert("textPath".to_string(), Value::String(path));
                }
            }
            out.push(
                MetadataRecord::new(fields)
                    .with_group(zone_id.clone(), ordinal)
                    .with_context(context.clone()),
            );
        }
    }
    Ok(out)
}

fn first_reward_text_path(fields: &Map<String, Value>) -> Option<String> {
    fields
        .get("rewards")?
        .as_array()?
        .iter()
        .filter_map(|r| r.get("textPath").and_then(Value::as_str))
        .map(str::trim)
        .find(|p| !p.is_empty())
        .map(str::to_string)
}
