//! `story sources`: report which metadata tables are present and parsable.

use anyhow::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};

use story_corpus_core::models::MetadataSource;

use crate::config::Config;
use crate::error::TableError;
use crate::status::short_digest;
use crate::tables::{load_table, table_path};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableHealth {
    Ok,
    Missing,
    Malformed,
}

impl TableHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableHealth::Ok => "OK",
            TableHealth::Missing => "MISSING",
            TableHealth::Malformed => "MALFORMED",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub source: MetadataSource,
    pub file: String,
    pub health: TableHealth,
    pub records: usize,
    /// SHA-256 of the file bytes, when the file could be read.
    pub sha256: Option<String>,
    pub reason: Option<String>,
}

/// Inspect every configured table without building anything.
pub fn inspect_tables(config: &Config) -> Vec<TableReport> {
    let dir = config.corpus.tables_path();
    MetadataSource::ALL
        .into_iter()
        .map(|source| {
            let path = table_path(&dir, &config.tables, source);
            let sha256 = std::fs::read(&path)
                .ok()
                .map(|bytes| format!("{:x}", Sha256::digest(&bytes)));
            let (health, records, reason) = match load_table(source, &path) {
                Ok(records) => (TableHealth::Ok, records.len(), None),
                Err(TableError::Missing { .. }) => (TableHealth::Missing, 0, None),
                Err(TableError::Malformed { reason, .. }) => {
                    (TableHealth::Malformed, 0, Some(reason))
                }
            };
            TableReport {
                source,
                file: config.tables.file_name(source).to_string(),
                health,
                records,
                sha256,
                reason,
            }
        })
        .collect()
}

pub fn list_sources(config: &Config, json: bool) -> Result<()> {
    let reports = inspect_tables(config);

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    let story_path = config.corpus.story_path();
    println!(
        "corpus: {} ({})",
        story_path.display(),
        if story_path.is_dir() { "OK" } else { "NOT FOUND" }
    );
    println!("tables: {}", config.corpus.tables_path().display());
    println!();
    println!(
        "{:<16} {:<10} {:>8}  {:<12}  FILE",
        "SOURCE", "STATUS", "RECORDS", "SHA256"
    );
    for r in &reports {
        println!(
            "{:<16} {:<10} {:>8}  {:<12}  {}",
            r.source.as_str(),
            r.health.as_str(),
            r.records,
            r.sha256.as_deref().map(short_digest).unwrap_or("-"),
            r.file
        );
        if let Some(reason) = &r.reason {
            println!("{:<16} {}", "", reason);
        }
    }

    Ok(())
}
