//! SQLite-backed [`SnapshotStore`].
//!
//! The snapshot lives in two tables: `story_index_meta` (key/value
//! identity of the generation) and `story_units` (one row per unit with
//! its asset path and body, `NULL` for unresolved units). Saving replaces both in a single
//! transaction, so a reader never sees a mix of two generations.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use story_corpus_core::models::{ReconciledAsset, StoryCategory, StoryUnit, TitleOrigin};
use story_corpus_core::store::{Snapshot, SnapshotStore, SnapshotUnit, SNAPSHOT_FORMAT_VERSION};

use crate::error::StoreError;
use crate::migrate::run_migrations;

pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the snapshot database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = connect(path).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM story_units")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM story_index_meta")
            .execute(&mut *tx)
            .await?;

        let meta = [
            ("format_version", snapshot.format_version.to_string()),
            ("generation_id", snapshot.generation_id.clone()),
            ("built_at", snapshot.built_at.to_string()),
            ("fingerprint", snapshot.fingerprint.clone()),
        ];
        for (key, value) in meta {
            sqlx::query("INSERT INTO story_index_meta (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        for (ordinal, entry) in snapshot.units.iter().enumerate() {
            let unit = &entry.unit;
            let aliases = serde_json::to_string(&unit.aliases)?;
            sqlx::query(
                r#"
                INSERT INTO story_units (ordinal, story_id, logical_id, category, group_name,
                                         title, title_origin, aliases_json, actual_path, body)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(ordinal as i64)
            .bind(&unit.story_id)
            .bind(&unit.logical_id)
            .bind(unit.category.code())
            .bind(&unit.group)
            .bind(&unit.resolved_title)
            .bind(unit.source_used.code())
            .bind(aliases)
            .bind(
                entry
                    .asset
                    .as_ref()
                    .map(|a| a.actual_path.to_string_lossy().into_owned()),
            )
            .bind(entry.asset.as_ref().map(|a| a.body_text.as_str()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Option<Snapshot>, StoreError> {
        let rows = sqlx::query("SELECT key, value FROM story_index_meta")
            .fetch_all(&self.pool)
            .await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut format_version = None;
        let mut generation_id = String::new();
        let mut built_at = 0i64;
        let mut fingerprint = String::new();
        for row in rows {
            let key: String = row.get("key");
            let value: String = row.get("value");
            match key.as_str() {
                "format_version" => format_version = value.parse::<u32>().ok(),
                "generation_id" => generation_id = value,
                "built_at" => built_at = value.parse().unwrap_or(0),
                "fingerprint" => fingerprint = value,
                _ => {}
            }
        }

        let format_version = format_version
            .ok_or_else(|| StoreError::Other("snapshot has no format_version".to_string()))?;

        let mut snapshot = Snapshot {
            format_version,
            generation_id,
            built_at,
            fingerprint,
            units: Vec::new(),
        };
        // Rows written by another format are not read; the caller will
        // discard the snapshot anyway.
        if format_version != SNAPSHOT_FORMAT_VERSION {
            return Ok(Some(snapshot));
        }

        let rows = sqlx::query(
            r#"
            SELECT story_id, logical_id, category, group_name, title, title_origin,
                   aliases_json, actual_path, body
            FROM story_units
            ORDER BY ordinal ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        for row in rows {
            let category: String = row.get("category");
            let origin: String = row.get("title_origin");
            let aliases_json: String = row.get("aliases_json");
            let actual_path: Option<String> = row.get("actual_path");
            let body: Option<String> = row.get("body");
            snapshot.units.push(SnapshotUnit {
                unit: StoryUnit {
                    story_id: row.get("story_id"),
                    logical_id: row.get("logical_id"),
                    category: StoryCategory::from_code(&category),
                    group: row.get("group_name"),
                    resolved_title: row.get("title"),
                    source_used: TitleOrigin::from_code(&origin),
                    aliases: serde_json::from_str(&aliases_json)?,
                },
                asset: body.map(|body_text| ReconciledAsset {
                    actual_path: actual_path.map(PathBuf::from).unwrap_or_default(),
                    body_text,
                }),
            });
        }

        Ok(Some(snapshot))
    }
}

/// WAL-mode pool on `path`; the parent directory is created if missing.
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);
    Ok(SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?)
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        Ok(self.save_snapshot(snapshot).await?)
    }

    async fn load(&self) -> Result<Option<Snapshot>> {
        Ok(self.load_snapshot().await?)
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM story_units")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM story_index_meta")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
