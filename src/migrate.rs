use anyhow::Result;
use sqlx::SqlitePool;

/// Create the snapshot tables if they do not exist. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Snapshot identity: format_version, generation_id, built_at, fingerprint
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS story_index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per story unit, in generation order
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS story_units (
            ordinal INTEGER PRIMARY KEY,
            story_id TEXT NOT NULL,
            logical_id TEXT NOT NULL,
            category TEXT NOT NULL,
            group_name TEXT NOT NULL,
            title TEXT NOT NULL,
            title_origin TEXT NOT NULL,
            aliases_json TEXT NOT NULL DEFAULT '[]',
            actual_path TEXT,
            body TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Databases written before asset paths were stored
    let has_path: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('story_units') WHERE name = 'actual_path'",
    )
    .fetch_one(pool)
    .await?;
    if has_path == 0 {
        sqlx::query("ALTER TABLE story_units ADD COLUMN actual_path TEXT")
            .execute(pool)
            .await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_story_units_story_id ON story_units(story_id)")
        .execute(pool)
        .await?;

    Ok(())
}
