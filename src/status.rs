//! Index status overview for `story status`.
//!
//! Shows the lifecycle state, the published generation's counts, and where
//! the snapshot lives, so a user can tell whether a rebuild is needed.

use anyhow::Result;

use crate::config::Config;
use crate::lifecycle::IndexStatus;

pub fn run_status(config: &Config, status: &IndexStatus, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(status)?);
        return Ok(());
    }

    let db_size = std::fs::metadata(&config.index.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Story Index Status");
    println!("==================");
    println!();
    println!("  State:       {}", status.state.as_str());
    println!("  Corpus:      {}", config.corpus.story_path().display());
    println!("  Tables:      {}", config.corpus.tables_path().display());
    if config.index.persist {
        println!(
            "  Snapshot:    {} ({})",
            config.index.path.display(),
            format_bytes(db_size)
        );
    } else {
        println!("  Snapshot:    disabled");
    }

    match &status.generation {
        Some(g) => {
            println!();
            println!("  Generation:  {}", g.generation_id);
            println!(
                "  Built:       {}{}",
                format_ts_relative(g.built_at.timestamp()),
                if g.restored { " (restored)" } else { "" }
            );
            println!("  Units:       {}", g.unit_count);
            println!(
                "  Indexed:     {} / {} ({}%)",
                g.indexed_count,
                g.unit_count,
                if g.unit_count > 0 {
                    (g.indexed_count * 100) / g.unit_count
                } else {
                    0
                }
            );
            println!("  Unresolved:  {}", g.unresolved_count);
            println!("  Warnings:    {}", g.warning_count);
            println!("  Fingerprint: {}", short_digest(&g.fingerprint));
        }
        None => {
            println!();
            println!("  No generation published. Run `story rebuild`.");
        }
    }

    if let Some(err) = &status.last_error {
        println!();
        println!("  Last error:  {}", err);
    }

    println!();
    Ok(())
}

pub(crate) fn short_digest(hex: &str) -> &str {
    hex.get(..12).unwrap_or(hex)
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        format_ts_iso(ts)
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
