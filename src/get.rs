//! Story lookup by id: `story title` and `story open`.
//!
//! An id may be a story id, an alias (e.g. a roguelike record key), or a
//! logical content path in any casing.

use anyhow::{bail, Result};
use serde::Serialize;

use crate::lifecycle::IndexManager;

/// Everything known about one story unit, for `story open --json`.
#[derive(Debug, Clone, Serialize)]
pub struct StoryResponse {
    pub story_id: String,
    pub logical_id: String,
    pub title: String,
    pub category: String,
    pub title_origin: String,
    /// File (or monthly-chat directory) the body was read from.
    pub file: Option<String>,
    pub body: String,
}

/// Look up a unit and its body. Errors when the id is unknown or the unit
/// never reconciled to a corpus file.
pub fn get_story(manager: &IndexManager, id: &str) -> Result<StoryResponse> {
    let Some(generation) = manager.current() else {
        bail!("index is empty; run `story rebuild` first");
    };
    let Some(unit) = generation.unit(id) else {
        bail!("story not found: {}", id);
    };
    let Some(body) = generation.open_story(id) else {
        bail!("story has no text in the corpus: {}", unit.story_id);
    };

    Ok(StoryResponse {
        story_id: unit.story_id.clone(),
        logical_id: unit.logical_id.clone(),
        title: unit.resolved_title.clone(),
        category: unit.category_label(),
        title_origin: unit.source_used.code(),
        file: generation
            .asset_path(id)
            .map(|p| p.display().to_string()),
        body: body.to_string(),
    })
}

/// CLI entry point for `story title <id>`. Never fails: unknown ids print
/// their last path segment.
pub fn run_title(manager: &IndexManager, id: &str) -> Result<()> {
    println!("{}", manager.resolve_title(id));
    Ok(())
}

/// CLI entry point for `story open <id>`.
pub fn run_open(manager: &IndexManager, id: &str, json: bool) -> Result<()> {
    let story = get_story(manager, id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&story)?);
        return Ok(());
    }

    println!("--- Story ---");
    println!("id:           {}", story.story_id);
    println!("title:        {}", story.title);
    println!("category:     {}", story.category);
    println!("path:         {}", story.logical_id);
    println!("title_origin: {}", story.title_origin);
    if let Some(file) = &story.file {
        println!("file:         {}", file);
    }
    println!();
    println!("--- Body ---");
    println!("{}", story.body);

    Ok(())
}
