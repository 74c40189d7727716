//! `story search`: run a query against the published generation and print
//! the hits.

use anyhow::Result;

use story_corpus_core::models::SearchResult;

use crate::lifecycle::IndexManager;

/// Query the index. `limit` overrides `[search].max_results` for this call.
pub fn search(manager: &IndexManager, query: &str, limit: Option<usize>) -> Vec<SearchResult> {
    match limit {
        Some(limit) => {
            let mut options = *manager.search_options();
            options.limit = limit.max(1);
            manager.search_with(query, &options)
        }
        None => manager.search(query),
    }
}

/// CLI entry point: prints either a table-ish listing or a JSON array.
pub fn run_search(
    manager: &IndexManager,
    query: &str,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let results = search(manager, query, limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, r) in results.iter().enumerate() {
        println!("{}. {}  [{}]", i + 1, r.story_name, r.category);
        println!("    id: {}", r.story_id);
        println!("    > {}", r.matched_text);
        println!();
    }
    println!("{} result(s)", results.len());

    Ok(())
}
