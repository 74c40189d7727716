//! Immutable in-memory inverted index over resolved story units.
//!
//! # Query algorithm
//!
//! 1. Fold the query; a blank query returns nothing.
//! 2. Tokenize it and drop repeated terms.
//! 3. Intersect the posting lists of every term (AND).
//! 4. Keep only documents where every whitespace-separated query segment
//!    occurs verbatim in the folded title or body.
//! 5. Rank by matched `(term, field)` pairs, then total occurrences, then
//!    insertion order.
//! 6. Truncate to the limit and cut a snippet around the first body match.

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::models::SearchResult;
use crate::normalize::{fold, normalize_text};
use crate::tokenizer::{query_segments, query_terms, tokenize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Title,
    Body,
}

/// Occurrences of one term in one field of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub doc: u32,
    pub field: Field,
    pub occurrences: u32,
}

/// Input to [`InvertedIndex::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDoc {
    pub story_id: String,
    pub title: String,
    /// Category label shown with results.
    pub category: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub limit: usize,
    pub snippet_chars: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 500,
            snippet_chars: 120,
        }
    }
}

#[derive(Debug)]
struct DocEntry {
    doc: IndexedDoc,
    folded_title: String,
    folded_body: String,
}

#[derive(Debug, Default)]
pub struct InvertedIndex {
    docs: Vec<DocEntry>,
    postings: HashMap<String, Vec<Posting>>,
}

impl InvertedIndex {
    pub fn build(docs: Vec<IndexedDoc>) -> InvertedIndex {
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut entries = Vec::with_capacity(docs.len());

        for (ordinal, doc) in docs.into_iter().enumerate() {
            let ordinal = ordinal as u32;
            let folded_title = fold(&doc.title);
            let folded_body = fold(&doc.body);
            add_field(&mut postings, ordinal, Field::Title, &folded_title);
            add_field(&mut postings, ordinal, Field::Body, &folded_body);
            entries.push(DocEntry {
                doc,
                folded_title,
                folded_body,
            });
        }

        InvertedIndex {
            docs: entries,
            postings,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Document by insertion ordinal.
    pub fn doc(&self, ordinal: u32) -> Option<&IndexedDoc> {
        self.docs.get(ordinal as usize).map(|e| &e.doc)
    }

    pub fn postings(&self, term: &str) -> &[Posting] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchResult> {
        let folded = fold(query);
        if folded.trim().is_empty() || options.limit == 0 {
            return Vec::new();
        }
        let terms = query_terms(&folded);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut lists: Vec<&[Posting]> = terms.iter().map(|t| self.postings(t)).collect();
        if lists.iter().any(|l| l.is_empty()) {
            return Vec::new();
        }
        lists.sort_by_key(|l| l.len());

        let mut candidates: Vec<u32> = lists[0].iter().map(|p| p.doc).collect();
        candidates.dedup();
        for list in &lists[1..] {
            candidates.retain(|doc| list.binary_search_by_key(doc, |p| p.doc).is_ok());
        }

        let segments = query_segments(&folded);
        let mut scored: Vec<(usize, u64, u32)> = candidates
            .into_iter()
            .filter(|&doc| {
                let entry = &self.docs[doc as usize];
                segments.iter().all(|s| {
                    entry.folded_title.contains(s) || entry.folded_body.contains(s)
                })
            })
            .map(|doc| {
                let (matched, occurrences) = lists.iter().fold((0usize, 0u64), |acc, list| {
                    doc_postings(list, doc)
                        .iter()
                        .fold(acc, |(m, o), p| (m + 1, o + p.occurrences as u64))
                });
                (matched, occurrences, doc)
            })
            .collect();

        scored.sort_by_key(|&(matched, occurrences, doc)| {
            (Reverse(matched), Reverse(occurrences), doc)
        });
        scored.truncate(options.limit);

        scored
            .into_iter()
            .map(|(_, _, doc)| {
                let entry = &self.docs[doc as usize];
                SearchResult {
                    story_id: entry.doc.story_id.clone(),
                    story_name: entry.doc.title.clone(),
                    category: entry.doc.category.clone(),
                    matched_text: snippet(entry, &segments, options.snippet_chars),
                }
            })
            .collect()
    }
}

/// The (at most two) postings of `doc` in a list ordered by doc.
fn doc_postings(list: &[Posting], doc: u32) -> &[Posting] {
    let start = list.partition_point(|p| p.doc < doc);
    let len = list[start..].partition_point(|p| p.doc == doc);
    &list[start..start + len]
}

fn add_field(
    postings: &mut HashMap<String, Vec<Posting>>,
    doc: u32,
    field: Field,
    folded: &str,
) {
    let mut local: HashMap<String, Posting> = HashMap::new();
    for term in tokenize(folded) {
        local
            .entry(term)
            .and_modify(|p| p.occurrences += 1)
            .or_insert(Posting {
                doc,
                field,
                occurrences: 1,
            });
    }
    // Title postings for a doc are pushed before its body postings, so each
    // list stays ordered by (doc, field).
    for (term, posting) in local {
        postings.entry(term).or_default().push(posting);
    }
}

const ELLIPSIS: &str = "...";

/// Text around the first body match, at most `max_chars` chars including
/// ellipses. Falls back to the title when only the title matched.
fn snippet(entry: &DocEntry, segments: &[&str], max_chars: usize) -> String {
    let first_in_body = segments
        .iter()
        .filter_map(|s| entry.folded_body.find(s).map(|pos| (pos, *s)))
        .min_by_key(|(pos, _)| *pos);

    let Some((_, segment)) = first_in_body else {
        return truncate_chars(&entry.doc.title, max_chars);
    };

    let mapped = normalize_text(&entry.doc.body);
    let Some(hit) = mapped.find(segment) else {
        return truncate_chars(&entry.doc.title, max_chars);
    };

    let chars: Vec<char> = entry.doc.body.chars().collect();
    let total = chars.len();
    let (start, end) = if total <= max_chars {
        (0, total)
    } else {
        let width = max_chars.saturating_sub(2 * ELLIPSIS.len()).max(1);
        let hit_len = hit.len();
        let start = if hit_len >= width {
            hit.start
        } else {
            hit.start.saturating_sub((width - hit_len) / 2)
        };
        let start = start.min(total - width);
        (start, start + width)
    };

    let window: String = chars[start..end]
        .iter()
        .map(|c| if c.is_whitespace() { ' ' } else { *c })
        .collect();
    let mut out = String::new();
    if start > 0 {
        out.push_str(ELLIPSIS);
    }
    out.push_str(window.trim());
    if end < total {
        out.push_str(ELLIPSIS);
    }
    out
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
