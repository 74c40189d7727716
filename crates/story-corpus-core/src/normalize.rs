//! Key and text normalization.
//!
//! Two unrelated normalizations live here:
//!
//! - [`normalized_key`] turns a declared content path into the key used to
//!   match metadata against files on disk. Metadata and the corpus disagree
//!   on casing and separators, so the key folds both.
//! - [`normalize_text`] folds text for indexing and matching (NFKC, lower
//!   case, combining marks removed) while remembering where every output
//!   character came from, so snippets can be cut from the original text.

use std::ops::Range;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonical lookup key for a logical content path.
///
/// `\` becomes `/`, empty segments are dropped (which collapses repeated
/// separators and trims leading/trailing ones), ASCII letters are lower
/// cased and any trailing `.txt` extension is removed. Non-ASCII characters
/// pass through unchanged.
pub fn normalized_key(logical_id: &str) -> String {
    let lowered = logical_id.replace('\\', "/").to_ascii_lowercase();
    let mut segments: Vec<&str> = lowered.split('/').filter(|s| !s.is_empty()).collect();

    while let Some(&last) = segments.last() {
        match last.strip_suffix(".txt") {
            Some("") => {
                segments.pop();
            }
            Some(stem) => {
                segments.pop();
                segments.push(stem);
            }
            None => break,
        }
    }

    segments.join("/")
}

/// Key of the enclosing directory, if the key has more than one segment.
pub fn parent_key(key: &str) -> Option<&str> {
    key.rsplit_once('/').map(|(parent, _)| parent)
}

/// Last non-empty `/`-delimited segment, preserved exactly.
pub fn last_segment(path: &str) -> &str {
    path.rsplit('/').find(|s| !s.is_empty()).unwrap_or(path)
}

/// Text folded for matching, with a map back to the source characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub text: String,
    /// `origin[i]` is the char index in the source of the i-th char of `text`.
    origin: Vec<usize>,
    source_chars: usize,
}

impl NormalizedText {
    /// Number of chars in the source text.
    pub fn source_len(&self) -> usize {
        self.source_chars
    }

    /// First occurrence of `needle` (already normalized), as a char range in
    /// the source text.
    pub fn find(&self, needle: &str) -> Option<Range<usize>> {
        if needle.is_empty() {
            return None;
        }
        let byte_start = self.text.find(needle)?;
        let start = self.text[..byte_start].chars().count();
        let len = needle.chars().count();
        Some(self.source_range(start, start + len))
    }

    /// Map a char range of `text` to a char range of the source.
    pub fn source_range(&self, start: usize, end: usize) -> Range<usize> {
        let src_start = self.origin.get(start).copied().unwrap_or(self.source_chars);
        let src_end = if end == 0 {
            src_start
        } else {
            self.origin
                .get(end - 1)
                .map(|i| i + 1)
                .unwrap_or(self.source_chars)
        };
        src_start..src_end.max(src_start)
    }
}

/// Fold `source` for indexing: NFKC, lower case, combining marks removed.
///
/// Applied one source character at a time so the mapping back to the
/// source stays exact.
pub fn normalize_text(source: &str) -> NormalizedText {
    let mut text = String::with_capacity(source.len());
    let mut origin = Vec::with_capacity(source.len());
    let mut count = 0;

    for (idx, c) in source.chars().enumerate() {
        count += 1;
        if c.is_ascii() {
            text.push(c.to_ascii_lowercase());
            origin.push(idx);
            continue;
        }
        for folded in std::iter::once(c).nfkc() {
            if is_combining_mark(folded) {
                continue;
            }
            for lower in folded.to_lowercase() {
                text.push(lower);
                origin.push(idx);
            }
        }
    }

    NormalizedText {
        text,
        origin,
        source_chars: count,
    }
}

/// Shorthand for the folded string alone.
pub fn fold(source: &str) -> String {
    normalize_text(source).text
}
