//! Whitespace- and ideograph-aware tokenizer.
//!
//! Input is expected to be folded already (see [`crate::normalize::fold`]).
//! Whitespace and punctuation separate tokens. A run of alphanumeric
//! non-ideographic characters is one word token. A run of ideographs emits
//! every single character and every overlapping two-character shingle, so a
//! query for any one- or two-character substring of a CJK run hits the
//! posting list directly; longer phrases are intersected and then verified.

use std::collections::HashSet;

/// CJK unified ideographs: the basic block and extensions A through E.
pub fn is_ideograph(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{20000}'..='\u{2A6DF}'
        | '\u{2A700}'..='\u{2B73F}'
        | '\u{2B740}'..='\u{2B81F}'
        | '\u{2B820}'..='\u{2CEAF}')
}

/// ASCII punctuation plus the CJK punctuation common in story text.
pub fn is_common_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(
            c,
            '，' | '、'
                | '。'
                | '！'
                | '？'
                | '：'
                | '；'
                | '（'
                | '）'
                | '【'
                | '】'
                | '「'
                | '」'
                | '『'
                | '』'
                | '《'
                | '》'
                | '〈'
                | '〉'
                | '“'
                | '”'
                | '‘'
                | '’'
                | '—'
                | '～'
                | '…'
                | '·'
                | '﹑'
                | '﹔'
                | '﹗'
                | '﹖'
                | '﹐'
                | '﹒'
                | '﹕'
                | '︰'
        )
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || is_common_punctuation(c)
}

/// Tokenize folded text into terms, in text order.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut ideographs: Vec<char> = Vec::new();

    for c in text.chars() {
        if is_ideograph(c) {
            flush_word(&mut word, &mut tokens);
            ideographs.push(c);
            continue;
        }

        flush_ideographs(&mut ideographs, &mut tokens);

        if is_separator(c) || !c.is_alphanumeric() {
            flush_word(&mut word, &mut tokens);
            continue;
        }
        word.push(c);
    }

    flush_word(&mut word, &mut tokens);
    flush_ideographs(&mut ideographs, &mut tokens);
    tokens
}

fn flush_word(word: &mut String, tokens: &mut Vec<String>) {
    if !word.is_empty() {
        tokens.push(std::mem::take(word));
    }
}

fn flush_ideographs(run: &mut Vec<char>, tokens: &mut Vec<String>) {
    for (i, c) in run.iter().enumerate() {
        tokens.push(c.to_string());
        if let Some(next) = run.get(i + 1) {
            let mut shingle = String::with_capacity(8);
            shingle.push(*c);
            shingle.push(*next);
            tokens.push(shingle);
        }
    }
    run.clear();
}

/// Distinct terms of a folded query, in first-seen order.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    tokenize(query)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Whitespace-separated segments of a folded query, each of which must
/// appear verbatim in a matching document.
pub fn query_segments(query: &str) -> Vec<&str> {
    query.split_whitespace().collect()
}
