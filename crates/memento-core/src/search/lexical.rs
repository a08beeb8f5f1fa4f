//! Thin wrapper over the FTS5 full-text index (spec §4.4).
//!
//! The heavy lifting (joining `memory_item_fts` against `memory_item`) lives
//! in [`crate::storage::SqliteStorage::lexical_search`]; this module only
//! owns query normalization and FTS5 query-string sanitization, since those
//! are pure and worth testing in isolation.

/// Latin-script stop words (English plus a handful of common Romance/Germanic
/// function words) and CJK stop words (common Chinese function words and
/// Japanese particles) — spec §4.2/§4.4 require stop-word removal for at
/// least Latin-script and CJK text.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "of", "to", "in", "on", "and", "or", "is", "are", "for", "with", "at", "by",
    "le", "la", "de", "el", "que", "und", "der", "die", "das", "的", "了", "是", "在", "和", "与",
    "也", "就", "都", "而", "及", "你", "我", "他", "它", "这", "那", "を", "は", "が", "の", "に",
    "で", "と", "も", "へ",
];

/// True for characters from scripts that don't separate words with spaces
/// (CJK ideographs, hiragana, katakana, hangul) — each such character is
/// tokenized on its own rather than run together with its neighbors.
fn is_unsegmented_script(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF
        | 0x3040..=0x309F | 0x30A0..=0x30FF
        | 0xAC00..=0xD7A3
    )
}

/// Lowercase, NFC-normalize (approximated: Rust strings are UTF-8 already
/// mostly-NFC for the inputs we expect), collapse whitespace, strip
/// punctuation, and drop a small multilingual stop-word list. CJK/hangul
/// characters carry no inter-word whitespace, so each is split into its own
/// token before the stop-word filter runs (spec §4.2/§4.4). Shared between
/// lexical search and the Ranking Core's jaccard/title-hit features.
pub fn normalize_query(text: &str) -> Vec<String> {
    let mut spaced = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        if is_unsegmented_script(c) {
            spaced.push(' ');
            spaced.push(c);
            spaced.push(' ');
        } else if c.is_alphanumeric() {
            spaced.push(c);
        } else {
            spaced.push(' ');
        }
    }

    spaced
        .split_whitespace()
        .filter(|w| !STOPWORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

/// Escape SQLite FTS5 query-syntax characters so arbitrary user text can't
/// break (or inject into) the `MATCH` expression. FTS5 treats `"` as a phrase
/// delimiter and a handful of ASCII punctuation as operators; we quote each
/// normalized token individually and join with `AND` (implicit via `*`-free
/// phrase tokens), which also sidesteps FTS5's `NEAR`/`OR`/`NOT` keywords
/// being interpreted as operators when present in the original text.
pub fn sanitize_fts5_query(text: &str) -> String {
    let tokens = normalize_query(text);
    tokens
        .iter()
        .map(|t| format!("\"{}\"", t.replace('"', "")))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Jaccard similarity between two token sets (spec §4.6 relevance term,
/// §4.8 duplication term).
pub fn jaccard(a: &[String], b: &[String]) -> f64 {
    use std::collections::HashSet;
    let a: HashSet<&String> = a.iter().collect();
    let b: HashSet<&String> = b.iter().collect();
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}
