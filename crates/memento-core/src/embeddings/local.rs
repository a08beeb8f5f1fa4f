//! Local Lightweight Embedding Provider (spec §4.2)
//!
//! Always available, no network calls. Produces a fixed-width (512) vector
//! by concatenating two distinguishable signals, each hashed into its own
//! half of the vector and both drawing from the same normalized token
//! stream ([`normalize_query`]):
//!
//! - a TF-IDF projection (first [`TFIDF_DIMENSIONS`] dims): sublinear
//!   in-document term frequency times corpus-wide inverse document
//!   frequency, via [`CorpusStats`].
//! - a hashed-keyword signature (remaining dims): a pure, IDF-free
//!   presence/absence hash of the same tokens, so the embedding still
//!   carries a keyword-overlap signal when corpus statistics are thin
//!   (a brand new store, or a query about a term never seen before).
//!
//! The result is L2-normalized so cosine similarity behaves like it would
//! on a dense vector. This is the terminal fallback of [`super::ProviderChain`]
//! and never fails for non-empty input.

use crate::search::lexical::normalize_query;

/// Dimensionality of vectors produced by [`embed`] (spec §4.2 — matches
/// `Config::embedding_dimensions` default).
pub const LOCAL_DIMENSIONS: usize = 512;

/// Half of [`LOCAL_DIMENSIONS`] given to the TF-IDF signal; the remainder
/// goes to the hashed-keyword signature.
pub const TFIDF_DIMENSIONS: usize = LOCAL_DIMENSIONS / 2;
const SIGNATURE_DIMENSIONS: usize = LOCAL_DIMENSIONS - TFIDF_DIMENSIONS;

/// Corpus-wide document-frequency statistics backing the IDF half of
/// [`embed`]. Constructed from [`crate::storage::sqlite::SqliteStorage`]'s
/// `memory_token_df`/`corpus_stats` tables; a default-constructed instance
/// (`total_docs: 0`) makes every token's IDF neutral (see [`CorpusStats::idf`]),
/// so an empty store degrades gracefully to the keyword-signature half alone.
#[derive(Debug, Clone, Default)]
pub struct CorpusStats {
    pub total_docs: u64,
    pub doc_frequency: std::collections::HashMap<String, u64>,
}

impl CorpusStats {
    pub fn new(total_docs: u64, doc_frequency: std::collections::HashMap<String, u64>) -> Self {
        CorpusStats { total_docs, doc_frequency }
    }

    /// Smoothed IDF: `ln((N + 1) / (df + 1)) + 1`. Always positive, and
    /// exactly `1.0` for a token with no recorded occurrences (including the
    /// `total_docs == 0` case), so an empty corpus contributes a uniform,
    /// non-zero weight rather than collapsing the TF-IDF half to zero.
    pub fn idf(&self, token: &str) -> f32 {
        let df = self.doc_frequency.get(token).copied().unwrap_or(0);
        let n = self.total_docs as f64;
        (((n + 1.0) / (df as f64 + 1.0)).ln() + 1.0) as f32
    }
}

/// Hashes `text` into a deterministic `LOCAL_DIMENSIONS`-wide unit vector,
/// combining a TF-IDF projection with a hashed-keyword signature (see module
/// docs). `corpus` supplies the document-frequency statistics for the IDF
/// term; pass `&CorpusStats::default()` when none are available yet.
pub fn embed(text: &str, corpus: &CorpusStats) -> Vec<f32> {
    let tokens = normalize_query(text);
    let mut counts: std::collections::HashMap<String, u32> = std::collections::HashMap::new();
    for token in tokens {
        *counts.entry(token).or_insert(0) += 1;
    }

    let mut vector = vec![0.0_f32; LOCAL_DIMENSIONS];

    for (token, count) in &counts {
        let h = fnv1a(token);

        // TF-IDF half: sublinear TF times corpus IDF, bucketed into the
        // first TFIDF_DIMENSIONS slots.
        let tfidf_bucket = (h % TFIDF_DIMENSIONS as u64) as usize;
        let tfidf_sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        let tf_weight = 1.0 + (*count as f32).ln();
        vector[tfidf_bucket] += tfidf_sign * tf_weight * corpus.idf(token);

        // Hashed-keyword signature half: a second, independent hash of the
        // same token (salted so it doesn't just mirror the TF-IDF bucket),
        // weighted by presence alone, into the remaining slots.
        let h2 = fnv1a_salted(token);
        let sig_bucket = TFIDF_DIMENSIONS + (h2 % SIGNATURE_DIMENSIONS as u64) as usize;
        let sig_sign = if (h2 >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        vector[sig_bucket] += sig_sign;
    }

    l2_normalize(&mut vector);
    vector
}

fn fnv1a(s: &str) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for byte in s.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Same FNV-1a, salted with a fixed byte sequence so it lands in an
/// independent bucket/sign from [`fnv1a`] for the same token.
fn fnv1a_salted(s: &str) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for byte in b"memento-sig".iter().chain(s.as_bytes()) {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector {
            *x /= norm;
        }
    }
}

/// Cosine similarity between two equal-length vectors; `0.0` on dimension
/// mismatch or a zero vector (spec §4.6 relevance term, §4.5 vector search).
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator > 0.0 {
        dot / denominator
    } else {
        0.0
    }
}

/// Euclidean distance between two equal-length vectors; `f32::MAX` on a
/// dimension mismatch.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::MAX;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Dot product between two equal-length vectors; `0.0` on a dimension
/// mismatch.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
