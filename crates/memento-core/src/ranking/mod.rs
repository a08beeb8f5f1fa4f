//! Ranking Core (spec §4.6): composes the final score
//! `S = α·relevance + β·recency + γ·importance + δ·usage − ε·duplication`
//! and applies Maximal-Marginal-Relevance selection.

use crate::config::RankingWeights;
use crate::model::Memory;
use crate::search::lexical::{jaccard, normalize_query};
use chrono::{DateTime, Utc};

/// Normalizes a raw lexical score into `[0,1)` via `s / (s + K)`, K = 2.0
/// (spec §4.6).
pub fn normalize_bm25(score: f64) -> f64 {
    const K: f64 = 2.0;
    let score = score.max(0.0);
    score / (score + K)
}

/// The per-candidate feature vector the final score is composed from.
#[derive(Debug, Clone, Copy, Default)]
pub struct Features {
    pub relevance: f64,
    pub recency: f64,
    pub importance: f64,
    pub usage: f64,
    pub duplication: f64,
}

/// Re-scaling weights for the relevance sub-score between the vector and
/// lexical contributions (spec §4.7: `vectorWeight=0.6, textWeight=0.4`).
#[derive(Debug, Clone, Copy)]
pub struct RelevanceWeights {
    pub vector_weight: f64,
    pub text_weight: f64,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        RelevanceWeights {
            vector_weight: 0.6,
            text_weight: 0.4,
        }
    }
}

/// `relevance = 0.60·cosine + 0.30·normalize_BM25(bm25) + 0.05·jaccard(query,tags) + 0.05·title_hit`
/// (spec §4.6). Missing inputs default to 0, never NaN; `vector_weight`/
/// `text_weight` re-scale the composed value without changing the internal
/// 0.30:0.05:0.05 proportions of the text group (spec §4.7).
pub fn relevance(
    cosine: Option<f64>,
    bm25: Option<f64>,
    query_tokens: &[String],
    memory: &Memory,
    weights: RelevanceWeights,
) -> f64 {
    let cosine = cosine.unwrap_or(0.0).clamp(0.0, 1.0);
    let bm25_norm = bm25.map(normalize_bm25).unwrap_or(0.0);
    let tag_jaccard = jaccard(query_tokens, &memory.tags);
    let title_tokens = normalize_query(&memory.title());
    let title_hit = if query_tokens.iter().any(|t| title_tokens.contains(t)) {
        1.0
    } else {
        0.0
    };

    // 0.30 : 0.05 : 0.05 out of the 0.40 "text" budget => 0.75 : 0.125 : 0.125.
    let text_component = 0.75 * bm25_norm + 0.125 * tag_jaccard + 0.125 * title_hit;

    (weights.vector_weight * cosine + weights.text_weight * text_component).clamp(0.0, 1.0)
}

/// `recency = exp(−ln 2 · age_days / halflife(type))` (spec §4.6).
pub fn recency(memory: &Memory, now: DateTime<Utc>) -> f64 {
    let age_days = memory.age_days(now).max(0.0);
    let halflife = memory.memory_type.halflife_days();
    (-std::f64::consts::LN_2 * age_days / halflife).exp().clamp(0.0, 1.0)
}

/// `importance = clamp01(user_importance + (0.2 if pinned) + type_boost)` (spec §4.6).
pub fn importance(memory: &Memory) -> f64 {
    let pinned_boost = if memory.pinned { 0.2 } else { 0.0 };
    (memory.importance + pinned_boost + memory.memory_type.importance_boost()).clamp(0.0, 1.0)
}

/// `usage = clamp01((ln(1+views) + 2·ln(1+citations) + 0.5·ln(1+edits)) / 10)` (spec §4.6).
pub fn usage(memory: &Memory) -> f64 {
    let v = (1.0 + memory.view_count as f64).ln();
    let c = 2.0 * (1.0 + memory.cite_count as f64).ln();
    let e = 0.5 * (1.0 + memory.edit_count as f64).ln();
    ((v + c + e) / 10.0).clamp(0.0, 1.0)
}

/// Maximum Jaccard similarity between `memory`'s content tokens and the
/// content tokens of already-selected results (spec §4.6 MMR penalty).
pub fn duplication(memory: &Memory, selected: &[Memory]) -> f64 {
    let tokens = normalize_query(&memory.content);
    selected
        .iter()
        .map(|s| jaccard(&tokens, &normalize_query(&s.content)))
        .fold(0.0_f64, f64::max)
}

/// `S = 0.50·relevance + 0.20·recency + 0.20·importance + 0.10·usage − 0.15·duplication` (spec §4.6).
pub fn score(features: &Features, weights: &RankingWeights) -> f64 {
    weights.relevance * features.relevance + weights.recency * features.recency
        + weights.importance * features.importance
        + weights.usage * features.usage
        - weights.duplication * features.duplication
}

/// A candidate ready for final scoring and MMR selection.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub memory: Memory,
    pub features: Features,
    pub score: f64,
}

/// Sort by `S` descending, tie-break by higher importance, then more recent
/// `created_at`, then lexicographically by id (spec §4.6), then iterate to
/// `k` with MMR, recomputing duplication after each pick.
pub fn select_top_k(
    mut candidates: Vec<(Memory, Features)>,
    weights: &RankingWeights,
    k: usize,
) -> Vec<ScoredCandidate> {
    for (memory, features) in &mut candidates {
        features.relevance = features.relevance.clamp(0.0, 1.0);
        features.recency = features.recency.clamp(0.0, 1.0);
        features.importance = features.importance.clamp(0.0, 1.0);
        features.usage = features.usage.clamp(0.0, 1.0);
        let _ = memory;
    }

    let mut selected: Vec<ScoredCandidate> = Vec::with_capacity(k.min(candidates.len()));
    let mut remaining = candidates;

    while selected.len() < k && !remaining.is_empty() {
        let selected_memories: Vec<Memory> = selected.iter().map(|s| s.memory.clone()).collect();

        let mut best_idx = 0;
        let mut best_score = f64::NEG_INFINITY;
        let mut best_features = Features::default();

        for (idx, (memory, features)) in remaining.iter().enumerate() {
            let mut f = *features;
            f.duplication = duplication(memory, &selected_memories);
            let s = score(&f, weights);

            let better = s > best_score
                || (s == best_score && tie_break_better(memory, &remaining[best_idx].0));
            if idx == 0 || better {
                best_idx = idx;
                best_score = s;
                best_features = f;
            }
        }

        let (memory, _) = remaining.remove(best_idx);
        selected.push(ScoredCandidate {
            memory,
            features: best_features,
            score: best_score,
        });
    }

    selected
}

fn tie_break_better(candidate: &Memory, current_best: &Memory) -> bool {
    if candidate.importance != current_best.importance {
        return candidate.importance > current_best.importance;
    }
    if candidate.created_at != current_best.created_at {
        return candidate.created_at > current_best.created_at;
    }
    candidate.id < current_best.id
}
