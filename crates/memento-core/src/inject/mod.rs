//! Context Injector (spec §4.9): packs the most relevant memories for a
//! query into a token-budgeted prompt block.

use std::sync::Arc;

use crate::error::Result;
use crate::model::{Filter, Memory};
use crate::search::HybridSearcher;

/// The literal marker returned when nothing qualifies (spec §4.9).
pub const NO_RELATED_MEMORIES: &str = "no related memories";

#[derive(Debug, Clone)]
pub struct InjectRequest {
    pub query: String,
    pub token_budget: usize,
    pub max_memories: usize,
    pub filter: Filter,
}

#[derive(Debug, Clone)]
pub struct InjectResult {
    pub block: String,
    pub included: Vec<String>,
    pub degraded: bool,
}

pub struct ContextInjector {
    searcher: Arc<HybridSearcher>,
}

impl ContextInjector {
    pub fn new(searcher: Arc<HybridSearcher>) -> Self {
        ContextInjector { searcher }
    }

    pub async fn inject(&self, request: &InjectRequest) -> Result<InjectResult> {
        let fetch_limit = (2 * request.max_memories).max(1);
        let hybrid = self
            .searcher
            .search(&request.query, &request.filter, fetch_limit)
            .await?;

        // Sorts by (relevance+importance) descending (spec §4.9). Hybrid
        // search already returns `limit`-bounded, MMR-ranked items ordered by
        // the full weighted score `S`; injection re-sorts by this narrower
        // combination before packing.
        let mut candidates: Vec<(f64, Memory)> = hybrid
            .items
            .into_iter()
            .map(|c| (c.features.relevance + c.features.importance, c.memory))
            .collect();
        candidates.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        let candidates: Vec<Memory> = candidates.into_iter().map(|(_, memory)| memory).collect();

        let per_memory_budget = (request.token_budget / request.max_memories.max(1)).max(1);
        let mut sections = Vec::new();
        let mut included = Vec::new();
        // Header and inter-section separators count against the budget too,
        // not just the per-memory summaries (spec §4.9 — the whole block is
        // what's bounded, not just its memory content).
        let header_tokens = estimate_tokens("[system context: related memories]\n");
        let separator_tokens = estimate_tokens("\n\n");
        let mut used_tokens = header_tokens;

        for memory in candidates.iter().take(request.max_memories) {
            let summary = summarize(&memory.content, per_memory_budget);
            let section = format_section(memory, &summary);
            let section_tokens = estimate_tokens(&section);
            let separator_cost = if sections.is_empty() { 0 } else { separator_tokens };
            if used_tokens + separator_cost + section_tokens > request.token_budget && !sections.is_empty() {
                break;
            }
            used_tokens += separator_cost + section_tokens;
            included.push(memory.id.clone());
            sections.push(section);
        }

        let block = if sections.is_empty() {
            NO_RELATED_MEMORIES.to_string()
        } else {
            format!("[system context: related memories]\n{}", sections.join("\n\n"))
        };

        Ok(InjectResult {
            block,
            included,
            degraded: hybrid.degraded,
        })
    }
}

/// First sentence + optional middle keywords + last sentence, truncated to
/// `budget_tokens` (spec §4.9).
fn summarize(content: &str, budget_tokens: usize) -> String {
    let sentences: Vec<&str> = content
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let mut summary = if sentences.len() <= 2 {
        sentences.join(". ")
    } else {
        let first = sentences[0];
        let last = sentences[sentences.len() - 1];
        let middle_keywords: Vec<&str> = sentences[1..sentences.len() - 1]
            .iter()
            .flat_map(|s| s.split_whitespace())
            .filter(|w| w.len() > 5)
            .take(5)
            .collect();
        if middle_keywords.is_empty() {
            format!("{first}. {last}")
        } else {
            format!("{first}. [{}] {last}", middle_keywords.join(", "))
        }
    };

    let budget_chars = budget_tokens * 4;
    if summary.chars().count() > budget_chars {
        let mut truncated: String = summary.chars().take(budget_chars.saturating_sub(1)).collect();
        truncated.push('…');
        summary = truncated;
    }
    summary
}

fn format_section(memory: &Memory, summary: &str) -> String {
    let stars = "★".repeat((memory.importance * 5.0).round().max(0.0) as usize);
    format!(
        "[{}] {}\n{}",
        memory.memory_type.as_str(),
        stars,
        summary
    )
}

/// Cheap `ceil(chars/4)` token estimate (spec §4.9); exact counts are the
/// caller's responsibility.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() + 3) / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn summarize_short_content_is_unchanged_shape() {
        let summary = summarize("A single short sentence", 100);
        assert!(summary.contains("A single short sentence"));
    }

    #[test]
    fn summarize_truncates_to_budget() {
        let long = "word ".repeat(500);
        let summary = summarize(&long, 5);
        assert!(summary.len() <= 21);
    }
}
