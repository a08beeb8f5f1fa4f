//! Forgetting Controller (spec §4.8): principled soft/hard deletion and
//! spaced-review scheduling, modeled as a periodic sweep over all memories.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::config::ForgetConfig;
use crate::error::Result;
use crate::model::{Filter, Memory, MemoryType, ScanOrder};
use crate::ranking;
use crate::search::lexical::normalize_query;
use crate::storage::SqliteStorage;

/// Outcome of one `run_sweep` pass.
#[derive(Debug, Default, Clone)]
pub struct SweepReport {
    pub soft_deleted: Vec<String>,
    pub hard_deleted: Vec<String>,
    pub scheduled_review: Vec<(String, f64)>,
    pub scanned: usize,
}

pub struct ForgettingController {
    storage: Arc<SqliteStorage>,
    config: ForgetConfig,
}

impl ForgettingController {
    pub fn new(storage: Arc<SqliteStorage>, config: ForgetConfig) -> Self {
        ForgettingController { storage, config }
    }

    /// `forget_score = w_recency·(1−recency) + w_disuse·(1−usage) +
    /// w_duplication·duplication_within_type − w_importance·importance`
    /// (spec §4.8). `duplication_within_type` is the max content-jaccard
    /// against other non-deleted memories sharing the same `memory_type`.
    fn forget_score(&self, memory: &Memory, duplication_within_type: f64, now: chrono::DateTime<Utc>) -> f64 {
        let recency = ranking::recency(memory, now);
        let usage = ranking::usage(memory);
        let importance = ranking::importance(memory);
        let w = &self.config.weights;

        (w.recency * (1.0 - recency) + w.disuse * (1.0 - usage) + w.duplication * duplication_within_type
            - w.importance * importance)
            .clamp(0.0, 1.0)
    }

    fn ttl_days(ttls: &crate::config::TypeTtls, memory_type: MemoryType) -> i64 {
        match memory_type {
            MemoryType::Working => ttls.working,
            MemoryType::Episodic => ttls.episodic,
            MemoryType::Semantic => ttls.semantic,
            MemoryType::Procedural => ttls.procedural,
        }
    }

    /// The spaced-review interval for `memory`, in days, clamped to
    /// `[min_interval_days, max_interval_days]` (Open Question #3 in
    /// SPEC_FULL.md §9): `base_multiplier` scales by feedback-derived helpful
    /// vs unhelpful counts, then by `(0.5 + importance)`.
    pub fn review_interval_days(&self, memory: &Memory, helpful_count: u32, unhelpful_count: u32) -> f64 {
        let review = &self.config.review;
        let multiplier = 1.0 + review.helpful_bonus * helpful_count as f64
            - review.unhelpful_penalty * unhelpful_count as f64;
        let importance = ranking::importance(memory);
        let days = multiplier.max(0.0) * (0.5 + importance);
        days.clamp(review.min_interval_days, review.max_interval_days)
    }

    /// Runs one full sweep: scans every memory, applies the soft/hard delete
    /// gates, and records which survivors are due for spaced review.
    /// Pinned memories are always skipped (spec §4.8 invariant).
    pub fn run_sweep(&self) -> Result<SweepReport> {
        let memories = self.storage.scan_candidates(&Filter::default(), ScanOrder::CreatedAtDesc, i64::MAX)?;
        let now = Utc::now();
        let mut report = SweepReport {
            scanned: memories.len(),
            ..Default::default()
        };

        let mut tokens_by_id: HashMap<String, Vec<String>> = HashMap::new();
        for memory in &memories {
            tokens_by_id.insert(memory.id.clone(), normalize_query(&memory.content));
        }

        let mut hard_deleted_ids = Vec::new();

        for memory in &memories {
            if memory.pinned {
                continue;
            }

            let own_tokens = &tokens_by_id[&memory.id];
            let duplication = memories
                .iter()
                .filter(|other| other.id != memory.id && other.memory_type == memory.memory_type)
                .map(|other| crate::search::lexical::jaccard(own_tokens, &tokens_by_id[&other.id]))
                .fold(0.0_f64, f64::max);

            let score = self.forget_score(memory, duplication, now);
            let age_days = memory.age_days(now);

            let hard_ttl = Self::ttl_days(&self.config.ttl_hard, memory.memory_type) as f64;
            if score >= self.config.thresholds.hard && age_days >= hard_ttl {
                self.storage.hard_delete(&memory.id)?;
                hard_deleted_ids.push(memory.id.clone());
                report.hard_deleted.push(memory.id.clone());
                continue;
            }

            let soft_ttl = Self::ttl_days(&self.config.ttl_soft, memory.memory_type) as f64;
            if score >= self.config.thresholds.soft && age_days >= soft_ttl {
                self.storage.soft_delete(&memory.id)?;
                report.soft_deleted.push(memory.id.clone());
                continue;
            }

            if score >= self.config.thresholds.review {
                let feedback = self.storage.feedback_for(&memory.id)?;
                let helpful = feedback
                    .iter()
                    .filter(|f| matches!(f.event_type, crate::model::FeedbackEvent::Helpful | crate::model::FeedbackEvent::Cited))
                    .count() as u32;
                let unhelpful = feedback
                    .iter()
                    .filter(|f| matches!(f.event_type, crate::model::FeedbackEvent::Unhelpful))
                    .count() as u32;
                let interval = self.review_interval_days(memory, helpful, unhelpful);
                report.scheduled_review.push((memory.id.clone(), interval));
            }
        }

        tracing::info!(
            scanned = report.scanned,
            soft_deleted = report.soft_deleted.len(),
            hard_deleted = report.hard_deleted.len(),
            scheduled_review = report.scheduled_review.len(),
            "forgetting sweep complete"
        );

        Ok(report)
    }
}
