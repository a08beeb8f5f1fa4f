//! Literal end-to-end scenarios from spec §8 (S1–S6).

use memento_core::config::Config;
use memento_core::inject::InjectRequest;
use memento_core::Filter;
use memento_scenario_harness::{no_filter, Harness, SearchHarness};

/// S1: ranking prefers recent over old-pinned when both lexically match;
/// an unrelated memory that never entered the candidate set (no lexical or
/// vector hit) is wholly absent from the result.
#[tokio::test]
async fn s1_ranking_prefers_recent_over_old_pinned() {
    let harness = SearchHarness::new();

    let a = harness.seed(
        "Hybrid search engine architecture overview",
        "semantic",
        &["search", "hybrid"],
        0.5,
        false,
    );
    harness.backdate(&a.id, 2.0);

    let b = harness.seed(
        "Hybrid search algorithm design with vector integration",
        "semantic",
        &["search", "vector"],
        0.4,
        true,
    );
    harness.backdate(&b.id, 200.0);

    let c = harness.seed(
        "Cooking recipe for pasta with tomato sauce",
        "episodic",
        &["cooking"],
        0.3,
        false,
    );
    harness.backdate(&c.id, 5.0);

    // None of A/B/C are embedded: the query "hybrid search" only lexically
    // matches A and B, so C never becomes a candidate at all.
    let result = harness.search("hybrid search", &no_filter(), 5).await;

    let ids: Vec<_> = result.items.iter().map(|i| i.memory.id.clone()).collect();
    assert_eq!(ids, vec![a.id.clone(), b.id.clone()]);
    assert!(!ids.contains(&c.id));

    let score_a = result.items.iter().find(|i| i.memory.id == a.id).unwrap().score;
    let score_b = result.items.iter().find(|i| i.memory.id == b.id).unwrap().score;
    assert!(score_a > score_b);
}

/// S2: pinned filter narrows the same seed to exactly B, and an explicit
/// unpinned+semantic filter narrows it to exactly A.
#[tokio::test]
async fn s2_pinned_filter_narrows_results() {
    let harness = SearchHarness::new();

    let a = harness.seed(
        "Hybrid search engine architecture overview",
        "semantic",
        &["search", "hybrid"],
        0.5,
        false,
    );
    harness.backdate(&a.id, 2.0);

    let b = harness.seed(
        "Hybrid search algorithm design with vector integration",
        "semantic",
        &["search", "vector"],
        0.4,
        true,
    );
    harness.backdate(&b.id, 200.0);

    let pinned_filter = Filter {
        pinned: Some(true),
        ..Default::default()
    };
    let pinned_result = harness.search("hybrid search", &pinned_filter, 5).await;
    let pinned_ids: Vec<_> = pinned_result.items.iter().map(|i| i.memory.id.clone()).collect();
    assert_eq!(pinned_ids, vec![b.id.clone()]);

    let unpinned_semantic_filter = Filter {
        memory_type: vec!["semantic".to_string()],
        pinned: Some(false),
        ..Default::default()
    };
    let unpinned_result = harness.search("hybrid search", &unpinned_semantic_filter, 5).await;
    let unpinned_ids: Vec<_> = unpinned_result.items.iter().map(|i| i.memory.id.clone()).collect();
    assert_eq!(unpinned_ids, vec![a.id.clone()]);
}

/// S3: hard forget cascades — embedding, link, and lexical/vector lookups
/// all come back empty afterward.
#[tokio::test]
async fn s3_hard_forget_cascades() {
    let harness = Harness::new();
    let id = harness
        .seed("a distinctive note about the quarterly security review", "semantic", &[], 0.5)
        .await;
    let other = harness.seed("a second note", "semantic", &[], 0.5).await;
    assert!(harness.wait_for_embedding(&id, 50).await, "embedding never landed");
    harness.seed_link(&id, &other);

    let result = harness.engine.forget(&id, true).await.unwrap();
    assert_eq!(result.mode, "hard");

    assert!(harness.embedding_model(&id).is_none());
    assert_eq!(harness.links_touching(&id), 0);

    let filter = Filter {
        id: vec![id.clone()],
        ..Default::default()
    };
    let search_result = harness
        .engine
        .search("quarterly security review", &filter, 5)
        .await
        .unwrap();
    assert!(search_result.items.is_empty());
}

/// S4: the soft-delete gate respects TTL and pin — the old, unpinned,
/// unused episodic memory is soft-deleted; the old pinned one is untouched.
/// `SweepReport` is the authoritative signal for which ids were touched
/// (soft delete resets counters/pinned in place rather than removing the
/// row — spec §4.8 — so the report is the real assertion surface).
#[tokio::test]
async fn s4_soft_delete_gate_respects_ttl_and_pin() {
    let harness = Harness::new();

    let p = harness.seed("pinned long-lived note", "semantic", &[], 0.1).await;
    harness.pin(&p).await;
    harness.backdate(&p, 400.0);

    // A near-duplicate pair pushes the forget-score's duplication term high
    // enough, together with zero usage and zero importance, to cross the
    // soft-delete threshold at an age past the episodic soft TTL (30 days)
    // but short of the hard TTL (180 days), so this lands as soft, not hard.
    let q = harness
        .seed("stale unused episodic note about a dropped feature", "episodic", &[], 0.0)
        .await;
    harness.backdate(&q, 100.0);
    let q_dup = harness
        .seed("stale unused episodic note about a dropped feature", "episodic", &[], 0.0)
        .await;
    harness.backdate(&q_dup, 100.0);

    let report = harness.engine.run_forget_sweep().await.unwrap();

    assert!(report.soft_deleted.contains(&q));
    assert!(!report.soft_deleted.contains(&p));
    assert!(!report.hard_deleted.contains(&p));

    let p_after = harness.engine.get(&p).await.unwrap();
    assert!(p_after.pinned);
}

/// S5: context injection under a tight token budget still returns at least
/// one memory, respects the 10% slack, and tags each included memory by type.
#[tokio::test]
async fn s5_context_injection_under_tight_budget() {
    let harness = Harness::new();

    let bodies = [
        "The deployment pipeline requires a signed build artifact before it reaches production, and every release manager must confirm the signature chain before promoting a candidate build to the canary ring.",
        "Incident response runbooks are stored under the operations wiki, reviewed quarterly, and every responder is expected to walk through the latest tabletop exercise notes before taking point on-call.",
        "The onboarding checklist for new engineers covers repository access, local environment setup, the pairing rotation, and a short reading list on the service's domain model and failure modes.",
    ];
    for body in bodies {
        harness.seed(body, "semantic", &["ops"], 0.5).await;
    }

    let token_budget = 300usize;
    let result = harness
        .engine
        .inject(InjectRequest {
            query: "deployment pipeline runbook onboarding".to_string(),
            token_budget,
            max_memories: 5,
            filter: Filter::default(),
        })
        .await
        .unwrap();

    assert!(!result.included.is_empty());
    let estimate = memento_core::inject::estimate_tokens(&result.block);
    assert!(estimate <= 330, "estimate={estimate}");
    assert!(result.block.contains("[semantic]"));
}

/// S6: provider fallback — with only the local provider configured, store
/// succeeds immediately and, once the embedding queue drains, a local
/// 512-dim embedding is searchable.
#[tokio::test]
async fn s6_provider_fallback_produces_searchable_local_embedding() {
    let mut config = Config::default();
    config.hosted_primary_endpoint = None;
    config.hosted_secondary_endpoint = None;
    let harness = Harness::with_config(config);

    let id = harness.seed("x", "semantic", &[], 0.5).await;
    assert!(harness.wait_for_embedding(&id, 50).await, "embedding never landed");
    assert_eq!(harness.embedding_model(&id).as_deref(), Some("local"));
    assert_eq!(harness.embedding_dim(&id), Some(512));

    let filter = Filter {
        id: vec![id.clone()],
        ..Default::default()
    };
    let result = harness.engine.search("x", &filter, 5).await.unwrap();
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].memory.id, id);
}
