//! Property tests for spec §8's P1–P9 invariants, driven end-to-end through
//! `MemoryEngine` (and `SearchHarness` where a test needs to control exactly
//! which memories are vector-indexed before a single `search` call).

use memento_core::config::Config;
use memento_core::inject::{estimate_tokens, InjectRequest};
use memento_core::{Filter, MemoryType};
use memento_scenario_harness::{no_filter, Harness};

/// P1: every stored memory is found by a subsequent empty-query, id-filtered search.
#[tokio::test]
async fn p1_store_then_empty_query_id_filter_returns_exactly_it() {
    let harness = Harness::new();
    let id = harness.seed("a note about onboarding", "semantic", &[], 0.5).await;

    let filter = Filter {
        id: vec![id.clone()],
        ..Default::default()
    };
    let result = harness.engine.search("", &filter, 5).await.unwrap();
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].memory.id, id);
}

/// P2: pin then unpin is idempotent — flags end at pinned:false, counters unchanged.
#[tokio::test]
async fn p2_pin_then_unpin_is_idempotent() {
    let harness = Harness::new();
    let id = harness.seed("pin me please", "semantic", &[], 0.5).await;

    harness.pin(&id).await;
    harness.pin(&id).await;
    harness.engine.unpin(&id).await.unwrap();
    harness.engine.unpin(&id).await.unwrap();

    let memory = harness.engine.get(&id).await.unwrap();
    assert!(!memory.pinned);
    assert_eq!(memory.view_count, 0);
    assert_eq!(memory.cite_count, 0);
    assert_eq!(memory.edit_count, 0);
}

/// P3: hard forget cascades — no embedding, no links, no feedback survive.
#[tokio::test]
async fn p3_hard_forget_cascades() {
    let harness = Harness::new();
    let id = harness.seed("ephemeral scratch note", "working", &[], 0.2).await;
    let other = harness.seed("a related note", "working", &[], 0.2).await;
    assert!(harness.wait_for_embedding(&id, 50).await, "embedding never landed");
    harness.seed_link(&id, &other);
    harness
        .engine
        .record_feedback(&id, memento_core::FeedbackEvent::Used, 1.0)
        .await
        .unwrap();

    harness.engine.forget(&id, true).await.unwrap();

    assert!(harness.engine.get(&id).await.is_err());
    assert!(harness.embedding_model(&id).is_none());
    assert_eq!(harness.links_touching(&id), 0);
    assert_eq!(harness.feedback_rows(&id), 0);
}

/// P4: ranking determinism — repeated search over a frozen store yields identical ordering.
#[tokio::test]
async fn p4_ranking_is_deterministic_for_a_frozen_store() {
    let harness = Harness::new();
    harness.seed("deploy pipeline requires a signed artifact", "semantic", &["ci"], 0.6).await;
    harness.seed("deploy pipeline rollback procedure", "procedural", &["ci"], 0.4).await;
    harness.seed("unrelated lunch menu notes", "episodic", &["food"], 0.1).await;

    let filter = Filter::default();
    let first = harness.engine.search("deploy pipeline", &filter, 5).await.unwrap();
    let second = harness.engine.search("deploy pipeline", &filter, 5).await.unwrap();

    let first_ids: Vec<_> = first.items.iter().map(|c| c.memory.id.clone()).collect();
    let second_ids: Vec<_> = second.items.iter().map(|c| c.memory.id.clone()).collect();
    assert_eq!(first_ids, second_ids);
}

/// P5: duplication penalty — among identical-content candidates, the first
/// pick carries no MMR penalty and scores strictly higher than the rest;
/// every later pick's score is non-increasing, since each accumulates at
/// least as much duplication as the one before it.
#[tokio::test]
async fn p5_duplication_penalty_orders_identical_candidates() {
    let harness = Harness::new();
    let content = "idempotent phrase alpha beta gamma delta epsilon";
    for _ in 0..5 {
        harness.seed(content, "semantic", &[], 0.5).await;
    }

    let result = harness.engine.search(content, &no_filter(), 5).await.unwrap();
    assert_eq!(result.items.len(), 5);

    assert!(result.items[0].score > result.items[1].score);
    for pair in result.items.windows(2) {
        assert!(pair[0].score >= pair[1].score - 1e-9);
    }
}

/// P6: halflife — two memories identical except created_at by one halflife
/// have recency within ±1e-6 of exactly half.
#[tokio::test]
async fn p6_recency_halves_after_one_halflife() {
    let harness = Harness::new();
    let newer = harness.seed("halflife probe content", "episodic", &[], 0.5).await;
    let older = harness.seed("halflife probe content", "episodic", &[], 0.5).await;
    harness.backdate(&older, MemoryType::Episodic.halflife_days());

    let filter = Filter {
        id: vec![newer.clone(), older.clone()],
        ..Default::default()
    };
    let result = harness.engine.search("halflife probe content", &filter, 5).await.unwrap();
    assert_eq!(result.items.len(), 2);

    let recency_of = |id: &str| {
        result
            .items
            .iter()
            .find(|c| c.memory.id == id)
            .map(|c| c.features.recency)
            .unwrap()
    };
    let r_new = recency_of(&newer);
    let r_old = recency_of(&older);
    assert!((r_old - r_new / 2.0).abs() < 1e-6, "r_new={r_new} r_old={r_old}");
}

/// P7: provider fallback — with hosted providers unconfigured, store still
/// completes and the eventual embedding is local, 512-dimensional.
#[tokio::test]
async fn p7_local_fallback_produces_512_dim_vectors() {
    let mut config = Config::default();
    config.hosted_primary_endpoint = None;
    config.hosted_secondary_endpoint = None;
    let harness = Harness::with_config(config);

    let id = harness.seed("fallback probe", "semantic", &[], 0.5).await;
    assert!(harness.wait_for_embedding(&id, 50).await, "embedding never landed");
    assert_eq!(harness.embedding_model(&id).as_deref(), Some("local"));
    assert_eq!(harness.embedding_dim(&id), Some(512));
}

/// P8: forgetting safety — a pinned memory survives any number of sweeps.
#[tokio::test]
async fn p8_pinned_memory_survives_any_number_of_sweeps() {
    let harness = Harness::new();
    let id = harness.seed("ancient unused note", "episodic", &[], 0.0).await;
    harness.pin(&id).await;
    harness.backdate(&id, 10_000.0);

    for _ in 0..5 {
        harness.engine.run_forget_sweep().await.unwrap();
    }

    let memory = harness.engine.get(&id).await.unwrap();
    assert!(memory.pinned);
}

/// P9: token budget — estimated tokens never exceed `token_budget * 1.1`.
#[tokio::test]
async fn p9_injection_respects_token_budget_with_slack() {
    let harness = Harness::new();
    for i in 0..5 {
        harness
            .seed(
                &format!("context fact number {i} about the release process and its owners"),
                "semantic",
                &["release"],
                0.5,
            )
            .await;
    }

    let token_budget = 120usize;
    let result = harness
        .engine
        .inject(InjectRequest {
            query: "release process".to_string(),
            token_budget,
            max_memories: 5,
            filter: Filter::default(),
        })
        .await
        .unwrap();

    let estimate = estimate_tokens(&result.block);
    assert!(
        (estimate as f64) <= (token_budget as f64) * 1.1,
        "estimate={estimate} budget={token_budget}"
    );
}
