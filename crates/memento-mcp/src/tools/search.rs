//! `search` tool adapter (spec §6). Shapes the ranked `ScoredCandidate` list
//! into the external `{items, total_count, query_time_ms, degraded?}` shape,
//! including a human-readable `recall_reason` derived from whichever ranking
//! feature dominated that candidate's score — a presentation-layer concern,
//! not part of the Ranking Core itself.

use memento_core::prelude::Filter;
use memento_core::MemoryEngine;
use serde_json::Value;

use crate::protocol::types::JsonRpcError;
use crate::server::map_engine_error;

const DEFAULT_LIMIT: usize = 10;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": { "type": "string" },
            "filters": {
                "type": "object",
                "properties": {
                    "memoryType": { "type": "array", "items": { "type": "string" } },
                    "tags": { "type": "array", "items": { "type": "string" } },
                    "privacyScope": { "type": "array", "items": { "type": "string" } },
                    "timeFrom": { "type": "string", "format": "date-time" },
                    "timeTo": { "type": "string", "format": "date-time" },
                    "pinned": { "type": "boolean" },
                    "id": { "type": "array", "items": { "type": "string" } },
                    "importanceMin": { "type": "number", "minimum": 0.0, "maximum": 1.0 }
                }
            },
            "limit": { "type": "integer", "minimum": 1, "default": DEFAULT_LIMIT }
        },
        "required": ["query"]
    })
}

pub async fn execute(engine: &MemoryEngine, arguments: Option<Value>) -> Result<Value, JsonRpcError> {
    let args = super::require_arguments(arguments)?;
    let query = super::required_str(&args, "query")?;
    let filter: Filter = match args.get("filters") {
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
        None => Filter::default(),
    };
    let limit = args
        .get("limit")
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_LIMIT);

    let started = std::time::Instant::now();
    let result = engine
        .search(&query, &filter, limit)
        .await
        .map_err(map_engine_error)?;
    let query_time_ms = started.elapsed().as_millis() as u64;

    let items: Vec<Value> = result
        .items
        .iter()
        .map(|candidate| {
            let memory = &candidate.memory;
            serde_json::json!({
                "id": memory.id,
                "content": memory.content,
                "type": memory.memory_type.as_str(),
                "importance": memory.importance,
                "createdAt": memory.created_at,
                "lastAccessed": memory.last_accessed,
                "pinned": memory.pinned,
                "tags": memory.tags,
                "score": candidate.score,
                "recallReason": recall_reason(&candidate.features),
            })
        })
        .collect();

    Ok(serde_json::json!({
        "items": items,
        "totalCount": items.len(),
        "queryTimeMs": query_time_ms,
        "degraded": result.degraded,
    }))
}

/// Names the single feature that contributed the most to a candidate's
/// score, for the caller-facing `recallReason`.
fn recall_reason(features: &memento_core::ranking::Features) -> &'static str {
    let mut best = ("relevance", features.relevance);
    for candidate in [
        ("recency", features.recency),
        ("importance", features.importance),
        ("usage", features.usage),
    ] {
        if candidate.1 > best.1 {
            best = candidate;
        }
    }
    match best.0 {
        "recency" => "recently created or accessed",
        "importance" => "marked as important",
        "usage" => "frequently viewed or cited",
        _ => "closely matches the query",
    }
}
