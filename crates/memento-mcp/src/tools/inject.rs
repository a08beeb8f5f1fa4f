//! `inject` prompt adapter (spec §6): the only prompt in the tool surface.
//! Packs the formatted context block and reports `{memoriesUsed,
//! tokenEstimate}` via the prompt's `description`, since MCP prompt results
//! don't otherwise carry a structured metadata field.

use memento_core::inject::{estimate_tokens, InjectRequest};
use memento_core::prelude::Filter;
use memento_core::MemoryEngine;
use serde_json::Value;

use crate::protocol::messages::{
    GetPromptResult, PromptArgument, PromptDescription, PromptMessage, PromptMessageContent,
};
use crate::protocol::types::JsonRpcError;
use crate::server::map_engine_error;

const DEFAULT_TOKEN_BUDGET: usize = 1000;
const DEFAULT_MAX_MEMORIES: usize = 5;

pub fn description() -> PromptDescription {
    PromptDescription {
        name: "inject".to_string(),
        description: "Pack the most relevant memories for a query into a token-budgeted \
                       system-context block."
            .to_string(),
        arguments: vec![
            PromptArgument {
                name: "query".to_string(),
                description: "The text to find related memories for.".to_string(),
                required: true,
            },
            PromptArgument {
                name: "tokenBudget".to_string(),
                description: "Maximum tokens the formatted block may use (default 1000).".to_string(),
                required: false,
            },
            PromptArgument {
                name: "maxMemories".to_string(),
                description: "Maximum number of memories to include (default 5).".to_string(),
                required: false,
            },
        ],
    }
}

pub async fn execute(
    engine: &MemoryEngine,
    arguments: Option<Value>,
) -> Result<GetPromptResult, JsonRpcError> {
    let args = arguments.unwrap_or(Value::Null);
    let query = args
        .get("query")
        .and_then(Value::as_str)
        .ok_or_else(|| JsonRpcError::invalid_params("missing required field 'query'"))?
        .to_string();
    let token_budget = args
        .get("tokenBudget")
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_TOKEN_BUDGET);
    let max_memories = args
        .get("maxMemories")
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_MAX_MEMORIES);
    let filter: Filter = match args.get("filters") {
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
        None => Filter::default(),
    };

    let result = engine
        .inject(InjectRequest {
            query,
            token_budget,
            max_memories,
            filter,
        })
        .await
        .map_err(map_engine_error)?;

    let memories_used = result.included.len();
    let token_estimate = estimate_tokens(&result.block);

    Ok(GetPromptResult {
        description: Some(format!(
            "memoriesUsed={memories_used} tokenEstimate={token_estimate} degraded={}",
            result.degraded
        )),
        messages: vec![PromptMessage {
            role: "user".to_string(),
            content: PromptMessageContent {
                content_type: "text".to_string(),
                text: result.block,
            },
        }],
    })
}
