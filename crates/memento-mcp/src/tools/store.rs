//! `store` tool adapter (spec §6).

use memento_core::{MemoryEngine, StoreInput};
use serde_json::Value;

use crate::protocol::types::JsonRpcError;
use crate::server::map_engine_error;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "content": { "type": "string", "description": "The memory text to store." },
            "memoryType": {
                "type": "string",
                "enum": ["working", "episodic", "semantic", "procedural"],
                "description": "Defaults to 'episodic' if omitted."
            },
            "tags": { "type": "array", "items": { "type": "string" } },
            "importance": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
            "source": { "type": "string" },
            "privacyScope": { "type": "string", "enum": ["private", "team", "public"] }
        },
        "required": ["content"]
    })
}

pub async fn execute(engine: &MemoryEngine, arguments: Option<Value>) -> Result<Value, JsonRpcError> {
    let args = super::require_arguments(arguments)?;
    let input: StoreInput =
        serde_json::from_value(args).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?;

    let result = engine.store(input).await.map_err(map_engine_error)?;
    serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
}
