//! `pin` tool adapter (spec §6).

use memento_core::MemoryEngine;
use serde_json::Value;

use crate::protocol::types::JsonRpcError;
use crate::server::map_engine_error;

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": { "id": { "type": "string" } },
        "required": ["id"]
    })
}

pub async fn execute(engine: &MemoryEngine, arguments: Option<Value>) -> Result<Value, JsonRpcError> {
    let args = super::require_arguments(arguments)?;
    let id = super::required_str(&args, "id")?;
    let result = engine.pin(&id).await.map_err(map_engine_error)?;
    serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
}
