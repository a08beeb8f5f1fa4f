//! Thin tool adapters: each module parses `tools/call` arguments into a
//! `memento_core` request type, calls the one matching `MemoryEngine` method,
//! and serializes the result back to JSON. No business logic lives here.

pub mod forget;
pub mod inject;
pub mod pin;
pub mod search;
pub mod store;
pub mod unpin;

use serde_json::Value;

use crate::protocol::types::JsonRpcError;

/// Extracts `arguments`, failing with `InvalidParams` if they're missing —
/// every tool here requires at least one field.
pub(crate) fn require_arguments(arguments: Option<Value>) -> Result<Value, JsonRpcError> {
    arguments.ok_or_else(|| JsonRpcError::invalid_params("missing tool arguments"))
}

pub(crate) fn required_str(args: &Value, field: &str) -> Result<String, JsonRpcError> {
    args.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| JsonRpcError::invalid_params(&format!("missing required field '{field}'")))
}
