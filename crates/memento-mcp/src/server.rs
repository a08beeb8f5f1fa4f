//! MCP Server Core
//!
//! Routes JSON-RPC requests to the five tool operations and the `inject`
//! prompt, all implemented as thin adapters over `memento_core::MemoryEngine`.

use std::sync::Arc;

use memento_core::MemoryEngine;
use tracing::{debug, warn};

use crate::protocol::messages::{
    CallToolRequest, CallToolResult, GetPromptRequest, InitializeRequest, InitializeResult,
    ListPromptsResult, ListToolsResult, PromptDescription, ServerCapabilities, ServerInfo,
    ToolDescription, ToolResultContent,
};
use crate::protocol::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_VERSION};
use crate::tools;

/// MCP server implementation bound to a single [`MemoryEngine`].
pub struct McpServer {
    engine: Arc<MemoryEngine>,
    initialized: bool,
}

impl McpServer {
    pub fn new(engine: Arc<MemoryEngine>) -> Self {
        McpServer {
            engine,
            initialized: false,
        }
    }

    /// Handle an incoming JSON-RPC request. Returns `None` for notifications,
    /// which carry no response.
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("handling request: {}", request.method);

        if !self.initialized
            && request.method != "initialize"
            && request.method != "notifications/initialized"
        {
            warn!("rejecting '{}': server not initialized", request.method);
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::server_not_initialized(),
            ));
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "notifications/initialized" => return None,
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params).await,
            "prompts/list" => self.handle_prompts_list(),
            "prompts/get" => self.handle_prompts_get(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            method => {
                warn!("unknown method: {}", method);
                Err(JsonRpcError::method_not_found())
            }
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(error) => JsonRpcResponse::error(request.id, error),
        })
    }

    fn handle_initialize(
        &mut self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: InitializeRequest = match params {
            Some(p) => {
                serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?
            }
            None => InitializeRequest::default(),
        };

        let negotiated_version = if request.protocol_version.as_str() < MCP_VERSION {
            request.protocol_version.clone()
        } else {
            MCP_VERSION.to_string()
        };

        self.initialized = true;

        let result = InitializeResult {
            protocol_version: negotiated_version,
            server_info: ServerInfo {
                name: "memento".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: ServerCapabilities {
                tools: Some(Default::default()),
                prompts: Some(Default::default()),
            },
            instructions: Some(
                "Memento stores and recalls memories for this agent. Use `store` to remember \
                 durable facts, decisions, or context; use `search` to retrieve relevant ones; \
                 use `inject` at session start to pull the most relevant memories into context \
                 under a token budget. Use `pin` to protect a memory from forgetting, `forget` \
                 to remove one.".to_string(),
            ),
        };

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let tools = vec![
            ToolDescription {
                name: "store".to_string(),
                description: Some(
                    "Store a new memory. Returns the assigned id and whether embedding was queued."
                        .to_string(),
                ),
                input_schema: tools::store::schema(),
            },
            ToolDescription {
                name: "search".to_string(),
                description: Some(
                    "Hybrid lexical+semantic search over stored memories, ranked by relevance, \
                     recency, importance, and usage."
                        .to_string(),
                ),
                input_schema: tools::search::schema(),
            },
            ToolDescription {
                name: "pin".to_string(),
                description: Some("Pin a memory so it is never forgotten.".to_string()),
                input_schema: tools::pin::schema(),
            },
            ToolDescription {
                name: "unpin".to_string(),
                description: Some("Unpin a previously pinned memory.".to_string()),
                input_schema: tools::unpin::schema(),
            },
            ToolDescription {
                name: "forget".to_string(),
                description: Some(
                    "Forget a memory: soft delete (recoverable, default) or hard delete \
                     (cascades to embedding, links, and feedback)."
                        .to_string(),
                ),
                input_schema: tools::forget::schema(),
            },
        ];

        let result = ListToolsResult { tools };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_tools_call(
        &self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: CallToolRequest = match params {
            Some(p) => {
                serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?
            }
            None => return Err(JsonRpcError::invalid_params("missing tool call parameters")),
        };

        let outcome = match request.name.as_str() {
            "store" => tools::store::execute(&self.engine, request.arguments).await,
            "search" => tools::search::execute(&self.engine, request.arguments).await,
            "pin" => tools::pin::execute(&self.engine, request.arguments).await,
            "unpin" => tools::unpin::execute(&self.engine, request.arguments).await,
            "forget" => tools::forget::execute(&self.engine, request.arguments).await,
            name => {
                return Err(JsonRpcError::method_not_found_with_message(&format!(
                    "unknown tool: {}",
                    name
                )));
            }
        };

        let (content, is_error) = match outcome {
            Ok(value) => (
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
                false,
            ),
            Err(error) => (serde_json::json!({ "error": error }).to_string(), true),
        };

        let call_result = CallToolResult {
            content: vec![ToolResultContent {
                content_type: "text".to_string(),
                text: content,
            }],
            is_error: Some(is_error),
        };
        serde_json::to_value(call_result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    fn handle_prompts_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let result = ListPromptsResult {
            prompts: vec![tools::inject::description()],
        };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_prompts_get(
        &self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: GetPromptRequest = match params {
            Some(p) => {
                serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?
            }
            None => return Err(JsonRpcError::invalid_params("missing prompt name")),
        };

        if request.name != "inject" {
            return Err(JsonRpcError::method_not_found_with_message(&format!(
                "unknown prompt: {}",
                request.name
            )));
        }

        let result = tools::inject::execute(&self.engine, request.arguments).await?;
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }
}

/// Maps a `memento_core::Error` onto a JSON-RPC error (spec §7).
pub(crate) fn map_engine_error(error: memento_core::Error) -> JsonRpcError {
    use memento_core::Error::*;
    match error {
        InvalidArgument(msg) => JsonRpcError::invalid_params(&msg),
        NotFound(id) => JsonRpcError::resource_not_found(&id),
        Contention => JsonRpcError::internal_error("store busy, retries exhausted"),
        ProviderUnavailable(msg) => JsonRpcError::internal_error(&msg),
        Timeout => JsonRpcError::request_timeout(),
        AlreadyRunning => JsonRpcError::internal_error("scheduler job already running"),
        other => JsonRpcError::internal_error(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memento_core::config::Config;
    use tempfile::TempDir;

    async fn test_server() -> (McpServer, TempDir) {
        let dir = TempDir::new().unwrap();
        let engine = MemoryEngine::new(Some(dir.path().join("t.db")), Config::default()).unwrap();
        (McpServer::new(engine), dir)
    }

    fn make_request(method: &str, params: Option<serde_json::Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(serde_json::json!(1)),
            method: method.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn initialize_sets_initialized_flag_and_returns_server_info() {
        let (mut server, _dir) = test_server().await;
        assert!(!server.initialized);

        let response = server
            .handle_request(make_request("initialize", None))
            .await
            .unwrap();
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "memento");
        assert!(server.initialized);
    }

    #[tokio::test]
    async fn request_before_initialize_is_rejected() {
        let (mut server, _dir) = test_server().await;
        let response = server
            .handle_request(make_request("tools/list", None))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32003);
    }

    #[tokio::test]
    async fn tools_list_returns_five_operations() {
        let (mut server, _dir) = test_server().await;
        server.handle_request(make_request("initialize", None)).await;

        let response = server
            .handle_request(make_request("tools/list", None))
            .await
            .unwrap();
        let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
        assert_eq!(tools, 5);
    }

    #[tokio::test]
    async fn store_then_search_round_trips_through_tools_call() {
        let (mut server, _dir) = test_server().await;
        server.handle_request(make_request("initialize", None)).await;

        let store_response = server
            .handle_request(make_request(
                "tools/call",
                Some(serde_json::json!({
                    "name": "store",
                    "arguments": { "content": "remember the onboarding checklist" }
                })),
            ))
            .await
            .unwrap();
        assert_eq!(store_response.result.unwrap()["isError"], false);

        let search_response = server
            .handle_request(make_request(
                "tools/call",
                Some(serde_json::json!({
                    "name": "search",
                    "arguments": { "query": "onboarding checklist" }
                })),
            ))
            .await
            .unwrap();
        let result = search_response.result.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("onboarding"));
    }

    #[tokio::test]
    async fn prompts_list_contains_inject() {
        let (mut server, _dir) = test_server().await;
        server.handle_request(make_request("initialize", None)).await;

        let response = server
            .handle_request(make_request("prompts/list", None))
            .await
            .unwrap();
        let prompts = response.result.unwrap()["prompts"].as_array().unwrap().len();
        assert_eq!(prompts, 1);
    }

    #[tokio::test]
    async fn unknown_tool_returns_method_not_found() {
        let (mut server, _dir) = test_server().await;
        server.handle_request(make_request("initialize", None)).await;

        let response = server
            .handle_request(make_request(
                "tools/call",
                Some(serde_json::json!({ "name": "nonexistent", "arguments": {} })),
            ))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32601);
    }
}
