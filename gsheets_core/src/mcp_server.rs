use serde_json::{json, Value};
use tracing::debug;

use crate::connector::SheetsConnector;
use crate::error::SheetsError;
use rmcp::model::*;

/// MCP server wrapping the single Sheets connector.
pub struct McpServer {
    connector: SheetsConnector,
}

impl McpServer {
    pub fn new(connector: SheetsConnector) -> Self {
        Self { connector }
    }

    pub async fn handle_initialize(
        &self,
        request: InitializeRequestParam,
    ) -> Result<InitializeResult, SheetsError> {
        tracing::info!("MCP server initializing");
        self.connector.initialize(request).await
    }

    pub async fn handle_list_tools(
        &self,
        request: Option<PaginatedRequestParam>,
    ) -> Result<ListToolsResult, SheetsError> {
        self.connector.list_tools(request).await
    }

    pub async fn handle_call_tool(
        &self,
        request: CallToolRequestParam,
    ) -> Result<CallToolResult, SheetsError> {
        self.connector.call_tool(request).await
    }

    pub async fn handle_list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
    ) -> Result<ListResourcesResult, SheetsError> {
        Ok(ListResourcesResult {
            resources: Vec::new(),
            next_cursor: None,
        })
    }

    pub async fn handle_list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
    ) -> Result<ListPromptsResult, SheetsError> {
        Ok(ListPromptsResult {
            prompts: Vec::new(),
            next_cursor: None,
        })
    }
}

/// JSON-RPC message handler for the MCP server
pub struct JsonRpcHandler {
    server: McpServer,
}

impl JsonRpcHandler {
    pub fn new(server: McpServer) -> Self {
        Self { server }
    }

    /// Process a JSON-RPC request and return a response
    pub async fn handle_request(&self, request: Value) -> Value {
        debug!("Handling JSON-RPC request: {:?}", request);

        let id = request.get("id").cloned();
        let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("");
        let params = request.get("params").cloned().unwrap_or(json!({}));

        let result = match method {
            "initialize" => match serde_json::from_value::<InitializeRequestParam>(params) {
                Ok(req) => self
                    .server
                    .handle_initialize(req)
                    .await
                    .and_then(|r| serde_json::to_value(r).map_err(SheetsError::SerdeJson))
                    .map_err(|e| e.to_jsonrpc_error()),
                Err(e) => Err(SheetsError::SerdeJson(e).to_jsonrpc_error()),
            },
            "tools/list" => match serde_json::from_value::<Option<PaginatedRequestParam>>(params) {
                Ok(req) => self
                    .server
                    .handle_list_tools(req)
                    .await
                    .and_then(|r| serde_json::to_value(r).map_err(SheetsError::SerdeJson))
                    .map_err(|e| e.to_jsonrpc_error()),
                Err(e) => Err(SheetsError::SerdeJson(e).to_jsonrpc_error()),
            },
            "tools/call" => match serde_json::from_value::<CallToolRequestParam>(params) {
                Ok(req) => self
                    .server
                    .handle_call_tool(req)
                    .await
                    .and_then(|r| serde_json::to_value(r).map_err(SheetsError::SerdeJson))
                    .map_err(|e| e.to_jsonrpc_error()),
                Err(e) => Err(SheetsError::SerdeJson(e).to_jsonrpc_error()),
            },
            "resources/list" => {
                match serde_json::from_value::<Option<PaginatedRequestParam>>(params) {
                    Ok(req) => self
                        .server
                        .handle_list_resources(req)
                        .await
                        .and_then(|r| serde_json::to_value(r).map_err(SheetsError::SerdeJson))
                        .map_err(|e| e.to_jsonrpc_error()),
                    Err(e) => Err(SheetsError::SerdeJson(e).to_jsonrpc_error()),
                }
            }
            "prompts/list" => {
                match serde_json::from_value::<Option<PaginatedRequestParam>>(params) {
                    Ok(req) => self
                        .server
                        .handle_list_prompts(req)
                        .await
                        .and_then(|r| serde_json::to_value(r).map_err(SheetsError::SerdeJson))
                        .map_err(|e| e.to_jsonrpc_error()),
                    Err(e) => Err(SheetsError::SerdeJson(e).to_jsonrpc_error()),
                }
            }
            _ => Err(SheetsError::MethodNotFound.to_jsonrpc_error()),
        };

        match result {
            Ok(result) => json!({
                "jsonrpc": "2.0",
                "result": result,
                "id": id,
            }),
            Err(error) => json!({
                "jsonrpc": "2.0",
                "error": error,
                "id": id,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CredentialStore;

    fn handler(dir: &std::path::Path) -> JsonRpcHandler {
        let store = CredentialStore::new(dir);
        std::fs::write(
            store.credentials_path(),
            r#"{"installed":{"client_id":"cid","client_secret":"cs"}}"#,
        )
        .unwrap();
        JsonRpcHandler::new(McpServer::new(SheetsConnector::new(store)))
    }

    #[tokio::test]
    async fn unknown_method_returns_method_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let response = handler(dir.path())
            .handle_request(json!({"jsonrpc": "2.0", "method": "nope/nothing", "id": 7}))
            .await;
        assert_eq!(response["id"], 7);
        assert_eq!(response["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn tools_list_round_trips_over_jsonrpc() {
        let dir = tempfile::tempdir().unwrap();
        let response = handler(dir.path())
            .handle_request(json!({"jsonrpc": "2.0", "method": "tools/list", "id": 1}))
            .await;
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 5);
        assert_eq!(tools[0]["name"], "google_sheets_get_info");
    }

    #[tokio::test]
    async fn tool_failure_is_a_result_not_a_jsonrpc_error() {
        let dir = tempfile::tempdir().unwrap();
        let response = handler(dir.path())
            .handle_request(json!({
                "jsonrpc": "2.0",
                "method": "tools/call",
                "params": {"name": "google_sheets_get_info", "arguments": {"url": "bogus"}},
                "id": 2
            }))
            .await;
        assert!(response.get("error").is_none());
        assert_eq!(response["result"]["isError"], true);
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("Error: Invalid Google Sheets URL"));
    }

    #[tokio::test]
    async fn prompts_and_resources_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let h = handler(dir.path());
        let response = h
            .handle_request(json!({"jsonrpc": "2.0", "method": "prompts/list", "id": 3}))
            .await;
        assert_eq!(response["result"]["prompts"].as_array().unwrap().len(), 0);
        let response = h
            .handle_request(json!({"jsonrpc": "2.0", "method": "resources/list", "id": 4}))
            .await;
        assert_eq!(response["result"]["resources"].as_array().unwrap().len(), 0);
    }
}
