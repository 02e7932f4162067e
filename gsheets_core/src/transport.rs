use serde_json::Value;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::mcp_server::JsonRpcHandler;

/// Stdio transport for the MCP server. One JSON-RPC message per line in,
/// one per line out; stdout carries nothing else.
pub struct StdioTransport {
    handler: JsonRpcHandler,
}

impl StdioTransport {
    pub fn new(handler: JsonRpcHandler) -> Self {
        Self { handler }
    }

    /// Reads stdin until EOF, answering each non-blank line on stdout.
    pub async fn run(&self) -> io::Result<()> {
        info!("Starting stdio transport");

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        // Reader task feeds lines into the channel until EOF
        tokio::spawn(async move {
            let mut reader = BufReader::new(tokio::io::stdin());
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!("EOF on stdin");
                        break;
                    }
                    Ok(_) if line.trim().is_empty() => {}
                    Ok(_) => {
                        if tx.send(line.clone()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            let response = self.response_for(&line).await;
            let raw = serde_json::to_string(&response)?;
            stdout.write_all(raw.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
            debug!("Sent response: {}", raw);
        }

        Ok(())
    }

    /// A line that is not valid JSON gets the standard -32700 response;
    /// everything else is handed to the JSON-RPC handler.
    async fn response_for(&self, line: &str) -> Value {
        match serde_json::from_str::<Value>(line) {
            Ok(request) => self.handler.handle_request(request).await,
            Err(e) => {
                error!("Failed to parse JSON-RPC request: {}", e);
                serde_json::json!({
                    "jsonrpc": "2.0",
                    "error": {
                        "code": -32700,
                        "message": "Parse error",
                        "data": e.to_string()
                    },
                    "id": null
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::SheetsConnector;
    use crate::mcp_server::McpServer;
    use crate::store::CredentialStore;

    fn transport(dir: &std::path::Path) -> StdioTransport {
        let store = CredentialStore::new(dir);
        std::fs::write(
            store.credentials_path(),
            r#"{"installed":{"client_id":"cid","client_secret":"cs"}}"#,
        )
        .unwrap();
        StdioTransport::new(JsonRpcHandler::new(McpServer::new(SheetsConnector::new(
            store,
        ))))
    }

    #[tokio::test]
    async fn garbage_input_gets_a_parse_error_response() {
        let dir = tempfile::tempdir().unwrap();
        let response = transport(dir.path()).response_for("{not json").await;
        assert_eq!(response["error"]["code"], -32700);
        assert_eq!(response["id"], Value::Null);
    }

    #[tokio::test]
    async fn valid_requests_reach_the_handler() {
        let dir = tempfile::tempdir().unwrap();
        let response = transport(dir.path())
            .response_for(r#"{"jsonrpc":"2.0","method":"tools/list","id":1}"#)
            .await;
        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["tools"].as_array().unwrap().len(), 5);
    }
}
