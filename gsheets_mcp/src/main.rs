use tracing::{error, info};

use gsheets_core::{
    mcp_server::{JsonRpcHandler, McpServer},
    transport::StdioTransport,
    CredentialStore, SheetsConnector,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout is the JSON-RPC stream
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Google Sheets MCP Server");

    let store = CredentialStore::new_default();

    // No credentials means no tool call can ever succeed; refuse to serve
    let credentials_path = store.credentials_path();
    if !credentials_path.exists() {
        error!(
            "OAuth credentials file not found at: {}",
            credentials_path.display()
        );
        error!("Follow the setup instructions in README.md to create credentials, then run 'gsheets authenticate'.");
        std::process::exit(1);
    }

    let connector = SheetsConnector::new(store);
    let server = McpServer::new(connector);
    let handler = JsonRpcHandler::new(server);
    let transport = StdioTransport::new(handler);

    info!("MCP Server ready, listening on stdio");

    if let Err(e) = transport.run().await {
        error!("Transport error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
