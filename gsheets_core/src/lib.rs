//! Core library for the Google Sheets MCP server: OAuth credential
//! handling, a thin gateway over the Sheets/Drive REST APIs, response
//! formatting, and the JSON-RPC/stdio plumbing that serves it all as
//! MCP tools.

pub mod connector;
pub mod error;
pub mod format;
pub mod gateway;
pub mod mcp_server;
pub mod oauth;
pub mod redirect;
pub mod settings;
pub mod store;
pub mod transport;

pub use connector::SheetsConnector;
pub use error::SheetsError;
pub use format::ResponseFormat;
pub use gateway::SheetsGateway;
pub use oauth::Authenticator;
pub use redirect::RedirectListener;
pub use settings::ClaudeSettings;
pub use store::CredentialStore;
