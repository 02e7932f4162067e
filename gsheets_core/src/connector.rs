use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::*;
use serde::Deserialize;
use serde_json::json;

use crate::error::SheetsError;
use crate::format::{
    enforce_limit, format_content_matches, format_file_matches, format_info, format_tab_data,
    format_tabs, ResponseFormat,
};
use crate::gateway::{extract_spreadsheet_id, FileType, SheetsGateway, MAX_SEARCH_RESULTS};
use crate::oauth::Authenticator;
use crate::store::CredentialStore;

pub const SERVER_NAME: &str = "google-sheets-mcp-server";

#[derive(Debug, Deserialize)]
struct GetInfoArgs {
    url: String,
    #[serde(default)]
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ListTabsArgs {
    url: String,
    #[serde(default)]
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct GetTabDataArgs {
    url: String,
    tab_name: String,
    #[serde(default)]
    range: Option<String>,
    #[serde(default)]
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct SearchFilesArgs {
    query: String,
    #[serde(default)]
    file_type: FileType,
    #[serde(default = "default_file_results")]
    max_results: u32,
    #[serde(default)]
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct SearchContentArgs {
    spreadsheet_id: String,
    search_term: String,
    #[serde(default = "default_content_results")]
    max_results: u32,
    #[serde(default)]
    response_format: ResponseFormat,
}

fn default_file_results() -> u32 {
    10
}

fn default_content_results() -> u32 {
    5
}

/// The five read-only Sheets/Drive tools behind one connector.
pub struct SheetsConnector {
    authenticator: Authenticator,
    gateway: SheetsGateway,
}

impl SheetsConnector {
    pub fn new(store: CredentialStore) -> Self {
        let gateway = SheetsGateway::new(store.token_path().display().to_string());
        Self {
            authenticator: Authenticator::new(store),
            gateway,
        }
    }

    pub fn with_gateway(store: CredentialStore, gateway: SheetsGateway) -> Self {
        Self {
            authenticator: Authenticator::new(store),
            gateway,
        }
    }

    pub async fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            tools: Some(Default::default()),
            ..Default::default()
        }
    }

    pub async fn initialize(
        &self,
        _request: InitializeRequestParam,
    ) -> Result<InitializeResult, SheetsError> {
        Ok(InitializeResult {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: self.capabilities().await,
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                title: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Read-only Google Sheets access. Use google_sheets_get_info or google_drive_search_files to locate a spreadsheet, then google_sheets_get_tab_data for cell values."
                    .to_string(),
            ),
        })
    }

    pub async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
    ) -> Result<ListToolsResult, SheetsError> {
        let tools = vec![
            Tool {
                name: Cow::Borrowed("google_sheets_get_info"),
                title: None,
                description: Some(Cow::Borrowed(
                    "Spreadsheet metadata: title, locale, timezone, owner, and the list of sheets. Does not read cell data.",
                )),
                input_schema: Arc::new(json!({
                    "type": "object",
                    "properties": {
                        "url": {
                            "type": "string",
                            "description": "Full Google Sheets URL (e.g., https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/edit)."
                        },
                        "response_format": {
                            "type": "string",
                            "enum": ["markdown", "json"],
                            "description": "Output format (default: 'markdown')."
                        }
                    },
                    "required": ["url"]
                }).as_object().expect("Schema object").clone()),
                output_schema: None,
                annotations: None,
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("google_sheets_list_tabs"),
                title: None,
                description: Some(Cow::Borrowed(
                    "All tabs/sheets in a spreadsheet, ordered by sheet index.",
                )),
                input_schema: Arc::new(json!({
                    "type": "object",
                    "properties": {
                        "url": {
                            "type": "string",
                            "description": "Full Google Sheets URL."
                        },
                        "response_format": {
                            "type": "string",
                            "enum": ["markdown", "json"],
                            "description": "Output format (default: 'markdown')."
                        }
                    },
                    "required": ["url"]
                }).as_object().expect("Schema object").clone()),
                output_schema: None,
                annotations: None,
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("google_sheets_get_tab_data"),
                title: None,
                description: Some(Cow::Borrowed(
                    "Cell values from one tab, optionally restricted to an A1 range (e.g., 'A1:D10').",
                )),
                input_schema: Arc::new(json!({
                    "type": "object",
                    "properties": {
                        "url": {
                            "type": "string",
                            "description": "Full Google Sheets URL."
                        },
                        "tab_name": {
                            "type": "string",
                            "description": "Name of the tab/sheet (e.g., 'Sheet1', 'Q4 Sales')."
                        },
                        "range": {
                            "type": "string",
                            "description": "Range in A1 notation (e.g., 'A1:D10', 'B:E'). Reads the whole tab when omitted."
                        },
                        "response_format": {
                            "type": "string",
                            "enum": ["markdown", "json"],
                            "description": "Output format (default: 'markdown')."
                        }
                    },
                    "required": ["url", "tab_name"]
                }).as_object().expect("Schema object").clone()),
                output_schema: None,
                annotations: None,
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("google_drive_search_files"),
                title: None,
                description: Some(Cow::Borrowed(
                    "Search Drive files by name, newest first. Excludes trashed items.",
                )),
                input_schema: Arc::new(json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Substring to match against file names."
                        },
                        "file_type": {
                            "type": "string",
                            "enum": ["any", "spreadsheet", "document"],
                            "description": "Filter by file type (default: 'any')."
                        },
                        "max_results": {
                            "type": "integer",
                            "minimum": 1,
                            "maximum": 50,
                            "description": "Maximum results to return, 1-50 (default: 10)."
                        },
                        "response_format": {
                            "type": "string",
                            "enum": ["markdown", "json"],
                            "description": "Output format (default: 'markdown')."
                        }
                    },
                    "required": ["query"]
                }).as_object().expect("Schema object").clone()),
                output_schema: None,
                annotations: None,
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("google_drive_search_content"),
                title: None,
                description: Some(Cow::Borrowed(
                    "Search for text inside a spreadsheet's cells. Reports the first matching cell of each row, scanning sheets in index order.",
                )),
                input_schema: Arc::new(json!({
                    "type": "object",
                    "properties": {
                        "spreadsheet_id": {
                            "type": "string",
                            "description": "Spreadsheet ID to search in (get one from google_drive_search_files)."
                        },
                        "search_term": {
                            "type": "string",
                            "description": "Text to search for (case-insensitive substring)."
                        },
                        "max_results": {
                            "type": "integer",
                            "minimum": 1,
                            "maximum": 50,
                            "description": "Maximum matching rows to return (default: 5)."
                        },
                        "response_format": {
                            "type": "string",
                            "enum": ["markdown", "json"],
                            "description": "Output format (default: 'markdown')."
                        }
                    },
                    "required": ["spreadsheet_id", "search_term"]
                }).as_object().expect("Schema object").clone()),
                output_schema: None,
                annotations: None,
                icons: None,
            },
        ];

        Ok(ListToolsResult {
            tools,
            next_cursor: None,
        })
    }

    /// Dispatches one tool call. Unknown tools surface as a protocol error;
    /// everything else is caught here and converted to a single `Error: ...`
    /// text payload with `is_error` set, never a raw fault.
    pub async fn call_tool(
        &self,
        request: CallToolRequestParam,
    ) -> Result<CallToolResult, SheetsError> {
        let name = request.name.as_ref();
        if !matches!(
            name,
            "google_sheets_get_info"
                | "google_sheets_list_tabs"
                | "google_sheets_get_tab_data"
                | "google_drive_search_files"
                | "google_drive_search_content"
        ) {
            return Err(SheetsError::ToolNotFound);
        }

        let args = serde_json::Value::Object(request.arguments.unwrap_or_default());
        match self.dispatch(name, args).await {
            Ok(text) => Ok(text_result(text, false)),
            Err(err) => {
                tracing::warn!(tool = name, code = err.code_str(), "tool call failed: {}", err);
                Ok(text_result(err.user_message(), true))
            }
        }
    }

    async fn dispatch(&self, name: &str, args: serde_json::Value) -> Result<String, SheetsError> {
        match name {
            "google_sheets_get_info" => {
                let args: GetInfoArgs = parse_args(args)?;
                // URL validation is local; do it before any token work
                let spreadsheet_id = extract_spreadsheet_id(&args.url)?;
                let token = self.authenticator.access_token().await?;
                let info = self.gateway.get_info(&token, &spreadsheet_id).await?;
                enforce_limit(format_info(&info, args.response_format)?)
            }
            "google_sheets_list_tabs" => {
                let args: ListTabsArgs = parse_args(args)?;
                let spreadsheet_id = extract_spreadsheet_id(&args.url)?;
                let token = self.authenticator.access_token().await?;
                let tabs = self.gateway.list_tabs(&token, &spreadsheet_id).await?;
                enforce_limit(format_tabs(&tabs, args.response_format)?)
            }
            "google_sheets_get_tab_data" => {
                let args: GetTabDataArgs = parse_args(args)?;
                require_non_empty("tab_name", &args.tab_name)?;
                let spreadsheet_id = extract_spreadsheet_id(&args.url)?;
                let token = self.authenticator.access_token().await?;
                let data = self
                    .gateway
                    .get_tab_data(&token, &spreadsheet_id, &args.tab_name, args.range.as_deref())
                    .await?;
                enforce_limit(format_tab_data(&data, args.response_format)?)
            }
            "google_drive_search_files" => {
                let args: SearchFilesArgs = parse_args(args)?;
                require_non_empty("query", &args.query)?;
                let max_results = args.max_results.clamp(1, MAX_SEARCH_RESULTS);
                let token = self.authenticator.access_token().await?;
                let files = self
                    .gateway
                    .search_files(&token, &args.query, args.file_type, max_results)
                    .await?;
                enforce_limit(format_file_matches(
                    &args.query,
                    &files,
                    args.response_format,
                )?)
            }
            "google_drive_search_content" => {
                let args: SearchContentArgs = parse_args(args)?;
                require_non_empty("spreadsheet_id", &args.spreadsheet_id)?;
                require_non_empty("search_term", &args.search_term)?;
                let max_results = args.max_results.clamp(1, MAX_SEARCH_RESULTS) as usize;
                let token = self.authenticator.access_token().await?;
                let matches = self
                    .gateway
                    .search_content(&token, &args.spreadsheet_id, &args.search_term, max_results)
                    .await?;
                enforce_limit(format_content_matches(
                    &args.search_term,
                    &matches,
                    args.response_format,
                )?)
            }
            _ => Err(SheetsError::ToolNotFound),
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(args: serde_json::Value) -> Result<T, SheetsError> {
    serde_json::from_value(args)
        .map_err(|e| SheetsError::InvalidParams(format!("Invalid arguments: {}", e)))
}

fn require_non_empty(field: &str, value: &str) -> Result<(), SheetsError> {
    if value.trim().is_empty() {
        return Err(SheetsError::InvalidParams(format!(
            "'{}' must not be empty",
            field
        )));
    }
    Ok(())
}

fn text_result(text: String, is_error: bool) -> CallToolResult {
    CallToolResult {
        content: vec![Content::text(text)],
        structured_content: None,
        is_error: Some(is_error),
        meta: None,
    }
}
