use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum SheetsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Credentials file not found at {path}")]
    MissingCredentialsFile { path: String },

    #[error("No saved authentication token found. Please authorize this app by visiting:\n{auth_url}\n\nThen run: gsheets exchange <code>")]
    MissingToken { auth_url: String },

    #[error("Authentication token expired. Please delete {token_path} and re-authenticate with: gsheets authenticate")]
    TokenExpired { token_path: String },

    #[error("Invalid Google Sheets URL: {0}")]
    InvalidUrl(String),

    #[error("Cannot access spreadsheet. Check that the URL is correct and that you have permission to view it.")]
    AccessDenied,

    #[error("Unable to parse range: {0}. Check that the tab name and range are valid.")]
    RangeOrTabNotFound(String),

    #[error("Response exceeds size limit ({actual} > {limit} characters).\nTry specifying a smaller range using the 'range' parameter (e.g., 'A1:Z100').")]
    ResponseTooLarge { actual: usize, limit: usize },

    #[error("Authorization timed out after {0} seconds. Please run the command again and complete the consent screen promptly.")]
    AuthorizationTimeout(u64),

    #[error("Port {0} is already in use. Close the application using it or wait a moment and try again.")]
    PortInUse(u16),

    #[error("Permission denied binding port {0}. Ports below 1024 require elevated privileges.")]
    PortPermissionDenied(u16),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Tool not found")]
    ToolNotFound,

    #[error("Method not found")]
    MethodNotFound,

    #[error("Parse error")]
    ParseError,

    #[error("Other error: {0}")]
    Other(String),
}

impl SheetsError {
    /// Single-line (plus remediation) text shown to the model/operator.
    /// Every tool failure funnels through this; nothing propagates raw.
    pub fn user_message(&self) -> String {
        format!("Error: {}", self)
    }

    pub fn code_str(&self) -> &'static str {
        match self {
            SheetsError::MissingCredentialsFile { .. } => "missing_credentials",
            SheetsError::MissingToken { .. } => "missing_token",
            SheetsError::TokenExpired { .. } => "token_expired",
            SheetsError::InvalidUrl(_) => "invalid_url",
            SheetsError::AccessDenied => "access_denied",
            SheetsError::RangeOrTabNotFound(_) => "range_not_found",
            SheetsError::ResponseTooLarge { .. } => "response_too_large",
            SheetsError::AuthorizationTimeout(_) => "authorization_timeout",
            SheetsError::PortInUse(_) => "port_in_use",
            SheetsError::PortPermissionDenied(_) => "port_permission_denied",
            SheetsError::Authentication(_) => "auth_failed",
            SheetsError::InvalidParams(_) => "invalid_params",
            SheetsError::ToolNotFound => "tool_not_found",
            SheetsError::MethodNotFound => "method_not_found",
            SheetsError::ParseError => "parse_error",
            SheetsError::HttpRequest(_) => "upstream_error",
            _ => "internal_error",
        }
    }

    pub fn to_jsonrpc_error(&self) -> serde_json::Value {
        let (code, message) = match self {
            SheetsError::ToolNotFound => (-32602, "Tool not found".to_string()),
            SheetsError::InvalidParams(msg) => (-32602, msg.to_string()),
            SheetsError::MethodNotFound => (-32601, "Method not found".to_string()),
            SheetsError::ParseError => (-32700, "Parse error".to_string()),
            SheetsError::Other(msg) => (-32603, msg.to_string()),
            err => (-32603, err.to_string()),
        };

        json!({
            "code": code,
            "message": message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_token_message_includes_auth_url_and_next_step() {
        let err = SheetsError::MissingToken {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth?client_id=abc".to_string(),
        };
        let msg = err.user_message();
        assert!(msg.starts_with("Error: No saved authentication token found"));
        assert!(msg.contains("https://accounts.google.com/o/oauth2/v2/auth?client_id=abc"));
        assert!(msg.contains("gsheets exchange"));
    }

    #[test]
    fn size_limit_message_names_actual_and_limit() {
        let err = SheetsError::ResponseTooLarge {
            actual: 31_000,
            limit: 25_000,
        };
        let msg = err.user_message();
        assert!(msg.contains("31000 > 25000"));
        assert!(msg.contains("'range' parameter"));
    }

    #[test]
    fn jsonrpc_mapping_uses_standard_codes() {
        let err = SheetsError::InvalidParams("bad args".to_string());
        let v = err.to_jsonrpc_error();
        assert_eq!(v["code"], -32602);
        assert_eq!(v["message"], "bad args");

        let v = SheetsError::MethodNotFound.to_jsonrpc_error();
        assert_eq!(v["code"], -32601);
    }
}
