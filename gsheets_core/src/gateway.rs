use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::SheetsError;

pub const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";
pub const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

pub const MAX_SEARCH_RESULTS: u32 = 50;

static SPREADSHEET_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/spreadsheets/d/([a-zA-Z0-9_-]+)").expect("spreadsheet id pattern"));

/// Extracts the spreadsheet identifier from a full Sheets URL.
/// Malformed URLs fail here, before any remote call.
pub fn extract_spreadsheet_id(url: &str) -> Result<String, SheetsError> {
    SPREADSHEET_ID_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| SheetsError::InvalidUrl(url.to_string()))
}

// ---------------------------------------------------------------------------
// Wire shapes (Sheets v4 / Drive v3)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpreadsheetResponse {
    spreadsheet_id: Option<String>,
    properties: Option<SpreadsheetProperties>,
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpreadsheetProperties {
    title: Option<String>,
    locale: Option<String>,
    time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: Option<SheetProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: Option<i64>,
    title: Option<String>,
    index: Option<i64>,
    grid_properties: Option<GridProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridProperties {
    row_count: Option<i64>,
    column_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ValuesResponse {
    range: Option<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFileResponse {
    #[serde(default)]
    owners: Vec<DriveOwner>,
    created_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveOwner {
    display_name: Option<String>,
    email_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: Option<String>,
    name: Option<String>,
    #[serde(default)]
    owners: Vec<DriveOwner>,
    created_time: Option<String>,
    modified_time: Option<String>,
    web_view_link: Option<String>,
    mime_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Domain results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerInfo {
    pub name: String,
    pub email: String,
    pub created_at: String,
}

impl OwnerInfo {
    /// Placeholder used when the Drive owner lookup fails (usually a file
    /// shared without metadata access).
    pub fn not_accessible() -> Self {
        Self {
            name: "Unknown".to_string(),
            email: "Not accessible".to_string(),
            created_at: "Not accessible".to_string(),
        }
    }
}

fn serialize_owner<S: Serializer>(owner: &Option<OwnerInfo>, s: S) -> Result<S::Ok, S::Error> {
    match owner {
        Some(info) => info.serialize(s),
        None => OwnerInfo::not_accessible().serialize(s),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SpreadsheetInfo {
    pub spreadsheet_id: String,
    pub title: String,
    pub locale: String,
    pub timezone: String,
    #[serde(serialize_with = "serialize_owner")]
    pub owner: Option<OwnerInfo>,
    pub sheets: Vec<SheetInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetInfo {
    pub sheet_id: i64,
    pub title: String,
    pub index: i64,
    pub row_count: i64,
    pub column_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TabList {
    pub spreadsheet_id: String,
    pub spreadsheet_title: String,
    pub tabs: Vec<TabEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabEntry {
    pub title: String,
    pub index: i64,
    pub sheet_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabData {
    pub spreadsheet_id: String,
    pub range: String,
    pub row_count: usize,
    pub column_count: usize,
    pub values: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileMatch {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub created_time: Option<String>,
    pub modified_time: Option<String>,
    pub web_view_link: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentMatch {
    pub sheet: String,
    /// 1-based row number.
    pub row: usize,
    /// 1-based column of the first matching cell in the row.
    pub column: usize,
    pub value: String,
    /// The whole row joined with " | ".
    pub context: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Any,
    Spreadsheet,
    Document,
}

impl Default for FileType {
    fn default() -> Self {
        FileType::Any
    }
}

impl FileType {
    fn mime_type(&self) -> Option<&'static str> {
        match self {
            FileType::Any => None,
            FileType::Spreadsheet => Some("application/vnd.google-apps.spreadsheet"),
            FileType::Document => Some("application/vnd.google-apps.document"),
        }
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Thin adapter over the Sheets v4 and Drive v3 REST APIs. One method per
/// tool; every call takes a bearer token obtained by the Authenticator.
/// Base URLs are swappable so tests can point at a local server.
pub struct SheetsGateway {
    client: reqwest::Client,
    sheets_base: String,
    drive_base: String,
    token_path: String,
}

impl SheetsGateway {
    pub fn new(token_path: String) -> Self {
        Self::with_base_urls(token_path, SHEETS_BASE_URL, DRIVE_BASE_URL)
    }

    pub fn with_base_urls(
        token_path: String,
        sheets_base: impl Into<String>,
        drive_base: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            sheets_base: sheets_base.into(),
            drive_base: drive_base.into(),
            token_path,
        }
    }

    pub async fn get_info(
        &self,
        token: &str,
        spreadsheet_id: &str,
    ) -> Result<SpreadsheetInfo, SheetsError> {
        let request_url = format!(
            "{}/spreadsheets/{}?fields=spreadsheetId,properties,sheets.properties",
            self.sheets_base, spreadsheet_id
        );
        let resp: SpreadsheetResponse = self.get_json(token, &request_url, None).await?;
        let owner = self.get_file_owner(token, spreadsheet_id).await;
        Ok(Self::info_from_response(spreadsheet_id.to_string(), resp, owner))
    }

    pub async fn list_tabs(&self, token: &str, spreadsheet_id: &str) -> Result<TabList, SheetsError> {
        let request_url = format!(
            "{}/spreadsheets/{}?fields=spreadsheetId,properties.title,sheets.properties(title,index,sheetId)",
            self.sheets_base, spreadsheet_id
        );
        let resp: SpreadsheetResponse = self.get_json(token, &request_url, None).await?;
        Ok(Self::tabs_from_response(spreadsheet_id.to_string(), resp))
    }

    pub async fn get_tab_data(
        &self,
        token: &str,
        spreadsheet_id: &str,
        tab_name: &str,
        range: Option<&str>,
    ) -> Result<TabData, SheetsError> {
        let qualified = qualify_range(tab_name, range);
        let request_url = format!(
            "{}/spreadsheets/{}/values/{}?valueRenderOption=FORMATTED_VALUE&dateTimeRenderOption=FORMATTED_STRING",
            self.sheets_base,
            spreadsheet_id,
            urlencoding::encode(&qualified)
        );
        let resp: ValuesResponse = self
            .get_json(token, &request_url, Some(&qualified))
            .await?;

        let actual_range = resp.range.unwrap_or(qualified);
        let values: Vec<Vec<String>> = resp
            .values
            .iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();
        let row_count = values.len();
        // Rows are not assumed rectangular
        let column_count = values.iter().map(|r| r.len()).max().unwrap_or(0);

        Ok(TabData {
            spreadsheet_id: spreadsheet_id.to_string(),
            range: actual_range,
            row_count,
            column_count,
            values,
        })
    }

    pub async fn search_files(
        &self,
        token: &str,
        query: &str,
        file_type: FileType,
        max_results: u32,
    ) -> Result<Vec<FileMatch>, SheetsError> {
        let request_url = Self::build_file_search_url(&self.drive_base, query, file_type, max_results);
        let resp: DriveListResponse = self.get_json(token, &request_url, None).await?;

        Ok(resp
            .files
            .into_iter()
            .map(|file| FileMatch {
                id: file.id.unwrap_or_default(),
                name: file.name.unwrap_or_else(|| "Untitled".to_string()),
                owner: file
                    .owners
                    .first()
                    .and_then(|o| o.email_address.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                created_time: file.created_time,
                modified_time: file.modified_time,
                web_view_link: file.web_view_link,
                mime_type: file.mime_type,
            })
            .collect())
    }

    /// Scans every sheet in index order, one values call per sheet, stopping
    /// once `max_results` matches are collected across all sheets combined.
    pub async fn search_content(
        &self,
        token: &str,
        spreadsheet_id: &str,
        search_term: &str,
        max_results: usize,
    ) -> Result<Vec<ContentMatch>, SheetsError> {
        let request_url = format!(
            "{}/spreadsheets/{}?fields=sheets.properties",
            self.sheets_base, spreadsheet_id
        );
        let resp: SpreadsheetResponse = self.get_json(token, &request_url, None).await?;

        let mut sheet_names: Vec<(i64, String)> = resp
            .sheets
            .into_iter()
            .filter_map(|s| s.properties)
            .map(|p| {
                (
                    p.index.unwrap_or(0),
                    p.title.unwrap_or_else(|| "Unknown".to_string()),
                )
            })
            .collect();
        sheet_names.sort_by_key(|(index, _)| *index);

        let mut matches = Vec::new();
        for (_, sheet_name) in sheet_names {
            if matches.len() >= max_results {
                break;
            }
            let range = format!("'{}'", sheet_name);
            let values_url = format!(
                "{}/spreadsheets/{}/values/{}",
                self.sheets_base,
                spreadsheet_id,
                urlencoding::encode(&range)
            );
            let data: ValuesResponse = self.get_json(token, &values_url, Some(&range)).await?;
            let rows: Vec<Vec<String>> = data
                .values
                .iter()
                .map(|row| row.iter().map(cell_to_string).collect())
                .collect();
            scan_rows(
                &sheet_name,
                &rows,
                search_term,
                max_results - matches.len(),
                &mut matches,
            );
        }

        Ok(matches)
    }

    /// Best-effort Drive lookup; failures are swallowed rather than failing
    /// the whole operation.
    async fn get_file_owner(&self, token: &str, spreadsheet_id: &str) -> Option<OwnerInfo> {
        let request_url = format!(
            "{}/files/{}?fields=owners,createdTime",
            self.drive_base, spreadsheet_id
        );
        let resp: DriveFileResponse = match self.get_json(token, &request_url, None).await {
            Ok(resp) => resp,
            Err(err) => {
                tracing::debug!("owner lookup failed: {}", err);
                return None;
            }
        };
        let owner = resp.owners.first()?;
        Some(OwnerInfo {
            name: owner
                .display_name
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            email: owner
                .email_address
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            created_at: resp
                .created_time
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
        })
    }

    fn build_file_search_url(
        drive_base: &str,
        query: &str,
        file_type: FileType,
        max_results: u32,
    ) -> String {
        // Single quotes in the query would break the filter expression
        let escaped = query.replace('\'', "\\'");
        let mut q = format!("name contains '{}' and trashed=false", escaped);
        if let Some(mime) = file_type.mime_type() {
            q.push_str(&format!(" and mimeType='{}'", mime));
        }
        format!(
            "{}/files?q={}&spaces=drive&fields={}&pageSize={}&orderBy=modifiedTime%20desc",
            drive_base,
            urlencoding::encode(&q),
            urlencoding::encode("files(id,name,owners,createdTime,modifiedTime,webViewLink,mimeType)"),
            max_results.min(MAX_SEARCH_RESULTS),
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        token: &str,
        url: &str,
        range: Option<&str>,
    ) -> Result<T, SheetsError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(SheetsError::HttpRequest)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(self.map_api_error(status.as_u16(), &body, range));
        }
        resp.json::<T>()
            .await
            .map_err(|e| SheetsError::Other(format!("failed to parse API response: {}", e)))
    }

    /// Maps the remote API's failure modes onto the local taxonomy.
    fn map_api_error(&self, status: u16, body: &str, range: Option<&str>) -> SheetsError {
        if status == 401 || body.contains("invalid_grant") || body.contains("Token has been expired")
        {
            return SheetsError::TokenExpired {
                token_path: self.token_path.clone(),
            };
        }
        if status == 400 {
            if let Some(range) = range {
                if body.contains("Unable to parse range") {
                    return SheetsError::RangeOrTabNotFound(range.to_string());
                }
            }
        }
        if status == 403 || status == 404 {
            return SheetsError::AccessDenied;
        }
        SheetsError::Other(format!("API request failed with status {}", status))
    }

    fn info_from_response(
        spreadsheet_id: String,
        resp: SpreadsheetResponse,
        owner: Option<OwnerInfo>,
    ) -> SpreadsheetInfo {
        let props = resp.properties.unwrap_or(SpreadsheetProperties {
            title: None,
            locale: None,
            time_zone: None,
        });
        let sheets = resp
            .sheets
            .into_iter()
            .filter_map(|s| s.properties)
            .map(|p| {
                let grid = p.grid_properties.as_ref();
                SheetInfo {
                    sheet_id: p.sheet_id.unwrap_or(0),
                    title: p.title.unwrap_or_else(|| "Untitled".to_string()),
                    index: p.index.unwrap_or(0),
                    row_count: grid.and_then(|g| g.row_count).unwrap_or(0),
                    column_count: grid.and_then(|g| g.column_count).unwrap_or(0),
                }
            })
            .collect();
        SpreadsheetInfo {
            spreadsheet_id: resp.spreadsheet_id.unwrap_or(spreadsheet_id),
            title: props.title.unwrap_or_else(|| "Untitled".to_string()),
            locale: props.locale.unwrap_or_else(|| "unknown".to_string()),
            timezone: props.time_zone.unwrap_or_else(|| "unknown".to_string()),
            owner,
            sheets,
        }
    }

    fn tabs_from_response(spreadsheet_id: String, resp: SpreadsheetResponse) -> TabList {
        let mut tabs: Vec<TabEntry> = resp
            .sheets
            .into_iter()
            .filter_map(|s| s.properties)
            .map(|p| TabEntry {
                title: p.title.unwrap_or_else(|| "Untitled".to_string()),
                index: p.index.unwrap_or(0),
                sheet_id: p.sheet_id.unwrap_or(0),
            })
            .collect();
        // Always index order, regardless of response order
        tabs.sort_by_key(|t| t.index);
        TabList {
            spreadsheet_id: resp.spreadsheet_id.unwrap_or(spreadsheet_id),
            spreadsheet_title: resp
                .properties
                .and_then(|p| p.title)
                .unwrap_or_else(|| "Untitled".to_string()),
            tabs,
        }
    }
}

/// Prefixes `tab!` when the caller's range omits a sheet qualifier.
pub fn qualify_range(tab_name: &str, range: Option<&str>) -> String {
    match range {
        None => tab_name.to_string(),
        Some(r) if r.contains('!') => r.to_string(),
        Some(r) => format!("{}!{}", tab_name, r),
    }
}

/// Case-insensitive substring scan: rows top-to-bottom, columns
/// left-to-right, first matching cell per row only.
pub fn scan_rows(
    sheet: &str,
    rows: &[Vec<String>],
    search_term: &str,
    budget: usize,
    out: &mut Vec<ContentMatch>,
) {
    let needle = search_term.to_lowercase();
    let mut taken = 0;
    for (row_idx, row) in rows.iter().enumerate() {
        if taken >= budget {
            break;
        }
        for (col_idx, cell) in row.iter().enumerate() {
            if cell.to_lowercase().contains(&needle) {
                out.push(ContentMatch {
                    sheet: sheet.to_string(),
                    row: row_idx + 1,
                    column: col_idx + 1,
                    value: cell.clone(),
                    context: row.join(" | "),
                });
                taken += 1;
                break;
            }
        }
    }
}

fn cell_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
