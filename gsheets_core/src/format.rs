use serde::Deserialize;

use crate::error::SheetsError;
use crate::gateway::{ContentMatch, FileMatch, SpreadsheetInfo, TabData, TabList};

/// Hard ceiling on any tool response. Exceeding it replaces the payload
/// with an error rather than silently truncating.
pub const CHARACTER_LIMIT: usize = 25_000;

/// Markdown tables stop after this many data rows; JSON is unaffected.
pub const MAX_MARKDOWN_ROWS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Markdown,
    Json,
}

impl Default for ResponseFormat {
    fn default() -> Self {
        ResponseFormat::Markdown
    }
}

/// Fail-closed size check: a payload at the limit passes unchanged, one
/// character over is rejected outright.
pub fn enforce_limit(text: String) -> Result<String, SheetsError> {
    if text.chars().count() > CHARACTER_LIMIT {
        return Err(SheetsError::ResponseTooLarge {
            actual: text.chars().count(),
            limit: CHARACTER_LIMIT,
        });
    }
    Ok(text)
}

pub fn format_info(info: &SpreadsheetInfo, format: ResponseFormat) -> Result<String, SheetsError> {
    match format {
        ResponseFormat::Json => Ok(serde_json::to_string_pretty(info)?),
        ResponseFormat::Markdown => {
            let mut lines = Vec::new();
            lines.push(format!("# {}", info.title));
            lines.push(String::new());
            lines.push(format!("**Spreadsheet ID**: {}", info.spreadsheet_id));
            lines.push(format!("**Locale**: {}", info.locale));
            lines.push(format!("**Timezone**: {}", info.timezone));
            match &info.owner {
                Some(owner) => {
                    lines.push(format!("**Owner**: {} ({})", owner.name, owner.email));
                    lines.push(format!("**Created**: {}", owner.created_at));
                }
                None => lines.push("**Owner**: Not accessible (shared file)".to_string()),
            }
            lines.push(String::new());
            lines.push("## Sheets".to_string());
            lines.push(String::new());
            if info.sheets.is_empty() {
                lines.push("No sheets found.".to_string());
            } else {
                for sheet in &info.sheets {
                    lines.push(format!("### {}", sheet.title));
                    lines.push(format!("- **Sheet ID**: {}", sheet.sheet_id));
                    lines.push(format!("- **Index**: {}", sheet.index));
                    lines.push(format!(
                        "- **Size**: {} rows × {} columns",
                        sheet.row_count, sheet.column_count
                    ));
                    lines.push(String::new());
                }
            }
            Ok(lines.join("\n"))
        }
    }
}

pub fn format_tabs(tabs: &TabList, format: ResponseFormat) -> Result<String, SheetsError> {
    match format {
        ResponseFormat::Json => Ok(serde_json::to_string_pretty(tabs)?),
        ResponseFormat::Markdown => {
            let mut lines = Vec::new();
            lines.push(format!("# Tabs in \"{}\"", tabs.spreadsheet_title));
            lines.push(String::new());
            if tabs.tabs.is_empty() {
                lines.push("No tabs found.".to_string());
            } else {
                for tab in &tabs.tabs {
                    lines.push(format!(
                        "{}. **{}** (ID: {})",
                        tab.index + 1,
                        tab.title,
                        tab.sheet_id
                    ));
                }
            }
            Ok(lines.join("\n"))
        }
    }
}

pub fn format_tab_data(data: &TabData, format: ResponseFormat) -> Result<String, SheetsError> {
    if data.row_count == 0 {
        // Empty range is reported as plain text, not an error
        return Ok(format!("No data found in range: {}", data.range));
    }
    match format {
        ResponseFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        ResponseFormat::Markdown => {
            let mut lines = Vec::new();
            lines.push(format!("# Data from {}", data.range));
            lines.push(String::new());
            lines.push(format!(
                "**Rows**: {} | **Columns**: {}",
                data.row_count, data.column_count
            ));
            lines.push(String::new());

            // First row becomes the table header, empty cells fall back to
            // positional names
            let headers: Vec<String> = (0..data.column_count)
                .map(|idx| {
                    let cell = data.values[0].get(idx).map(|s| s.as_str()).unwrap_or("");
                    if cell.is_empty() {
                        format!("Col{}", idx + 1)
                    } else {
                        cell.to_string()
                    }
                })
                .collect();
            lines.push(format!("| {} |", headers.join(" | ")));
            lines.push(format!(
                "| {} |",
                headers.iter().map(|_| "---").collect::<Vec<_>>().join(" | ")
            ));

            let data_rows = &data.values[1..];
            for row in data_rows.iter().take(MAX_MARKDOWN_ROWS) {
                let cells: Vec<&str> = (0..data.column_count)
                    .map(|idx| row.get(idx).map(|s| s.as_str()).unwrap_or(""))
                    .collect();
                lines.push(format!("| {} |", cells.join(" | ")));
            }

            if data_rows.len() > MAX_MARKDOWN_ROWS {
                lines.push(String::new());
                lines.push(format!(
                    "*... and {} more rows not shown. Use 'response_format: json' or specify a smaller range for complete data.*",
                    data_rows.len() - MAX_MARKDOWN_ROWS
                ));
            }
            Ok(lines.join("\n"))
        }
    }
}

pub fn format_file_matches(
    query: &str,
    files: &[FileMatch],
    format: ResponseFormat,
) -> Result<String, SheetsError> {
    match format {
        ResponseFormat::Json => Ok(serde_json::to_string_pretty(files)?),
        ResponseFormat::Markdown => {
            if files.is_empty() {
                return Ok(format!("No files found matching: \"{}\"", query));
            }
            let entries: Vec<String> = files
                .iter()
                .enumerate()
                .map(|(i, f)| {
                    format!(
                        "{}. **{}**\n   - ID: {}\n   - Owner: {}\n   - Created: {}\n   - Modified: {}\n   - Link: {}",
                        i + 1,
                        f.name,
                        f.id,
                        f.owner,
                        f.created_time.as_deref().unwrap_or("Unknown"),
                        f.modified_time.as_deref().unwrap_or("Unknown"),
                        f.web_view_link.as_deref().unwrap_or("Unknown"),
                    )
                })
                .collect();
            Ok(format!(
                "Found {} file(s):\n\n{}",
                files.len(),
                entries.join("\n\n")
            ))
        }
    }
}

pub fn format_content_matches(
    search_term: &str,
    matches: &[ContentMatch],
    format: ResponseFormat,
) -> Result<String, SheetsError> {
    match format {
        ResponseFormat::Json => Ok(serde_json::to_string_pretty(matches)?),
        ResponseFormat::Markdown => {
            if matches.is_empty() {
                return Ok(format!(
                    "No matches found for \"{}\" in this spreadsheet",
                    search_term
                ));
            }
            let entries: Vec<String> = matches
                .iter()
                .enumerate()
                .map(|(i, m)| {
                    let context: String = m.context.chars().take(100).collect();
                    format!(
                        "{}. **{}** - Row {}, Column {}\n   Value: {}\n   Context: {}...",
                        i + 1,
                        m.sheet,
                        m.row,
                        m.column,
                        m.value,
                        context
                    )
                })
                .collect();
            Ok(format!(
                "Found {} matching row(s):\n\n{}",
                matches.len(),
                entries.join("\n\n")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{OwnerInfo, SheetInfo, TabEntry};

    fn two_by_two() -> TabData {
        TabData {
            spreadsheet_id: "sid".to_string(),
            range: "Sheet1!A1:B2".to_string(),
            row_count: 2,
            column_count: 2,
            values: vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string(), "d".to_string()],
            ],
        }
    }

    #[test]
    fn limit_boundary_is_inclusive() {
        let exact = "x".repeat(CHARACTER_LIMIT);
        assert_eq!(enforce_limit(exact.clone()).unwrap(), exact);

        let over = "x".repeat(CHARACTER_LIMIT + 1);
        let err = enforce_limit(over).unwrap_err();
        match err {
            SheetsError::ResponseTooLarge { actual, limit } => {
                assert_eq!(actual, CHARACTER_LIMIT + 1);
                assert_eq!(limit, CHARACTER_LIMIT);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn tab_data_json_round_trips() {
        let data = two_by_two();
        let text = format_tab_data(&data, ResponseFormat::Json).unwrap();
        let parsed: TabData = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.row_count, 2);
        assert_eq!(parsed.column_count, 2);
        assert_eq!(parsed.values, data.values);
    }

    #[test]
    fn tab_data_markdown_renders_a_table() {
        let text = format_tab_data(&two_by_two(), ResponseFormat::Markdown).unwrap();
        assert!(text.contains("# Data from Sheet1!A1:B2"));
        assert!(text.contains("**Rows**: 2 | **Columns**: 2"));
        assert!(text.contains("| a | b |"));
        assert!(text.contains("| --- | --- |"));
        assert!(text.contains("| c | d |"));
    }

    #[test]
    fn empty_header_cells_get_positional_names() {
        let data = TabData {
            values: vec![
                vec!["".to_string(), "b".to_string()],
                vec!["c".to_string()],
            ],
            ..two_by_two()
        };
        let text = format_tab_data(&data, ResponseFormat::Markdown).unwrap();
        assert!(text.contains("| Col1 | b |"));
        // Ragged rows are padded out to the column count
        assert!(text.contains("| c |  |"));
    }

    #[test]
    fn markdown_table_caps_rendered_rows() {
        let mut values = vec![vec!["h".to_string()]];
        for i in 0..150 {
            values.push(vec![format!("r{}", i)]);
        }
        let data = TabData {
            spreadsheet_id: "sid".to_string(),
            range: "Sheet1".to_string(),
            row_count: values.len(),
            column_count: 1,
            values,
        };
        let text = format_tab_data(&data, ResponseFormat::Markdown).unwrap();
        assert!(text.contains("| r99 |"));
        assert!(!text.contains("| r100 |"));
        assert!(text.contains("and 50 more rows not shown"));
    }

    #[test]
    fn empty_range_reports_no_data_in_both_modes() {
        let data = TabData {
            row_count: 0,
            column_count: 0,
            values: vec![],
            ..two_by_two()
        };
        for format in [ResponseFormat::Markdown, ResponseFormat::Json] {
            let text = format_tab_data(&data, format).unwrap();
            assert_eq!(text, "No data found in range: Sheet1!A1:B2");
        }
    }

    #[test]
    fn info_markdown_shows_owner_or_placeholder() {
        let mut info = SpreadsheetInfo {
            spreadsheet_id: "sid".to_string(),
            title: "Budget".to_string(),
            locale: "en_US".to_string(),
            timezone: "UTC".to_string(),
            owner: Some(OwnerInfo {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                created_at: "2024-01-01T00:00:00Z".to_string(),
            }),
            sheets: vec![SheetInfo {
                sheet_id: 7,
                title: "Data".to_string(),
                index: 0,
                row_count: 10,
                column_count: 3,
            }],
        };
        let text = format_info(&info, ResponseFormat::Markdown).unwrap();
        assert!(text.contains("**Owner**: Ada (ada@example.com)"));
        assert!(text.contains("- **Size**: 10 rows × 3 columns"));

        info.owner = None;
        let text = format_info(&info, ResponseFormat::Markdown).unwrap();
        assert!(text.contains("**Owner**: Not accessible (shared file)"));
    }

    #[test]
    fn tabs_markdown_numbers_by_index() {
        let tabs = TabList {
            spreadsheet_id: "sid".to_string(),
            spreadsheet_title: "Book".to_string(),
            tabs: vec![
                TabEntry {
                    title: "A".to_string(),
                    index: 0,
                    sheet_id: 10,
                },
                TabEntry {
                    title: "B".to_string(),
                    index: 1,
                    sheet_id: 11,
                },
            ],
        };
        let text = format_tabs(&tabs, ResponseFormat::Markdown).unwrap();
        assert!(text.contains("# Tabs in \"Book\""));
        assert!(text.contains("1. **A** (ID: 10)"));
        assert!(text.contains("2. **B** (ID: 11)"));
    }

    #[test]
    fn content_match_context_is_truncated() {
        let matches = vec![ContentMatch {
            sheet: "Sheet1".to_string(),
            row: 3,
            column: 2,
            value: "needle".to_string(),
            context: "x".repeat(300),
        }];
        let text = format_content_matches("needle", &matches, ResponseFormat::Markdown).unwrap();
        assert!(text.contains("**Sheet1** - Row 3, Column 2"));
        assert!(text.contains(&format!("Context: {}...", "x".repeat(100))));
        assert!(!text.contains(&"x".repeat(101)));
    }

    #[test]
    fn empty_searches_report_plainly() {
        let text = format_file_matches("report", &[], ResponseFormat::Markdown).unwrap();
        assert_eq!(text, "No files found matching: \"report\"");

        let text = format_content_matches("term", &[], ResponseFormat::Markdown).unwrap();
        assert_eq!(text, "No matches found for \"term\" in this spreadsheet");

        let text = format_file_matches("report", &[], ResponseFormat::Json).unwrap();
        assert_eq!(text.trim(), "[]");
    }
}
