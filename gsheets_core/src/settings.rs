use std::path::PathBuf;

use serde_json::{json, Map, Value};

use crate::error::SheetsError;

pub const SERVER_KEY: &str = "google-sheets";

/// Read-merge-write access to the Claude settings file. Only the
/// `mcpServers.google-sheets` entry is ever touched; unrelated keys pass
/// through untouched, and the file is rewritten only when the entry
/// actually changes.
pub struct ClaudeSettings {
    path: PathBuf,
}

impl ClaudeSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.claude/settings.json`.
    pub fn new_default() -> Self {
        let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join(".claude").join("settings.json"))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Installs the server-launch entry. Returns whether the file was
    /// written (false when the entry was already up to date).
    pub fn install_server(&self, command: &str, args: &[String]) -> Result<bool, SheetsError> {
        let mut settings = self.read_or_empty();
        let entry = json!({
            "command": command,
            "args": args,
        });

        let servers = settings
            .entry("mcpServers".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        let servers = match servers.as_object_mut() {
            Some(map) => map,
            None => {
                return Err(SheetsError::Other(
                    "'mcpServers' in the settings file is not an object".to_string(),
                ))
            }
        };

        if servers.get(SERVER_KEY) == Some(&entry) {
            return Ok(false);
        }
        servers.insert(SERVER_KEY.to_string(), entry);
        self.write(&settings)?;
        Ok(true)
    }

    /// Removes the entry. Returns whether anything was removed.
    pub fn remove_server(&self) -> Result<bool, SheetsError> {
        let mut settings = self.read_or_empty();
        let removed = settings
            .get_mut("mcpServers")
            .and_then(|s| s.as_object_mut())
            .and_then(|s| s.remove(SERVER_KEY))
            .is_some();
        if removed {
            self.write(&settings)?;
        }
        Ok(removed)
    }

    pub fn server_entry(&self) -> Option<Value> {
        self.read_or_empty()
            .get("mcpServers")?
            .get(SERVER_KEY)
            .cloned()
    }

    fn read_or_empty(&self) -> Map<String, Value> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default()
    }

    fn write(&self, settings: &Map<String, Value>) -> Result<(), SheetsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut raw = serde_json::to_string_pretty(settings)?;
        raw.push('\n');
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_preserves_unrelated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"theme": "dark", "mcpServers": {"other": {"command": "x", "args": []}}}"#,
        )
        .unwrap();

        let settings = ClaudeSettings::new(&path);
        assert!(settings
            .install_server("/usr/local/bin/gsheets_mcp", &[])
            .unwrap());

        let raw = std::fs::read_to_string(&path).unwrap();
        let v: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["theme"], "dark");
        assert_eq!(v["mcpServers"]["other"]["command"], "x");
        assert_eq!(
            v["mcpServers"][SERVER_KEY]["command"],
            "/usr/local/bin/gsheets_mcp"
        );
        assert!(raw.ends_with('\n'));
    }

    #[test]
    fn install_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ClaudeSettings::new(dir.path().join("nested").join("settings.json"));

        assert!(settings.install_server("gsheets_mcp", &[]).unwrap());
        // Same entry again: nothing to write
        assert!(!settings.install_server("gsheets_mcp", &[]).unwrap());
        // Different command: rewritten
        assert!(settings.install_server("/opt/gsheets_mcp", &[]).unwrap());
    }

    #[test]
    fn remove_only_touches_our_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = ClaudeSettings::new(&path);

        // Removing from a missing file is a no-op
        assert!(!settings.remove_server().unwrap());

        settings.install_server("gsheets_mcp", &[]).unwrap();
        assert!(settings.server_entry().is_some());
        assert!(settings.remove_server().unwrap());
        assert!(settings.server_entry().is_none());
        assert!(!settings.remove_server().unwrap());
    }

    #[test]
    fn unreadable_settings_start_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let settings = ClaudeSettings::new(&path);
        assert!(settings.install_server("gsheets_mcp", &[]).unwrap());
        let v: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["mcpServers"][SERVER_KEY]["command"], "gsheets_mcp");
    }
}
