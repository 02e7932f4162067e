use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SheetsError;

pub const CREDENTIALS_FILE: &str = ".google-sheets-mcp-credentials.json";
pub const TOKEN_FILE: &str = ".google-sheets-mcp-token.json";

/// OAuth client secrets as downloaded from the Google Cloud console.
/// The file wraps the actual keys in either an `installed` or `web` object.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn from_json(raw: &str) -> Result<Self, SheetsError> {
        let file: ClientSecretsFile = serde_json::from_str(raw)?;
        file.installed
            .or(file.web)
            .ok_or_else(|| {
                SheetsError::Authentication(
                    "Credentials file must contain an 'installed' or 'web' section".to_string(),
                )
            })
    }

    /// First registered redirect URI, falling back to the local listener default.
    pub fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(|s| s.as_str())
            .unwrap_or("http://localhost:3000")
    }
}

/// Persisted OAuth token, in the same shape the token endpoint returns
/// (`expiry_date` is epoch milliseconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
}

impl StoredToken {
    /// Expired (or about to expire) relative to now. A missing expiry is
    /// treated as still valid; the API's 401 is the fallback signal.
    pub fn is_expired(&self) -> bool {
        match self.expiry_date {
            Some(at) => at - 60_000 <= chrono::Utc::now().timestamp_millis(),
            None => false,
        }
    }
}

/// File-backed store for the two local auth artifacts, both directly under
/// the base directory (the operator's home in production).
pub struct CredentialStore {
    base: PathBuf,
}

impl CredentialStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Store rooted at the user's home directory.
    pub fn new_default() -> Self {
        let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.base.join(CREDENTIALS_FILE)
    }

    pub fn token_path(&self) -> PathBuf {
        self.base.join(TOKEN_FILE)
    }

    pub fn load_secrets(&self) -> Result<ClientSecrets, SheetsError> {
        let path = self.credentials_path();
        let raw = std::fs::read_to_string(&path).map_err(|_| {
            SheetsError::MissingCredentialsFile {
                path: path.display().to_string(),
            }
        })?;
        ClientSecrets::from_json(&raw)
    }

    pub fn load_token(&self) -> Option<StoredToken> {
        let raw = std::fs::read_to_string(self.token_path()).ok()?;
        serde_json::from_str(&raw).ok()
    }

    pub fn save_token(&self, token: &StoredToken) -> Result<(), SheetsError> {
        let path = self.token_path();
        let s = serde_json::to_string_pretty(token)?;
        std::fs::write(&path, &s)?;

        // Restrictive permissions on Unix (owner read/write only)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    /// Removes a file if present. Returns whether anything was deleted.
    pub fn remove_file(path: &Path) -> Result<bool, SheetsError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_installed_and_web_secrets() {
        let installed = r#"{"installed":{"client_id":"id1","client_secret":"s1","redirect_uris":["http://localhost:3000"]}}"#;
        let secrets = ClientSecrets::from_json(installed).unwrap();
        assert_eq!(secrets.client_id, "id1");
        assert_eq!(secrets.redirect_uri(), "http://localhost:3000");

        let web = r#"{"web":{"client_id":"id2","client_secret":"s2"}}"#;
        let secrets = ClientSecrets::from_json(web).unwrap();
        assert_eq!(secrets.client_id, "id2");
        // No registered URI falls back to the local listener
        assert_eq!(secrets.redirect_uri(), "http://localhost:3000");

        assert!(ClientSecrets::from_json(r#"{"other":{}}"#).is_err());
    }

    #[test]
    fn missing_credentials_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        let err = store.load_secrets().unwrap_err();
        assert!(matches!(err, SheetsError::MissingCredentialsFile { .. }));
        assert!(err.to_string().contains(CREDENTIALS_FILE));
    }

    #[test]
    fn token_round_trip_overwrites_and_restricts_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        assert!(store.load_token().is_none());

        let token = StoredToken {
            access_token: "first".to_string(),
            refresh_token: Some("r1".to_string()),
            scope: None,
            token_type: Some("Bearer".to_string()),
            expiry_date: Some(1_700_000_000_000),
        };
        store.save_token(&token).unwrap();

        let rotated = StoredToken {
            access_token: "second".to_string(),
            ..token
        };
        store.save_token(&rotated).unwrap();

        let loaded = store.load_token().unwrap();
        assert_eq!(loaded.access_token, "second");
        assert_eq!(loaded.refresh_token.as_deref(), Some("r1"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(store.token_path())
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn expiry_check_uses_skew() {
        let now = chrono::Utc::now().timestamp_millis();
        let fresh = StoredToken {
            access_token: "a".to_string(),
            refresh_token: None,
            scope: None,
            token_type: None,
            expiry_date: Some(now + 3_600_000),
        };
        assert!(!fresh.is_expired());

        let stale = StoredToken {
            expiry_date: Some(now + 30_000),
            ..fresh.clone()
        };
        assert!(stale.is_expired());

        let unknown = StoredToken {
            expiry_date: None,
            ..fresh
        };
        assert!(!unknown.is_expired());
    }
}
