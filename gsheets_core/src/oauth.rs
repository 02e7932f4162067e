use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SheetsError;
use crate::store::{CredentialStore, StoredToken};

pub const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Sheets read/write plus read-only Drive metadata (for owner lookup and
/// file search).
pub const SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive.readonly";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

impl OAuthTokens {
    /// Stored form, keeping the previous refresh token when the endpoint
    /// omits one (Google only returns it on the first exchange).
    pub fn into_stored(self, previous_refresh: Option<String>) -> StoredToken {
        let expiry_date = self
            .expires_in
            .map(|ex| chrono::Utc::now().timestamp_millis() + ex * 1000);
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            scope: self.scope,
            token_type: self.token_type,
            expiry_date,
        }
    }
}

/// Obtains and refreshes access tokens backed by the local credential store.
pub struct Authenticator {
    store: CredentialStore,
    client: reqwest::Client,
}

impl Authenticator {
    pub fn new(store: CredentialStore) -> Self {
        Self {
            store,
            client: reqwest::Client::new(),
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Consent URL for the authorization-code flow. `access_type=offline`
    /// plus `prompt=consent` so Google issues a refresh token.
    pub fn authorization_url(client_id: &str, redirect_uri: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            AUTH_ENDPOINT,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(SCOPES),
        )
    }

    /// Valid access token, refreshing (and persisting) a stale one.
    /// Fails fast with the full remediation story when no token exists yet.
    pub async fn access_token(&self) -> Result<String, SheetsError> {
        let secrets = self.store.load_secrets()?;

        let token = match self.store.load_token() {
            Some(token) => token,
            None => {
                return Err(SheetsError::MissingToken {
                    auth_url: Self::authorization_url(&secrets.client_id, secrets.redirect_uri()),
                })
            }
        };

        if !token.is_expired() {
            return Ok(token.access_token);
        }

        let refresh_token = match &token.refresh_token {
            Some(rt) => rt.clone(),
            None => return Err(self.token_expired()),
        };

        tracing::debug!("access token stale, refreshing");
        let tokens = self
            .refresh(&secrets.client_id, &secrets.client_secret, &refresh_token)
            .await?;
        let stored = tokens.into_stored(Some(refresh_token));
        self.store.save_token(&stored)?;
        Ok(stored.access_token)
    }

    /// Exchanges an authorization code for tokens and persists them.
    pub async fn exchange_code(&self, code: &str) -> Result<StoredToken, SheetsError> {
        let secrets = self.store.load_secrets()?;
        let body = [
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("client_id", secrets.client_id.clone()),
            ("client_secret", secrets.client_secret.clone()),
            ("redirect_uri", secrets.redirect_uri().to_string()),
        ];
        let resp = self
            .client
            .post(TOKEN_ENDPOINT)
            .form(&body)
            .send()
            .await
            .map_err(SheetsError::HttpRequest)?;
        let status = resp.status();
        let v = resp
            .json::<Value>()
            .await
            .map_err(|e| SheetsError::Other(e.to_string()))?;
        let tokens = self.parse_token_response(status.is_success(), &v)?;

        let stored = tokens.into_stored(None);
        self.store.save_token(&stored)?;
        Ok(stored)
    }

    async fn refresh(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<OAuthTokens, SheetsError> {
        let body = [
            ("grant_type", "refresh_token".to_string()),
            ("client_id", client_id.to_string()),
            ("client_secret", client_secret.to_string()),
            ("refresh_token", refresh_token.to_string()),
        ];
        let resp = self
            .client
            .post(TOKEN_ENDPOINT)
            .form(&body)
            .send()
            .await
            .map_err(SheetsError::HttpRequest)?;
        let status = resp.status();
        let v = resp
            .json::<Value>()
            .await
            .map_err(|e| SheetsError::Other(e.to_string()))?;
        self.parse_token_response(status.is_success(), &v)
    }

    /// Parses the token endpoint's JSON. A revoked or stale grant comes back
    /// as `invalid_grant`, which maps to the token-expired remediation.
    fn parse_token_response(&self, success: bool, v: &Value) -> Result<OAuthTokens, SheetsError> {
        if !success || v.get("error").is_some() {
            let error = v["error"].as_str().unwrap_or("unknown");
            if error == "invalid_grant" {
                return Err(self.token_expired());
            }
            let description = v["error_description"].as_str().unwrap_or("");
            return Err(SheetsError::Authentication(format!(
                "token request failed: {} {}",
                error, description
            )));
        }
        Ok(OAuthTokens {
            access_token: v["access_token"].as_str().unwrap_or_default().to_string(),
            refresh_token: v
                .get("refresh_token")
                .and_then(|s| s.as_str())
                .map(|s| s.to_string()),
            expires_in: v.get("expires_in").and_then(|i| i.as_i64()),
            scope: v
                .get("scope")
                .and_then(|s| s.as_str())
                .map(|s| s.to_string()),
            token_type: v
                .get("token_type")
                .and_then(|s| s.as_str())
                .map(|s| s.to_string()),
        })
    }

    pub(crate) fn token_expired(&self) -> SheetsError {
        SheetsError::TokenExpired {
            token_path: self.store.token_path().display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with_secrets(dir: &std::path::Path) -> CredentialStore {
        let store = CredentialStore::new(dir);
        std::fs::write(
            store.credentials_path(),
            r#"{"installed":{"client_id":"cid","client_secret":"cs","redirect_uris":["http://localhost:3000"]}}"#,
        )
        .unwrap();
        store
    }

    #[test]
    fn authorization_url_carries_scopes_and_offline_access() {
        let url = Authenticator::authorization_url("cid", "http://localhost:3000");
        assert!(url.starts_with(AUTH_ENDPOINT));
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("spreadsheets"));
        assert!(url.contains("drive.readonly"));
    }

    #[test]
    fn parse_token_response_success() {
        let dir = tempfile::tempdir().unwrap();
        let auth = Authenticator::new(store_with_secrets(dir.path()));
        let v = json!({
            "access_token": "at",
            "refresh_token": "rt",
            "expires_in": 3599,
            "token_type": "Bearer"
        });
        let tokens = auth.parse_token_response(true, &v).unwrap();
        assert_eq!(tokens.access_token, "at");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt"));
        assert_eq!(tokens.expires_in, Some(3599));
    }

    #[test]
    fn parse_token_response_invalid_grant_is_token_expired() {
        let dir = tempfile::tempdir().unwrap();
        let auth = Authenticator::new(store_with_secrets(dir.path()));
        let v = json!({"error": "invalid_grant", "error_description": "Token has been expired or revoked."});
        let err = auth.parse_token_response(false, &v).unwrap_err();
        assert!(matches!(err, SheetsError::TokenExpired { .. }));

        let v = json!({"error": "invalid_client"});
        let err = auth.parse_token_response(false, &v).unwrap_err();
        assert!(matches!(err, SheetsError::Authentication(_)));
    }

    #[tokio::test]
    async fn missing_token_error_embeds_fresh_auth_url() {
        let dir = tempfile::tempdir().unwrap();
        let auth = Authenticator::new(store_with_secrets(dir.path()));
        let err = auth.access_token().await.unwrap_err();
        match &err {
            SheetsError::MissingToken { auth_url } => {
                assert!(auth_url.contains("client_id=cid"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.user_message().contains("authentication token"));
    }

    #[tokio::test]
    async fn fresh_token_is_returned_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_secrets(dir.path());
        store
            .save_token(&StoredToken {
                access_token: "cached".to_string(),
                refresh_token: None,
                scope: None,
                token_type: None,
                expiry_date: Some(chrono::Utc::now().timestamp_millis() + 3_600_000),
            })
            .unwrap();
        let auth = Authenticator::new(store);
        assert_eq!(auth.access_token().await.unwrap(), "cached");
    }

    #[tokio::test]
    async fn expired_token_without_refresh_token_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_secrets(dir.path());
        store
            .save_token(&StoredToken {
                access_token: "stale".to_string(),
                refresh_token: None,
                scope: None,
                token_type: None,
                expiry_date: Some(0),
            })
            .unwrap();
        let auth = Authenticator::new(store);
        let err = auth.access_token().await.unwrap_err();
        assert!(matches!(err, SheetsError::TokenExpired { .. }));
    }
}
