//! Google OAuth client configuration
//!
//! Supports loading OAuth client credentials from (in order of priority):
//! 1. Compile-time embedded credentials (for production builds)
//! 2. JSON file in the Vega config directory (Google Cloud Console format)
//! 3. Runtime environment variables (fallback)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Credentials filename in the Vega config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";

/// Redirect URI used when none is configured
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8787/oauth/callback";

/// OAuth client credentials for the Google APIs
#[derive(Clone)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
    /// Redirect URI registered for the web client; must match the one the
    /// browser used when the authorization code was issued
    pub redirect_uri: String,
}

impl std::fmt::Debug for GoogleCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Google Cloud Console credential file format
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
}

#[derive(Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl GoogleCredentials {
    /// Load credentials using the following priority:
    /// 1. Compile-time embedded credentials
    /// 2. JSON file (~/.config/vega/google-credentials.json)
    /// 3. Runtime environment variables
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }

        if config::config_exists(CREDENTIALS_FILE) {
            let creds: GoogleCredentialFile = config::load_json(CREDENTIALS_FILE)?;
            return Self::from_credential_file(creds);
        }

        Self::from_env()
    }

    /// Load credentials embedded at compile time.
    /// Build with: GOOGLE_CLIENT_ID=xxx GOOGLE_CLIENT_SECRET=yyy cargo build --release
    pub fn from_compile_time() -> Option<Self> {
        let client_id = option_env!("GOOGLE_CLIENT_ID")?;
        let client_secret = option_env!("GOOGLE_CLIENT_SECRET")?;

        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }

        Some(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: option_env!("GOOGLE_REDIRECT_URI")
                .filter(|uri| !uri.is_empty())
                .unwrap_or(DEFAULT_REDIRECT_URI)
                .to_string(),
        })
    }

    /// Load credentials from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let creds: GoogleCredentialFile = config::load_json_file(path)?;
        Self::from_credential_file(creds)
    }

    /// Parse credentials from JSON string (Google Cloud Console format)
    pub fn from_json(json: &str) -> Result<Self> {
        let creds: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        Self::from_credential_file(creds)
    }

    fn from_credential_file(creds: GoogleCredentialFile) -> Result<Self> {
        // A server normally has a "web" client, but "installed" works the same way
        let section = creds
            .web
            .or(creds.installed)
            .context("Credentials file missing 'web' or 'installed' section")?;

        let redirect_uri = config::env_var("GOOGLE_REDIRECT_URI")
            .or_else(|| section.redirect_uris.into_iter().next())
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

        Ok(Self {
            client_id: section.client_id,
            client_secret: section.client_secret,
            redirect_uri,
        })
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let client_id = config::env_var("GOOGLE_CLIENT_ID")
            .context("GOOGLE_CLIENT_ID environment variable not set")?;
        let client_secret = config::env_var("GOOGLE_CLIENT_SECRET")
            .context("GOOGLE_CLIENT_SECRET environment variable not set")?;
        let redirect_uri = config::env_var("GOOGLE_REDIRECT_URI")
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
        })
    }

    /// Get the default credentials file path (~/.config/vega/google-credentials.json)
    pub fn default_credentials_path() -> Option<PathBuf> {
        config::config_path(CREDENTIALS_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_web_credentials_with_redirect() {
        let json = r#"{
            "web": {
                "client_id": "web-client-id.apps.googleusercontent.com",
                "client_secret": "web-secret",
                "redirect_uris": ["https://vega.example.com/oauth/callback"]
            }
        }"#;

        let creds = GoogleCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "web-client-id.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "web-secret");
        if config::env_var("GOOGLE_REDIRECT_URI").is_none() {
            assert_eq!(creds.redirect_uri, "https://vega.example.com/oauth/callback");
        }
    }

    #[test]
    fn test_parse_installed_credentials_defaults_redirect() {
        let json = r#"{
            "installed": {
                "client_id": "desktop-client-id",
                "client_secret": "desktop-secret"
            }
        }"#;

        let creds = GoogleCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "desktop-client-id");
        if config::env_var("GOOGLE_REDIRECT_URI").is_none() {
            assert_eq!(creds.redirect_uri, DEFAULT_REDIRECT_URI);
        }
    }

    #[test]
    fn test_missing_section_is_rejected() {
        assert!(GoogleCredentials::from_json(r#"{ "other": {} }"#).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = GoogleCredentials {
            client_id: "id".to_string(),
            client_secret: "super-secret".to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
        };
        assert!(!format!("{:?}", creds).contains("super-secret"));
    }
}
