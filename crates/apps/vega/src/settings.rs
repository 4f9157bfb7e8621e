//! Server settings
//!
//! Read from `vega.json` in the config directory when present, then
//! overridden by environment variables. Every field has a default, so a bare
//! install starts without any file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

const SETTINGS_FILE: &str = "vega.json";
const DATABASE_FILE: &str = "vega.db";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address the HTTP server listens on
    pub bind_addr: String,
    /// SQLite database; defaults to `vega.db` in the config directory
    pub database_path: Option<PathBuf>,
    /// Google Cloud Console credentials file, overriding the usual lookup
    pub google_credentials_path: Option<PathBuf>,
    pub session_ttl_hours: i64,
    pub reset_ttl_minutes: i64,
    /// Used by wait-for-email when the request gives no timeout
    pub default_wait_timeout_secs: i64,
    /// Resend API key; reset links are only logged without one
    pub resend_api_key: Option<String>,
    /// Sender of password-reset mail
    pub reset_sender: String,
    /// Base URL of the web client, used to build reset links
    pub public_url: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8787".to_string(),
            database_path: None,
            google_credentials_path: None,
            session_ttl_hours: 24,
            reset_ttl_minutes: 60,
            default_wait_timeout_secs: 60,
            resend_api_key: None,
            reset_sender: "Vega <no-reply@vega.local>".to_string(),
            public_url: "http://localhost:8787".to_string(),
        }
    }
}

impl ServerSettings {
    /// Load `vega.json` (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut settings: Self = config::load_json_or_default(SETTINGS_FILE)?;
        settings.apply_overrides(config::env_var);
        Ok(settings)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("VEGA_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(path) = lookup("VEGA_DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("VEGA_GOOGLE_CREDENTIALS") {
            self.google_credentials_path = Some(PathBuf::from(path));
        }
        if let Some(key) = lookup("RESEND_API_KEY") {
            self.resend_api_key = Some(key);
        }
        if let Some(url) = lookup("VEGA_PUBLIC_URL") {
            self.public_url = url;
        }
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => config::config_path(DATABASE_FILE)
                .context("Could not determine config directory for the database"),
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }

    pub fn reset_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.reset_ttl_minutes)
    }

    /// Link the reset email points at
    pub fn reset_link(&self, token: &str) -> String {
        format!(
            "{}/reset-password?token={}",
            self.public_url.trim_end_matches('/'),
            token
        )
    }
}
