//! Google OAuth2 token endpoints
//!
//! The browser runs the consent screen and hands the server an authorization
//! code. This module exchanges that code for tokens, looks up which Gmail
//! address the tokens belong to, and refreshes expired access tokens.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use std::time::Duration;

use crate::config::GoogleCredentials;
use crate::error::MailError;
use crate::wait::TokenRefresher;

/// Tokens granted by an authorization-code exchange
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    /// Space-separated scopes the user actually granted
    pub scope: String,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Linking operations the server needs from Google's OAuth endpoints
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Public OAuth client id, handed to the browser to start consent
    fn client_id(&self) -> &str;

    /// Exchange an authorization code for access and refresh tokens
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant>;

    /// Look up the Gmail address the access token belongs to
    async fn user_email(&self, access_token: &str) -> Result<String>;
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    scope: Option<String>,
    #[allow(dead_code)]
    expires_in: Option<u64>,
}

/// Userinfo endpoint response
#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
}

/// Google OAuth2 client for a web application
#[derive(Clone)]
pub struct GoogleOAuth {
    credentials: GoogleCredentials,
    agent: ureq::Agent,
}

impl GoogleOAuth {
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";
    const USERINFO_URL: &'static str = "https://www.googleapis.com/oauth2/v3/userinfo";

    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(credentials: GoogleCredentials) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Self::REQUEST_TIMEOUT))
            .build()
            .into();
        Self { credentials, agent }
    }

    fn exchange_code_blocking(&self, code: &str) -> Result<TokenGrant> {
        let mut response = self
            .agent
            .post(Self::TOKEN_URL)
            .send_form([
                ("code", code),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .context("Failed to exchange authorization code")?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;

        // Google only returns a refresh token on first consent (or prompt=consent)
        let Some(refresh_token) = token.refresh_token else {
            bail!("Google did not return a refresh token; remove the app's access and link again");
        };

        Ok(TokenGrant {
            access_token: token.access_token,
            refresh_token,
            scope: token.scope.unwrap_or_default(),
        })
    }

    fn user_email_blocking(&self, access_token: &str) -> Result<String> {
        let mut response = self
            .agent
            .get(Self::USERINFO_URL)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to fetch Google user info")?;

        let info: UserInfo = response
            .body_mut()
            .read_json()
            .context("Failed to parse Google user info")?;

        info.email
            .filter(|email| !email.is_empty())
            .context("Google user info has no email; is the email scope granted?")
    }

    fn refresh_blocking(&self, refresh_token: &str) -> Result<String, MailError> {
        let mut response = self
            .agent
            .post(Self::TOKEN_URL)
            .send_form([
                ("refresh_token", refresh_token),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .map_err(|e| MailError::RefreshFailed(e.to_string()))?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| MailError::RefreshFailed(format!("invalid token response: {}", e)))?;

        Ok(token.access_token)
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuth {
    fn client_id(&self) -> &str {
        &self.credentials.client_id
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        let this = self.clone();
        let code = code.to_string();
        tokio::task::spawn_blocking(move || this.exchange_code_blocking(&code))
            .await
            .context("Token exchange task failed")?
    }

    async fn user_email(&self, access_token: &str) -> Result<String> {
        let this = self.clone();
        let access_token = access_token.to_string();
        tokio::task::spawn_blocking(move || this.user_email_blocking(&access_token))
            .await
            .context("User info task failed")?
    }
}

#[async_trait]
impl TokenRefresher for GoogleOAuth {
    async fn refresh(&self, _expired: &str, refresh_token: &str) -> Result<String, MailError> {
        debug!("Refreshing Google access token");
        let this = self.clone();
        let refresh_token = refresh_token.to_string();
        let result = tokio::task::spawn_blocking(move || this.refresh_blocking(&refresh_token))
            .await
            .map_err(|e| MailError::RefreshFailed(format!("refresh task failed: {}", e)))?;

        if let Err(e) = &result {
            warn!("Google token refresh failed: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_without_refresh_token_parses() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"access_token":"ya29.new","expires_in":3599,"scope":"openid","token_type":"Bearer"}"#,
        )
        .unwrap();
        assert_eq!(token.access_token, "ya29.new");
        assert!(token.refresh_token.is_none());
    }

    #[test]
    fn test_token_grant_debug_hides_tokens() {
        let grant = TokenGrant {
            access_token: "ya29.secret".to_string(),
            refresh_token: "1//secret".to_string(),
            scope: "https://www.googleapis.com/auth/gmail.readonly".to_string(),
        };
        let shown = format!("{:?}", grant);
        assert!(!shown.contains("secret"));
        assert!(shown.contains("gmail.readonly"));
    }

    #[test]
    fn test_client_id_is_exposed() {
        let oauth = GoogleOAuth::new(GoogleCredentials {
            client_id: "client.apps.googleusercontent.com".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: crate::config::DEFAULT_REDIRECT_URI.to_string(),
        });
        assert_eq!(oauth.client_id(), "client.apps.googleusercontent.com");
    }
}
