//! Delivery of password-reset links

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use serde_json::json;
use std::time::Duration;

#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn send_reset_link(&self, email: &str, link: &str) -> Result<()>;
}

/// Sends reset mail through the Resend HTTP API
pub struct ResendNotifier {
    api_key: String,
    from: String,
    agent: ureq::Agent,
}

impl ResendNotifier {
    const API_URL: &'static str = "https://api.resend.com/emails";

    pub fn new(api_key: String, from: String) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(30)))
            .build()
            .into();
        Self {
            api_key,
            from,
            agent,
        }
    }
}

fn reset_email_html(link: &str) -> String {
    format!(
        "<h1>Reset Your Password</h1>\
         <p>You have requested to reset your password. Click the link below to get a new one:</p>\
         <p><a href=\"{}\">Reset Password</a></p>\
         <p>If you didn't request this, please ignore this email.</p>",
        link
    )
}

#[async_trait]
impl ResetNotifier for ResendNotifier {
    async fn send_reset_link(&self, email: &str, link: &str) -> Result<()> {
        let agent = self.agent.clone();
        let bearer = format!("Bearer {}", self.api_key);
        let body = json!({
            "from": self.from,
            "to": email,
            "subject": "Reset Your Password",
            "html": reset_email_html(link),
        });

        tokio::task::spawn_blocking(move || {
            agent
                .post(Self::API_URL)
                .header("Authorization", &bearer)
                .send_json(&body)
                .context("Failed to send reset email")?;
            Ok::<_, anyhow::Error>(())
        })
        .await
        .context("Reset email task failed")?
    }
}

/// Writes the link to the log instead of sending mail
pub struct LogNotifier;

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn send_reset_link(&self, email: &str, link: &str) -> Result<()> {
        info!("Password reset requested for {}: {}", email, link);
        Ok(())
    }
}
