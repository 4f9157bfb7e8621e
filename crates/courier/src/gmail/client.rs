//! Gmail API HTTP client
//!
//! Searches and fetches messages with a caller-supplied access token.
//! Requests use synchronous HTTP (ureq) and are moved onto tokio's blocking
//! pool so a long poll never parks a runtime worker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::api::{GmailMessage, ListMessagesResponse};
use crate::error::MailError;
use crate::models::{MessageId, SearchFilter};
use crate::wait::MailQuery;

/// Gmail API client
#[derive(Clone)]
pub struct GmailClient {
    agent: ureq::Agent,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Per-request timeout, covering connect through body read
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a new Gmail client
    pub fn new() -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Self::REQUEST_TIMEOUT))
            .build()
            .into();
        Self { agent }
    }

    /// List message references matching a Gmail search query, newest first
    async fn list_messages(
        &self,
        access_token: &str,
        query: &str,
        max_results: usize,
    ) -> Result<ListMessagesResponse, MailError> {
        let url = format!(
            "{}/users/me/messages?maxResults={}&q={}",
            Self::BASE_URL,
            max_results.clamp(1, 500),
            urlencoding::encode(query)
        );
        self.get_json(url, access_token, "Failed to list emails").await
    }

    /// GET a URL with bearer auth and decode the JSON response
    async fn get_json<T>(
        &self,
        url: String,
        access_token: &str,
        action: &'static str,
    ) -> Result<T, MailError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let agent = self.agent.clone();
        let bearer = format!("Bearer {}", access_token);

        tokio::task::spawn_blocking(move || {
            let mut response = agent
                .get(&url)
                .header("Authorization", &bearer)
                .call()
                .map_err(|e| classify_error(e, action))?;

            response
                .body_mut()
                .read_json::<T>()
                .map_err(|e| MailError::Transient(format!("{}: invalid response: {}", action, e)))
        })
        .await
        .map_err(|e| MailError::Transient(format!("{}: request task failed: {}", action, e)))?
    }
}

impl Default for GmailClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MailQuery for GmailClient {
    async fn exists_recent(
        &self,
        access_token: &str,
        filter: &SearchFilter,
    ) -> Result<bool, MailError> {
        let query = recent_search_query(filter, Utc::now());
        let list = self.list_messages(access_token, &query, 1).await?;
        Ok(list.messages.is_some_and(|m| !m.is_empty()))
    }

    async fn list_newest(
        &self,
        access_token: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<MessageId>, MailError> {
        let list = self
            .list_messages(access_token, &search_query(filter), limit)
            .await?;

        Ok(list
            .messages
            .unwrap_or_default()
            .into_iter()
            .take(limit)
            .map(|m| MessageId::new(m.id))
            .collect())
    }

    async fn fetch_message(
        &self,
        access_token: &str,
        id: &MessageId,
    ) -> Result<GmailMessage, MailError> {
        let url = format!(
            "{}/users/me/messages/{}?format=full",
            Self::BASE_URL,
            urlencoding::encode(id.as_str())
        );
        self.get_json(url, access_token, "Failed to get email details")
            .await
    }
}

/// Map a ureq failure onto the mail error taxonomy
///
/// Only 401 means the access token is no longer accepted; everything else,
/// including 403 (insufficient scope) and 429, is reported as transient.
fn classify_error(err: ureq::Error, action: &str) -> MailError {
    match err {
        ureq::Error::StatusCode(401) => MailError::AuthExpired,
        other => MailError::Transient(format!("{}: {}", action, other)),
    }
}

/// Gmail search query for a filter: `from:<sender>`, or empty for any sender
pub fn search_query(filter: &SearchFilter) -> String {
    filter
        .sender()
        .map(|sender| format!("from:{}", sender))
        .unwrap_or_default()
}

/// Gmail search query restricted to the filter's recent window before `now`
///
/// Gmail's `after:` operator takes whole epoch seconds.
pub fn recent_search_query(filter: &SearchFilter, now: DateTime<Utc>) -> String {
    let window_ms = i64::try_from(filter.recent_window().as_millis()).unwrap_or(i64::MAX);
    let after = now.timestamp_millis().saturating_sub(window_ms).div_euclid(1000);

    match filter.sender() {
        Some(sender) => format!("from:{} after:{}", sender, after),
        None => format!("after:{}", after),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    #[test]
    fn test_search_query_with_sender() {
        assert_eq!(
            search_query(&SearchFilter::from_sender("alerts@y.com")),
            "from:alerts@y.com"
        );
    }

    #[test]
    fn test_search_query_without_sender_is_empty() {
        assert_eq!(search_query(&SearchFilter::any_sender()), "");
    }

    #[test]
    fn test_recent_query_looks_back_one_minute() {
        let now = at(1_700_000_060_500);
        assert_eq!(
            recent_search_query(&SearchFilter::from_sender("alerts@y.com"), now),
            "from:alerts@y.com after:1700000000"
        );
        assert_eq!(
            recent_search_query(&SearchFilter::any_sender(), now),
            "after:1700000000"
        );
    }

    #[test]
    fn test_recent_query_honours_custom_window() {
        let filter = SearchFilter::any_sender().with_recent_window(Duration::from_secs(300));
        assert_eq!(
            recent_search_query(&filter, at(1_700_000_300_000)),
            "after:1700000000"
        );
    }

    #[test]
    fn test_classify_unauthorized_as_auth_expired() {
        assert_eq!(
            classify_error(ureq::Error::StatusCode(401), "Failed to list emails"),
            MailError::AuthExpired
        );
    }

    #[test]
    fn test_classify_other_status_as_transient() {
        let err = classify_error(ureq::Error::StatusCode(503), "Failed to list emails");
        assert!(matches!(err, MailError::Transient(msg) if msg.starts_with("Failed to list emails")));
    }
}
