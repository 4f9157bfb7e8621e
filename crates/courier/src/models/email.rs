//! Normalized email content and search criteria

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unique identifier for a message (Gmail message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A fetched message, normalized from Gmail's nested payload structure
///
/// Built fresh on every fetch and never cached. Serializes with the camelCase
/// field names HTTP clients expect (`threadId`, `receivedAt`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailContent {
    pub id: MessageId,
    pub thread_id: String,
    /// Raw `From` header, `""` when absent
    pub from: String,
    /// Raw `To` header, `""` when absent
    pub to: String,
    /// `Subject` header, `""` when absent
    pub subject: String,
    /// Gmail's short preview of the body
    pub snippet: String,
    /// Decoded `text/plain` body, `""` when the message has none
    pub body: String,
    #[serde(with = "iso_millis")]
    pub received_at: DateTime<Utc>,
}

impl EmailContent {
    /// `received_at` as an ISO-8601 instant with millisecond precision
    pub fn received_at_iso(&self) -> String {
        iso_millis::format(&self.received_at)
    }
}

/// Result of a bounded wait for a matching message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Found(EmailContent),
    NotFound,
}

impl PollOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, PollOutcome::Found(_))
    }

    pub fn into_email(self) -> Option<EmailContent> {
        match self {
            PollOutcome::Found(email) => Some(email),
            PollOutcome::NotFound => None,
        }
    }
}

/// Criteria used to match candidate messages
///
/// `sender` is optional: without it every message matches. `recent_window`
/// bounds existence checks to messages received within that long before the
/// moment of the check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    sender: Option<String>,
    recent_window: Duration,
}

impl SearchFilter {
    /// Lookback used by existence checks unless overridden
    pub const DEFAULT_RECENT_WINDOW: Duration = Duration::from_secs(60);

    /// Build a filter; a blank sender means "any sender"
    pub fn new(sender: Option<&str>) -> Self {
        Self {
            sender: sender
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            recent_window: Self::DEFAULT_RECENT_WINDOW,
        }
    }

    pub fn any_sender() -> Self {
        Self::new(None)
    }

    pub fn from_sender(sender: &str) -> Self {
        Self::new(Some(sender))
    }

    pub fn with_recent_window(mut self, window: Duration) -> Self {
        self.recent_window = window;
        self
    }

    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    pub fn recent_window(&self) -> Duration {
        self.recent_window
    }
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self::any_sender()
    }
}

/// Serde adapter rendering timestamps like `2023-11-14T22:13:20.000Z`
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(at: &DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EmailContent {
        EmailContent {
            id: MessageId::new("18b"),
            thread_id: "18a".to_string(),
            from: "alerts@y.com".to_string(),
            to: "a@x.com".to_string(),
            subject: "Code".to_string(),
            snippet: "Your code is 1234".to_string(),
            body: "Your code is 1234\n".to_string(),
            received_at: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
        }
    }

    #[test]
    fn test_email_content_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["id"], "18b");
        assert_eq!(json["threadId"], "18a");
        assert_eq!(json["receivedAt"], "2023-11-14T22:13:20.000Z");
        assert!(json.get("thread_id").is_none());
    }

    #[test]
    fn test_email_content_json_reads_back() {
        let json = serde_json::to_string(&sample()).unwrap();
        let parsed: EmailContent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn test_blank_sender_matches_anything() {
        assert_eq!(SearchFilter::new(Some("   ")).sender(), None);
        assert_eq!(SearchFilter::new(None), SearchFilter::any_sender());
        assert_eq!(
            SearchFilter::from_sender(" alerts@y.com ").sender(),
            Some("alerts@y.com")
        );
    }

    #[test]
    fn test_default_recent_window_is_one_minute() {
        assert_eq!(
            SearchFilter::any_sender().recent_window(),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_poll_outcome_into_email() {
        assert_eq!(PollOutcome::NotFound.into_email(), None);
        assert!(PollOutcome::Found(sample()).is_found());
    }
}
