//! Seams between the wait/read core and the Google APIs

use async_trait::async_trait;

use crate::error::MailError;
use crate::gmail::api::GmailMessage;
use crate::models::{MessageId, SearchFilter};

/// Read-only mail queries made with a caller-supplied access token
///
/// Implementations report a rejected token as [`MailError::AuthExpired`] and
/// every other failure as [`MailError::Transient`].
#[async_trait]
pub trait MailQuery: Send + Sync {
    /// Whether any message matching `filter` arrived within the filter's
    /// recent window, measured back from the moment of the call
    async fn exists_recent(&self, access_token: &str, filter: &SearchFilter)
    -> Result<bool, MailError>;

    /// Ids of the newest messages matching `filter`, newest first
    async fn list_newest(
        &self,
        access_token: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<MessageId>, MailError>;

    /// Full message record
    async fn fetch_message(&self, access_token: &str, id: &MessageId)
    -> Result<GmailMessage, MailError>;
}

/// Exchanges a refresh token for a new access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// `expired` is the access token the caller saw rejected. Plain
    /// refreshers ignore it; [`super::MailboxRefresher`] uses it to tell
    /// whether a concurrent refresh already replaced it.
    ///
    /// Fails with [`MailError::RefreshFailed`].
    async fn refresh(&self, expired: &str, refresh_token: &str) -> Result<String, MailError>;
}
