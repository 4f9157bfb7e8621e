//! Error taxonomy for the wait/read protocol
//!
//! Storage, config and Sheets plumbing use `anyhow`. The mail protocol needs
//! callers to branch on *what* failed, so it has its own enum.

/// Failure of a mail query, fetch, wait or token refresh
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailError {
    /// The access token was rejected (HTTP 401); a refresh may recover
    #[error("Token expired")]
    AuthExpired,

    /// No message matched the search filter
    #[error("No emails found")]
    NoMatchingEmail,

    /// The refresh token itself was rejected, or the refresh call failed
    #[error("Failed to refresh token: {0}")]
    RefreshFailed(String),

    /// Any other mail API failure (network, 5xx, malformed response)
    #[error("Mail API request failed: {0}")]
    Transient(String),

    /// The operation was aborted by its caller
    #[error("Operation cancelled")]
    Cancelled,
}

impl MailError {
    /// Whether refreshing the access token could make a retry succeed
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, MailError::AuthExpired)
    }
}

/// A failed wait or read, with the access token it refreshed on the way
///
/// A refresh that succeeded before the failure still produced a valid token;
/// callers store `refreshed_token` before reporting `error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{error}")]
pub struct MailFailure {
    pub error: MailError,
    pub refreshed_token: Option<String>,
}

impl MailFailure {
    pub fn new(error: MailError, refreshed_token: Option<String>) -> Self {
        Self {
            error,
            refreshed_token,
        }
    }
}

impl From<MailError> for MailFailure {
    fn from(error: MailError) -> Self {
        Self::new(error, None)
    }
}
