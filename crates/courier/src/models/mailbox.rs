//! Gmail mailboxes linked to local accounts

use chrono::{DateTime, Utc};

/// Identifies one linked mailbox: (owning account, mailbox address)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MailboxKey {
    pub account_id: i64,
    pub mailbox: String,
}

impl MailboxKey {
    pub fn new(account_id: i64, mailbox: impl Into<String>) -> Self {
        Self {
            account_id,
            mailbox: mailbox.into(),
        }
    }
}

/// The access/refresh token pair a poll or fetch starts from
#[derive(Clone, PartialEq, Eq)]
pub struct MailboxTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl MailboxTokens {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// Tokens end up in log lines via `{:?}` far too easily
impl std::fmt::Debug for MailboxTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// A Gmail account linked to a local account via OAuth
///
/// At most one exists per (account_id, mailbox). The access token is replaced
/// in place whenever a refresh succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedMailbox {
    pub account_id: i64,
    /// Gmail address as reported by Google's userinfo endpoint
    pub mailbox: String,
    pub tokens: MailboxTokens,
    /// Space-separated OAuth scopes granted at link time
    pub scopes: String,
    pub linked_at: DateTime<Utc>,
}

impl LinkedMailbox {
    pub fn new(
        account_id: i64,
        mailbox: impl Into<String>,
        tokens: MailboxTokens,
        scopes: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            mailbox: mailbox.into(),
            tokens,
            scopes: scopes.into(),
            linked_at: Utc::now(),
        }
    }

    pub fn key(&self) -> MailboxKey {
        MailboxKey::new(self.account_id, self.mailbox.clone())
    }
}
