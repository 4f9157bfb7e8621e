//! Storage trait definitions

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{Account, LinkedMailbox, MailboxKey, PasswordReset, Session};

/// Local accounts, their login sessions and password-reset tokens
pub trait AccountStore: Send + Sync {
    /// Insert a new account and return it with its assigned id
    ///
    /// Returns `None` if the email is already registered.
    fn create_account(&self, account: Account) -> Result<Option<Account>>;

    fn find_account_by_email(&self, email: &str) -> Result<Option<Account>>;

    fn get_account(&self, id: i64) -> Result<Option<Account>>;

    /// Replace the password hash; `false` if no account has that email
    fn update_password(&self, email: &str, password_hash: &str) -> Result<bool>;

    fn create_session(&self, session: Session) -> Result<()>;

    /// Look up a session by token, expired or not
    fn find_session(&self, token: &str) -> Result<Option<Session>>;

    /// Remove sessions that expired at or before `now`, returning how many
    fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize>;

    fn create_password_reset(&self, reset: PasswordReset) -> Result<()>;

    fn find_password_reset(&self, token: &str) -> Result<Option<PasswordReset>>;

    /// Flag a reset token as consumed; `false` if the token is unknown
    fn mark_password_reset_used(&self, token: &str) -> Result<bool>;
}

/// OAuth credentials of linked Gmail mailboxes
///
/// Keyed by (account id, mailbox address); at most one record per key.
pub trait CredentialStore: Send + Sync {
    /// Insert the mailbox, or replace tokens and scopes of an existing link
    fn upsert_mailbox(&self, mailbox: LinkedMailbox) -> Result<()>;

    fn get_mailbox(&self, key: &MailboxKey) -> Result<Option<LinkedMailbox>>;

    /// Mailboxes linked by one account, ordered by address
    fn list_mailboxes(&self, account_id: i64) -> Result<Vec<LinkedMailbox>>;

    /// Store a refreshed access token; `false` if the mailbox is not linked
    fn update_access_token(&self, key: &MailboxKey, access_token: &str) -> Result<bool>;

    /// Unlink a mailbox; `false` if it was not linked
    fn delete_mailbox(&self, key: &MailboxKey) -> Result<bool>;
}
