//! Courier - Gmail wait/read core and Google API plumbing for Vega
//!
//! This crate provides:
//! - Domain models (accounts, linked mailboxes, normalized email content)
//! - Gmail API client, Google OAuth token exchange/refresh, message parsing
//! - Sheets/Drive client
//! - Storage traits with SQLite and in-memory backends
//! - The email-wait poller and last-email fetcher with token-refresh recovery
//!
//! Nothing here knows about HTTP routing; the `vega` server wires it up.

pub mod accounts;
pub mod config;
pub mod error;
pub mod gmail;
pub mod models;
pub mod sheets;
pub mod storage;
pub mod wait;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::GoogleCredentials;
pub use error::{MailError, MailFailure};
pub use gmail::{GmailClient, GoogleOAuth, OAuthProvider, TokenGrant, parse_email};
pub use models::{
    Account, EmailContent, LinkedMailbox, MailboxKey, MailboxTokens, MessageId, PasswordReset,
    PollOutcome, SearchFilter, Session,
};
pub use sheets::{SheetsApi, SheetsClient};
pub use storage::{AccountStore, CredentialStore, InMemoryStore, SqliteStore};
pub use wait::{
    FetchReport, MailQuery, MailboxRefresher, POLL_INTERVAL, RefreshGate, TokenRefresher,
    WaitReport, read_last_email, read_last_email_with_refresh, wait_for_email,
};
