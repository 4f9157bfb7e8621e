//! Waiting for and reading mail with token-refresh recovery
//!
//! - [`wait_for_email`] polls until a matching message arrives or a timeout
//!   elapses, refreshing the access token whenever Gmail rejects it.
//! - [`read_last_email`] fetches the newest matching message once;
//!   [`read_last_email_with_refresh`] adds a single refresh-and-retry.
//! - [`RefreshGate`] collapses concurrent refreshes of one mailbox.
//!
//! Neither operation touches storage. A refreshed access token is returned in
//! the report, or in the [`MailFailure`](crate::error::MailFailure) when a
//! later step failed, so the caller can persist it.

mod fetcher;
mod poller;
mod refresh;
mod traits;

pub use fetcher::{FetchReport, read_last_email, read_last_email_with_refresh};
pub use poller::{POLL_INTERVAL, WaitReport, wait_for_email};
pub use refresh::{MailboxRefresher, RefreshGate};
pub use traits::{MailQuery, TokenRefresher};
