//! Shared application state

use std::sync::Arc;

use courier::{
    AccountStore, CredentialStore, LinkedMailbox, MailQuery, MailboxKey, MailboxRefresher,
    OAuthProvider, RefreshGate, SheetsApi, TokenRefresher,
};
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;
use crate::notify::ResetNotifier;
use crate::settings::ServerSettings;

/// Services every handler can reach
pub struct AppState {
    pub accounts: Arc<dyn AccountStore>,
    pub mailboxes: Arc<dyn CredentialStore>,
    pub mail: Arc<dyn MailQuery>,
    pub oauth: Arc<dyn OAuthProvider>,
    /// Upstream token refresh; handlers go through `refresh_gate` instead
    pub refresher: Arc<dyn TokenRefresher>,
    pub refresh_gate: Arc<RefreshGate>,
    pub sheets: Arc<dyn SheetsApi>,
    pub notifier: Arc<dyn ResetNotifier>,
    pub settings: ServerSettings,
    /// Cancelled on shutdown; long waits run on child tokens
    pub shutdown: CancellationToken,
}

impl AppState {
    /// The caller's link to `gmail`, or 404
    pub fn linked_mailbox(&self, account_id: i64, gmail: &str) -> Result<LinkedMailbox, ApiError> {
        self.mailboxes
            .get_mailbox(&MailboxKey::new(account_id, gmail))?
            .ok_or_else(|| ApiError::NotFound("Gmail not found or unauthorized".to_string()))
    }

    /// Refresher for one mailbox that shares refreshes with concurrent requests
    pub fn mailbox_refresher(&self, key: MailboxKey) -> MailboxRefresher {
        self.refresh_gate.for_mailbox(key, Arc::clone(&self.refresher))
    }
}
