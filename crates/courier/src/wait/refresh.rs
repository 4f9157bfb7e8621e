//! Per-mailbox refresh coordination
//!
//! Concurrent waits on the same mailbox all see the same expired access
//! token. Routing their refreshes through a [`RefreshGate`] means only the
//! first one calls the token endpoint; the rest pick up its result.

use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;

use super::traits::TokenRefresher;
use crate::error::MailError;
use crate::models::MailboxKey;

/// Latest access token issued for one mailbox
type Slot = Arc<AsyncMutex<Option<String>>>;

/// Single-flight token refresh, keyed by mailbox
#[derive(Default)]
pub struct RefreshGate {
    slots: Mutex<HashMap<MailboxKey, Slot>>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &MailboxKey) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(key.clone()).or_default().clone()
    }

    /// Refresh the token for `key`, or reuse one issued since `expired`
    ///
    /// Callers for the same mailbox are serialized. If the newest token the
    /// gate has seen differs from `expired`, someone already refreshed and
    /// that token is returned without another upstream call.
    pub async fn refresh(
        &self,
        key: &MailboxKey,
        refresher: &dyn TokenRefresher,
        expired: &str,
        refresh_token: &str,
    ) -> Result<String, MailError> {
        let slot = self.slot(key);
        let mut latest = slot.lock().await;

        if let Some(token) = latest.as_deref()
            && token != expired
        {
            debug!("Reusing access token refreshed concurrently for {}", key.mailbox);
            return Ok(token.to_string());
        }

        let fresh = refresher.refresh(expired, refresh_token).await?;
        *latest = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drop the remembered token, e.g. after the mailbox is unlinked
    pub fn forget(&self, key: &MailboxKey) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.remove(key);
    }

    /// Bind the gate to one mailbox so it can stand in for `inner`
    pub fn for_mailbox(
        self: &Arc<Self>,
        key: MailboxKey,
        inner: Arc<dyn TokenRefresher>,
    ) -> MailboxRefresher {
        MailboxRefresher {
            gate: Arc::clone(self),
            key,
            inner,
        }
    }
}

/// A [`TokenRefresher`] that refreshes through a [`RefreshGate`]
pub struct MailboxRefresher {
    gate: Arc<RefreshGate>,
    key: MailboxKey,
    inner: Arc<dyn TokenRefresher>,
}

#[async_trait]
impl TokenRefresher for MailboxRefresher {
    async fn refresh(&self, expired: &str, refresh_token: &str) -> Result<String, MailError> {
        self.gate
            .refresh(&self.key, self.inner.as_ref(), expired, refresh_token)
            .await
    }
}
