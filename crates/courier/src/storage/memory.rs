//! In-memory storage implementation, used by tests

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{AccountStore, CredentialStore};
use crate::models::{Account, LinkedMailbox, MailboxKey, PasswordReset, Session};

#[derive(Default)]
struct Tables {
    accounts: Vec<Account>,
    sessions: HashMap<String, Session>,
    resets: HashMap<String, PasswordReset>,
    mailboxes: HashMap<MailboxKey, LinkedMailbox>,
}

/// In-memory implementation of [`AccountStore`] and [`CredentialStore`]
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AccountStore for InMemoryStore {
    fn create_account(&self, account: Account) -> Result<Option<Account>> {
        let mut tables = self.write();
        if tables.accounts.iter().any(|a| a.email == account.email) {
            return Ok(None);
        }

        let id = tables.accounts.len() as i64 + 1;
        let account = account.with_id(id);
        tables.accounts.push(account.clone());
        Ok(Some(account))
    }

    fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        Ok(self.read().accounts.iter().find(|a| a.email == email).cloned())
    }

    fn get_account(&self, id: i64) -> Result<Option<Account>> {
        Ok(self.read().accounts.iter().find(|a| a.id == id).cloned())
    }

    fn update_password(&self, email: &str, password_hash: &str) -> Result<bool> {
        let mut tables = self.write();
        match tables.accounts.iter_mut().find(|a| a.email == email) {
            Some(account) => {
                account.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn create_session(&self, session: Session) -> Result<()> {
        self.write().sessions.insert(session.token.clone(), session);
        Ok(())
    }

    fn find_session(&self, token: &str) -> Result<Option<Session>> {
        Ok(self.read().sessions.get(token).cloned())
    }

    fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut tables = self.write();
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| !s.is_expired(now));
        Ok(before - tables.sessions.len())
    }

    fn create_password_reset(&self, reset: PasswordReset) -> Result<()> {
        self.write().resets.insert(reset.token.clone(), reset);
        Ok(())
    }

    fn find_password_reset(&self, token: &str) -> Result<Option<PasswordReset>> {
        Ok(self.read().resets.get(token).cloned())
    }

    fn mark_password_reset_used(&self, token: &str) -> Result<bool> {
        match self.write().resets.get_mut(token) {
            Some(reset) => {
                reset.used = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl CredentialStore for InMemoryStore {
    fn upsert_mailbox(&self, mailbox: LinkedMailbox) -> Result<()> {
        let mut tables = self.write();
        match tables.mailboxes.get_mut(&mailbox.key()) {
            Some(existing) => {
                existing.tokens = mailbox.tokens;
                existing.scopes = mailbox.scopes;
            }
            None => {
                tables.mailboxes.insert(mailbox.key(), mailbox);
            }
        }
        Ok(())
    }

    fn get_mailbox(&self, key: &MailboxKey) -> Result<Option<LinkedMailbox>> {
        Ok(self.read().mailboxes.get(key).cloned())
    }

    fn list_mailboxes(&self, account_id: i64) -> Result<Vec<LinkedMailbox>> {
        let mut mailboxes: Vec<_> = self
            .read()
            .mailboxes
            .values()
            .filter(|m| m.account_id == account_id)
            .cloned()
            .collect();
        mailboxes.sort_by(|a, b| a.mailbox.cmp(&b.mailbox));
        Ok(mailboxes)
    }

    fn update_access_token(&self, key: &MailboxKey, access_token: &str) -> Result<bool> {
        match self.write().mailboxes.get_mut(key) {
            Some(mailbox) => {
                mailbox.tokens.access_token = access_token.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_mailbox(&self, key: &MailboxKey) -> Result<bool> {
        Ok(self.write().mailboxes.remove(key).is_some())
    }
}
