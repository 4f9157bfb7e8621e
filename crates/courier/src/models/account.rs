//! Local user accounts, login sessions and password-reset tokens

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A registered local account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// Unique integer identifier (database primary key)
    pub id: i64,
    /// Login email (unique)
    pub email: String,
    /// Salted password hash, see [`crate::accounts::hash_password`]
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// When the account was registered
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account (id will be assigned by the store)
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id: 0,
            email: email.into(),
            password_hash: password_hash.into(),
            created_at: Utc::now(),
        }
    }

    /// Set the id assigned by the store
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }
}

/// A bearer token issued at login
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub account_id: i64,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A one-shot password reset token
#[derive(Debug, Clone, PartialEq)]
pub struct PasswordReset {
    pub token: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

impl PasswordReset {
    pub fn new(token: impl Into<String>, email: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            email: email.into(),
            expires_at,
            used: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
