//! SQLite-backed storage

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rusqlite_migration::{M, Migrations};

use super::{AccountStore, CredentialStore};
use crate::models::{Account, LinkedMailbox, MailboxKey, MailboxTokens, PasswordReset, Session};

/// Database migrations, tracked through the `user_version` pragma
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        r#"
        CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE sessions (
            token TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            expires_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_sessions_expires_at ON sessions(expires_at);

        CREATE TABLE password_resets (
            token TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            used INTEGER NOT NULL DEFAULT 0
        );

        -- One row per (user, Gmail address); access_token is rewritten on refresh
        CREATE TABLE linked_mailboxes (
            user_id INTEGER NOT NULL,
            gmail TEXT NOT NULL,
            access_token TEXT NOT NULL,
            refresh_token TEXT NOT NULL,
            scopes TEXT NOT NULL,
            linked_at TEXT NOT NULL,
            PRIMARY KEY (user_id, gmail)
        );
        "#,
    )])
}

/// SQLite implementation of [`AccountStore`] and [`CredentialStore`]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path` and migrate it
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;
        Self::from_connection(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        // WAL lets readers proceed while a refresh rewrites a token
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fixed-width UTC timestamps, so they also compare correctly as text
fn format_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp in database: {:?}", raw))
}

type AccountRow = (i64, String, String, String);

fn account_row(row: &Row<'_>) -> rusqlite::Result<AccountRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_account((id, email, password_hash, created_at): AccountRow) -> Result<Account> {
    Ok(Account {
        id,
        email,
        password_hash,
        created_at: parse_time(&created_at)?,
    })
}

type MailboxRow = (i64, String, String, String, String, String);

fn mailbox_row(row: &Row<'_>) -> rusqlite::Result<MailboxRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_mailbox(
    (account_id, mailbox, access_token, refresh_token, scopes, linked_at): MailboxRow,
) -> Result<LinkedMailbox> {
    Ok(LinkedMailbox {
        account_id,
        mailbox,
        tokens: MailboxTokens {
            access_token,
            refresh_token,
        },
        scopes,
        linked_at: parse_time(&linked_at)?,
    })
}

const MAILBOX_COLUMNS: &str = "user_id, gmail, access_token, refresh_token, scopes, linked_at";

impl AccountStore for SqliteStore {
    fn create_account(&self, account: Account) -> Result<Option<Account>> {
        let conn = self.conn();
        let inserted = conn.execute(
            "INSERT INTO users (email, password_hash, created_at) VALUES (?, ?, ?)
             ON CONFLICT(email) DO NOTHING",
            params![
                account.email,
                account.password_hash,
                format_time(&account.created_at)
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(account.with_id(conn.last_insert_rowid())))
    }

    fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let row = self
            .conn()
            .query_row(
                "SELECT id, email, password_hash, created_at FROM users WHERE email = ?",
                [email],
                account_row,
            )
            .optional()?;
        row.map(into_account).transpose()
    }

    fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let row = self
            .conn()
            .query_row(
                "SELECT id, email, password_hash, created_at FROM users WHERE id = ?",
                [id],
                account_row,
            )
            .optional()?;
        row.map(into_account).transpose()
    }

    fn update_password(&self, email: &str, password_hash: &str) -> Result<bool> {
        let updated = self.conn().execute(
            "UPDATE users SET password_hash = ? WHERE email = ?",
            params![password_hash, email],
        )?;
        Ok(updated > 0)
    }

    fn create_session(&self, session: Session) -> Result<()> {
        self.conn().execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)",
            params![session.token, session.account_id, format_time(&session.expires_at)],
        )?;
        Ok(())
    }

    fn find_session(&self, token: &str) -> Result<Option<Session>> {
        let row: Option<(String, i64, String)> = self
            .conn()
            .query_row(
                "SELECT token, user_id, expires_at FROM sessions WHERE token = ?",
                [token],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((token, account_id, expires_at)) = row else {
            return Ok(None);
        };
        Ok(Some(Session {
            token,
            account_id,
            expires_at: parse_time(&expires_at)?,
        }))
    }

    fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        let deleted = self.conn().execute(
            "DELETE FROM sessions WHERE expires_at <= ?",
            [format_time(&now)],
        )?;
        Ok(deleted)
    }

    fn create_password_reset(&self, reset: PasswordReset) -> Result<()> {
        self.conn().execute(
            "INSERT INTO password_resets (token, email, expires_at, used) VALUES (?, ?, ?, ?)",
            params![reset.token, reset.email, format_time(&reset.expires_at), reset.used],
        )?;
        Ok(())
    }

    fn find_password_reset(&self, token: &str) -> Result<Option<PasswordReset>> {
        let row: Option<(String, String, String, bool)> = self
            .conn()
            .query_row(
                "SELECT token, email, expires_at, used FROM password_resets WHERE token = ?",
                [token],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((token, email, expires_at, used)) = row else {
            return Ok(None);
        };
        Ok(Some(PasswordReset {
            token,
            email,
            expires_at: parse_time(&expires_at)?,
            used,
        }))
    }

    fn mark_password_reset_used(&self, token: &str) -> Result<bool> {
        let updated = self.conn().execute(
            "UPDATE password_resets SET used = 1 WHERE token = ?",
            [token],
        )?;
        Ok(updated > 0)
    }
}

impl CredentialStore for SqliteStore {
    fn upsert_mailbox(&self, mailbox: LinkedMailbox) -> Result<()> {
        self.conn().execute(
            "INSERT INTO linked_mailboxes
             (user_id, gmail, access_token, refresh_token, scopes, linked_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id, gmail) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                scopes = excluded.scopes",
            params![
                mailbox.account_id,
                mailbox.mailbox,
                mailbox.tokens.access_token,
                mailbox.tokens.refresh_token,
                mailbox.scopes,
                format_time(&mailbox.linked_at),
            ],
        )?;
        Ok(())
    }

    fn get_mailbox(&self, key: &MailboxKey) -> Result<Option<LinkedMailbox>> {
        let row = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {} FROM linked_mailboxes WHERE user_id = ? AND gmail = ?",
                    MAILBOX_COLUMNS
                ),
                params![key.account_id, key.mailbox],
                mailbox_row,
            )
            .optional()?;
        row.map(into_mailbox).transpose()
    }

    fn list_mailboxes(&self, account_id: i64) -> Result<Vec<LinkedMailbox>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM linked_mailboxes WHERE user_id = ? ORDER BY gmail",
            MAILBOX_COLUMNS
        ))?;
        let rows = stmt
            .query_map([account_id], mailbox_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(into_mailbox).collect()
    }

    fn update_access_token(&self, key: &MailboxKey, access_token: &str) -> Result<bool> {
        let updated = self.conn().execute(
            "UPDATE linked_mailboxes SET access_token = ? WHERE user_id = ? AND gmail = ?",
            params![access_token, key.account_id, key.mailbox],
        )?;
        Ok(updated > 0)
    }

    fn delete_mailbox(&self, key: &MailboxKey) -> Result<bool> {
        let deleted = self.conn().execute(
            "DELETE FROM linked_mailboxes WHERE user_id = ? AND gmail = ?",
            params![key.account_id, key.mailbox],
        )?;
        Ok(deleted > 0)
    }
}
