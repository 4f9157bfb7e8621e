//! Persistence for accounts, sessions and linked mailboxes
//!
//! Two backends implement the same traits: [`SqliteStore`] for the server and
//! [`InMemoryStore`] for tests.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AccountStore, CredentialStore};
