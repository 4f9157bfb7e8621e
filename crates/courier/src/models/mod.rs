//! Domain models

mod account;
mod email;
mod mailbox;

pub use account::{Account, PasswordReset, Session};
pub use email::{EmailContent, MessageId, PollOutcome, SearchFilter};
pub use mailbox::{LinkedMailbox, MailboxKey, MailboxTokens};
