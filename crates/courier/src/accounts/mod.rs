//! Credentials for local accounts: password hashing and random tokens

mod password;
mod token;

pub use password::{generate_password, hash_password, verify_password};
pub use token::generate_token;
