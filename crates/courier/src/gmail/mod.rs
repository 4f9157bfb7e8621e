//! Gmail API integration
//!
//! This module provides:
//! - Google OAuth2 code exchange, token refresh and userinfo lookup
//! - Gmail API client for searching and fetching messages
//! - Parsing of Gmail message payloads into [`EmailContent`](crate::models::EmailContent)

pub mod api;
mod auth;
mod client;
mod normalize;

pub use auth::{GoogleOAuth, OAuthProvider, TokenGrant};
pub use client::{GmailClient, recent_search_query, search_query};
pub use normalize::parse_email;
