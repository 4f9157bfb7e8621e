//! Bearer-token authentication for API routes

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;

use crate::error::ApiError;
use crate::state::AppState;

/// The account behind a valid, unexpired session token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub account_id: i64,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))?;

        let session = state
            .accounts
            .find_session(token)?
            .filter(|session| !session.is_expired(Utc::now()))
            .ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string()))?;

        Ok(AuthUser {
            account_id: session.account_id,
        })
    }
}
