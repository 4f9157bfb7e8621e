//! Registration, login and password reset

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use courier::accounts::{generate_password, generate_token, hash_password, verify_password};
use courier::{Account, PasswordReset, Session};
use log::{debug, error, info};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ApiJson, required};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    email: Option<String>,
    password: Option<String>,
}

impl Credentials {
    fn required(&self) -> Result<(&str, &str), ApiError> {
        match (required(&self.email), self.password.as_deref()) {
            (Some(email), Some(password)) if !password.is_empty() => Ok((email, password)),
            _ => Err(ApiError::bad_request("Email and password are required")),
        }
    }
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<Credentials>,
) -> Result<Json<Value>, ApiError> {
    let (email, password) = body.required()?;

    let account = Account::new(email, hash_password(password)?);
    if state.accounts.create_account(account)?.is_none() {
        return Err(ApiError::bad_request("Email already registered"));
    }

    info!("Registered account {}", email);
    Ok(Json(json!({ "message": "User registered successfully" })))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<Credentials>,
) -> Result<Json<Value>, ApiError> {
    let (email, password) = body.required()?;

    let account = state
        .accounts
        .find_account_by_email(email)?
        .filter(|account| verify_password(password, &account.password_hash))
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    let now = Utc::now();
    let pruned = state.accounts.delete_expired_sessions(now)?;
    if pruned > 0 {
        debug!("Pruned {} expired session(s)", pruned);
    }

    let token = generate_token()?;
    state.accounts.create_session(Session {
        token: token.clone(),
        account_id: account.id,
        expires_at: now + state.settings.session_ttl(),
    })?;

    Ok(Json(json!({ "token": token })))
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    email: Option<String>,
}

pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = required(&body.email).ok_or_else(|| ApiError::bad_request("Email is required"))?;

    if state.accounts.find_account_by_email(email)?.is_none() {
        return Err(ApiError::bad_request("Email not found"));
    }

    let token = generate_token()?;
    let expires_at = Utc::now() + state.settings.reset_ttl();
    state
        .accounts
        .create_password_reset(PasswordReset::new(token.clone(), email, expires_at))?;

    let link = state.settings.reset_link(&token);
    if let Err(e) = state.notifier.send_reset_link(email, &link).await {
        error!("Failed to send reset email to {}: {:#}", email, e);
        return Err(ApiError::Upstream("Failed to send reset email".to_string()));
    }

    Ok(Json(json!({ "message": "Password reset email sent" })))
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    token: Option<String>,
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<ResetPasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    let token = required(&body.token).ok_or_else(|| ApiError::bad_request("Token is required"))?;

    let reset = state
        .accounts
        .find_password_reset(token)?
        .ok_or_else(|| ApiError::bad_request("Invalid token"))?;
    if reset.used {
        return Err(ApiError::bad_request("Token already used"));
    }
    if reset.is_expired(Utc::now()) {
        return Err(ApiError::bad_request("Token expired"));
    }

    let password = generate_password()?;
    state
        .accounts
        .update_password(&reset.email, &hash_password(&password)?)?;
    state.accounts.mark_password_reset_used(token)?;

    info!("Password reset for {}", reset.email);
    Ok(Json(json!({
        "message": "Password has been reset successfully",
        "password": password
    })))
}
