//! Mailbox linking and the wait/read endpoints

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use courier::{
    EmailContent, LinkedMailbox, MailboxKey, MailboxTokens, SearchFilter, read_last_email_with_refresh,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{ApiJson, required};
use crate::error::ApiError;
use crate::session::AuthUser;
use crate::state::AppState;

/// Public OAuth client id, so the browser can start the consent flow
pub async fn google_client_id(State(state): State<Arc<AppState>>) -> Json<String> {
    Json(state.oauth.client_id().to_string())
}

#[derive(Debug, Serialize)]
pub struct MailboxSummary {
    gmail: String,
    scopes: String,
}

pub async fn list_mailboxes(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<MailboxSummary>>, ApiError> {
    let mailboxes = state
        .mailboxes
        .list_mailboxes(user.account_id)?
        .into_iter()
        .map(|m| MailboxSummary {
            gmail: m.mailbox,
            scopes: m.scopes,
        })
        .collect();
    Ok(Json(mailboxes))
}

#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    code: Option<String>,
}

pub async fn link_mailbox(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(body): ApiJson<LinkRequest>,
) -> Result<Json<Value>, ApiError> {
    let code = required(&body.code)
        .ok_or_else(|| ApiError::bad_request("Authorization code is required"))?;

    let linked = async {
        let grant = state.oauth.exchange_code(code).await?;
        let gmail = state.oauth.user_email(&grant.access_token).await?;
        anyhow::Ok((grant, gmail))
    }
    .await;
    let (grant, gmail) = linked.map_err(|e| {
        warn!("Failed to link Gmail account: {:#}", e);
        ApiError::Upstream("Failed to add Gmail account".to_string())
    })?;

    let mailbox = LinkedMailbox::new(
        user.account_id,
        gmail.clone(),
        MailboxTokens::new(grant.access_token, grant.refresh_token),
        grant.scope,
    );
    state.refresh_gate.forget(&mailbox.key());
    state.mailboxes.upsert_mailbox(mailbox)?;

    info!("Linked {} to account {}", gmail, user.account_id);
    Ok(Json(json!({ "gmail": gmail })))
}

#[derive(Debug, Deserialize)]
pub struct UnlinkRequest {
    gmail: Option<String>,
}

pub async fn unlink_mailbox(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(body): ApiJson<UnlinkRequest>,
) -> Result<Json<Value>, ApiError> {
    let gmail = required(&body.gmail).ok_or_else(|| ApiError::bad_request("Gmail is required"))?;

    let key = MailboxKey::new(user.account_id, gmail);
    state.mailboxes.delete_mailbox(&key)?;
    state.refresh_gate.forget(&key);

    Ok(Json(json!({ "message": "Gmail token deleted successfully" })))
}

#[derive(Debug, Deserialize)]
pub struct WaitRequest {
    #[serde(alias = "mailbox")]
    gmail: Option<String>,
    #[serde(alias = "senderFilter")]
    sender: Option<String>,
    #[serde(alias = "timeoutSeconds")]
    timeout: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct WaitResponse {
    success: bool,
    email: Option<EmailContent>,
}

/// Store a token obtained by refreshing; the result still goes to the caller
/// when the write fails
fn persist_refreshed(state: &AppState, key: &MailboxKey, token: Option<&str>) {
    let Some(token) = token else {
        return;
    };
    match state.mailboxes.update_access_token(key, token) {
        Ok(true) => info!("Stored refreshed access token for {}", key.mailbox),
        Ok(false) => warn!("{} was unlinked while its token was refreshed", key.mailbox),
        Err(e) => warn!("Failed to store refreshed token for {}: {:#}", key.mailbox, e),
    }
}

pub async fn wait_for_email(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(body): ApiJson<WaitRequest>,
) -> Result<Json<WaitResponse>, ApiError> {
    let gmail = required(&body.gmail).ok_or_else(|| ApiError::bad_request("Gmail is required"))?;
    let mailbox = state.linked_mailbox(user.account_id, gmail)?;

    let key = mailbox.key();
    let filter = SearchFilter::new(body.sender.as_deref());
    let timeout = body
        .timeout
        .unwrap_or(state.settings.default_wait_timeout_secs);
    let refresher = state.mailbox_refresher(key.clone());
    let cancel = state.shutdown.child_token();

    let waited = courier::wait_for_email(
        state.mail.as_ref(),
        &refresher,
        &mailbox.tokens,
        &filter,
        timeout,
        &cancel,
    )
    .await;

    let report = match waited {
        Ok(report) => report,
        Err(failure) => {
            warn!("Waiting for email in {} failed: {}", gmail, failure);
            persist_refreshed(&state, &key, failure.refreshed_token.as_deref());
            return Err(failure.error.into());
        }
    };
    persist_refreshed(&state, &key, report.refreshed_token.as_deref());

    let email = report.outcome.into_email();
    Ok(Json(WaitResponse {
        success: email.is_some(),
        email,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ReadRequest {
    #[serde(alias = "mailbox")]
    gmail: Option<String>,
    #[serde(alias = "senderFilter")]
    sender: Option<String>,
}

pub async fn read_last_email(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(body): ApiJson<ReadRequest>,
) -> Result<Json<EmailContent>, ApiError> {
    let gmail = required(&body.gmail).ok_or_else(|| ApiError::bad_request("Gmail is required"))?;
    let mailbox = state.linked_mailbox(user.account_id, gmail)?;

    let key = mailbox.key();
    let refresher = state.mailbox_refresher(key.clone());
    let read = read_last_email_with_refresh(
        state.mail.as_ref(),
        &refresher,
        &mailbox.tokens,
        &SearchFilter::new(body.sender.as_deref()),
    )
    .await;

    let report = match read {
        Ok(report) => report,
        Err(failure) => {
            warn!("Reading last email in {} failed: {}", gmail, failure);
            persist_refreshed(&state, &key, failure.refreshed_token.as_deref());
            return Err(failure.error.into());
        }
    };
    persist_refreshed(&state, &key, report.refreshed_token.as_deref());
    Ok(Json(report.email))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{LINK_CODE, LINKED_GMAIL, TestApp, signed_in};
    use axum::http::StatusCode;
    use courier::CredentialStore;
    use courier::testing::{ScriptedMail, StaticRefresher, message_from};

    fn wait_request(gmail: &str, sender: Option<&str>, timeout: Option<i64>) -> ApiJson<WaitRequest> {
        ApiJson(WaitRequest {
            gmail: Some(gmail.to_string()),
            sender: sender.map(str::to_string),
            timeout,
        })
    }

    #[tokio::test]
    async fn test_client_id_is_public() {
        let app = TestApp::new();
        let Json(id) = google_client_id(State(app.state.clone())).await;
        assert_eq!(id, "test-client.apps.googleusercontent.com");
    }

    #[tokio::test]
    async fn test_link_list_and_unlink() {
        let app = TestApp::new();
        let (account_id, _) = signed_in(&app.state, "user@example.com");
        let user = AuthUser { account_id };

        let Json(linked) = link_mailbox(
            State(app.state.clone()),
            user,
            ApiJson(LinkRequest {
                code: Some(LINK_CODE.to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(linked["gmail"], LINKED_GMAIL);

        let Json(listed) = list_mailboxes(State(app.state.clone()), user).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].gmail, LINKED_GMAIL);
        assert!(listed[0].scopes.contains("gmail.readonly"));

        let stored = app
            .store
            .get_mailbox(&MailboxKey::new(account_id, LINKED_GMAIL))
            .unwrap()
            .unwrap();
        assert_eq!(stored.tokens.refresh_token, "1//linked");

        unlink_mailbox(
            State(app.state.clone()),
            user,
            ApiJson(UnlinkRequest {
                gmail: Some(LINKED_GMAIL.to_string()),
            }),
        )
        .await
        .unwrap();
        let Json(listed) = list_mailboxes(State(app.state.clone()), user).await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_bad_code_is_upstream_failure() {
        let app = TestApp::new();
        let err = link_mailbox(
            State(app.state.clone()),
            AuthUser { account_id: 1 },
            ApiJson(LinkRequest {
                code: Some("expired-code".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "Failed to add Gmail account");
    }

    #[tokio::test]
    async fn test_mailbox_of_another_account_is_not_found() {
        let app = TestApp::new();
        app.link(2, "theirs@gmail.com", "ya29.theirs");

        let err = wait_for_email(
            State(app.state.clone()),
            AuthUser { account_id: 1 },
            wait_request("theirs@gmail.com", None, Some(5)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Gmail not found or unauthorized");
        assert_eq!(app.mail.check_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_gmail_is_bad_request() {
        let app = TestApp::new();
        let err = read_last_email(
            State(app.state.clone()),
            AuthUser { account_id: 1 },
            ApiJson(ReadRequest {
                gmail: None,
                sender: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_email_and_stores_refreshed_token() {
        let mail = ScriptedMail::new()
            .with_message(message_from("m1", "alerts@y.com", "Your code is 1234"))
            .rejecting("ya29.stale");
        let app = TestApp::with_mail(mail, StaticRefresher::granting(["ya29.fresh"]));
        let key = app.link(1, "a@gmail.com", "ya29.stale");

        let Json(response) = wait_for_email(
            State(app.state.clone()),
            AuthUser { account_id: 1 },
            wait_request("a@gmail.com", Some("alerts@y.com"), Some(30)),
        )
        .await
        .unwrap();

        assert!(response.success);
        assert_eq!(response.email.unwrap().body, "Your code is 1234");
        assert_eq!(app.stored_access_token(&key), "ya29.fresh");
        assert_eq!(app.refresher.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_reports_no_email() {
        let app = TestApp::new();
        app.link(1, "a@gmail.com", "ya29.ok");

        let Json(response) = wait_for_email(
            State(app.state.clone()),
            AuthUser { account_id: 1 },
            wait_request("a@gmail.com", Some("alerts@y.com"), Some(5)),
        )
        .await
        .unwrap();

        assert!(!response.success);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({ "success": false, "email": null }));
        assert_eq!(app.mail.check_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_without_timeout_uses_default() {
        let app = TestApp::new();
        app.link(1, "a@gmail.com", "ya29.ok");

        wait_for_email(
            State(app.state.clone()),
            AuthUser { account_id: 1 },
            wait_request("a@gmail.com", None, None),
        )
        .await
        .unwrap();

        // 60 s default: checks at 0, 5, ... 55
        assert_eq!(app.mail.check_count(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_wait() {
        let app = TestApp::new();
        app.link(1, "a@gmail.com", "ya29.ok");
        app.state.shutdown.cancel();

        let err = wait_for_email(
            State(app.state.clone()),
            AuthUser { account_id: 1 },
            wait_request("a@gmail.com", None, Some(60)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_failure_is_upstream_error() {
        let mail = ScriptedMail::new().rejecting("ya29.stale");
        let app = TestApp::with_mail(mail, StaticRefresher::rejecting());
        let key = app.link(1, "a@gmail.com", "ya29.stale");

        let err = wait_for_email(
            State(app.state.clone()),
            AuthUser { account_id: 1 },
            wait_request("a@gmail.com", None, Some(60)),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert!(err.to_string().starts_with("Failed to refresh token"));
        assert_eq!(app.stored_access_token(&key), "ya29.stale");
    }

    #[tokio::test]
    async fn test_read_last_email_refreshes_once() {
        let mail = ScriptedMail::new()
            .with_message(message_from("m1", "alerts@y.com", "hello"))
            .rejecting("ya29.stale");
        let app = TestApp::with_mail(mail, StaticRefresher::granting(["ya29.fresh"]));
        let key = app.link(1, "a@gmail.com", "ya29.stale");

        let Json(email) = read_last_email(
            State(app.state.clone()),
            AuthUser { account_id: 1 },
            ApiJson(ReadRequest {
                gmail: Some("a@gmail.com".to_string()),
                sender: None,
            }),
        )
        .await
        .unwrap();

        assert_eq!(email.body, "hello");
        assert_eq!(app.stored_access_token(&key), "ya29.fresh");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_stores_refreshed_token() {
        let mail = ScriptedMail::new().rejecting("ya29.stale");
        let app = TestApp::with_mail(mail, StaticRefresher::granting(["ya29.fresh"]));
        let key = app.link(1, "a@gmail.com", "ya29.stale");

        let shutdown = app.state.shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(7)).await;
            shutdown.cancel();
        });

        let err = wait_for_email(
            State(app.state.clone()),
            AuthUser { account_id: 1 },
            wait_request("a@gmail.com", None, Some(60)),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(app.stored_access_token(&key), "ya29.fresh");
    }

    #[tokio::test]
    async fn test_failed_read_retry_stores_refreshed_token() {
        let mail = ScriptedMail::new()
            .rejecting("ya29.stale")
            .with_listings(vec![Err(courier::MailError::Transient("503".to_string()))]);
        let app = TestApp::with_mail(mail, StaticRefresher::granting(["ya29.fresh"]));
        let key = app.link(1, "a@gmail.com", "ya29.stale");

        let err = read_last_email(
            State(app.state.clone()),
            AuthUser { account_id: 1 },
            ApiJson(ReadRequest {
                gmail: Some("a@gmail.com".to_string()),
                sender: None,
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(app.stored_access_token(&key), "ya29.fresh");
    }

    #[tokio::test]
    async fn test_read_empty_mailbox_is_not_found() {
        let app = TestApp::new();
        app.link(1, "a@gmail.com", "ya29.ok");

        let err = read_last_email(
            State(app.state.clone()),
            AuthUser { account_id: 1 },
            ApiJson(ReadRequest {
                gmail: Some("a@gmail.com".to_string()),
                sender: Some("alerts@y.com".to_string()),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "No emails found");
    }

    #[test]
    fn test_wait_request_accepts_aliases() {
        let request: WaitRequest = serde_json::from_str(
            r#"{ "mailbox": "a@gmail.com", "senderFilter": "alerts@y.com", "timeoutSeconds": 30 }"#,
        )
        .unwrap();
        assert_eq!(request.gmail.as_deref(), Some("a@gmail.com"));
        assert_eq!(request.sender.as_deref(), Some("alerts@y.com"));
        assert_eq!(request.timeout, Some(30));
    }
}
