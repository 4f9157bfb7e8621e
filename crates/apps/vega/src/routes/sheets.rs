//! Spreadsheet endpoints, run with a linked mailbox's stored access token

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use courier::sheets::style_request_body;
use log::warn;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ApiJson, required};
use crate::error::ApiError;
use crate::session::AuthUser;
use crate::state::AppState;

const MISSING_PARAMETERS: &str = "Missing required parameters";

fn missing() -> ApiError {
    ApiError::bad_request(MISSING_PARAMETERS)
}

fn upstream(action: &str, err: anyhow::Error) -> ApiError {
    warn!("{}: {:#}", action, err);
    ApiError::Upstream(format!("{}: {:#}", action, err))
}

/// Access token of the caller's link to `gmail`
fn access_token(state: &AppState, account_id: i64, gmail: &Option<String>) -> Result<String, ApiError> {
    let gmail = required(gmail).ok_or_else(missing)?;
    Ok(state.linked_mailbox(account_id, gmail)?.tokens.access_token)
}

#[derive(Debug, Deserialize)]
pub struct MailboxQuery {
    gmail: Option<String>,
}

pub async fn list_sheets(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<MailboxQuery>,
) -> Result<Json<Value>, ApiError> {
    let token = access_token(&state, user.account_id, &query.gmail)?;
    let files = state
        .sheets
        .list_spreadsheets(&token)
        .await
        .map_err(|e| upstream("Failed to list spreadsheets", e))?;
    Ok(Json(files))
}

#[derive(Debug, Deserialize)]
pub struct CreateSheetRequest {
    gmail: Option<String>,
    title: Option<String>,
}

pub async fn create_sheet(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(body): ApiJson<CreateSheetRequest>,
) -> Result<Json<Value>, ApiError> {
    let title = required(&body.title).ok_or_else(missing)?;
    let token = access_token(&state, user.account_id, &body.gmail)?;
    let sheet = state
        .sheets
        .create_spreadsheet(&token, title)
        .await
        .map_err(|e| upstream("Failed to create spreadsheet", e))?;
    Ok(Json(sheet))
}

#[derive(Debug, Deserialize)]
pub struct DeleteSheetRequest {
    gmail: Option<String>,
}

pub async fn delete_sheet(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(file_id): Path<String>,
    ApiJson(body): ApiJson<DeleteSheetRequest>,
) -> Result<Json<Value>, ApiError> {
    let token = access_token(&state, user.account_id, &body.gmail)?;
    state
        .sheets
        .delete_file(&token, &file_id)
        .await
        .map_err(|e| upstream("Failed to delete file", e))?;
    Ok(Json(json!({ "message": "File deleted successfully" })))
}

pub async fn read_values(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((file_id, range)): Path<(String, String)>,
    Query(query): Query<MailboxQuery>,
) -> Result<Json<Value>, ApiError> {
    let token = access_token(&state, user.account_id, &query.gmail)?;
    let values = state
        .sheets
        .read_range(&token, &file_id, &range)
        .await
        .map_err(|e| upstream("Failed to read range", e))?;
    Ok(Json(values))
}

#[derive(Debug, Deserialize)]
pub struct UpdateValuesRequest {
    gmail: Option<String>,
    values: Option<Value>,
}

pub async fn update_values(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((file_id, range)): Path<(String, String)>,
    ApiJson(body): ApiJson<UpdateValuesRequest>,
) -> Result<Json<Value>, ApiError> {
    let values = body
        .values
        .filter(Value::is_array)
        .ok_or_else(missing)?;
    let token = access_token(&state, user.account_id, &body.gmail)?;
    let updated = state
        .sheets
        .update_range(&token, &file_id, &range, &values)
        .await
        .map_err(|e| upstream("Failed to update range", e))?;
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStyleRequest {
    gmail: Option<String>,
    style: Option<Value>,
}

pub async fn update_style(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path((file_id, range)): Path<(String, String)>,
    ApiJson(body): ApiJson<UpdateStyleRequest>,
) -> Result<Json<Value>, ApiError> {
    let style = body.style.ok_or_else(missing)?;
    // Reject malformed styles and ranges before spending a Google call
    style_request_body(&range, &style).map_err(|e| ApiError::bad_request(format!("{:#}", e)))?;

    let token = access_token(&state, user.account_id, &body.gmail)?;
    let updated = state
        .sheets
        .update_style(&token, &file_id, &range, &style)
        .await
        .map_err(|e| upstream("Failed to update style", e))?;
    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::TestApp;
    use axum::http::StatusCode;
    use courier::testing::RecordingSheets;

    const USER: AuthUser = AuthUser { account_id: 1 };

    fn gmail() -> Option<String> {
        Some("a@gmail.com".to_string())
    }

    fn linked(app: TestApp) -> TestApp {
        app.link(1, "a@gmail.com", "ya29.sheets");
        app
    }

    #[tokio::test]
    async fn test_list_uses_stored_access_token() {
        let app = linked(TestApp::new());

        let Json(files) = list_sheets(
            State(app.state.clone()),
            USER,
            Query(MailboxQuery { gmail: gmail() }),
        )
        .await
        .unwrap();

        assert_eq!(files["files"][0]["id"], "sheet-1");
        let calls = app.sheets.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].op, "list");
        assert_eq!(calls[0].access_token, "ya29.sheets");
    }

    #[tokio::test]
    async fn test_missing_gmail_is_bad_request() {
        let app = linked(TestApp::new());
        let err = list_sheets(
            State(app.state.clone()),
            USER,
            Query(MailboxQuery { gmail: None }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), MISSING_PARAMETERS);
        assert!(app.sheets.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unlinked_mailbox_is_not_found() {
        let app = TestApp::new();
        let err = read_values(
            State(app.state.clone()),
            USER,
            Path(("sheet-1".to_string(), "A1:B2".to_string())),
            Query(MailboxQuery { gmail: gmail() }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_requires_title() {
        let app = linked(TestApp::new());
        let err = create_sheet(
            State(app.state.clone()),
            USER,
            ApiJson(CreateSheetRequest {
                gmail: gmail(),
                title: Some("  ".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let Json(sheet) = create_sheet(
            State(app.state.clone()),
            USER,
            ApiJson(CreateSheetRequest {
                gmail: gmail(),
                title: Some("Codes".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(sheet["properties"]["title"], "Codes");
    }

    #[tokio::test]
    async fn test_delete_reports_success() {
        let app = linked(TestApp::new());
        let Json(body) = delete_sheet(
            State(app.state.clone()),
            USER,
            Path("sheet-1".to_string()),
            ApiJson(DeleteSheetRequest { gmail: gmail() }),
        )
        .await
        .unwrap();

        assert_eq!(body["message"], "File deleted successfully");
        assert_eq!(app.sheets.calls()[0].args["fileId"], "sheet-1");
    }

    #[tokio::test]
    async fn test_update_values_must_be_an_array() {
        let app = linked(TestApp::new());
        let update = |values: Value| {
            update_values(
                State(app.state.clone()),
                USER,
                Path(("sheet-1".to_string(), "Sheet1!A1".to_string())),
                ApiJson(UpdateValuesRequest {
                    gmail: gmail(),
                    values: Some(values),
                }),
            )
        };

        let err = update(json!("1234")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let Json(body) = update(json!([["1234"]])).await.unwrap();
        assert_eq!(body["updatedRange"], "Sheet1!A1");
        assert_eq!(app.sheets.calls()[0].args["values"], json!([["1234"]]));
    }

    #[tokio::test]
    async fn test_style_accepts_json_string() {
        let app = linked(TestApp::new());
        update_style(
            State(app.state.clone()),
            USER,
            Path(("sheet-1".to_string(), "A1:B2".to_string())),
            ApiJson(UpdateStyleRequest {
                gmail: gmail(),
                style: Some(json!(r#"{"textFormat":{"bold":true}}"#)),
            }),
        )
        .await
        .unwrap();

        let calls = app.sheets.calls();
        assert_eq!(calls[0].op, "style");
        let repeat = &calls[0].args["requests"][0]["repeatCell"];
        assert_eq!(repeat["fields"], "userEnteredFormat(textFormat)");
    }

    #[tokio::test]
    async fn test_invalid_style_is_bad_request() {
        let app = linked(TestApp::new());
        let err = update_style(
            State(app.state.clone()),
            USER,
            Path(("sheet-1".to_string(), "A1".to_string())),
            ApiJson(UpdateStyleRequest {
                gmail: gmail(),
                style: Some(json!(["bold"])),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(app.sheets.calls().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_style_range_is_bad_request() {
        let app = linked(TestApp::new());
        let err = update_style(
            State(app.state.clone()),
            USER,
            Path(("sheet-1".to_string(), "AAAAAAAAAAAAAAA1".to_string())),
            ApiJson(UpdateStyleRequest {
                gmail: gmail(),
                style: Some(json!({ "textFormat": { "bold": true } })),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(app.sheets.calls().is_empty());
    }

    #[tokio::test]
    async fn test_google_failure_is_bad_gateway() {
        let app = linked(TestApp::with_sheets(RecordingSheets::failing()));
        let err = list_sheets(
            State(app.state.clone()),
            USER,
            Query(MailboxQuery { gmail: gmail() }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "Failed to list spreadsheets: http status: 403");
    }
}
