//! HTTP route table

mod auth;
mod gmail;
mod sheets;

use std::sync::Arc;

use axum::extract::FromRequest;
use axum::routing::{delete, get, post};
use axum::{Router, middleware};

use crate::cors::cors;
use crate::error::ApiError;
use crate::state::AppState;

/// JSON request body whose rejection renders as an [`ApiError`]
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Trimmed, non-empty value of an optional request field
pub(crate) fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/forgot-password", post(auth::forgot_password))
        .route("/api/auth/reset-password", post(auth::reset_password))
        .route("/api/google-client-id", get(gmail::google_client_id))
        .route(
            "/api/gmail/tokens",
            get(gmail::list_mailboxes)
                .post(gmail::link_mailbox)
                .delete(gmail::unlink_mailbox),
        )
        .route("/api/gmail/wait-for-email", post(gmail::wait_for_email))
        .route("/api/gmail/read-last-email", post(gmail::read_last_email))
        .route(
            "/api/sheets",
            get(sheets::list_sheets).post(sheets::create_sheet),
        )
        .route("/api/sheets/:file_id", delete(sheets::delete_sheet))
        .route(
            "/api/sheets/:file_id/values/:range",
            get(sheets::read_values).put(sheets::update_values),
        )
        .route("/api/sheets/:file_id/style/:range", post(sheets::update_style))
        .fallback(not_found)
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let response = not_found().await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_required_trims_and_rejects_blank() {
        assert_eq!(required(&Some("  a@x.com ".to_string())), Some("a@x.com"));
        assert_eq!(required(&Some("   ".to_string())), None);
        assert_eq!(required(&None), None);
    }

    mod through_router {
        use super::super::test_support::{TestApp, signed_in};
        use super::super::router;
        use axum::body::{Body, to_bytes};
        use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, AUTHORIZATION, CONTENT_TYPE};
        use axum::http::{Method, Request, StatusCode};
        use axum::response::Response;
        use serde_json::{Value, json};
        use tower::ServiceExt;

        async fn send(app: &TestApp, request: Request<Body>) -> Response {
            router(app.state.clone()).oneshot(request).await.unwrap()
        }

        async fn json_body(response: Response) -> Value {
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            serde_json::from_slice(&bytes).unwrap()
        }

        fn request(method: Method, uri: &str) -> Request<Body> {
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap()
        }

        fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
            Request::builder()
                .method(method)
                .uri(uri)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap()
        }

        #[tokio::test]
        async fn test_unknown_path_is_json_404_with_cors() {
            let app = TestApp::new();
            let response = send(&app, request(Method::GET, "/api/nope")).await;

            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
            assert_eq!(json_body(response).await, json!({ "error": "Not found" }));
        }

        #[tokio::test]
        async fn test_preflight_is_answered_with_204() {
            let app = TestApp::new();
            let response = send(&app, request(Method::OPTIONS, "/api/sheets")).await;

            assert_eq!(response.status(), StatusCode::NO_CONTENT);
            let headers = response.headers();
            assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
            assert!(
                headers["access-control-allow-headers"]
                    .to_str()
                    .unwrap()
                    .contains("Authorization")
            );
        }

        #[tokio::test]
        async fn test_wait_without_session_is_401_with_cors() {
            let app = TestApp::new();
            let response = send(
                &app,
                json_request(
                    Method::POST,
                    "/api/gmail/wait-for-email",
                    json!({ "gmail": "a@gmail.com", "timeout": 5 }),
                ),
            )
            .await;

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
            assert_eq!(json_body(response).await, json!({ "error": "Unauthorized" }));
            assert_eq!(app.mail.check_count(), 0);
        }

        #[tokio::test]
        async fn test_public_routes_are_wired() {
            let app = TestApp::new();

            let response = send(&app, request(Method::GET, "/api/google-client-id")).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                json_body(response).await,
                json!("test-client.apps.googleusercontent.com")
            );

            let response = send(
                &app,
                json_request(
                    Method::POST,
                    "/api/auth/register",
                    json!({ "email": "new@example.com", "password": "pw" }),
                ),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        #[tokio::test]
        async fn test_signed_in_routes_are_wired() {
            let app = TestApp::new();
            let (account_id, token) = signed_in(&app.state, "user@example.com");
            app.link(account_id, "a@gmail.com", "ya29.ok");
            let bearer = format!("Bearer {}", token);

            let mut list = request(Method::GET, "/api/gmail/tokens");
            list.headers_mut().insert(AUTHORIZATION, bearer.parse().unwrap());
            let response = send(&app, list).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(json_body(response).await[0]["gmail"], "a@gmail.com");

            let mut read = request(Method::GET, "/api/sheets/sheet-1/values/A1%3AB2?gmail=a%40gmail.com");
            read.headers_mut().insert(AUTHORIZATION, bearer.parse().unwrap());
            let response = send(&app, read).await;
            assert_eq!(response.status(), StatusCode::OK);
            let calls = app.sheets.calls();
            assert_eq!(calls[0].op, "read");
            assert_eq!(calls[0].args["range"], "A1:B2");

            let mut write = json_request(
                Method::PUT,
                "/api/sheets/sheet-1/values/A1",
                json!({ "gmail": "a@gmail.com", "values": [["1"]] }),
            );
            write.headers_mut().insert(AUTHORIZATION, bearer.parse().unwrap());
            let response = send(&app, write).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(app.sheets.calls()[1].op, "update");
        }

        #[tokio::test]
        async fn test_wrong_method_is_rejected() {
            let app = TestApp::new();
            let response = send(&app, request(Method::GET, "/api/gmail/wait-for-email")).await;
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        }
    }
}
